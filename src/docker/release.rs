use anyhow::Error;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::{Command, Stdio};

#[derive(Clone, Debug, Parser)]
#[clap(author, version, about, long_about = None)]
pub struct DockerReleaseArgs {
    /// docker build context
    /// - defaults to the current working directory
    #[clap(short, long, default_value = ".")]
    pub context: PathBuf,

    /// local image name applied during build and used to resolve the built image id
    #[clap(short, long, default_value = "jellyfin-library-poster")]
    pub image: String,

    /// comma separated platform list passed to docker build
    #[clap(long, default_value = "linux/amd64,linux/arm64")]
    pub platform: String,

    /// registry reference the image is tagged with and pushed to
    #[clap(short, long, default_value = "evanqu/jellyfin-library-poster:latest")]
    pub push_tag: String,

    /// stop after tagging, do not push to the registry
    #[clap(long)]
    pub skip_push: bool,

    /// log commands prior to running them
    #[clap(short, long)]
    pub verbose: bool,
}

pub fn docker_release(docker_release_args: DockerReleaseArgs) -> Result<(), Error> {
    let DockerReleaseArgs {
        context,
        image,
        platform,
        push_tag,
        skip_push,
        verbose,
    } = docker_release_args;

    // catches malformed references before any docker invocation
    let registry = get_registry_from_tag(&push_tag)?;
    get_repository_from_tag(&push_tag)?;

    let context = context.display().to_string();
    let build_args = build_command_args(&image, &platform, &context);
    run_streamed("docker", &build_args.iter().map(|x| &**x).collect::<Vec<_>>(), verbose)?;

    let image_id = resolve_image_id(&image, verbose)?;

    run_streamed("docker", &["tag", &image_id, &push_tag], verbose)?;
    println!("tagged image {image_id} as {push_tag}");

    if skip_push {
        if verbose {
            println!("{}", "skipping push".to_string().dimmed());
        }
        return Ok(());
    }

    run_streamed("docker", &["push", &push_tag], verbose)?;
    println!("pushed {push_tag} to {registry}");

    Ok(())
}

pub fn build_command_args(image: &str, platform: &str, context: &str) -> Vec<String> {
    vec![
        "build".to_string(),
        "--platform".to_string(),
        platform.to_string(),
        "--tag".to_string(),
        image.to_string(),
        context.to_string(),
    ]
}

/// Resolves the id of the most recently built image with the given name by taking the
/// first line of `docker images <name> -q`. Ordering is whatever docker returns, which
/// in practice is most-recent-first.
pub fn resolve_image_id(image: &str, verbose: bool) -> Result<String, Error> {
    let cmd = "docker";
    let args = ["images", image, "-q"];
    if verbose {
        println!("{}", format!("{cmd} {}", args.join(" ")).dimmed());
    }

    let output = Command::new(cmd).args(args).stderr(Stdio::inherit()).output()?;

    if !output.status.success() {
        return Err(Error::msg(format!(
            "docker failed with status {}",
            output.status.code().unwrap()
        )));
    }

    let stdout = String::from_utf8(output.stdout)?;
    let image_id = first_image_id(&stdout)
        .ok_or_else(|| Error::msg(format!("no local image found with name: {image}")))?;

    Ok(image_id.to_string())
}

fn run_streamed(cmd: &str, args: &[&str], verbose: bool) -> Result<(), Error> {
    if verbose {
        println!("{}", format!("{cmd} {}", args.join(" ")).dimmed());
    }

    let output = Command::new(cmd)
        .args(args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .output()?;

    if !output.status.success() {
        return Err(Error::msg(format!(
            "docker failed with status {}",
            output.status.code().unwrap()
        )));
    }

    Ok(())
}

pub fn first_image_id(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).find(|line| !line.is_empty())
}

pub fn get_registry_from_tag(tag: &str) -> Result<&str, Error> {
    let registry = tag
        .split_once('/')
        .ok_or_else(|| Error::msg("cannot parse image registry from image tag: no `/` character found"))?
        .0;
    Ok(registry)
}

pub fn get_repository_from_tag(tag: &str) -> Result<&str, Error> {
    let non_registry = tag
        .split_once('/')
        .ok_or_else(|| Error::msg("cannot parse image repository from image tag: no `/` character found"))?
        .1;
    let repository = non_registry
        .split_once(':')
        .ok_or_else(|| Error::msg("cannot parse image repository from image tag: no `:` character found"))?
        .0;
    Ok(repository)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_args_matches_script_invocation() {
        let args = build_command_args("jellyfin-library-poster", "linux/amd64,linux/arm64", ".");
        assert_eq!(
            args,
            vec!["build", "--platform", "linux/amd64,linux/arm64", "--tag", "jellyfin-library-poster", "."]
        );
    }

    #[test]
    fn first_image_id_takes_first_line() {
        assert_eq!(first_image_id("abc123\ndef456\n"), Some("abc123"));
    }

    #[test]
    fn first_image_id_skips_blank_lines() {
        assert_eq!(first_image_id("\n  \nabc123\n"), Some("abc123"));
    }

    #[test]
    fn first_image_id_empty_output() {
        assert_eq!(first_image_id(""), None);
        assert_eq!(first_image_id("\n"), None);
    }

    #[test]
    fn parses_registry_and_repository() {
        let tag = "evanqu/jellyfin-library-poster:latest";
        assert_eq!(get_registry_from_tag(tag).unwrap(), "evanqu");
        assert_eq!(get_repository_from_tag(tag).unwrap(), "jellyfin-library-poster");
    }

    #[test]
    fn rejects_tag_without_registry() {
        assert!(get_registry_from_tag("jellyfin-library-poster:latest").is_err());
    }

    #[test]
    fn rejects_tag_without_version() {
        assert!(get_repository_from_tag("evanqu/jellyfin-library-poster").is_err());
    }
}
