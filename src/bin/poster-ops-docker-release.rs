use clap::Parser;
use poster_ops::docker::release::*;

fn main() -> Result<(), anyhow::Error> {
    docker_release(DockerReleaseArgs::parse())
}
