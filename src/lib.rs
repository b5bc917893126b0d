pub mod docker;

pub mod prelude {
    use super::*;
    pub use docker::prelude::*;
}
