pub mod release;

pub mod prelude {
    use super::*;
    pub use release::*;
}
