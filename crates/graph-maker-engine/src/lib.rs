mod error;
mod maker;

pub use error::RunError;
pub use maker::*;
