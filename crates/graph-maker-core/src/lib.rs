pub mod form_schema;
mod graph;
mod request;
mod validation;

pub use graph::*;
pub use request::*;
pub use validation::*;
