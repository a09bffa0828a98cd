//! The offer desk's tools.
//!
//! - [`catalog`]: the declarations advertised to the model
//! - [`args`]: typed arguments, coerced once from the model's argument bag
//! - [`dispatcher`]: runs one call request against the stores

pub mod args;
pub mod catalog;
pub mod dispatcher;

pub use args::ToolInvocation;
pub use catalog::{ToolName, catalog};
pub use dispatcher::Dispatcher;
