//! Operator schemas and compiled-function storage for the tracelang
//! frontend.

pub mod function;
pub mod prelude;
pub mod registry;

pub use function::CompiledFunction;
pub use registry::OpRegistry;
