pub mod runtime;

pub use runtime::{serve, ServiceRuntime};
