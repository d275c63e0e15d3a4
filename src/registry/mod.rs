pub mod service;
pub mod store;

pub use service::{RegistryServer, RegistryService};
pub use store::Store;
