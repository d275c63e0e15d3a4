pub mod codec;
pub mod registry;
pub mod service;
