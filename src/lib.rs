pub mod error;
pub mod config;

pub mod rpc;

pub mod discovery;
pub mod listener;

pub mod caller;
pub mod registry;
pub mod service;

pub use caller::{Caller, PendingCall};
pub use config::Config;
pub use error::{Error, Result};
pub use rpc::registry::ServiceEndpoint;
pub use rpc::service::{ArgumentSpec, CallEnvelope, ResultEnvelope, ServiceContract};
