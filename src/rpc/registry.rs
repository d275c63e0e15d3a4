//! Messages of the registry control protocol and of discovery.
//!
//! Every request on the control port is a [`ControlRequest`] whose `kind`
//! says whether it is a registration or a lookup, so the registry never has
//! to guess from the payload.
//!
//! Field names are not on the wire. Protobuf carries only field tags, so a
//! renamed field stays compatible while a retagged one does not.

use std::collections::HashMap;

use super::service::ServiceContract;

/// A service's network address paired with its contract.
///
/// On registration `address` holds the claimed listening port only; the
/// registry rewrites it to `peer-ip:port` before storing it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceEndpoint {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, optional, tag = "2")]
    pub contract: Option<ServiceContract>,
}

impl ServiceEndpoint {
    pub fn new(address: impl Into<String>, contract: ServiceContract) -> Self {
        ServiceEndpoint {
            address: address.into(),
            contract: Some(contract),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.contract.as_ref().map(|c| c.name.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Operation {
    Unspecified = 0,
    Address = 1,
    Info = 2,
    List = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LookupRequest {
    #[prost(enumeration = "Operation", tag = "1")]
    pub operation: i32,
    /// Ignored for [`Operation::List`].
    #[prost(string, tag = "2")]
    pub service_name: String,
}

impl LookupRequest {
    pub fn new(operation: Operation, service_name: impl Into<String>) -> Self {
        LookupRequest {
            operation: operation as i32,
            service_name: service_name.into(),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceListing {
    #[prost(map = "string, message", tag = "1")]
    pub services: HashMap<String, ServiceEndpoint>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LookupResponse {
    #[prost(oneof = "lookup_response::Outcome", tags = "1, 2, 3, 4")]
    pub outcome: Option<lookup_response::Outcome>,
}

pub mod lookup_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Outcome {
        #[prost(string, tag = "1")]
        Address(String),
        #[prost(message, tag = "2")]
        Endpoint(super::ServiceEndpoint),
        #[prost(message, tag = "3")]
        Listing(super::ServiceListing),
        /// Carries the name that was looked up.
        #[prost(string, tag = "4")]
        NotFound(String),
    }
}

impl LookupResponse {
    pub fn address(address: impl Into<String>) -> Self {
        LookupResponse {
            outcome: Some(lookup_response::Outcome::Address(address.into())),
        }
    }

    pub fn endpoint(endpoint: ServiceEndpoint) -> Self {
        LookupResponse {
            outcome: Some(lookup_response::Outcome::Endpoint(endpoint)),
        }
    }

    pub fn listing(services: HashMap<String, ServiceEndpoint>) -> Self {
        LookupResponse {
            outcome: Some(lookup_response::Outcome::Listing(ServiceListing { services })),
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        LookupResponse {
            outcome: Some(lookup_response::Outcome::NotFound(name.into())),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControlRequest {
    #[prost(oneof = "control_request::Kind", tags = "1, 2")]
    pub kind: Option<control_request::Kind>,
}

pub mod control_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Register(super::ServiceEndpoint),
        #[prost(message, tag = "2")]
        Lookup(super::LookupRequest),
    }
}

impl ControlRequest {
    pub fn register(endpoint: ServiceEndpoint) -> Self {
        ControlRequest {
            kind: Some(control_request::Kind::Register(endpoint)),
        }
    }

    pub fn lookup(operation: Operation, service_name: impl Into<String>) -> Self {
        ControlRequest {
            kind: Some(control_request::Kind::Lookup(LookupRequest::new(
                operation,
                service_name,
            ))),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControlResponse {
    #[prost(oneof = "control_response::Reply", tags = "1, 2")]
    pub reply: Option<control_response::Reply>,
}

pub mod control_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Reply {
        /// The endpoint as stored, with its rewritten address.
        #[prost(message, tag = "1")]
        Registered(super::ServiceEndpoint),
        #[prost(message, tag = "2")]
        Lookup(super::LookupResponse),
    }
}

impl ControlResponse {
    pub fn registered(endpoint: ServiceEndpoint) -> Self {
        ControlResponse {
            reply: Some(control_response::Reply::Registered(endpoint)),
        }
    }

    pub fn lookup(response: LookupResponse) -> Self {
        ControlResponse {
            reply: Some(control_response::Reply::Lookup(response)),
        }
    }
}
