//! Messages of the service call protocol and the contract a service
//! advertises when it registers.
//!
//! As with the registry messages, only field tags are encoded; field names
//! never appear in the bytes a peer receives.

/// Type tag of the placeholder argument used by contracts that take no input.
pub const VOID_TYPE: &str = "void";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArgumentSpec {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub type_tag: String,
    #[prost(string, tag = "3")]
    pub description: String,
}

impl ArgumentSpec {
    pub fn new(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        ArgumentSpec {
            name: name.into(),
            type_tag: type_tag.into(),
            description: description.into(),
        }
    }

    pub fn void() -> Self {
        Self::new(VOID_TYPE, VOID_TYPE, "no arguments")
    }

    pub fn is_void(&self) -> bool {
        self.type_tag == VOID_TYPE
    }
}

/// Static metadata describing a service. Type tags are documentation only;
/// every argument and result travels as a string.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceContract {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub result_type: String,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(message, repeated, tag = "4")]
    pub arguments: Vec<ArgumentSpec>,
}

impl ServiceContract {
    pub fn new(
        name: impl Into<String>,
        result_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        ServiceContract {
            name: name.into(),
            result_type: result_type.into(),
            description: description.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(
        mut self,
        name: impl Into<String>,
        type_tag: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.arguments.push(ArgumentSpec::new(name, type_tag, description));
        self
    }

    pub fn with_void_argument(mut self) -> Self {
        self.arguments.push(ArgumentSpec::void());
        self
    }

    /// Number of real arguments a caller has to supply. A single `void`
    /// argument counts as none.
    pub fn arity(&self) -> usize {
        match self.arguments.as_slice() {
            [only] if only.is_void() => 0,
            args => args.len(),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallEnvelope {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, repeated, tag = "2")]
    pub arguments: Vec<String>,
}

impl CallEnvelope {
    pub fn new<I, S>(service_name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CallEnvelope {
            service_name: service_name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn argument(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).map(String::as_str)
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultEnvelope {
    #[prost(string, tag = "1")]
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_contract_has_no_arity() {
        let contract = ServiceContract::new("random", "int", "Generates a random int")
            .with_void_argument();
        assert_eq!(contract.arity(), 0);
        assert_eq!(contract.arguments.len(), 1);
    }

    #[test]
    fn test_contract_arity() {
        let contract = ServiceContract::new("concatenate", "variable", "")
            .with_argument("service1", "string", "first service name")
            .with_argument("service2", "string", "second service name")
            .with_argument("service", "string", "new service name");
        assert_eq!(contract.arity(), 3);

        let empty = ServiceContract::new("noop", "", "");
        assert_eq!(empty.arity(), 0);
    }

    #[test]
    fn test_call_envelope_argument() {
        let call = CallEnvelope::new("double", ["21"]);
        assert_eq!(call.argument(0), Some("21"));
        assert_eq!(call.argument(1), None);
    }
}
