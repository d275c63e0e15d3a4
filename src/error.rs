use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// No registry answered discovery, or its reply was unusable.
    RegistryUnavailable(String),
    /// The registry has no endpoint under the requested name.
    ServiceNotFound(String),
    /// A wire payload could not be decoded.
    Decode(String),
    /// A payload exceeded the maximum frame size.
    Oversize(usize),
    /// Dial, accept, read or write failure.
    Connection(std::io::Error),
    Parse(String),
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RegistryUnavailable(msg) => write!(f, "Registry unavailable: {}", msg),
            Error::ServiceNotFound(name) => write!(f, "Service not found: {}", name),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
            Error::Oversize(len) => write!(
                f,
                "Payload of {} bytes exceeds the {} byte frame limit",
                len,
                crate::config::MAX_FRAME_SIZE
            ),
            Error::Connection(err) => write!(f, "Connection error: {}", err),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Connection(err)
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<std::net::AddrParseError> for Error {
    fn from(err: std::net::AddrParseError) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<tokio::sync::AcquireError> for Error {
    fn from(err: tokio::sync::AcquireError) -> Self {
        Error::Internal(err.to_string())
    }
}

#[test]
fn test_io_error_is_connection_error() {
    let err: Error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
    assert!(matches!(err, Error::Connection(_)));
    assert!(std::error::Error::source(&err).is_some());
}
