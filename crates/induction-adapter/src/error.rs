use crate::source::Capability;
use thiserror::Error;

/// Unified error type for every adapter, connection and fetch operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// Backend host could not be reached (DNS, refused, missing file)
    #[error("Host unreachable: {0}")]
    HostUnreachable(String),

    /// Credentials were rejected by the backend
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// Backend speaks a protocol or version this adapter does not understand
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// Operation did not finish before its deadline
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Connection failed for any other reason
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No registered adapter accepts the URL
    #[error("No adapter can connect to {0}")]
    NoAdapter(String),

    /// URL could not be parsed or is missing required components
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Query text could not be parsed by the backend
    #[error("Syntax error: {0}")]
    QuerySyntax(String),

    /// Query or expression uses something the backend does not support
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// Query parsed but failed while running (constraint, resources, ...)
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Backend aborted the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// A requested record index is outside the collection
    #[error("Index {index} out of range for {count} records")]
    IndexOutOfRange { index: usize, count: usize },

    /// Operation is not valid in the current connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A back-reference outlived the object it points to
    #[error("Detached: {0} is no longer available")]
    Detached(&'static str),

    /// Group, data source or database not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller asked for a capability the data source does not implement
    #[error("Data source does not support {0}")]
    CapabilityAbsent(Capability),

    /// Invalid configuration (fixtures, catalogs, arguments)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by hosts when presenting errors
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    Connection,
    Query,
    Usage,
    Internal,
}

impl DataError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::HostUnreachable(_)
            | DataError::AuthenticationRejected(_)
            | DataError::ProtocolMismatch(_)
            | DataError::Timeout(_)
            | DataError::ConnectionFailed(_)
            | DataError::NoAdapter(_)
            | DataError::InvalidUrl(_) => ErrorKind::Connection,
            DataError::QuerySyntax(_)
            | DataError::UnsupportedConstruct(_)
            | DataError::ExecutionFailed(_)
            | DataError::Cancelled
            | DataError::IndexOutOfRange { .. } => ErrorKind::Query,
            DataError::InvalidState(_)
            | DataError::Detached(_)
            | DataError::NotFound(_)
            | DataError::CapabilityAbsent(_)
            | DataError::InvalidConfiguration(_) => ErrorKind::Usage,
            DataError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Create a "not found" error with custom message
    pub fn not_found(msg: impl Into<String>) -> Self {
        DataError::NotFound(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        DataError::InvalidState(msg.into())
    }

    /// Create an unsupported construct error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        DataError::UnsupportedConstruct(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DataError::InvalidConfiguration(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        DataError::Internal(msg.into())
    }
}

impl From<url::ParseError> for DataError {
    fn from(err: url::ParseError) -> Self {
        DataError::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
