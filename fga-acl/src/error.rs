//! Error types for ACL permission queries.

use std::fmt;

/// Errors that can occur while classifying or executing a permission query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclError {
    /// Invalid or incomplete connection configuration.
    Configuration(String),
    /// A predicate column required by the active relation policy is unbound.
    MissingPredicate(&'static str),
    /// The bound predicates cannot be turned into a backend tuple filter.
    InvalidFilterCombination(String),
    /// The OpenFGA server could not be reached.
    BackendUnavailable(String),
    /// The OpenFGA server returned an error.
    BackendRpc { code: String, message: String },
    /// The request timed out.
    Timeout,
    /// A list-users result was a subject set or a wildcard.
    UnsupportedSubjectKind(String),
    /// No store was configured and none is active on the server.
    NoActiveStore,
    /// The configured store does not exist.
    StoreNotFound(String),
    /// The configured store has been soft-deleted.
    StoreDeleted { id: String, name: String },
    /// The configured authorization model does not exist, or the store has none.
    ModelNotFound(String),
    /// The caller cancelled the query.
    Cancelled,
}

impl fmt::Display for AclError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclError::Configuration(msg) => write!(f, "Invalid OpenFGA config: {}", msg),
            AclError::MissingPredicate(column) => {
                write!(f, "Missing required predicate: {} must be set", column)
            }
            AclError::InvalidFilterCombination(msg) => {
                write!(f, "Invalid predicate combination: {}", msg)
            }
            AclError::BackendUnavailable(msg) => write!(f, "OpenFGA unavailable: {}", msg),
            AclError::BackendRpc { code, message } => {
                write!(f, "OpenFGA server error ({}): {}", code, message)
            }
            AclError::Timeout => write!(f, "OpenFGA request timed out"),
            AclError::UnsupportedSubjectKind(kind) => {
                write!(f, "{} subjects are not supported in list users results", kind)
            }
            AclError::NoActiveStore => write!(f, "No active OpenFGA store found"),
            AclError::StoreNotFound(id) => write!(f, "OpenFGA store not found: {}", id),
            AclError::StoreDeleted { id, name } => {
                write!(f, "OpenFGA store is deleted: {} [{}]", id, name)
            }
            AclError::ModelNotFound(msg) => {
                write!(f, "OpenFGA authorization model not found: {}", msg)
            }
            AclError::Cancelled => write!(f, "Query cancelled"),
        }
    }
}

impl std::error::Error for AclError {}

impl From<tonic::transport::Error> for AclError {
    fn from(err: tonic::transport::Error) -> Self {
        AclError::BackendUnavailable(err.to_string())
    }
}

impl From<tonic::Status> for AclError {
    fn from(status: tonic::Status) -> Self {
        use tonic::Code;

        match status.code() {
            Code::DeadlineExceeded => AclError::Timeout,
            Code::Unavailable => AclError::BackendUnavailable(status.message().to_string()),
            code => AclError::BackendRpc {
                code: format!("{:?}", code),
                message: status.message().to_string(),
            },
        }
    }
}
