//! # Resolution Errors
//!
//! One error enum covers everything that can go wrong while turning a request
//! into a document. Parameter problems and write rejections surface before any
//! I/O is issued; remote failures surface after I/O and abort the whole request.

use thiserror::Error;

/// Boxed error produced by external collaborators (local adapters).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the resolver.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A filter, sort, page or include value is malformed or cannot be
    /// coerced to the attribute's declared type.
    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameterKind { parameter: String, reason: String },

    /// A filter or sort names an attribute the resource does not allow.
    #[error("Unknown attribute '{attribute}' on '{resource}' for {usage}")]
    UnknownAttribute {
        resource: String,
        attribute: String,
        usage: &'static str,
    },

    /// No resource is registered under the given key.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// A `show` request matched no record.
    #[error("Record not found: {resource} {id}")]
    RecordNotFound { resource: String, id: String },

    /// An upstream service failed while resolving a remote subtree.
    #[error("Remote error: {0}")]
    RemoteError(String),

    /// A write was attempted against a remote-backed resource.
    #[error("Resource '{0}' is remote and does not support writes")]
    RemoteWriteUnsupported(String),

    /// A remote service answered 2xx with a body that is not a JSON:API document.
    #[error("Malformed remote response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Error raised by the local adapter, passed through as-is.
    #[error(transparent)]
    Adapter(BoxError),
}

impl GraphError {
    pub(crate) fn invalid(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::InvalidParameterKind {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// HTTP-equivalent status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            GraphError::InvalidParameterKind { .. } | GraphError::UnknownAttribute { .. } => 400,
            GraphError::UnknownResource(_) | GraphError::RecordNotFound { .. } => 404,
            GraphError::RemoteWriteUnsupported(_) => 405,
            GraphError::RemoteError(_) | GraphError::Decode(_) => 502,
            GraphError::Adapter(_) => 500,
        }
    }
}
