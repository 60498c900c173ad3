use std::time::Duration;

/// Errors returned by resource and data source operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stored identifier cannot be parsed. Never retried: it points at
    /// corrupted or hand-edited state rather than a transient condition.
    #[error("malformed resource identifier {id:?}: {reason}")]
    MalformedIdentifier { id: String, reason: &'static str },

    /// A metadata or attribute value was rejected before reaching the API server.
    #[error("invalid {attribute}: {message}")]
    Validation { attribute: String, message: String },

    /// A state attribute has the wrong JSON shape for its field.
    #[error("attribute {attribute:?} {message}")]
    InvalidAttribute {
        attribute: &'static str,
        message: String,
    },

    #[error("unsupported resource type {0:?}")]
    UnknownType(String),

    #[error("{0} can only be used as a data source")]
    ReadOnly(&'static str),

    /// The planned change touches attributes that cannot be updated in place.
    #[error("changes to {} require the resource to be replaced", .0.join(", "))]
    RequiresReplacement(Vec<String>),

    #[error("cannot import non-existent remote object {0:?}")]
    ImportNotFound(String),

    #[error("timed out after {timeout:?} waiting for {id} to be deleted")]
    DeleteTimeout { id: String, timeout: Duration },

    /// Errors from the Kubernetes client, passed through unchanged.
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Whether the API server reported the object as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(status)) if status.code == 404)
    }
}
