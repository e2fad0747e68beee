//! Failure taxonomy for calls made to the upstream services.
//!
//! Every failed upstream call is classified into exactly one of three
//! kinds. The kind decides whether the call may be retried and which
//! status the caller finally sees; the payload keeps the upstream status
//! code and message so nothing gets generalized on the way out.

use std::fmt;

use thiserror::Error;

/// The tag of an [`UpstreamError`], used by retry predicates and by the
/// inbound layer to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The upstream answered 404 for the requested id.
    UpstreamNotFound,
    /// The upstream rejected the request with some other 4xx.
    UpstreamClientRejected,
    /// The upstream answered 5xx, sent garbage, or could not be reached.
    UpstreamUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UpstreamNotFound => "UpstreamNotFound",
            ErrorKind::UpstreamClientRejected => "UpstreamClientRejected",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
        };
        f.write_str(name)
    }
}

/// Errors raised by an upstream client.
///
/// `Display` is the bare message, which is also what the inbound layer
/// writes into the response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The upstream has nothing for the requested id. Never retried.
    #[error("{message}")]
    NotFound { status: u16, message: String },

    /// Any other 4xx; `message` is the upstream body verbatim. Never retried.
    #[error("{message}")]
    ClientRejected { status: u16, message: String },

    /// 5xx, undecodable body, or transport failure.
    ///
    /// `status` is `None` when no response arrived at all (connect error,
    /// per-call timeout).
    #[error("{message}")]
    Unavailable { status: Option<u16>, message: String },
}

impl UpstreamError {
    /// Movie-info 404 for `movie_id`.
    pub fn movie_info_not_found(movie_id: &str, status: u16) -> Self {
        UpstreamError::NotFound {
            status,
            message: format!("There is no MovieInfo available for the given Id: {}", movie_id),
        }
    }

    /// 5xx from `service`, embedding the upstream's own error text.
    pub fn server_error(service: &str, status: Option<u16>, upstream_message: &str) -> Self {
        UpstreamError::Unavailable {
            status,
            message: format!("Server error in {} {}", service, upstream_message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::NotFound { .. } => ErrorKind::UpstreamNotFound,
            UpstreamError::ClientRejected { .. } => ErrorKind::UpstreamClientRejected,
            UpstreamError::Unavailable { .. } => ErrorKind::UpstreamUnavailable,
        }
    }

    /// Upstream status code, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::NotFound { status, .. } => Some(*status),
            UpstreamError::ClientRejected { status, .. } => Some(*status),
            UpstreamError::Unavailable { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UpstreamError::NotFound { message, .. }
            | UpstreamError::ClientRejected { message, .. }
            | UpstreamError::Unavailable { message, .. } => message,
        }
    }

    /// Only an unhealthy upstream is worth asking again.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::UpstreamUnavailable
    }
}

/// Convenience type alias for upstream call results
pub type Result<T> = std::result::Result<T, UpstreamError>;
