//! Error types for the backend client layer.

use schoolgate_model::ConnectionError;

/// Errors reported by a [`BackendClient`](crate::BackendClient)
/// implementation.
///
/// The variants encode the one distinction the session layer must never
/// get wrong: a **rejection** (the service heard the request and said
/// no) versus a **connectivity failure** (the service could not be
/// reached, answered with a server error, or answered garbage). Wrong
/// passwords are rejections and stay scoped to the calling form;
/// everything else feeds the shared connection-error projection and is
/// eligible for automatic retry.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The service rejected the request: wrong password, duplicate
    /// email, weak password, constraint violation. Never retried.
    #[error("{message}")]
    Rejected {
        /// Machine error code from the service, when it sent one.
        code: Option<String>,
        /// The service's human-readable message, passed through verbatim.
        message: String,
    },

    /// The service could not be reached at all: connect failure, DNS,
    /// request timeout, aborted request.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The service answered, but with a server-side error status.
    #[error("backend unavailable (status {status})")]
    Unavailable {
        /// The HTTP status the service answered with.
        status: u16,
    },

    /// The service answered with a body this client cannot decode.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether this failure is connectivity-shaped (sets the shared
    /// connection-error projection, eligible for automatic retry).
    ///
    /// This is the typed replacement for sniffing "network" out of error
    /// message strings: the classification is decided once, where the
    /// error is constructed, not re-guessed at every call site.
    pub fn is_connectivity(&self) -> bool {
        !matches!(self, BackendError::Rejected { .. })
    }

    /// The machine code to surface in diagnostics, when one exists.
    pub fn code(&self) -> Option<String> {
        match self {
            BackendError::Rejected { code, .. } => code.clone(),
            BackendError::Unavailable { status } => Some(status.to_string()),
            BackendError::Unreachable(_) | BackendError::Malformed(_) => None,
        }
    }

    /// Builds the shared [`ConnectionError`] projection for this failure.
    pub fn to_connection_error(&self) -> ConnectionError {
        ConnectionError::unreachable(self.to_string(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_is_not_connectivity() {
        let err = BackendError::Rejected {
            code: Some("invalid_credentials".into()),
            message: "Invalid login credentials".into(),
        };
        assert!(!err.is_connectivity());
        assert_eq!(err.code().as_deref(), Some("invalid_credentials"));
    }

    #[test]
    fn test_unreachable_is_connectivity() {
        let err = BackendError::Unreachable("connection refused".into());
        assert!(err.is_connectivity());
        assert!(err.code().is_none());
    }

    #[test]
    fn test_unavailable_is_connectivity_with_status_code() {
        let err = BackendError::Unavailable { status: 503 };
        assert!(err.is_connectivity());
        assert_eq!(err.code().as_deref(), Some("503"));
    }

    #[test]
    fn test_malformed_is_connectivity() {
        assert!(BackendError::Malformed("truncated body".into()).is_connectivity());
    }

    #[test]
    fn test_rejected_message_passes_through_verbatim() {
        // The caller of sign-in displays this string inline; rewording it
        // here would hide the service's actual reason.
        let err = BackendError::Rejected {
            code: None,
            message: "Password should be at least 6 characters".into(),
        };
        assert_eq!(err.to_string(), "Password should be at least 6 characters");
    }

    #[test]
    fn test_to_connection_error_sets_flag_and_code() {
        let status = BackendError::Unavailable { status: 502 }.to_connection_error();
        assert!(status.is_error);
        assert_eq!(status.code.as_deref(), Some("502"));
        assert!(status.message.contains("502"));
    }
}
