//! Error types for the session layer.

use std::time::Duration;

use schoolgate_backend::BackendError;
use schoolgate_model::UserId;

/// Errors surfaced by [`SessionManager`](crate::SessionManager)
/// operations.
///
/// Propagation policy:
/// - [`Auth`](SessionError::Auth) and
///   [`ProfileCreation`](SessionError::ProfileCreation) go only to the
///   immediate caller (a form submit handler) for inline display. They
///   never set the shared connection-error projection.
/// - [`Connectivity`](SessionError::Connectivity) and
///   [`Timeout`](SessionError::Timeout) additionally update the shared
///   projection (with one exception: a sign-in that failed
///   network-shaped while the follow-up probe succeeded is surfaced as
///   `Connectivity` without touching the projection; a one-off glitch
///   must not raise the global error view).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend rejected the credentials or the identity request
    /// (wrong password, duplicate email, weak password). The message is
    /// the backend's, verbatim. Never retried.
    #[error("{message}")]
    Auth {
        /// Machine error code from the backend, when it sent one.
        code: Option<String>,
        /// The backend's message, passed through for inline display.
        message: String,
    },

    /// Phase one of sign-up succeeded but phase two failed: the
    /// identity exists without a usable profile. There is no automatic
    /// rollback: the caller must tell the user explicitly ("account
    /// created but profile setup failed; retry or contact support").
    #[error("account created but profile setup failed for {user_id}: {source}")]
    ProfileCreation {
        /// The identity that now exists without a profile row.
        user_id: UserId,
        /// The insert failure.
        #[source]
        source: BackendError,
    },

    /// A connectivity-dependent operation failed for a non-credential
    /// reason.
    #[error("connection problem: {0}")]
    Connectivity(String),

    /// A race against a fixed deadline was lost. A specialization of
    /// connectivity failure with its own message so the error view can
    /// say "timed out" instead of "unreachable".
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        /// Which operation lost its race.
        operation: &'static str,
        /// The deadline it lost against.
        limit: Duration,
    },
}

impl SessionError {
    /// Whether this error is connectivity-shaped (the kind that feeds
    /// the shared connection-error projection and automatic retry).
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SessionError::Connectivity(_) | SessionError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_is_not_connectivity() {
        let err = SessionError::Auth {
            code: None,
            message: "Invalid login credentials".into(),
        };
        assert!(!err.is_connectivity());
    }

    #[test]
    fn test_profile_creation_is_not_connectivity() {
        let err = SessionError::ProfileCreation {
            user_id: UserId("u-1".into()),
            source: BackendError::Unavailable { status: 500 },
        };
        assert!(!err.is_connectivity());
        // The message must name the stranded identity.
        assert!(err.to_string().contains("u-1"));
    }

    #[test]
    fn test_timeout_is_connectivity() {
        let err = SessionError::Timeout {
            operation: "session fetch",
            limit: Duration::from_secs(8),
        };
        assert!(err.is_connectivity());
        assert!(err.to_string().contains("session fetch"));
    }

    #[test]
    fn test_auth_message_is_verbatim() {
        let err = SessionError::Auth {
            code: Some("invalid_credentials".into()),
            message: "Invalid login credentials".into(),
        };
        assert_eq!(err.to_string(), "Invalid login credentials");
    }
}
