//! The shared connection-error projection.
//!
//! One structure, owned by the session layer, read by every view: when
//! the most recent connectivity-dependent operation failed for a
//! non-credential reason, the flag is set and a global connection-error
//! view preempts the dashboards. Credential rejections never land here;
//! they are surfaced inline to whichever form triggered them.

use serde::{Deserialize, Serialize};

/// Transient diagnostic state for backend reachability.
///
/// Lifecycle: reset to "no error" at the start of every
/// connectivity-dependent operation, set on failure, cleared by the next
/// successful probe. Not persisted anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionError {
    /// Whether the most recent connectivity-dependent operation failed.
    pub is_error: bool,

    /// Human-readable description, suitable for the error view.
    pub message: String,

    /// Machine error code when the failure had one (`"timeout"`,
    /// an HTTP status, a backend error code).
    pub code: Option<String>,

    /// Opaque extra detail for diagnostics, never interpreted.
    pub details: Option<String>,
}

impl ConnectionError {
    /// The cleared state: no error, empty message.
    pub fn none() -> Self {
        Self {
            is_error: false,
            message: String::new(),
            code: None,
            details: None,
        }
    }

    /// A connectivity failure with a message and optional code.
    pub fn unreachable(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            is_error: true,
            message: message.into(),
            code,
            details: None,
        }
    }

    /// A lost race against a fixed deadline.
    pub fn timeout(operation: &str, limit: std::time::Duration) -> Self {
        Self {
            is_error: true,
            message: format!(
                "{operation} timed out after {:.1}s — the server may be unreachable",
                limit.as_secs_f64()
            ),
            code: Some("timeout".into()),
            details: None,
        }
    }

    /// Attaches an opaque detail payload.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl Default for ConnectionError {
    fn default() -> Self {
        Self::none()
    }
}
