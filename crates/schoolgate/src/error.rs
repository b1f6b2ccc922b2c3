//! Unified error type for the Schoolgate client.

use schoolgate_backend::BackendError;
use schoolgate_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `schoolgate` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SchoolgateError {
    /// A backend-level error (rejection, unreachable, malformed body).
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A session-level error (credential rejection, two-phase sign-up
    /// breakage, connectivity failure, timeout).
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl SchoolgateError {
    /// Whether the wrapped error is connectivity-shaped (feeds the
    /// shared connection-error projection and automatic retry).
    pub fn is_connectivity(&self) -> bool {
        match self {
            SchoolgateError::Backend(e) => e.is_connectivity(),
            SchoolgateError::Session(e) => e.is_connectivity(),
        }
    }
}
