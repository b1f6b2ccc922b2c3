//! Backend client abstraction for Schoolgate.
//!
//! Provides the [`BackendClient`] trait that abstracts over the hosted
//! backend-as-a-service: session retrieval, auth-state-change
//! notifications, credential operations, and profile row access. The
//! session layer is written entirely against this trait, so it can run
//! against the real service, the in-memory backend, or a scripted test
//! double without changing a line.
//!
//! # Feature Flags
//!
//! - `http` (default) — hosted-service implementation via `reqwest`

mod error;
#[cfg(feature = "http")]
mod http;
mod memory;

pub use error::BackendError;
#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use memory::MemoryBackend;

// Re-exported so implementors don't need a direct tokio-util dependency
// for the profile-fetch abort signal.
pub use tokio_util::sync::CancellationToken;

use schoolgate_model::{AuthChange, NewProfile, Profile, Session, UserId};
use tokio::sync::broadcast;

/// A client for the hosted backend-as-a-service.
///
/// # Trait bounds
///
/// - `Send + Sync` → the client is shared across async tasks (the
///   session manager's bootstrap path and its subscription pump both
///   hold it).
/// - `'static` → it doesn't borrow temporary data; it lives as long as
///   the session layer itself.
///
/// The async methods are declared in the `-> impl Future + Send` form so
/// generic callers can spawn the returned futures onto the runtime.
/// Implementations still write plain `async fn`.
///
/// # Contract notes
///
/// - Every session transition an implementation performs (sign-in,
///   sign-up, sign-out, token refresh) MUST be announced on the channel
///   returned by [`subscribe_auth_changes`](Self::subscribe_auth_changes).
///   The session layer applies session state exclusively from that
///   channel.
/// - [`probe_health`](Self::probe_health) must be side-effect free:
///   probing repeatedly with no backend state change yields the same
///   verdict every time.
/// - [`sign_out`](Self::sign_out) is best-effort: implementations clear
///   their local token state and emit `SignedOut` even when the
///   revocation call cannot reach the service; the service remains the
///   source of truth for token invalidation.
pub trait BackendClient: Send + Sync + 'static {
    /// Checks whether the service is reachable at all.
    ///
    /// Lightweight and unauthenticated; the verdict distinguishes
    /// "the network path works" from "the network path is down", nothing
    /// more.
    fn probe_health(&self)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Fetches the current session, if a principal is signed in.
    ///
    /// `Ok(None)` means "nobody is signed in" and is not an error.
    fn fetch_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Subscribes to auth-state-change notifications.
    ///
    /// The channel is long-lived: it delivers every session transition
    /// from the moment of subscription until the receiver is dropped.
    /// Dropping the receiver is deregistration.
    fn subscribe_auth_changes(&self) -> broadcast::Receiver<AuthChange>;

    /// Creates a new identity (phase one of sign-up) and signs it in.
    ///
    /// Returns the new identity's session. Rejections (duplicate email,
    /// weak password) come back as [`BackendError::Rejected`].
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, BackendError>> + Send;

    /// Verifies credentials and signs the principal in.
    ///
    /// On success the new session is delivered through the auth-change
    /// channel, not through this return value.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Signs the current principal out (best-effort, see contract notes).
    fn sign_out(&self)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Fetches the profile row keyed by `user_id`.
    ///
    /// `Ok(None)` means "no row yet": a valid provisioning state, not a
    /// failure. The call must return promptly once `abort` fires; the
    /// session layer cancels it when the fetch loses its timeout race.
    fn fetch_profile(
        &self,
        user_id: &UserId,
        abort: CancellationToken,
    ) -> impl Future<Output = Result<Option<Profile>, BackendError>> + Send;

    /// Inserts the profile row created in phase two of sign-up.
    fn insert_profile(
        &self,
        profile: NewProfile,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}
