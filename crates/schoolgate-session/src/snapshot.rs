//! Snapshot types: what consumers of the session layer get to see.
//!
//! Dashboards and forms never touch the session manager's internals.
//! They hold a `watch` receiver of [`SessionSnapshot`] values and react
//! to changes. The snapshot is a value type: cloning it is cheap enough
//! and nothing a consumer does to its copy can leak back in.

use serde::{Deserialize, Serialize};

use schoolgate_model::{ConnectionError, Profile, Session};

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Where the session lifecycle currently stands.
///
/// The phase machine, with the connection-error flag orthogonal to it
/// (any phase can carry an error):
///
/// ```text
/// Uninitialized ──→ CheckingConnection ──→ FetchingSession ──┬──→ NoSession
///       ↑                  │                     │           │
///       └──────(failure)───┴─────(timeout)───────┘           └──→ FetchingProfile
///                                                                   │        │
///                                                            Ready ←┘        └→ ProfileMissing
/// ```
///
/// `Ready`, `NoSession`, and `ProfileMissing` are the steady states a
/// consumer renders from:
/// - **Ready**: session and profile both present, show the dashboard.
/// - **NoSession**: nobody signed in, redirect to the sign-in view.
/// - **ProfileMissing**: signed in but no profile row (account
///   provisioning in progress, or the row was unreachable). This is a
///   distinct state, NOT an error: the consumer shows a provisioning /
///   retry view.
///
/// A failed bootstrap returns to `Uninitialized` with the connection
/// error set; a retry re-enters `CheckingConnection` from there.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
pub enum SessionPhase {
    /// Nothing has run yet, or the last bootstrap attempt failed.
    #[default]
    Uninitialized,

    /// Probing backend reachability.
    CheckingConnection,

    /// Racing the session fetch against its deadline.
    FetchingSession,

    /// Session present; racing the profile fetch against its deadline.
    FetchingProfile,

    /// Session and profile both present.
    Ready,

    /// No authenticated principal.
    NoSession,

    /// Session present, profile row absent or unreachable.
    ProfileMissing,
}

impl SessionPhase {
    /// Whether bootstrap got past the session fetch. Once it has, the
    /// auth-change subscription is live and keeps the projection
    /// current; before that, only a retry can move the machine.
    pub fn past_session_fetch(&self) -> bool {
        matches!(
            self,
            SessionPhase::FetchingProfile
                | SessionPhase::Ready
                | SessionPhase::NoSession
                | SessionPhase::ProfileMissing
        )
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// The read-only projection consumers render from.
///
/// Mutated only by the session manager, in response to its own async
/// completions or the auth-change channel. Consumers treat every field
/// as read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    /// Current lifecycle phase.
    pub phase: SessionPhase,

    /// The authenticated principal, if any.
    pub user: Option<Session>,

    /// The principal's profile, once loaded.
    pub profile: Option<Profile>,

    /// The shared connectivity diagnostic. When `is_error` is set, a
    /// global connection-error view preempts normal rendering.
    pub connection_error: ConnectionError,
}

impl SessionSnapshot {
    /// Whether a consumer should render a loading state.
    ///
    /// True while an operation is in flight and no connection error has
    /// been raised; a raised error always takes precedence over the
    /// spinner so the user is never stuck watching one.
    pub fn loading(&self) -> bool {
        !self.connection_error.is_error
            && matches!(
                self.phase,
                SessionPhase::Uninitialized
                    | SessionPhase::CheckingConnection
                    | SessionPhase::FetchingSession
                    | SessionPhase::FetchingProfile
            )
    }

    /// Whether the account is in the "provisioning" window: signed in,
    /// but no profile row visible yet. Consumers must render this as a
    /// provisioning view, never as an error.
    pub fn provisioning(&self) -> bool {
        self.user.is_some() && self.profile.is_none()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use schoolgate_model::UserId;

    fn signed_in_snapshot(phase: SessionPhase) -> SessionSnapshot {
        SessionSnapshot {
            phase,
            user: Some(Session {
                user_id: UserId("u-1".into()),
                email: "a@b.com".into(),
            }),
            profile: None,
            connection_error: ConnectionError::none(),
        }
    }

    #[test]
    fn test_default_is_uninitialized_and_loading() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.phase, SessionPhase::Uninitialized);
        assert!(snapshot.loading());
        assert!(!snapshot.connection_error.is_error);
    }

    #[test]
    fn test_steady_phases_are_not_loading() {
        for phase in [
            SessionPhase::Ready,
            SessionPhase::NoSession,
            SessionPhase::ProfileMissing,
        ] {
            let snapshot = SessionSnapshot {
                phase,
                ..Default::default()
            };
            assert!(!snapshot.loading(), "{phase:?} must not read as loading");
        }
    }

    #[test]
    fn test_connection_error_overrides_loading() {
        // A failed bootstrap leaves the phase at Uninitialized with the
        // error set; the consumer must see the error view, not a spinner.
        let snapshot = SessionSnapshot {
            connection_error: ConnectionError::unreachable("down", None),
            ..Default::default()
        };
        assert!(!snapshot.loading());
    }

    #[test]
    fn test_provisioning_requires_user_without_profile() {
        let snapshot = signed_in_snapshot(SessionPhase::ProfileMissing);
        assert!(snapshot.provisioning());

        let signed_out = SessionSnapshot::default();
        assert!(!signed_out.provisioning());
    }

    #[test]
    fn test_past_session_fetch_classification() {
        assert!(!SessionPhase::Uninitialized.past_session_fetch());
        assert!(!SessionPhase::CheckingConnection.past_session_fetch());
        assert!(!SessionPhase::FetchingSession.past_session_fetch());
        assert!(SessionPhase::FetchingProfile.past_session_fetch());
        assert!(SessionPhase::Ready.past_session_fetch());
        assert!(SessionPhase::NoSession.past_session_fetch());
        assert!(SessionPhase::ProfileMissing.past_session_fetch());
    }
}
