//! In-memory implementation of [`BackendClient`] for development,
//! demos, and tests.
//!
//! Behaves like the hosted service with the network removed: accounts
//! and profile rows live in process-local maps, identities are minted
//! locally, and the same auth-change broadcast discipline applies. Two
//! knobs simulate the conditions the session layer has to survive:
//!
//! - [`set_offline`](MemoryBackend::set_offline) — every network-shaped
//!   call fails `Unreachable` while set, and the health probe's verdict
//!   flips with it (and with nothing else, so the probe stays
//!   idempotent).
//! - [`hold_profiles`](MemoryBackend::hold_profiles) — profile reads
//!   return "no row yet" even for rows that exist, simulating the
//!   provisioning window between identity creation and row visibility.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use schoolgate_model::{
    AuthChange, AuthEventKind, NewProfile, Profile, RoleDetails, Session, UserId,
};

use crate::{BackendClient, BackendError};

/// Minimum accepted password length, matching the hosted service's
/// default policy.
const MIN_PASSWORD_LEN: usize = 6;

/// Auth-change channel capacity (see the HTTP backend for the lag
/// semantics).
const AUTH_CHANNEL_CAPACITY: usize = 32;

/// An in-memory [`BackendClient`].
///
/// Cheap to clone: clones share the same state, so a demo or test can
/// keep one handle for its control knobs while the session layer owns
/// another.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    offline: AtomicBool,
    hold_profiles: AtomicBool,
    /// Artificial latency applied to every network-shaped call.
    latency: Mutex<Duration>,
    changes: broadcast::Sender<AuthChange>,
}

#[derive(Default)]
struct State {
    /// Accounts keyed by email.
    accounts: HashMap<String, Account>,
    /// Profile rows keyed by the owning identity.
    profiles: HashMap<UserId, Profile>,
    /// The signed-in principal, if any.
    session: Option<Session>,
}

struct Account {
    user_id: UserId,
    password: String,
}

impl MemoryBackend {
    /// Creates an empty backend: no accounts, no profiles, nobody
    /// signed in, online.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                offline: AtomicBool::new(false),
                hold_profiles: AtomicBool::new(false),
                latency: Mutex::new(Duration::ZERO),
                changes,
            }),
        }
    }

    /// Simulates an outage: while set, every network-shaped call fails
    /// with [`BackendError::Unreachable`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::Release);
    }

    /// Simulates provisioning lag: while set, profile reads return
    /// `Ok(None)` even for rows that exist.
    pub fn hold_profiles(&self, hold: bool) {
        self.inner.hold_profiles.store(hold, Ordering::Release);
    }

    /// Adds artificial latency to every network-shaped call.
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock().expect("latency lock poisoned") = latency;
    }

    /// Test/demo inspection: the stored profile row for `user_id`,
    /// bypassing the network simulation.
    pub fn stored_profile(&self, user_id: &UserId) -> Option<Profile> {
        self.lock_state().profiles.get(user_id).cloned()
    }

    /// Test/demo inspection: whether an account exists for `email`.
    pub fn has_account(&self, email: &str) -> bool {
        self.lock_state().accounts.contains_key(email)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().expect("state lock poisoned")
    }

    /// The simulated network leg of every call: optional latency, then
    /// the offline check.
    async fn network(&self) -> Result<(), BackendError> {
        let latency = *self.inner.latency.lock().expect("latency lock poisoned");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.inner.offline.load(Ordering::Acquire) {
            return Err(BackendError::Unreachable(
                "simulated outage: backend offline".into(),
            ));
        }
        Ok(())
    }

    fn announce(&self, kind: AuthEventKind, session: Option<Session>) {
        // Send fails only when nobody is subscribed, which is fine.
        let _ = self.inner.changes.send(AuthChange { kind, session });
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendClient for MemoryBackend {
    async fn probe_health(&self) -> Result<(), BackendError> {
        // Pure function of the offline flag: no state is read or
        // written, so repeated probes always agree.
        self.network().await
    }

    async fn fetch_session(&self) -> Result<Option<Session>, BackendError> {
        self.network().await?;
        Ok(self.lock_state().session.clone())
    }

    fn subscribe_auth_changes(&self) -> broadcast::Receiver<AuthChange> {
        self.inner.changes.subscribe()
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        self.network().await?;

        if password.len() < MIN_PASSWORD_LEN {
            return Err(BackendError::Rejected {
                code: Some("weak_password".into()),
                message: format!(
                    "Password should be at least {MIN_PASSWORD_LEN} characters"
                ),
            });
        }

        let session = {
            let mut state = self.lock_state();
            if state.accounts.contains_key(email) {
                return Err(BackendError::Rejected {
                    code: Some("user_already_exists".into()),
                    message: "A user with this email address has already been registered"
                        .into(),
                });
            }

            let user_id = UserId::random();
            state.accounts.insert(
                email.to_string(),
                Account {
                    user_id: user_id.clone(),
                    password: password.to_string(),
                },
            );
            let session = Session {
                user_id,
                email: email.to_string(),
            };
            state.session = Some(session.clone());
            session
        };

        tracing::debug!(user_id = %session.user_id, "identity created");
        self.announce(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), BackendError> {
        self.network().await?;

        let session = {
            let mut state = self.lock_state();
            // Unknown email and wrong password produce the same
            // rejection, like the hosted service (no account
            // enumeration).
            let user_id = state
                .accounts
                .get(email)
                .filter(|account| account.password == password)
                .map(|account| account.user_id.clone());
            match user_id {
                Some(user_id) => {
                    let session = Session {
                        user_id,
                        email: email.to_string(),
                    };
                    state.session = Some(session.clone());
                    session
                }
                None => {
                    return Err(BackendError::Rejected {
                        code: Some("invalid_credentials".into()),
                        message: "Invalid login credentials".into(),
                    });
                }
            }
        };

        self.announce(AuthEventKind::SignedIn, Some(session));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        // Local sign-out first, unconditionally: the projection clears
        // even when the simulated revocation call fails below.
        self.lock_state().session = None;
        self.announce(AuthEventKind::SignedOut, None);
        self.network().await
    }

    async fn fetch_profile(
        &self,
        user_id: &UserId,
        abort: CancellationToken,
    ) -> Result<Option<Profile>, BackendError> {
        tokio::select! {
            result = self.network() => result?,
            _ = abort.cancelled() => {
                return Err(BackendError::Unreachable("profile fetch aborted".into()));
            }
        }

        if self.inner.hold_profiles.load(Ordering::Acquire) {
            return Ok(None);
        }
        Ok(self.lock_state().profiles.get(user_id).cloned())
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<(), BackendError> {
        self.network().await?;

        let mut state = self.lock_state();
        if state.profiles.contains_key(&profile.user_id) {
            return Err(BackendError::Rejected {
                code: Some("23505".into()),
                message: format!("a profile already exists for {}", profile.user_id),
            });
        }

        let now = Utc::now();
        let (grade, section, subjects) = match &profile.details {
            RoleDetails::Admin => (None, None, None),
            RoleDetails::Teacher { subjects } => (None, None, Some(subjects.clone())),
            RoleDetails::Student { grade, section } => {
                (Some(grade.clone()), Some(section.clone()), None)
            }
        };
        let row = Profile {
            id: profile.user_id.clone(),
            full_name: profile.full_name,
            role: profile.details.role(),
            bio: None,
            avatar_url: None,
            grade,
            section,
            subjects,
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(profile.user_id, row);
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use schoolgate_model::UserRole;

    fn ada_details() -> RoleDetails {
        RoleDetails::Student {
            grade: "10".into(),
            section: "A".into(),
        }
    }

    async fn backend_with_ada() -> (MemoryBackend, Session) {
        let backend = MemoryBackend::new();
        let session = backend.sign_up("a@b.com", "secret123").await.unwrap();
        backend
            .insert_profile(NewProfile {
                user_id: session.user_id.clone(),
                full_name: "Ada".into(),
                details: ada_details(),
            })
            .await
            .unwrap();
        (backend, session)
    }

    // =====================================================================
    // probe_health
    // =====================================================================

    #[tokio::test]
    async fn test_probe_health_is_idempotent_while_online() {
        let backend = MemoryBackend::new();
        for _ in 0..5 {
            assert!(backend.probe_health().await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_probe_health_is_idempotent_while_offline() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        for _ in 0..5 {
            let err = backend.probe_health().await.unwrap_err();
            assert!(err.is_connectivity());
        }
    }

    #[tokio::test]
    async fn test_probe_verdict_follows_offline_flag() {
        let backend = MemoryBackend::new();
        assert!(backend.probe_health().await.is_ok());
        backend.set_offline(true);
        assert!(backend.probe_health().await.is_err());
        backend.set_offline(false);
        assert!(backend.probe_health().await.is_ok());
    }

    // =====================================================================
    // sign_up
    // =====================================================================

    #[tokio::test]
    async fn test_sign_up_creates_account_and_session() {
        let backend = MemoryBackend::new();
        let session = backend.sign_up("a@b.com", "secret123").await.unwrap();

        assert_eq!(session.email, "a@b.com");
        assert!(backend.has_account("a@b.com"));
        let current = backend.fetch_session().await.unwrap();
        assert_eq!(current, Some(session));
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_email_is_rejected() {
        let backend = MemoryBackend::new();
        backend.sign_up("a@b.com", "secret123").await.unwrap();

        let err = backend.sign_up("a@b.com", "other-pass").await.unwrap_err();
        assert!(!err.is_connectivity());
        assert_eq!(err.code().as_deref(), Some("user_already_exists"));
    }

    #[tokio::test]
    async fn test_sign_up_weak_password_is_rejected() {
        let backend = MemoryBackend::new();
        let err = backend.sign_up("a@b.com", "pw").await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected { .. }));
        assert_eq!(err.code().as_deref(), Some("weak_password"));
    }

    #[tokio::test]
    async fn test_sign_up_announces_signed_in() {
        let backend = MemoryBackend::new();
        let mut rx = backend.subscribe_auth_changes();

        let session = backend.sign_up("a@b.com", "secret123").await.unwrap();

        let change = rx.try_recv().unwrap();
        assert_eq!(change.kind, AuthEventKind::SignedIn);
        assert_eq!(change.session, Some(session));
    }

    // =====================================================================
    // sign_in
    // =====================================================================

    #[tokio::test]
    async fn test_sign_in_wrong_password_is_rejected() {
        let (backend, _) = backend_with_ada().await;

        let err = backend.sign_in("a@b.com", "wrong").await.unwrap_err();
        assert!(!err.is_connectivity());
        assert_eq!(err.code().as_deref(), Some("invalid_credentials"));
    }

    #[tokio::test]
    async fn test_sign_in_unknown_email_same_rejection_as_wrong_password() {
        let (backend, _) = backend_with_ada().await;

        let wrong_pass = backend.sign_in("a@b.com", "wrong").await.unwrap_err();
        let no_account = backend.sign_in("ghost@b.com", "wrong").await.unwrap_err();
        assert_eq!(wrong_pass.to_string(), no_account.to_string());
    }

    #[tokio::test]
    async fn test_sign_in_announces_session_on_channel() {
        let (backend, session) = backend_with_ada().await;
        backend.sign_out().await.unwrap();

        let mut rx = backend.subscribe_auth_changes();
        backend.sign_in("a@b.com", "secret123").await.unwrap();

        let change = rx.try_recv().unwrap();
        assert_eq!(change.kind, AuthEventKind::SignedIn);
        assert_eq!(change.session.unwrap().user_id, session.user_id);
    }

    #[tokio::test]
    async fn test_sign_in_while_offline_is_connectivity_error() {
        let (backend, _) = backend_with_ada().await;
        backend.set_offline(true);

        let err = backend.sign_in("a@b.com", "secret123").await.unwrap_err();
        assert!(err.is_connectivity());
    }

    // =====================================================================
    // sign_out
    // =====================================================================

    #[tokio::test]
    async fn test_sign_out_clears_session_and_announces() {
        let (backend, _) = backend_with_ada().await;
        let mut rx = backend.subscribe_auth_changes();

        backend.sign_out().await.unwrap();

        assert_eq!(backend.fetch_session().await.unwrap(), None);
        let change = rx.try_recv().unwrap();
        assert_eq!(change.kind, AuthEventKind::SignedOut);
        assert!(change.session.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_offline_still_clears_locally() {
        // Best-effort sign-out: the revocation call fails but the local
        // session is gone and the SignedOut event still fires.
        let (backend, _) = backend_with_ada().await;
        let mut rx = backend.subscribe_auth_changes();
        backend.set_offline(true);

        let result = backend.sign_out().await;

        assert!(result.is_err());
        assert_eq!(rx.try_recv().unwrap().kind, AuthEventKind::SignedOut);
        backend.set_offline(false);
        assert_eq!(backend.fetch_session().await.unwrap(), None);
    }

    // =====================================================================
    // Profiles
    // =====================================================================

    #[tokio::test]
    async fn test_insert_profile_builds_denormalized_student_row() {
        let (backend, session) = backend_with_ada().await;

        let row = backend
            .fetch_profile(&session.user_id, CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.id, session.user_id);
        assert_eq!(row.full_name, "Ada");
        assert_eq!(row.role, UserRole::Student);
        assert_eq!(row.grade.as_deref(), Some("10"));
        assert_eq!(row.section.as_deref(), Some("A"));
        assert!(row.subjects.is_none());
    }

    #[tokio::test]
    async fn test_fetch_profile_missing_row_is_none_not_error() {
        let backend = MemoryBackend::new();
        let session = backend.sign_up("a@b.com", "secret123").await.unwrap();

        let row = backend
            .fetch_profile(&session.user_id, CancellationToken::new())
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_insert_profile_duplicate_is_rejected() {
        let (backend, session) = backend_with_ada().await;

        let err = backend
            .insert_profile(NewProfile {
                user_id: session.user_id,
                full_name: "Ada Again".into(),
                details: ada_details(),
            })
            .await
            .unwrap_err();
        assert!(!err.is_connectivity());
    }

    #[tokio::test]
    async fn test_hold_profiles_hides_existing_rows() {
        let (backend, session) = backend_with_ada().await;
        backend.hold_profiles(true);

        let hidden = backend
            .fetch_profile(&session.user_id, CancellationToken::new())
            .await
            .unwrap();
        assert!(hidden.is_none());

        backend.hold_profiles(false);
        let visible = backend
            .fetch_profile(&session.user_id, CancellationToken::new())
            .await
            .unwrap();
        assert!(visible.is_some());
    }

    #[tokio::test]
    async fn test_fetch_profile_honors_abort() {
        let (backend, session) = backend_with_ada().await;
        backend.set_latency(Duration::from_secs(60));

        let abort = CancellationToken::new();
        abort.cancel();
        let err = backend
            .fetch_profile(&session.user_id, abort)
            .await
            .unwrap_err();
        assert!(err.is_connectivity());
        assert!(err.to_string().contains("aborted"));
    }
}
