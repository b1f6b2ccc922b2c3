//! The session manager: owns the lifecycle of the authenticated user.
//!
//! This is the central piece of the client. It's responsible for:
//! - Bootstrapping the session on startup (probe → session → profile)
//! - Racing the session and profile fetches against their deadlines
//! - Applying auth-state changes delivered by the backend's channel
//! - Classifying failures into credential vs connectivity errors
//! - Publishing the read-only [`SessionSnapshot`] every view renders from
//!
//! # Concurrency note
//!
//! Two paths write the snapshot: the bootstrap/retry sequence and the
//! auth-change pump task. They are not mutually excluded by a lock.
//! Each individual write is atomic (`watch::Sender::send_modify`), and
//! ordering between the paths doesn't matter because later auth events
//! supersede earlier state wholesale. What IS enforced is liveness:
//! every write first checks a flag that [`SessionManager::shutdown`]
//! flips, so completions that land after teardown mutate nothing.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use schoolgate_backend::{BackendClient, BackendError};
use schoolgate_model::{
    ConnectionError, NewProfile, RoleDetails, Session, UserId,
};

use crate::{SessionConfig, SessionError, SessionPhase, SessionSnapshot};

/// Owns the in-memory projections of session, profile, and connection
/// status for the current process.
///
/// ## Lifecycle
///
/// ```text
/// new() ──→ initialize() ──→ { Ready | NoSession | ProfileMissing }
///              │                      │
///              │ (probe/fetch fails)  │ sign_in()/sign_out() arrive
///              ▼                      ▼ via the auth-change pump
///      connection_error set      snapshot updated
///              │
///              ▼
///       retry_connection()  (manual, or scheduled by the retry layer)
///
/// shutdown() — from any point: liveness flag off, pump aborted,
///              all in-flight completions become no-ops.
/// ```
pub struct SessionManager<B: BackendClient> {
    backend: Arc<B>,
    config: SessionConfig,
    shared: Arc<Shared>,
    /// Set once the auth-change pump has been spawned. The pump starts
    /// after the first bootstrap that gets past the session fetch and
    /// is never started twice.
    pump_started: AtomicBool,
    /// Handle of the pump task, kept so shutdown can abort it.
    pump: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the manager, its pump task, and in-flight
/// operations.
struct Shared {
    /// The liveness guard: flipped off by `shutdown()`. Checked before
    /// every snapshot write so late completions can't mutate state the
    /// consumer has already torn down.
    live: AtomicBool,
    state: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Applies a snapshot mutation, unless the manager has shut down.
    fn apply(&self, mutate: impl FnOnce(&mut SessionSnapshot)) {
        if !self.is_live() {
            tracing::trace!("snapshot write dropped after shutdown");
            return;
        }
        self.state.send_modify(mutate);
    }
}

impl<B: BackendClient> SessionManager<B> {
    /// Creates a manager over the given backend. Nothing runs until
    /// [`initialize`](Self::initialize) is called.
    pub fn new(backend: B, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            backend: Arc::new(backend),
            config: config.validated(),
            shared: Arc::new(Shared {
                live: AtomicBool::new(true),
                state,
            }),
            pump_started: AtomicBool::new(false),
            pump: Mutex::new(None),
        }
    }

    /// The current snapshot, by value.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Subscribes to snapshot changes. The receiver is structurally
    /// read-only: consumers can observe but never write.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state.subscribe()
    }

    /// Startup sequence: probe reachability, fetch the session racing
    /// its deadline, fetch the profile (or land in `NoSession`), then
    /// start the auth-change pump.
    ///
    /// Invoked once per manager lifetime; the sequence is re-entered
    /// only through [`retry_connection`](Self::retry_connection).
    pub async fn initialize(&self) -> Result<(), SessionError> {
        if self.snapshot().phase != SessionPhase::Uninitialized {
            tracing::warn!("initialize() called again; re-running bootstrap");
        }
        let result = self.bootstrap().await;
        self.ensure_pump();
        result
    }

    /// Manual re-entry point after a connection error: re-runs the
    /// probe and, on success, the session/profile fetch sequence.
    ///
    /// On failure the connection error stays set and the failure is
    /// returned, so a retry button can reflect the outcome.
    pub async fn retry_connection(&self) -> Result<(), SessionError> {
        tracing::info!("retrying backend connection");
        let result = self.bootstrap().await;
        self.ensure_pump();
        result
    }

    /// Two-phase account creation.
    ///
    /// Phase one creates the identity; a backend rejection (duplicate
    /// email, weak password) propagates verbatim as
    /// [`SessionError::Auth`]. Phase two inserts the profile row keyed
    /// by the new identity; a failure there is
    /// [`SessionError::ProfileCreation`]: the identity exists without
    /// a profile and no rollback is attempted.
    ///
    /// Neither phase writes the snapshot directly: the backend's
    /// `SignedIn` event drives the projection through the pump.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        details: RoleDetails,
    ) -> Result<Session, SessionError> {
        let session = self
            .backend
            .sign_up(email, password)
            .await
            .map_err(|e| match e {
                BackendError::Rejected { code, message } => {
                    SessionError::Auth { code, message }
                }
                other => SessionError::Connectivity(other.to_string()),
            })?;

        tracing::info!(user_id = %session.user_id, role = %details.role(), "identity created, inserting profile");

        let record = NewProfile {
            user_id: session.user_id.clone(),
            full_name: full_name.to_string(),
            details,
        };
        if let Err(e) = self.backend.insert_profile(record).await {
            tracing::error!(
                user_id = %session.user_id,
                error = %e,
                "identity created but profile insert failed"
            );
            return Err(SessionError::ProfileCreation {
                user_id: session.user_id,
                source: e,
            });
        }

        Ok(session)
    }

    /// Verifies credentials against the backend.
    ///
    /// - Credential rejection → [`SessionError::Auth`], and the shared
    ///   connection error stays clear.
    /// - Connectivity-shaped failure → a second reachability probe
    ///   disambiguates: if the probe also fails, the shared connection
    ///   error is raised; if it succeeds, the failure was a one-off
    ///   glitch and only a transient error goes back to the caller.
    /// - Success → nothing is applied here; the `SignedIn` event on the
    ///   auth-change channel updates the projection. Single-sourcing the
    ///   session write through that channel means the direct call path
    ///   and the notification path can never double-write.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        self.shared
            .apply(|s| s.connection_error = ConnectionError::none());

        match self.backend.sign_in(email, password).await {
            Ok(()) => Ok(()),
            Err(BackendError::Rejected { code, message }) => {
                tracing::debug!(?code, "sign-in rejected");
                Err(SessionError::Auth { code, message })
            }
            Err(network_err) => match self.backend.probe_health().await {
                Err(probe_err) => {
                    tracing::warn!(
                        error = %probe_err,
                        "sign-in failed and backend is unreachable"
                    );
                    self.shared.apply(|s| {
                        s.connection_error = probe_err.to_connection_error();
                    });
                    Err(SessionError::Connectivity(format!(
                        "cannot reach the server: {network_err}"
                    )))
                }
                Ok(()) => {
                    tracing::debug!(
                        error = %network_err,
                        "sign-in failed but backend is reachable; treating as transient"
                    );
                    Err(SessionError::Connectivity(
                        "temporary network problem — please try again".into(),
                    ))
                }
            },
        }
    }

    /// Signs the principal out, best-effort.
    ///
    /// A failed backend call is logged and swallowed: the backend is
    /// the source of truth for token invalidation, and navigation away
    /// from the portal must not block on it. The `SignedOut` event
    /// clears the projection through the pump.
    pub async fn sign_out(&self) {
        if let Err(e) = self.backend.sign_out().await {
            tracing::warn!(error = %e, "sign-out call failed (continuing anyway)");
        }
    }

    /// Tears the manager down: flips the liveness flag, then aborts the
    /// pump task (which releases the auth-change subscription). Safe to
    /// call more than once. After this, no in-flight completion can
    /// write the snapshot.
    pub fn shutdown(&self) {
        if !self.shared.live.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.pump.lock().expect("pump lock poisoned").take()
        {
            handle.abort();
        }
        tracing::debug!("session manager shut down");
    }

    /// The probe → session → profile sequence shared by `initialize`
    /// and `retry_connection`.
    async fn bootstrap(&self) -> Result<(), SessionError> {
        self.shared.apply(|s| {
            s.phase = SessionPhase::CheckingConnection;
            s.connection_error = ConnectionError::none();
        });

        if let Err(e) = self.backend.probe_health().await {
            tracing::warn!(error = %e, "backend unreachable, bootstrap stopped");
            self.shared.apply(|s| {
                s.phase = SessionPhase::Uninitialized;
                s.connection_error = e.to_connection_error();
            });
            return Err(SessionError::Connectivity(e.to_string()));
        }

        self.shared.apply(|s| s.phase = SessionPhase::FetchingSession);
        let limit = self.config.session_fetch_timeout;
        let session =
            match tokio::time::timeout(limit, self.backend.fetch_session()).await
            {
                // The timer won the race. The backend call's eventual
                // completion is discarded along with its future.
                Err(_) => {
                    tracing::warn!(?limit, "session fetch lost its timeout race");
                    self.shared.apply(|s| {
                        s.phase = SessionPhase::Uninitialized;
                        s.connection_error =
                            ConnectionError::timeout("session fetch", limit);
                    });
                    return Err(SessionError::Timeout {
                        operation: "session fetch",
                        limit,
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "session fetch failed");
                    self.shared.apply(|s| {
                        s.phase = SessionPhase::Uninitialized;
                        s.connection_error = e.to_connection_error();
                    });
                    return Err(SessionError::Connectivity(e.to_string()));
                }
                Ok(Ok(None)) => {
                    tracing::info!("no stored session; principal must sign in");
                    self.shared.apply(|s| {
                        s.user = None;
                        s.profile = None;
                        s.phase = SessionPhase::NoSession;
                        s.connection_error = ConnectionError::none();
                    });
                    return Ok(());
                }
                Ok(Ok(Some(session))) => session,
            };

        tracing::info!(user_id = %session.user_id, "session recovered");
        let user_id = session.user_id.clone();
        self.shared.apply(|s| {
            s.user = Some(session);
            s.phase = SessionPhase::FetchingProfile;
        });
        load_profile(self.backend.as_ref(), &self.shared, &self.config, &user_id)
            .await
    }

    /// Spawns the auth-change pump exactly once, after the first
    /// bootstrap that gets past the session fetch.
    ///
    /// Events may arrive while a retry is mid-bootstrap; that is fine,
    /// because an auth event always supersedes the projection wholesale.
    fn ensure_pump(&self) {
        if !self.shared.is_live() {
            return;
        }
        if !self.snapshot().phase.past_session_fetch() {
            // Bootstrap never got past the session fetch; there is no
            // session state for events to supersede yet. The next
            // successful retry will start the pump.
            return;
        }
        if self.pump_started.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut changes = self.backend.subscribe_auth_changes();
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            tracing::debug!("auth-change pump started");
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if !shared.is_live() {
                            break;
                        }
                        tracing::debug!(kind = ?change.kind, "auth state changed");
                        match change.session {
                            Some(session) => {
                                let user_id = session.user_id.clone();
                                shared.apply(|s| {
                                    s.user = Some(session);
                                    s.phase = SessionPhase::FetchingProfile;
                                });
                                // Failures surface through the snapshot's
                                // connection error; nothing to return to.
                                let _ = load_profile(
                                    backend.as_ref(),
                                    &shared,
                                    &config,
                                    &user_id,
                                )
                                .await;
                            }
                            None => {
                                shared.apply(|s| {
                                    s.user = None;
                                    s.profile = None;
                                    s.phase = SessionPhase::NoSession;
                                });
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(
                            missed,
                            "auth-change channel lagged; resynchronizing on next event"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("auth-change pump stopped");
        });

        *self.pump.lock().expect("pump lock poisoned") = Some(handle);
    }
}

impl<B: BackendClient> Drop for SessionManager<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fetches the profile for `user_id`, racing the backend call against
/// the configured deadline.
///
/// Shared by the bootstrap path and the pump task. The timeout is
/// enforced with an explicit cancellation token so the backend can stop
/// working on a fetch whose result nobody will read. Whatever happens,
/// the phase leaves `FetchingProfile`: a failure must never leave the
/// consumer stuck on a spinner.
async fn load_profile<B: BackendClient>(
    backend: &B,
    shared: &Shared,
    config: &SessionConfig,
    user_id: &UserId,
) -> Result<(), SessionError> {
    shared.apply(|s| {
        s.phase = SessionPhase::FetchingProfile;
        s.connection_error = ConnectionError::none();
    });

    let abort = CancellationToken::new();
    let limit = config.profile_fetch_timeout;
    let outcome = tokio::select! {
        result = backend.fetch_profile(user_id, abort.clone()) => Some(result),
        _ = tokio::time::sleep(limit) => {
            abort.cancel();
            None
        }
    };

    match outcome {
        None => {
            tracing::warn!(%user_id, ?limit, "profile fetch lost its timeout race");
            shared.apply(|s| {
                s.phase = SessionPhase::ProfileMissing;
                s.connection_error = ConnectionError::timeout("profile fetch", limit);
            });
            Err(SessionError::Timeout {
                operation: "profile fetch",
                limit,
            })
        }
        Some(Err(e)) => {
            tracing::warn!(%user_id, error = %e, "profile fetch failed");
            shared.apply(|s| {
                s.phase = SessionPhase::ProfileMissing;
                s.connection_error = e.to_connection_error();
            });
            Err(SessionError::Connectivity(e.to_string()))
        }
        Some(Ok(None)) => {
            tracing::info!(%user_id, "no profile row yet (account provisioning in progress)");
            shared.apply(|s| {
                s.profile = None;
                s.phase = SessionPhase::ProfileMissing;
                s.connection_error = ConnectionError::none();
            });
            Ok(())
        }
        Some(Ok(Some(profile))) => {
            tracing::info!(%user_id, role = %profile.role, "profile loaded");
            shared.apply(|s| {
                s.profile = Some(profile);
                s.phase = SessionPhase::Ready;
                s.connection_error = ConnectionError::none();
            });
            Ok(())
        }
    }
}
