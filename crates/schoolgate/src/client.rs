//! `SchoolgateClient` builder and consumer handle.
//!
//! This is the entry point for embedding the session layer. It ties
//! together the stack: backend client → session manager → automatic
//! retry, and hands the consumer one object exposing the read-only
//! snapshot plus the four operations.

use std::sync::Arc;

use tokio::sync::watch;

use schoolgate_backend::BackendClient;
use schoolgate_model::{RoleDetails, Session};
use schoolgate_retry::{RetryConfig, RetryHandle, spawn_auto_retry};
use schoolgate_session::{SessionConfig, SessionManager, SessionSnapshot};

use crate::SchoolgateError;

/// Builder for configuring and connecting a Schoolgate client.
///
/// # Example
///
/// ```rust,no_run
/// use schoolgate::prelude::*;
///
/// # async fn run() {
/// let backend = MemoryBackend::new();
/// let client = SchoolgateClient::builder(backend)
///     .session_config(SessionConfig::default())
///     .connect()
///     .await;
/// let snapshot = client.snapshot();
/// # }
/// ```
pub struct SchoolgateClientBuilder<B: BackendClient> {
    backend: B,
    session_config: SessionConfig,
    retry_config: Option<RetryConfig>,
}

impl<B: BackendClient> SchoolgateClientBuilder<B> {
    /// Creates a builder with default timeouts and automatic retry on.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            session_config: SessionConfig::default(),
            retry_config: Some(RetryConfig::default()),
        }
    }

    /// Overrides the session-layer timeouts.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Overrides the automatic retry schedule.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// Disables automatic retry entirely; only manual
    /// [`retry_connection`](SchoolgateClient::retry_connection) calls
    /// will re-attempt after a connection error.
    pub fn without_auto_retry(mut self) -> Self {
        self.retry_config = None;
        self
    }

    /// Builds the client and runs the startup sequence.
    ///
    /// Always returns a client, even when the backend is unreachable:
    /// in that case the snapshot carries the connection error, the
    /// retry layer starts working on it, and the consumer renders the
    /// connection-error view. Construction failure would leave the
    /// consumer with nothing to drive a retry from.
    pub async fn connect(self) -> SchoolgateClient<B> {
        let manager = Arc::new(SessionManager::new(
            self.backend,
            self.session_config,
        ));

        if let Err(e) = manager.initialize().await {
            tracing::warn!(error = %e, "initial connection attempt failed");
        }

        let retry = self.retry_config.map(|config| {
            let mgr = Arc::clone(&manager);
            spawn_auto_retry(
                manager.subscribe(),
                move || {
                    let mgr = Arc::clone(&mgr);
                    async move { mgr.retry_connection().await.is_ok() }
                },
                config,
            )
        });

        SchoolgateClient { manager, retry }
    }
}

/// A connected Schoolgate client.
///
/// Views read state through [`snapshot`](Self::snapshot) /
/// [`subscribe`](Self::subscribe) and drive the session through the
/// operation methods. The underlying projections are owned by the
/// session manager; nothing a consumer holds can write them.
pub struct SchoolgateClient<B: BackendClient> {
    manager: Arc<SessionManager<B>>,
    retry: Option<RetryHandle>,
}

impl<B: BackendClient> SchoolgateClient<B> {
    /// Creates a new builder.
    pub fn builder(backend: B) -> SchoolgateClientBuilder<B> {
        SchoolgateClientBuilder::new(backend)
    }

    /// The current session snapshot, by value.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.manager.snapshot()
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.manager.subscribe()
    }

    /// Two-phase account creation. See
    /// [`SessionManager::sign_up`](schoolgate_session::SessionManager::sign_up).
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        details: RoleDetails,
    ) -> Result<Session, SchoolgateError> {
        Ok(self
            .manager
            .sign_up(email, password, full_name, details)
            .await?)
    }

    /// Credential sign-in. See
    /// [`SessionManager::sign_in`](schoolgate_session::SessionManager::sign_in).
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), SchoolgateError> {
        Ok(self.manager.sign_in(email, password).await?)
    }

    /// Best-effort sign-out; never fails from the caller's perspective.
    pub async fn sign_out(&self) {
        self.manager.sign_out().await;
    }

    /// Manual reconnection attempt.
    pub async fn retry_connection(&self) -> Result<(), SchoolgateError> {
        Ok(self.manager.retry_connection().await?)
    }

    /// Tears the client down deterministically: pending automatic
    /// retries are cancelled first, then the session manager shuts down
    /// (liveness flag off, subscription released). Dropping the client
    /// does the same; this method just makes the order explicit.
    pub fn disconnect(mut self) {
        self.retry.take();
        self.manager.shutdown();
    }
}
