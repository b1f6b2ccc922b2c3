//! # Schoolgate
//!
//! Client-side session and connection-resilience layer for a
//! school-management portal backed by a hosted backend-as-a-service.
//!
//! The portal's dashboards (admin, teacher, student) are thin views;
//! the machinery they all share lives here: session bootstrap with
//! timeout races, two-phase sign-up, credential-vs-connectivity error
//! classification, an auth-state-change subscription, and automatic
//! backoff retries when the backend becomes unreachable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schoolgate::prelude::*;
//!
//! # async fn run() {
//! let backend = HttpBackend::new("https://project.example.co", "anon-key");
//! let client = SchoolgateClient::builder(backend).connect().await;
//!
//! // Views render from the snapshot...
//! let snapshot = client.snapshot();
//! if snapshot.connection_error.is_error {
//!     // show the global connection-error view (retry is automatic)
//! } else if snapshot.loading() {
//!     // show a spinner
//! }
//!
//! // ...and drive the session through the operations.
//! if let Err(_credential_error) = client.sign_in("ada@school.edu", "secret123").await {
//!     // credential errors render inline, scoped to the form
//! }
//! # }
//! ```

mod client;
mod error;

pub use client::{SchoolgateClient, SchoolgateClientBuilder};
pub use error::SchoolgateError;

// Re-export the sub-crate surface so consumers need only this crate.
pub use schoolgate_backend::{
    BackendClient, BackendError, CancellationToken, HttpBackend, MemoryBackend,
};
pub use schoolgate_model::{
    AuthChange, AuthEventKind, ConnectionError, NewProfile, Profile,
    RoleDetails, Session, UserId, UserRole,
};
pub use schoolgate_retry::{RetryConfig, RetryHandle, spawn_auto_retry};
pub use schoolgate_session::{
    SessionConfig, SessionError, SessionManager, SessionPhase, SessionSnapshot,
};

/// The types a typical consumer touches, in one import.
pub mod prelude {
    pub use crate::{
        BackendClient, ConnectionError, HttpBackend, MemoryBackend, Profile,
        RetryConfig, RoleDetails, SchoolgateClient, SchoolgateError, Session,
        SessionConfig, SessionPhase, SessionSnapshot, UserId, UserRole,
    };
}
