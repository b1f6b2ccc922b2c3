//! Session lifecycle management for the Schoolgate portal client.
//!
//! This crate owns the one piece of real machinery in the client: the
//! session manager and its connection-error recovery protocol.
//!
//! 1. **Bootstrap** — probe the backend, recover the stored session
//!    (raced against a deadline), load the matching profile
//! 2. **Operations** — sign-up (two-phase), sign-in, sign-out, manual
//!    retry
//! 3. **Subscription** — apply the backend's auth-state-change events
//!    to the projection, for as long as the manager lives
//! 4. **Projection** — publish a read-only [`SessionSnapshot`]
//!    (`{user, profile, loading, connection_error}`) that every
//!    dashboard and form renders from
//!
//! # How it fits in the stack
//!
//! ```text
//! Dashboards / forms (above)  ← read the snapshot, call the operations
//!     ↕
//! Session Layer (this crate)  ← owns session, profile, and error state
//!     ↕
//! Backend Client (below)  ← hosted auth + row storage, auth-change channel
//! ```

mod config;
mod error;
mod manager;
mod snapshot;

pub use config::SessionConfig;
pub use error::SessionError;
pub use manager::SessionManager;
pub use snapshot::{SessionPhase, SessionSnapshot};
