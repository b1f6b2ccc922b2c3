//! Shared data model for the Schoolgate client session layer.
//!
//! Every type that crosses a layer boundary lives here:
//!
//! 1. **Identity** — [`UserId`], the [`Session`] projection
//! 2. **Profiles** — [`Profile`], [`UserRole`], [`RoleDetails`],
//!    [`NewProfile`] (the two-phase sign-up insert payload)
//! 3. **Events** — [`AuthChange`] / [`AuthEventKind`], the typed payload
//!    of the auth-state-change channel
//! 4. **Status** — [`ConnectionError`], the shared connectivity
//!    diagnostic every view reads
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← owns the in-memory projections of these types
//!     ↕
//! Model Layer (this crate)  ← defines the shapes and their JSON contract
//!     ↕
//! Backend Client (below)  ← reads/writes the durable records they mirror
//! ```

mod error;
mod profile;
mod status;
mod types;

pub use error::UnknownRole;
pub use profile::{NewProfile, Profile, RoleDetails, UserRole};
pub use status::ConnectionError;
pub use types::{AuthChange, AuthEventKind, Session, UserId};
