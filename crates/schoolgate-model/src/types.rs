//! Identity and session types shared by every layer of the client.
//!
//! This module defines the shapes that cross the boundary between the
//! hosted backend and the in-process session layer. The backend owns the
//! durable records; these types are the client-side projections of them,
//! so their JSON representation is part of the contract and is pinned
//! down by tests.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a principal (admin, teacher, or student).
///
/// This is a newtype wrapper around the identifier string the hosted
/// backend mints for each account. Wrapping it buys two things:
///
/// 1. **Type safety**: a `UserId` can't be confused with any other
///    string-shaped value (an email, a token) in a function signature.
/// 2. **Opacity**: the session layer never inspects the id, it only
///    passes it back to the backend as a lookup key. Keeping it a string
///    means the backend is free to change its id format.
///
/// `#[serde(transparent)]` makes a `UserId` serialize as the bare string,
/// not as `{ "0": "..." }`, which is what the backend's row format expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Mints a fresh random identifier (a v4 UUID string).
    ///
    /// Only the in-memory backend creates ids on the client side; the
    /// hosted backend mints its own and this helper is never used there.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session — the read-only projection of the authenticated principal
// ---------------------------------------------------------------------------

/// The client-side projection of the backend-owned session.
///
/// The backend holds the full session record (tokens, expiry, refresh
/// state). The session layer only ever needs to know WHO is signed in,
/// so the projection carries the identity and nothing else. Token state
/// is deliberately absent: it is owned by the backend client, and
/// projecting it here would invite consumers to misuse it.
///
/// A `Session` is never mutated in place: the session layer replaces
/// its copy wholesale when the auth-change channel delivers a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated principal's identifier.
    pub user_id: UserId,

    /// The email the principal signed in with.
    pub email: String,
}

// ---------------------------------------------------------------------------
// Auth-change events
// ---------------------------------------------------------------------------

/// What kind of auth-state transition a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEventKind {
    /// A principal signed in (or completed sign-up, which signs them in).
    SignedIn,

    /// The current principal signed out or their token was invalidated.
    SignedOut,

    /// The backend refreshed the session token. The identity is
    /// unchanged; the event exists so the projection can be re-validated.
    TokenRefreshed,
}

/// A single notification on the auth-state-change channel.
///
/// The backend client broadcasts one of these for every session
/// transition it performs. Session mutation in the session layer is
/// single-sourced through this channel: the sign-in call itself never
/// writes the session projection, it waits for the matching `SignedIn`
/// notification to arrive here. That keeps the direct call path and the
/// notification path from racing each other with duplicate writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChange {
    /// Which transition happened.
    pub kind: AuthEventKind,

    /// The session after the transition. `None` means "nobody is
    /// signed in" (the payload of a `SignedOut` event).
    pub session: Option<Session>,
}

// =========================================================================
// Tests
// =========================================================================
