//! Error types for the model layer.

/// A role string that isn't one of the closed set.
///
/// Roles are a fixed enum (`admin | teacher | student`); a row carrying
/// anything else is corrupt or from a newer schema, and the caller
/// decides whether that is fatal.
#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);
