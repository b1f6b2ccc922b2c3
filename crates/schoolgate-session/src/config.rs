//! Session-layer configuration.

use std::time::Duration;

use tracing::warn;

/// Timeouts for the session layer's two timeout races.
///
/// Both defaults come from the portal's observed behavior against the
/// hosted service: session recovery answers within a couple of seconds
/// when the network is healthy, so anything past these limits is treated
/// as a connectivity failure rather than waited out.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for the initial session fetch. If the backend call has
    /// not settled by then, bootstrap stops with a timeout-kind
    /// connection error. Default: 8 seconds.
    pub session_fetch_timeout: Duration,

    /// Deadline for each profile fetch. When the timer wins, the fetch
    /// is aborted through its cancellation token. Default: 5 seconds.
    pub profile_fetch_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_fetch_timeout: Duration::from_secs(8),
            profile_fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Smallest accepted timeout. A zero timeout would lose every race
    /// before the backend call is even polled.
    pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by
    /// [`SessionManager::new`](crate::SessionManager::new).
    pub fn validated(mut self) -> Self {
        if self.session_fetch_timeout < Self::MIN_TIMEOUT {
            warn!(
                configured = ?self.session_fetch_timeout,
                "session_fetch_timeout below minimum — clamping"
            );
            self.session_fetch_timeout = Self::MIN_TIMEOUT;
        }
        if self.profile_fetch_timeout < Self::MIN_TIMEOUT {
            warn!(
                configured = ?self.profile_fetch_timeout,
                "profile_fetch_timeout below minimum — clamping"
            );
            self.profile_fetch_timeout = Self::MIN_TIMEOUT;
        }
        self
    }
}
