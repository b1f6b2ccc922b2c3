//! Automatic backoff retry scheduling for Schoolgate.
//!
//! When the session layer raises the shared connection error, this
//! crate schedules a bounded series of automatic reconnection attempts
//! at fixed offsets from the moment the error was observed (by default
//! 5 s, 10 s, 15 s). The schedule stops the instant the error clears,
//! whether an automatic attempt cleared it, a manual retry did, or the
//! backend recovered on its own. Every pending timer dies with the
//! [`RetryHandle`], so a torn-down view never leaks a timer.
//!
//! # Integration
//!
//! The watcher runs as its own task over the session layer's `watch`
//! channel plus a retry callback:
//!
//! ```ignore
//! let mgr = Arc::new(SessionManager::new(backend, SessionConfig::default()));
//! let handle = spawn_auto_retry(
//!     mgr.subscribe(),
//!     {
//!         let mgr = Arc::clone(&mgr);
//!         move || {
//!             let mgr = Arc::clone(&mgr);
//!             async move { mgr.retry_connection().await.is_ok() }
//!         }
//!     },
//!     RetryConfig::default(),
//! );
//! // ... dropping `handle` cancels any pending attempts.
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use schoolgate_session::SessionSnapshot;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the automatic retry schedule.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// When each automatic attempt fires, measured from the moment the
    /// connection error is first observed. Default: 5 s, 10 s, 15 s.
    /// Three attempts with a widening gap, then give up and wait for a
    /// manual retry.
    pub offsets: Vec<Duration>,

    /// Random jitter (0–max ms) added to the whole schedule, so many
    /// clients observing the same outage don't stampede the backend at
    /// the same instant. Default: 250 ms. Set to 0 for deterministic
    /// tests.
    pub initial_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            offsets: vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(15),
            ],
            initial_jitter_ms: 250,
        }
    }
}

impl RetryConfig {
    /// Hard cap on attempts per error episode.
    pub const MAX_ATTEMPTS: usize = 8;

    /// Clamps and fixes any out-of-range values so the config is safe
    /// to use.
    ///
    /// Called automatically by [`spawn_auto_retry`]. Rules:
    /// - zero offsets are dropped (an attempt "0 units after the error"
    ///   would retry before the backend could possibly have recovered)
    /// - offsets are sorted and deduplicated
    /// - at most [`Self::MAX_ATTEMPTS`] attempts are kept
    /// - an empty list falls back to the defaults
    pub fn validated(mut self) -> Self {
        let before = self.offsets.len();
        self.offsets.retain(|offset| !offset.is_zero());
        if self.offsets.len() != before {
            warn!("dropped zero-valued retry offsets");
        }
        self.offsets.sort();
        self.offsets.dedup();
        if self.offsets.len() > Self::MAX_ATTEMPTS {
            warn!(
                configured = self.offsets.len(),
                max = Self::MAX_ATTEMPTS,
                "too many retry offsets — truncating"
            );
            self.offsets.truncate(Self::MAX_ATTEMPTS);
        }
        if self.offsets.is_empty() {
            warn!("no usable retry offsets — falling back to defaults");
            self.offsets = Self::default().offsets;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owner handle for the retry watcher task.
///
/// Dropping the handle aborts the watcher, which cancels any pending
/// attempt timers. This is the teardown contract: whoever mounted the
/// error view holds the handle, and unmounting drops it.
pub struct RetryHandle {
    task: JoinHandle<()>,
}

impl RetryHandle {
    /// Stops the watcher explicitly. Equivalent to dropping the handle.
    pub fn stop(self) {
        // Drop does the work.
    }

    /// Whether the watcher has already exited (its snapshot source was
    /// dropped).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RetryHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

/// Spawns the automatic retry watcher.
///
/// `states` is the session layer's snapshot channel; `retry` is invoked
/// for each automatic attempt and returns whether reconnection
/// succeeded. The watcher runs until the snapshot channel closes (the
/// session manager was dropped) or the returned handle is dropped.
pub fn spawn_auto_retry<F, Fut>(
    mut states: watch::Receiver<SessionSnapshot>,
    retry: F,
    config: RetryConfig,
) -> RetryHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let config = config.validated();

    let task = tokio::spawn(async move {
        debug!("automatic retry watcher started");
        loop {
            // Park until the connection error flips on.
            while !states.borrow_and_update().connection_error.is_error {
                if states.changed().await.is_err() {
                    debug!("snapshot channel closed; retry watcher stopping");
                    return;
                }
            }

            let observed = Instant::now();
            let jitter = if config.initial_jitter_ms > 0 {
                let ms = rand::rng().random_range(0..config.initial_jitter_ms);
                Duration::from_millis(ms)
            } else {
                Duration::ZERO
            };
            info!(
                attempts = config.offsets.len(),
                "connection error observed; automatic retries scheduled"
            );

            'schedule: {
                for (attempt, offset) in config.offsets.iter().enumerate() {
                    let due = observed + *offset + jitter;

                    // Sleep until this attempt is due, bailing out the
                    // moment the error clears underneath us.
                    loop {
                        tokio::select! {
                            _ = time::sleep_until(due) => break,
                            changed = states.changed() => {
                                if changed.is_err() {
                                    return;
                                }
                                if !states.borrow_and_update().connection_error.is_error {
                                    info!("connection error cleared; cancelling remaining retries");
                                    break 'schedule;
                                }
                            }
                        }
                    }

                    debug!(attempt = attempt + 1, "automatic retry attempt");
                    let recovered = retry().await;
                    if recovered
                        && !states.borrow_and_update().connection_error.is_error
                    {
                        info!(
                            attempt = attempt + 1,
                            "automatic retry restored the connection"
                        );
                        break 'schedule;
                    }
                }
                warn!("automatic retries exhausted; waiting for a manual retry");
            }

            // Don't arm a new schedule against the same error episode:
            // wait for the error to clear (however that happens) before
            // watching for the next one.
            while states.borrow_and_update().connection_error.is_error {
                if states.changed().await.is_err() {
                    return;
                }
            }
        }
    });

    RetryHandle { task }
}

// =========================================================================
// Tests (config only — the schedule itself is covered in tests/)
// =========================================================================
