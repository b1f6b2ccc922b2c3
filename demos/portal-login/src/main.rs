//! Portal login demo: drives the full session flow against the
//! in-memory backend.
//!
//! Walks the lifecycle end to end: connect → sign up a student → reach
//! the ready state → simulated outage → automatic recovery → sign out.
//!
//! Run with: `cargo run -p portal-login` (set `RUST_LOG=debug` to watch
//! the session layer's internals).

use std::time::Duration;

use tracing::info;

use schoolgate::prelude::*;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let backend = MemoryBackend::new();
    let client = SchoolgateClient::builder(backend.clone())
        // Short offsets so the recovery is watchable in a demo run.
        .retry_config(RetryConfig {
            offsets: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
            ],
            initial_jitter_ms: 0,
        })
        .connect()
        .await;
    info!(phase = ?client.snapshot().phase, "connected");

    // -- Sign up a student ------------------------------------------------
    let session = client
        .sign_up(
            "ada@school.edu",
            "secret123",
            "Ada Lovelace",
            RoleDetails::Student {
                grade: "10".into(),
                section: "A".into(),
            },
        )
        .await
        .expect("sign-up failed");
    info!(user_id = %session.user_id, "signed up");

    // The SignedIn event may outrun the profile insert; if we land in
    // the provisioning window, one retry settles it.
    wait_for(&client, |s| {
        matches!(s.phase, SessionPhase::Ready | SessionPhase::ProfileMissing)
    })
    .await;
    if client.snapshot().phase == SessionPhase::ProfileMissing {
        info!("profile row not visible yet, retrying");
        client.retry_connection().await.expect("retry failed");
    }
    let profile = client.snapshot().profile.expect("profile loaded");
    info!(name = %profile.full_name, role = %profile.role, "ready");

    // -- Outage and automatic recovery ------------------------------------
    backend.set_offline(true);
    let _ = client.retry_connection().await;
    info!(
        message = %client.snapshot().connection_error.message,
        "outage detected; automatic retries scheduled"
    );

    backend.set_offline(false);
    wait_for(&client, |s| !s.connection_error.is_error).await;
    info!("connection recovered automatically");

    // -- Sign out ----------------------------------------------------------
    client.sign_out().await;
    wait_for(&client, |s| s.phase == SessionPhase::NoSession).await;
    info!("signed out");

    client.disconnect();
}

/// Blocks until the snapshot satisfies `pred`.
async fn wait_for(
    client: &SchoolgateClient<MemoryBackend>,
    pred: impl Fn(&SessionSnapshot) -> bool,
) {
    let mut rx = client.subscribe();
    while !pred(&*rx.borrow_and_update()) {
        rx.changed().await.expect("session manager closed");
    }
}
