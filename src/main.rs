//! admission-gate - Kubernetes admission webhook enforcing required labels.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Parses flags into the immutable policy configuration
//! - Starts the health server and the TLS webhook server
//! - Shuts down gracefully on SIGTERM or SIGINT

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use admission_gate::{
    Config, HealthState, KindRegistry, ReviewRouter, ServerSettings, WebhookState,
    run_health_server, run_webhook_server,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("admission_gate=info".parse()?),
        )
        .json()
        .init();

    let config = Config::parse();
    let policy = config.policy()?;

    // rustls needs a process-wide crypto provider before any TLS config is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        error!("Failed to install rustls crypto provider");
    }

    let kinds = KindRegistry::default();
    info!(
        port = config.port,
        exempt_annotation = %policy.exempt_annotation,
        required_labels = ?policy.required_labels,
        ignored_namespaces = ?policy.ignored_namespaces,
        unsupported_kinds = %policy.unsupported_kinds,
        kinds = ?kinds.kinds(),
        "Starting admission-gate"
    );

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (liveness should work before TLS is loaded)
    let health_handle = tokio::spawn(run_health_server(
        health_state.clone(),
        config.health_addr(),
    ));

    let state = Arc::new(
        WebhookState::new(ReviewRouter::new(policy, kinds)).with_health(health_state.clone()),
    );
    let settings = ServerSettings::from(&config);

    tokio::select! {
        result = run_webhook_server(state, settings, shutdown_signal()) => {
            if let Err(e) = result {
                error!("Webhook server error: {}", e);
                return Err(e.into());
            }
        }
        // Health server exit is fatal, even a clean one
        result = health_handle => {
            let err: Box<dyn std::error::Error> = match result {
                Ok(Ok(())) => "health server exited unexpectedly".into(),
                Ok(Err(e)) => e.into(),
                Err(e) => e.into(),
            };
            error!("Health server error: {}", err);
            return Err(err);
        }
    }

    info!("admission-gate stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal, initiating graceful shutdown...");
}
