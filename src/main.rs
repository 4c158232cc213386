use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};

use keda_suspender::health::{HealthState, run_health_server};
use keda_suspender::{Config, cancellation, run_suspender};

/// Grace period for in-flight corrections to finish during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keda_suspender=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    info!("Starting keda-suspender");

    let config = Config::from_env()?;
    info!(?config, "Loaded configuration");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness works before the first sweep
    let health_handle = {
        let health_state = health_state.clone();
        let addr = config.health_addr;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, addr).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let (cancel_handle, cancel) = cancellation();

    let mut suspender_handle = {
        let health_state = health_state.clone();
        tokio::spawn(run_suspender(client, config, Some(health_state), cancel))
    };

    tokio::select! {
        result = &mut suspender_handle => {
            if let Err(e) = result {
                error!("Suspender task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            health_state.set_ready(false).await;
            cancel_handle.cancel();

            match tokio::time::timeout(
                Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS),
                suspender_handle,
            )
            .await
            {
                Ok(Ok(())) => info!("In-flight corrections finished"),
                Ok(Err(e)) => error!("Suspender task panicked: {}", e),
                Err(_) => warn!(
                    "Suspender did not stop within {}s, exiting anyway",
                    SHUTDOWN_GRACE_PERIOD_SECS
                ),
            }
        }
    }

    info!("keda-suspender stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
