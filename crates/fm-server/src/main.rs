//! `fmd`, the fault management daemon.
//!
//! Prepares the alarm store, hosts the fault engine and keeps the event log
//! trimmed until SIGTERM/SIGINT.

use std::process::ExitCode;

use fm_server::config::{self, Config};
use fm_server::retention::start_retention_task;
use fm_server::{init_tracing, open_store, FaultService, StartupError};

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("FM_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() -> ExitCode {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("fm.toml"));

    let config = match config::load_config(selected_config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fmd: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging);
    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    match run(config).await {
        Ok(()) => {
            tracing::info!("fault management daemon shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "fault management daemon failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let pool = tokio::task::spawn_blocking({
        let config = config.clone();
        move || open_store(&config)
    })
    .await??;

    let service = FaultService::new(pool.clone(), config.event_log.max_size);
    match service.summary(false) {
        Ok(summary) => tracing::info!(
            summary = %serde_json::to_string(&summary).unwrap_or_default(),
            "active alarm summary"
        ),
        Err(e) => tracing::warn!(error = %e, "failed to compute alarm summary"),
    }

    tracing::info!(
        db = %config.database.path,
        event_log_max_size = config.event_log.max_size,
        "fault management daemon ready"
    );

    let retention = tokio::spawn(start_retention_task(
        pool,
        config.event_log.max_size,
        config.event_log.sweep_interval_secs,
    ));

    shutdown_signal().await;
    retention.abort();
    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
        () = terminate => { tracing::info!("received SIGTERM, shutting down"); }
    }
}
