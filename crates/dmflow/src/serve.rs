// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dmflow serve` command implementation.
//!
//! Opens the SQLite state store, connects the relay executor, starts the
//! orchestrator (which recovers any interrupted queue first), then exposes
//! it through the HTTP gateway and the daily reset trigger until a shutdown
//! signal arrives.

use std::sync::Arc;
use std::time::Duration;

use dmflow_config::model::DmflowConfig;
use dmflow_core::types::HealthStatus;
use dmflow_core::{DmflowError, PluginAdapter};
use dmflow_cron::DailyTrigger;
use dmflow_engine::{CommandRouter, EngineOptions, Orchestrator};
use dmflow_gateway::{AuthConfig, GatewayState, ServerConfig};
use dmflow_relay::RelayExecutor;
use dmflow_storage::{SqliteStore, StateRecords};
use dmflow_template::SpintaxResolver;
use tracing::{debug, error, info, warn};

use crate::shutdown;

/// Runs the `dmflow serve` command.
pub async fn run_serve(config: DmflowConfig) -> Result<(), DmflowError> {
    init_tracing(&config.engine.log_level);

    info!("starting dmflow serve");

    // Initialize storage.
    let store = {
        let store = SqliteStore::new(config.storage.clone());
        store.initialize().await?;
        Arc::new(store)
    };
    info!(path = %config.storage.database_path, "state store opened");

    let records = StateRecords::new(store.clone());
    records.initialize_defaults().await?;

    // Initialize the executor. An unreachable agent is not fatal: sends fail
    // and are retried until it comes up.
    let executor = Arc::new(RelayExecutor::new(&config.relay)?);
    match executor.health_check().await? {
        HealthStatus::Healthy => info!("surface agent reachable"),
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            warn!(reason = %reason, "surface agent not reachable yet");
        }
    }

    let cancel = shutdown::install_signal_handler();

    // The router exists before the engine so transports never race startup.
    let router = CommandRouter::new(Duration::from_secs(config.engine.command_timeout_secs));

    let orchestrator = Orchestrator::new(
        records,
        executor.clone(),
        Arc::new(SpintaxResolver::new()),
        EngineOptions::from(&config.engine),
    );
    let (handle, engine_task) = orchestrator.spawn(cancel.clone());
    router.attach(handle);

    if config.schedule.daily_reset {
        DailyTrigger::new(router.clone()).spawn(cancel.clone());
        info!("daily reset trigger enabled");
    } else {
        debug!("daily reset trigger disabled");
    }

    #[cfg(not(target_env = "msvc"))]
    {
        let mem_cancel = cancel.clone();
        tokio::spawn(async move {
            memory_monitor(mem_cancel).await;
        });
    }

    let gateway_task = if config.gateway.enabled {
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let state = GatewayState::new(
            router.clone(),
            AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
        );
        let gw_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = dmflow_gateway::start_server(&server_config, state, gw_cancel.clone()).await {
                error!(error = %e, "gateway failed");
                // Without its only transport the engine is unreachable.
                gw_cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled");
        None
    };

    if let Err(e) = engine_task.await {
        error!(error = %e, "orchestrator task panicked");
        cancel.cancel();
    }
    if let Some(task) = gateway_task {
        let _ = task.await;
    }

    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "state store did not close cleanly");
    }

    info!("dmflow serve shutdown complete");
    Ok(())
}

/// Logs heap statistics from jemalloc once a minute.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(cancel: tokio_util::sync::CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let _ = tikv_jemalloc_ctl::epoch::advance();
                let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
                let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
                debug!(
                    allocated_kb = allocated / 1024,
                    resident_kb = resident / 1024,
                    "memory usage"
                );
            }
            _ = cancel.cancelled() => {
                debug!("memory monitor shutting down");
                break;
            }
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dmflow={log_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
