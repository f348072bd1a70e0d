//! payflow - Ledger Gateway + Payout Worker
//!
//! ```text
//! client ──▶ Gateway ──▶ IdempotencyGate (Redis)
//!               │
//!               ▼
//!         TransferEngine ──▶ PostgreSQL: entries + balances + payout_tasks
//!                                             │ SKIP LOCKED
//!                                             ▼
//!                                       PayoutWorker ──▶ payout provider
//! ```
//!
//! Usage: `payflow [--env <name>]` (loads `config/<name>.yaml`, default `dev`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;

use payflow::config::{AppConfig, IdempotencyBackend, ProviderKind};
use payflow::db::{Database, schema};
use payflow::gateway::{self, state::AppState};
use payflow::idempotency::{
    IdempotencyGate, IdempotencyStore, MemoryIdempotencyStore, RedisIdempotencyStore,
};
use payflow::ledger::LedgerAudit;
use payflow::payout::{
    HttpPayoutProvider, PayoutProvider, PayoutWorker, PgTaskQueue, WorkerConfig,
};
use payflow::transfer::{TransferEngine, TransferService};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env).with_context(|| format!("loading config for '{}'", env))?;
    let _log_guard = payflow::logging::init_logging(&config);

    tracing::info!(
        env = %env,
        build = env!("PAYFLOW_BUILD"),
        "Starting payflow"
    );

    // ==========================================================================
    // Storage
    // ==========================================================================
    let db = Database::connect(&config.database.url, config.database.max_connections)
        .await
        .context("connecting to PostgreSQL")?;
    if config.database.init_schema {
        schema::init_schema(db.pool())
            .await
            .context("initializing schema")?;
    }

    let store = build_idempotency_store(&config).await?;
    let gate = IdempotencyGate::with_settings(
        store,
        Duration::from_secs(config.idempotency.ttl_secs),
        Duration::from_millis(config.idempotency.timeout_ms),
    );
    tracing::info!(
        backend = ?config.idempotency.backend,
        ttl_secs = gate.ttl().as_secs(),
        "Idempotency gate ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ==========================================================================
    // Payout worker
    // ==========================================================================
    let worker_handle = if config.worker.enabled {
        let provider = build_provider(&config)?;
        let worker = PayoutWorker::new(
            Arc::new(PgTaskQueue::new(db.pool().clone())),
            provider,
            WorkerConfig::from(&config.worker),
            shutdown_rx.clone(),
        );
        Some(tokio::spawn(worker.run()))
    } else {
        tracing::warn!("Payout worker disabled; tasks will stay PENDING");
        None
    };

    // ==========================================================================
    // Gateway
    // ==========================================================================
    let service = TransferService::new(gate, TransferEngine::new(db.pool().clone()));
    let state = Arc::new(AppState::new(
        Arc::new(service),
        Arc::new(LedgerAudit::new(db.pool().clone())),
    ));

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    gateway::run_server(&config.gateway, state, shutdown_rx)
        .await
        .context("gateway server")?;

    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Payout worker task panicked");
        }
    }

    tracing::info!("payflow stopped");
    Ok(())
}

async fn build_idempotency_store(config: &AppConfig) -> anyhow::Result<Arc<dyn IdempotencyStore>> {
    match config.idempotency.backend {
        IdempotencyBackend::Redis => {
            let store = RedisIdempotencyStore::connect(&config.idempotency.redis_url)
                .await
                .context("connecting to Redis")?;
            store.ping().await.context("pinging Redis")?;
            Ok(Arc::new(store))
        }
        IdempotencyBackend::Memory => {
            tracing::warn!("Using process-local idempotency store; do not run multiple gateways");
            let store = Arc::new(MemoryIdempotencyStore::new());
            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(60));
                loop {
                    ticker.tick().await;
                    let purged = sweeper.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "Purged expired idempotency keys");
                    }
                }
            });
            Ok(store)
        }
    }
}

fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn PayoutProvider>> {
    match config.provider.kind {
        ProviderKind::Http => {
            let url = config
                .provider
                .url
                .as_deref()
                .context("provider.url is required for the http provider")?;
            let provider = HttpPayoutProvider::new(url, config.worker.provider_timeout())
                .context("building HTTP payout provider")?;
            Ok(Arc::new(provider))
        }
        #[cfg(feature = "mock-provider")]
        ProviderKind::Mock => {
            tracing::warn!(
                failure_rate = config.provider.failure_rate,
                latency_ms = config.provider.latency_ms,
                "Using SIMULATED payout provider"
            );
            Ok(Arc::new(payflow::payout::MockPayoutProvider::new(
                Duration::from_millis(config.provider.latency_ms),
                config.provider.failure_rate,
            )))
        }
        #[cfg(not(feature = "mock-provider"))]
        ProviderKind::Mock => {
            anyhow::bail!("mock payout provider requested but this build has the 'mock-provider' feature disabled")
        }
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
