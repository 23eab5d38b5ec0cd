//! Quizcache - a layered in-process cache service
//!
//! Demo binary: builds the service from environment configuration,
//! runs a short cache-aside scenario with simulated slow loaders, and
//! shuts down gracefully on SIGINT/SIGTERM.

use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizcache::{
    loader_fn, CacheService, CacheServiceConfig, EntryMetadata, InvalidationRule,
    InvalidationStrategy, KeyPattern, WarmingPriority, WarmingRule, WarmingSchedule,
    WarmingStrategy,
};

/// Main entry point for the quizcache demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Construct the cache service and wire its rules
/// 4. Run a short cache-aside / warming / invalidation scenario
/// 5. Wait for SIGINT/SIGTERM and shut down gracefully
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting quizcache demo");

    let mut config = CacheServiceConfig::from_env();
    config.factory_timeout = Some(Duration::from_secs(10));
    config.invalidation_rules = vec![InvalidationRule::new(
        "user-data",
        KeyPattern::prefix("user:"),
        InvalidationStrategy::Immediate,
    )
    .with_priority(10)];
    config.warming_rules = vec![WarmingRule::new(
        "plan-catalog",
        WarmingStrategy::Eager,
        KeyPattern::prefix("plans:"),
        loader_fn(|key| async move {
            // Stands in for a document-database read
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(json!({ "catalog": key }))
        }),
    )
    .with_seed_keys(["plans:catalog"])
    .with_schedule(WarmingSchedule::immediate_then_every(Duration::from_secs(60)))];

    info!(
        max_entries = config.store.max_entries,
        sweep_interval_ms = config.sweep_interval.as_millis() as u64,
        "Configuration loaded"
    );

    let service = CacheService::new(config).context("failed to construct cache service")?;
    service.initialize().await.context("failed to initialize cache service")?;

    run_scenario(&service).await?;

    shutdown_signal().await;
    service.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Exercises the cache-aside flow the service is built for.
async fn run_scenario(service: &CacheService) -> anyhow::Result<()> {
    // First read is a miss and pays for the slow factory
    let generated = service
        .get_or_set(
            "quiz:doc-42",
            || async {
                // Stands in for an LLM generation call
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(json!({ "questions": ["What is caching?"] }))
            },
            Some(Duration::from_secs(60)),
            EntryMetadata::depending_on(["user:42"]),
            Some("user-42"),
        )
        .await?;
    info!(
        from_cache = generated.from_cache,
        elapsed_ms = generated.execution_time_ms,
        "quiz generated"
    );

    // Second read is served from cache
    let cached = service.get("quiz:doc-42", Some("user-42")).await;
    info!(
        from_cache = cached.from_cache,
        elapsed_ms = cached.execution_time_ms,
        "quiz re-read"
    );

    // The user record changes; the rule drops everything under user:42
    // and the dependency cascade removes the derived quiz
    service.set("user:42", json!({"plan": "pro"}), None, EntryMetadata::default()).await;
    let affected = service.notify_change("user:42", Some("profile updated")).await?;
    service.delete("user:42").await;
    info!(affected, "user change invalidated");

    // Warm a known-hot key ahead of demand
    let job_id = service
        .warm_cache(
            vec!["quiz:doc-42".to_string()],
            Some(loader_fn(|_key| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!({ "questions": ["What is warming?"] }))
            })),
            WarmingPriority::High,
        )
        .await?;
    let job = service.warming_job(job_id).await?;
    info!(?job, "warming job finished");

    let report = service.get_cache_stats().await;
    let pretty = serde_json::to_string_pretty(&report)?;
    info!(stats = %pretty, "cache stats");

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
