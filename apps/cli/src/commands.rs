//! Subcommand implementations

use anyhow::Context;
use keyguard_azure::{ArmClient, AzureKeyProvider, AzureMetricsSource};
use keyguard_core::config::AppConfig;
use keyguard_credential::{PendingReinstatement, ProtectionEngine};
use keyguard_monitor::{MonitoringStats, PollingScheduler, RunSummary};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Output of `keyguard run`
#[derive(Debug, Serialize)]
struct RunOutput {
    run: RunSummary,
    stats: MonitoringStats,
    /// Reinstatements still scheduled when the process exits
    pending_reinstatements: Vec<PendingReinstatement>,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn connect(config: &AppConfig) -> anyhow::Result<Arc<ArmClient>> {
    Ok(Arc::new(ArmClient::new(&config.azure)?))
}

fn scheduler(config: &AppConfig, client: Arc<ArmClient>) -> anyhow::Result<PollingScheduler> {
    let provider = Arc::new(AzureKeyProvider::new(Arc::clone(&client)));
    let metrics = Arc::new(AzureMetricsSource::new(client));
    let notifier = Arc::new(keyguard_notify::from_config(&config.alerts)?);
    let engine = ProtectionEngine::new(provider, notifier, config.monitoring.clone());
    Ok(PollingScheduler::new(engine, metrics, config.resources()))
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping after the current cycle");
                token.cancel();
            }
            Err(error) => tracing::warn!(error = %error, "Failed to listen for Ctrl-C"),
        }
    });
}

/// Wait for scheduled reinstatements unless `cancel` fires first
async fn drain(engine: &ProtectionEngine, cancel: &CancellationToken) {
    let pending = engine.pending_reinstatements().len();
    if pending == 0 {
        return;
    }
    tracing::info!(pending, "Waiting for scheduled reinstatements");
    tokio::select! {
        () = engine.drain() => {}
        () = cancel.cancelled() => {
            tracing::warn!(
                pending = engine.pending_reinstatements().len(),
                "Drain interrupted, reinstatements abandoned"
            );
        }
    }
}

pub async fn run(config: &AppConfig, window: Option<Duration>, no_drain: bool) -> anyhow::Result<()> {
    config.validate()?;
    let client = connect(config)?;
    client
        .test_connection()
        .await
        .context("Azure connection test failed")?;

    let scheduler = scheduler(config, client)?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let window = window.unwrap_or(config.monitoring.run_window);
    let summary = scheduler.run_for(window, cancel.clone()).await;

    if !no_drain {
        // An interrupt during the drain abandons it.
        let drain_cancel = CancellationToken::new();
        cancel_on_ctrl_c(drain_cancel.clone());
        drain(scheduler.engine(), &drain_cancel).await;
    }

    print_json(&RunOutput {
        run: summary,
        stats: scheduler.monitoring_stats(),
        pending_reinstatements: scheduler.engine().pending_reinstatements(),
    })
}

pub async fn check(config: &AppConfig, no_drain: bool) -> anyhow::Result<()> {
    config.validate()?;
    let client = connect(config)?;
    let scheduler = scheduler(config, client)?;

    let report = scheduler.run_cycle().await;
    print_json(&report)?;

    if !no_drain {
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());
        drain(scheduler.engine(), &cancel).await;
    }
    Ok(())
}

pub async fn test_connection(config: &AppConfig) -> anyhow::Result<()> {
    config.azure.validate()?;
    let client = connect(config)?;
    client
        .test_connection()
        .await
        .context("Azure connection test failed")?;
    println!("Azure connection OK");
    Ok(())
}

pub fn show_config(config: &AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    print_json(config)
}
