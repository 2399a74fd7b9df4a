//! resilience-check
//!
//! Loads a targets file, binds one resilience pipeline per target and checks
//! each target concurrently through its pipeline.
//!
//! ```text
//! resilience-check --config targets.toml [--target NAME] [--path /health]
//! ```
//!
//! Prints a JSON summary to stdout and exits non-zero if any check failed.
//! Ctrl-C cancels outstanding checks; cancelled checks are reported as such.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use resilience_pipeline::config::load_config;
use resilience_pipeline::observability::metrics::init_metrics;
use resilience_pipeline::observability::{logging, TracingEventSink};
use resilience_pipeline::{PipelineRegistry, ServiceClient};

#[derive(Parser)]
#[command(name = "resilience-check")]
#[command(about = "Check configured targets through their resilience pipelines", long_about = None)]
struct Cli {
    /// Path to the targets file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Check only this target
    #[arg(short, long)]
    target: Option<String>,

    /// Request path, relative to each target's base URL
    #[arg(short, long, default_value = "/")]
    path: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    target: String,
    ok: bool,
    elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    cancelled: bool,
    circuit: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init(&config.observability)?;

    tracing::info!(
        config = %cli.config.display(),
        targets = config.targets.len(),
        "resilience-check v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let registry = PipelineRegistry::from_config(&config, Arc::new(TracingEventSink));

    let names: Vec<String> = match &cli.target {
        Some(name) if registry.get(name).is_none() => {
            return Err(format!("unknown target: {name}").into());
        }
        Some(name) => vec![name.clone()],
        None => registry.names().map(str::to_string).collect(),
    };

    let mut clients = Vec::with_capacity(names.len());
    for name in &names {
        let (Some(target), Some(pipeline)) = (config.target(name), registry.get(name)) else {
            continue;
        };
        clients.push(ServiceClient::new(target, pipeline)?);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, cancelling outstanding checks");
            ctrl_c.cancel();
        }
    });

    let reports = join_all(
        clients
            .iter()
            .map(|client| check(client, &cli.path, &cancel)),
    )
    .await;

    let failed = reports.iter().filter(|r| !r.ok).count();
    println!("{}", serde_json::to_string_pretty(&reports)?);

    tracing::info!(checked = reports.len(), failed, "Check run complete");

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn check(client: &ServiceClient, path: &str, cancel: &CancellationToken) -> CheckReport {
    let started = Instant::now();
    let result = client.get_text_with_cancellation(path, cancel).await;
    let elapsed_ms = started.elapsed().as_millis();
    let pipeline = client.pipeline();

    let mut report = CheckReport {
        target: pipeline.target().to_string(),
        ok: result.is_ok(),
        elapsed_ms,
        body_bytes: None,
        attempts: None,
        error: None,
        cancelled: false,
        circuit: format!("{:?}", pipeline.circuit_status()),
    };

    match result {
        Ok(body) => report.body_bytes = Some(body.len()),
        Err(err) => {
            tracing::warn!(target_name = %err.target(), error = %err, "Check failed");
            report.attempts = Some(err.attempts());
            report.cancelled = err.is_cancelled();
            report.error = Some(err.to_string());
        }
    }

    report
}
