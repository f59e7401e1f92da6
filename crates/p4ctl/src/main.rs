//! p4ctl entry point.
//!
//! Loads the configuration and the program's build outputs, then runs the
//! controller until SIGINT arrives.

use anyhow::Context;
use clap::Parser;
use p4ctl::{Controller, ControllerConfig, RunSummary};
use p4ctl_catalog::Catalog;
use p4ctl_runtime::{Connector, GrpcConnector, MemoryFabric, PipelineConfig};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// P4Runtime controller for BMv2 switches
#[derive(Parser, Debug)]
#[command(name = "p4ctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller configuration file (YAML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// P4Info descriptor, overrides the configuration file
    #[arg(long)]
    p4info: Option<PathBuf>,

    /// BMv2 JSON, overrides the configuration file
    #[arg(long)]
    bmv2_json: Option<PathBuf>,

    /// Run against in-memory switches instead of real ones
    #[arg(long)]
    dry_run: bool,

    /// Skip tunnel counter polling
    #[arg(long)]
    no_telemetry: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn init_logging(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).compact())
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<ControllerConfig> {
    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(p4info) = &args.p4info {
        config.p4info = p4info.clone();
    }
    if let Some(bmv2_json) = &args.bmv2_json {
        config.bmv2_json = bmv2_json.clone();
    }
    if args.no_telemetry {
        config.telemetry.enabled = false;
    }
    config.validate()?;
    config.check_inputs()?;
    Ok(config)
}

async fn execute<C: Connector>(
    connector: C,
    config: ControllerConfig,
    cancel: CancellationToken,
) -> anyhow::Result<RunSummary> {
    let catalog = Catalog::load(&config.p4info)
        .with_context(|| format!("loading {}", config.p4info.display()))?;
    let device_config = fs::read(&config.bmv2_json)
        .with_context(|| format!("reading {}", config.bmv2_json.display()))?;
    let pipeline = PipelineConfig::new(catalog.p4info().clone(), device_config);

    let controller = Controller::new(connector, Arc::new(catalog), pipeline, config);
    let summary = controller.run(cancel, |report| print!("{report}")).await?;
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting p4ctl with {} switches{}",
        config.switches.len(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let shutdown_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received SIGINT, shutting down");
                signal_cancel.cancel();
            }
            Err(err) => error!("Failed to listen for ctrl-c: {}", err),
        }
    });

    let result = if args.dry_run {
        execute(MemoryFabric::new(), config, cancel).await
    } else {
        let connector = GrpcConnector::new(config.connect_timeout());
        execute(connector, config, cancel).await
    };
    shutdown_handle.abort();

    match result {
        Ok(summary) => {
            info!(
                "p4ctl finished{}: {}, {} telemetry cycles",
                if summary.interrupted { " early" } else { "" },
                summary.stats,
                summary.telemetry_cycles
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
