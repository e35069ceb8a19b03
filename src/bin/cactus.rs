//! cactus - run a CSIP-Aus test procedure against a utility server
//!
//! Usage:
//!   cactus run procedures/S-ALL-01.yaml --client device-1
//!   cactus run procedures/S-ALL-02.yaml --config ./.cactus.yaml --client device-1 --client aggregator-1
//!
//! Log verbosity follows RUST_LOG (default `cactus_harness=info`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cactus_harness::execution::{log_snapshot, run_with_monitor, spawn_monitor};
use cactus_harness::{
    build_execution_context, render_summary, write_report, ExecutionEngine, GlobalConfig, RunConfig, RunSummary,
    StandardActions, StandardChecks, TestProcedure,
};

/// CSIP-Aus conformance test harness
#[derive(Parser, Debug)]
#[command(name = "cactus")]
#[command(about = "Run CSIP-Aus conformance test procedures against a server")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single test procedure
    Run {
        /// Test procedure YAML file
        procedure: PathBuf,

        /// Configuration file (defaults to $CACTUS_CONFIG, ./.cactus.yaml, ~/.cactus.yaml)
        #[arg(long, short = 'c', env = "CACTUS_CONFIG")]
        config: Option<PathBuf>,

        /// Configured client id, once per procedure client alias, in order
        #[arg(long = "client", required = true)]
        clients: Vec<String>,

        /// Seconds between monitor status lines
        #[arg(long, default_value_t = 5)]
        status_interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cactus_harness=info,cactus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run {
            procedure,
            config,
            clients,
            status_interval,
        } => run(procedure, config, clients, status_interval).await,
    }
}

async fn run(
    procedure_path: PathBuf,
    config_path: Option<PathBuf>,
    client_ids: Vec<String>,
    status_interval: u64,
) -> anyhow::Result<ExitCode> {
    let config = match config_path {
        Some(path) => GlobalConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => GlobalConfig::discover().context("Failed to find a configuration file")?.1,
    };

    let procedure = TestProcedure::from_file(&procedure_path)
        .with_context(|| format!("Failed to load test procedure {}", procedure_path.display()))?;
    if procedure.steps.is_empty() {
        bail!("Test procedure {} has no steps", procedure.id);
    }

    let run = RunConfig {
        test_procedure: procedure_path,
        client_ids,
    };
    let mut context =
        build_execution_context(&config, &run, &procedure).context("Failed to prepare execution context")?;
    let steps = procedure.build_steps()?;

    let engine = ExecutionEngine::new(Arc::new(StandardActions), Arc::new(StandardChecks));
    let monitor = spawn_monitor(
        engine.subscribe(),
        Duration::from_secs(status_interval.max(1)),
        log_snapshot,
    );

    tracing::info!("Running {} ({})", procedure.id, procedure.description);
    let result = run_with_monitor(engine.run(&mut context, steps), monitor).await?;

    let summary = RunSummary::new(&context, result);
    println!("{}", render_summary(&summary));
    let report = write_report(&config.output_dir, &summary)?;
    println!("Report: {}", report.display());

    Ok(if summary.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
