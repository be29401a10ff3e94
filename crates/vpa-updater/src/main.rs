//! vpa-updater — disruption planning CLI.
//!
//! # Usage
//!
//! ```text
//! vpa-updater plan --snapshot pass.json --config updater.toml --output json
//! vpa-updater check-config --config updater.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vpa_disruption::TracingEventSink;
use vpa_state::{AttemptStore, RedbAttemptStore};
use vpa_types::UpdaterConfig;
use vpa_updater::{PlanAction, Snapshot, run_plan, seed_attempts};

#[derive(Parser)]
#[command(name = "vpa-updater", about = "VPA updater disruption planner")]
struct Cli {
    /// Log line format (logs go to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dry-run one pass over a snapshot and print the per-pod decisions.
    Plan {
        /// JSON snapshot with `policy`, `pods`, `controllers`, `attempts`, `now`.
        #[arg(long)]
        snapshot: PathBuf,

        /// updater.toml; built-in defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Parse and validate a configuration file.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vpa_disruption=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Plan {
            snapshot,
            config,
            output,
        } => plan(snapshot, config, output).await,
        Command::CheckConfig { config } => {
            let config = UpdaterConfig::from_file(&config)?;
            info!(
                min_replicas = config.disruption.min_replicas,
                tolerance = config.disruption.eviction_tolerance_fraction,
                "configuration is valid"
            );
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn plan(
    snapshot_path: PathBuf,
    config_path: Option<PathBuf>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let config = match &config_path {
        Some(path) => UpdaterConfig::from_file(path)?,
        None => UpdaterConfig::default(),
    };
    let snapshot = Snapshot::from_file(&snapshot_path)?;

    let persisted = match &config.state.path {
        Some(path) => {
            let store = RedbAttemptStore::open(path)?;
            info!(path = ?path, entries = store.entries()?.len(), "attempt store opened");
            Some(store)
        }
        None => None,
    };
    let attempts = seed_attempts(&snapshot, persisted.as_ref().map(|s| s as &dyn AttemptStore))?;

    let report = run_plan(&snapshot, &config, attempts, &TracingEventSink).await?;
    info!(
        evict = report.count(PlanAction::Evict),
        resize = report.count(PlanAction::ResizeInPlace),
        fallback = report.count(PlanAction::FallbackEvict),
        skip = report.count(PlanAction::Skip),
        "plan complete"
    );

    match output {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
