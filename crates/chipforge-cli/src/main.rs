//! ChipForge CLI
//!
//! The `chipforge` command drives the design loop over JSON files.
//!
//! ## Commands
//!
//! - `generate`: Build an initial architecture for a requirements file
//! - `analyze`: Score a snapshot and report its quality
//! - `optimize`: Run the improve loop, optionally writing a session artifact
//! - `run`: Register a chip, optimize it, and record the DESIGN stage
//! - `history`: Print a chip's lifecycle history
//! - `config`: Print the default configuration as TOML

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chipforge_core::telemetry::{init_tracing, level_for_verbosity};
use chipforge_core::{
    read_session_artifact, write_session_artifact, ArchitectureSnapshot, DesignPipeline,
    DesignRequest, Designer, LifecycleStore, LifecycleTracker, MemoryLifecycleStore,
    PipelineConfig, Requirements, SurrealLifecycleStore, CONFIG_ENV,
};

#[derive(Parser)]
#[command(name = "chipforge")]
#[command(author = "ChipForge Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Autonomous chip design-optimization pipeline", long_about = None)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an initial architecture
    Generate {
        /// Requirements file (JSON)
        #[arg(short, long)]
        requirements: PathBuf,

        /// Seed for the headroom draw
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
    },

    /// Analyze a snapshot against requirements
    Analyze {
        /// Requirements file (JSON)
        #[arg(short, long)]
        requirements: PathBuf,

        /// Snapshot file (JSON)
        #[arg(short = 'n', long)]
        snapshot: PathBuf,
    },

    /// Run the optimization loop without lifecycle tracking
    Optimize {
        /// Requirements file (JSON)
        #[arg(short, long)]
        requirements: PathBuf,

        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// Write the session as a digest-verified artifact under this directory
        #[arg(long)]
        artifact_dir: Option<PathBuf>,
    },

    /// Register a chip, optimize it and record the DESIGN stage
    ///
    /// Uses SurrealDB when CHIPFORGE_DB_URL is set, otherwise an in-memory store.
    Run {
        /// Chip identifier
        #[arg(long)]
        chip: String,

        /// Owning project
        #[arg(long, default_value = "default")]
        project: String,

        /// Requirements file (JSON)
        #[arg(short, long)]
        requirements: PathBuf,

        /// Seed (defaults to one derived from the chip id)
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Show the lifecycle history of a chip
    History {
        /// Chip identifier
        chip: String,
    },

    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, level_for_verbosity(cli.verbose));

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate { requirements, seed } => cmd_generate(config, &requirements, seed),
        Commands::Analyze {
            requirements,
            snapshot,
        } => cmd_analyze(config, &requirements, &snapshot),
        Commands::Optimize {
            requirements,
            seed,
            artifact_dir,
        } => cmd_optimize(config, &requirements, seed, artifact_dir.as_deref()),
        Commands::Run {
            chip,
            project,
            requirements,
            seed,
        } => cmd_run(config, chip, project, &requirements, seed).await,
        Commands::History { chip } => cmd_history(config, &chip).await,
        Commands::Config => {
            print!("{}", PipelineConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_generate(config: PipelineConfig, requirements: &Path, seed: u64) -> Result<()> {
    let requirements: Requirements = read_json(requirements)?;
    let designer = Designer::new(config)?;
    let snapshot = designer
        .generate_initial(&requirements, seed)
        .context("Failed to generate an initial architecture")?;
    info!(snapshot_id = %snapshot.id().short(), "generated initial architecture");
    print_json(&snapshot)
}

fn cmd_analyze(config: PipelineConfig, requirements: &Path, snapshot: &Path) -> Result<()> {
    let requirements: Requirements = read_json(requirements)?;
    requirements.validate()?;
    let snapshot: ArchitectureSnapshot = read_json(snapshot)?;
    let designer = Designer::new(config)?;

    let analysis = designer.analyzer().analyze(&snapshot, &requirements);
    let quality = designer.evaluator().evaluate(&analysis, &snapshot);
    print_json(&serde_json::json!({
        "analysis": analysis,
        "quality": quality,
    }))
}

fn cmd_optimize(
    config: PipelineConfig,
    requirements: &Path,
    seed: u64,
    artifact_dir: Option<&Path>,
) -> Result<()> {
    let requirements: Requirements = read_json(requirements)?;
    let designer = Designer::new(config)?;
    let cancel = cancel_on_ctrl_c();

    let session = designer.optimize(&requirements, seed, &cancel)?;

    if let Some(dir) = artifact_dir {
        let path = write_session_artifact(&session, dir)?;
        // confirm the sidecar matches before reporting the path
        read_session_artifact(&session.session_id.to_string(), dir)?;
        info!(path = %path.display(), "session artifact written");
    }
    print_json(&session.summary())
}

async fn open_store() -> Result<Arc<dyn LifecycleStore>> {
    if std::env::var("CHIPFORGE_DB_URL").is_ok() {
        let store = SurrealLifecycleStore::from_env()
            .await
            .context("Failed to connect to ChipForge database")?;
        Ok(Arc::new(store))
    } else {
        warn!("CHIPFORGE_DB_URL not set; lifecycle history is kept in memory only");
        Ok(Arc::new(MemoryLifecycleStore::new()))
    }
}

async fn cmd_run(
    config: PipelineConfig,
    chip: String,
    project: String,
    requirements: &Path,
    seed: Option<u64>,
) -> Result<()> {
    let requirements: Requirements = read_json(requirements)?;
    let store = open_store().await?;
    let pipeline = DesignPipeline::from_config(config, store)?;

    let mut request = DesignRequest::new(chip, project, requirements);
    if let Some(seed) = seed {
        request = request.with_seed(seed);
    }

    let cancel = cancel_on_ctrl_c();
    let report = pipeline.run(request, &cancel).await?;
    info!(
        chip_id = %report.chip_id,
        outcome = %report.outcome,
        iterations = report.iterations,
        "pipeline finished"
    );
    print_json(&report)
}

async fn cmd_history(config: PipelineConfig, chip: &str) -> Result<()> {
    let store = open_store().await?;
    let tracker = LifecycleTracker::with_plan(store, config.lifecycle.stages);
    let history = tracker
        .history(chip)
        .await
        .with_context(|| format!("No lifecycle history for '{chip}'"))?;

    for entry in &history {
        println!(
            "{:>3}  {:<14} {}",
            entry.seq,
            entry.stage,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current iteration");
            token.cancel();
        }
    });
    cancel
}
