//! # Overlay Simulation Runtime
//!
//! Runs one simulation of the two-tier overlay and reports request
//! throughput and the share of invalid replica outcomes.
//!
//! ## Startup Sequence
//!
//! 1. Parse arguments (`OV_*` environment variables fill in missing flags)
//! 2. Initialize logging (`RUST_LOG` overrides `--log-level`)
//! 3. Build coordinator, supers and leaves
//! 4. Run the startup, request, update and metrics phases
//! 5. Print the report

use anyhow::{Context, Result};
use clap::Parser;
use ov_04_leaf_replica::FetchStrategy;
use overlay_runtime::{Simulation, SimulationConfig, Topology};
use shared_types::ConsistencyMode;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Two-tier Gnutella overlay simulator
#[derive(Parser, Debug)]
#[command(name = "overlay-runtime")]
#[command(about = "Simulate super-peer search and replica consistency strategies")]
struct Args {
    /// Number of super-peers
    #[arg(long, env = "OV_SUPERS", default_value_t = 5)]
    supers: u32,

    /// Leaves attached to each super-peer
    #[arg(long, env = "OV_LEAVES_PER_SUPER", default_value_t = 3)]
    leaves_per_super: u32,

    /// Files authored by each leaf
    #[arg(long, env = "OV_FILES_PER_LEAF", default_value_t = 20)]
    files_per_leaf: usize,

    /// Files requested by each leaf
    #[arg(long, env = "OV_REQUESTS_PER_LEAF", default_value_t = 10)]
    requests_per_leaf: usize,

    /// Super-peer topology: all-to-all or linear
    #[arg(long, env = "OV_TOPOLOGY", default_value = "all-to-all")]
    topology: Topology,

    /// Consistency mode: none, push, pull-validate, push-pull-validate,
    /// version-authority, push-version-authority (or codes 0-5)
    #[arg(long, env = "OV_MODE", default_value = "push")]
    mode: ConsistencyMode,

    /// Holder selection: random-holder or first-success
    #[arg(long, env = "OV_FETCH", default_value = "random-holder")]
    fetch: FetchStrategy,

    /// Leaves that join during the update phase
    #[arg(long, env = "OV_EXTRA_LEAVES", default_value_t = 1)]
    extra_leaves: u32,

    /// Files requested by each extra leaf
    #[arg(long, env = "OV_EXTRA_REQUESTS", default_value_t = 200)]
    extra_requests: usize,

    /// Local updates per leaf during the update phase
    #[arg(long, env = "OV_UPDATE_ROUNDS", default_value_t = 5)]
    update_rounds: usize,

    /// Milliseconds between local updates
    #[arg(long, env = "OV_UPDATE_INTERVAL_MS", default_value_t = 100)]
    update_interval_ms: u64,

    /// Seconds to wait for each phase
    #[arg(long, env = "OV_PHASE_TIMEOUT_SECS", default_value_t = 30)]
    phase_timeout_secs: u64,

    /// Seed for every random choice (OS entropy when omitted)
    #[arg(long, env = "OV_SEED")]
    seed: Option<u64>,

    /// Store leaf files on disk under this directory
    #[arg(long, env = "OV_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "OV_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_config(self) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.overlay.n_supers = self.supers;
        config.overlay.leaves_per_super = self.leaves_per_super;
        config.overlay.topology = self.topology;
        config.workload.files_per_leaf = self.files_per_leaf;
        config.workload.requests_per_leaf = self.requests_per_leaf;
        config.workload.extra_leaves = self.extra_leaves;
        config.workload.extra_requests = self.extra_requests;
        config.workload.update_rounds = self.update_rounds;
        config.workload.update_interval = Duration::from_millis(self.update_interval_ms);
        config.consistency.mode = self.mode;
        config.consistency.fetch_strategy = self.fetch;
        config.runtime.seed = self.seed;
        config.runtime.phase_timeout = Duration::from_secs(self.phase_timeout_secs);
        config.runtime.data_dir = self.data_dir;
        config
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;
    let json = args.json;
    let config = args.into_config();

    info!("===========================================");
    info!("  Gnutella Overlay Simulation v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "  {} supers x {} leaves, {} topology, {} mode",
        config.overlay.n_supers,
        config.overlay.leaves_per_super,
        config.overlay.topology,
        config.consistency.mode
    );
    info!("===========================================");

    let report = Simulation::build(config).await?.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} requests took {:.3} seconds. R/s = {:.1}",
            report.requests, report.elapsed_secs, report.requests_per_second
        );
        println!(
            "Valid: {}\tInvalid: {}\tInvalid percent: {:.3}%",
            report.valid, report.invalid, report.invalid_percent
        );
        if !report.is_complete() {
            println!("Stuck leaves: {:?}", report.stuck_leaves);
        }
    }
    Ok(())
}
