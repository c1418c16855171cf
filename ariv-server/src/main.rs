use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ariv_core::{AppConfig, BenchmarkHarness, HardwareProbe, Registry};
use ariv_server::{build_router, AppState};

const DEFAULT_REGISTRY_PATH: &str = "models.yaml";
const BENCH_RESULTS_DIR: &str = "benchmarks/results";

#[derive(Parser)]
#[command(name = "arivctl", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print hardware probe results and per-model local availability.
    Status,
    /// Launch the HTTP frontend.
    Start {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the benchmark harness for one or more models.
    Bench {
        #[arg(long = "models", required = true, num_args = 1..)]
        models: Vec<String>,
        #[arg(long)]
        lang: String,
        #[arg(long)]
        subset: String,
    },
    /// Delegate to the out-of-tree model download helper.
    Download {
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_registry(config: &AppConfig) -> ariv_common::Result<Registry> {
    let path = config
        .registry
        .path
        .clone()
        .unwrap_or_else(|| DEFAULT_REGISTRY_PATH.to_string());
    Registry::load(&path)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Status => run_status().await,
        Command::Start { host, port } => run_start(host, port).await,
        Command::Bench { models, lang, subset } => run_bench(models, lang, subset).await,
        Command::Download { dry_run } => run_download(dry_run).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run_status() -> ariv_common::Result<()> {
    let config = AppConfig::load().map_err(|e| ariv_common::ArivError::ConfigInvalid(e.to_string()))?;
    let registry = load_registry(&config)?;
    let hardware = HardwareProbe::new().probe();

    println!(
        "hardware: gpu={} vram_mb={} cpu_mem_mb={} device={}",
        hardware.gpu, hardware.vram_mb, hardware.cpu_mem_mb, hardware.device_name
    );
    for spec in registry.list() {
        println!(
            "model: {} task={} vram_mb={} local={}",
            spec.name,
            spec.task,
            spec.vram_mb,
            spec.is_available_locally()
        );
    }
    Ok(())
}

async fn run_start(host: Option<String>, port: Option<u16>) -> ariv_common::Result<()> {
    let mut config = AppConfig::load().map_err(|e| ariv_common::ArivError::ConfigInvalid(e.to_string()))?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let registry = load_registry(&config)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, registry));
    let app = build_router(state);

    tracing::info!(%addr, "starting ariv-server");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ariv_common::ArivError::Internal(format!("cannot bind {addr}: {e}")))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| ariv_common::ArivError::Internal(e.to_string()))?;
    Ok(())
}

async fn run_bench(models: Vec<String>, lang: String, subset: String) -> ariv_common::Result<()> {
    let config = AppConfig::load().map_err(|e| ariv_common::ArivError::ConfigInvalid(e.to_string()))?;
    let registry = load_registry(&config)?;
    let runner = ariv_core::StreamingRunner::from_config(&config.runner);
    let harness = BenchmarkHarness::new(&runner);

    let resolved = models
        .iter()
        .map(|name| {
            let spec = registry.get(name)?;
            let path = spec.local_path.clone().unwrap_or_else(|| spec.name.clone());
            Ok((spec.name.clone(), path))
        })
        .collect::<ariv_common::Result<Vec<_>>>()?;

    let (results, csv_path, md_path) = harness
        .run(&resolved, "benchmarks/data.jsonl", &lang, &subset, BENCH_RESULTS_DIR)
        .await?;

    for result in &results {
        println!(
            "{}: bleu={} chrf={} throughput_tps={} p50={} p95={}",
            result.model, result.bleu, result.chrf, result.throughput_tps, result.latency_p50, result.latency_p95
        );
    }
    println!("-> {} / {}", csv_path.display(), md_path.display());
    Ok(())
}

async fn run_download(dry_run: bool) -> ariv_common::Result<()> {
    let helper = PathBuf::from("scripts/download_models.sh");
    if dry_run {
        println!("would invoke {}", helper.display());
        return Ok(());
    }
    let status = std::process::Command::new(&helper)
        .status()
        .map_err(|e| ariv_common::ArivError::Internal(format!("cannot run {}: {e}", helper.display())))?;
    if !status.success() {
        return Err(ariv_common::ArivError::Internal(format!(
            "{} exited with {:?}",
            helper.display(),
            status.code()
        )));
    }
    Ok(())
}
