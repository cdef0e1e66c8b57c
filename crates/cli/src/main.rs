use anyhow::Result;
use clap::{Parser, Subcommand};
use pipeline::{
    AmbientTicker, AnalysisEvent, AnalysisOrchestrator, FileCandidate, HttpGateway,
    PipelineConfig, ServiceSelection, SimulatedDriver,
};
use queue::{AnalysisKind, QueueItem, QueueStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "matchvision-cli")]
#[command(about = "Matchvision CLI - Headless match video analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a match video and run the selected analyses
    Analyze {
        /// Video file to analyze
        file: PathBuf,

        /// Analysis kind (highlights, player, tactics, performance, crowd)
        #[arg(long, default_value = "highlights")]
        kind: String,

        /// Run player tracking inference
        #[arg(long)]
        player: bool,

        /// Run crowd analysis inference
        #[arg(long)]
        crowd: bool,

        /// Focus areas (repeatable)
        #[arg(long)]
        focus: Vec<String>,

        /// Backend API root
        #[arg(long, default_value = "http://127.0.0.1:8000/api/v1")]
        api_url: String,

        /// Bearer token for the backend
        #[arg(long)]
        token: Option<String>,

        /// Write the analysis report to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List uploads the backend knows about
    List {
        #[arg(long, default_value = "http://127.0.0.1:8000/api/v1")]
        api_url: String,

        #[arg(long)]
        token: Option<String>,
    },

    /// Delete an upload server-side
    Delete {
        /// Upload id to delete
        id: String,

        #[arg(long, default_value = "http://127.0.0.1:8000/api/v1")]
        api_url: String,

        #[arg(long)]
        token: Option<String>,
    },

    /// Run an offline queue simulation with the ambient ticker
    Demo {
        /// Number of simulated queue items
        #[arg(long, default_value_t = 6)]
        items: usize,

        /// Number of ticker passes
        #[arg(long, default_value_t = 30)]
        ticks: u32,

        /// Milliseconds between passes
        #[arg(long, default_value_t = 200)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Analyze {
            file,
            kind,
            player,
            crowd,
            focus,
            api_url,
            token,
            output,
        } => analyze_command(file, kind, player, crowd, focus, api_url, token, output).await,
        Commands::List { api_url, token } => list_command(api_url, token).await,
        Commands::Delete { id, api_url, token } => delete_command(id, api_url, token).await,
        Commands::Demo {
            items,
            ticks,
            interval_ms,
        } => demo_command(items, ticks, interval_ms).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn analyze_command(
    file: PathBuf,
    kind: String,
    player: bool,
    crowd: bool,
    focus: Vec<String>,
    api_url: String,
    token: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = PipelineConfig::new(api_url);
    if let Some(token) = token {
        config = config.with_bearer_token(token);
    }

    let gateway = Arc::new(HttpGateway::from_config(&config));
    let store = QueueStore::new();
    let mut orchestrator = AnalysisOrchestrator::new(store, gateway, config);

    orchestrator.set_kind(parse_kind(&kind));
    orchestrator.set_services(ServiceSelection {
        player_tracking: player,
        crowd_analysis: crowd,
    });
    for area in &focus {
        orchestrator.set_focus_area(area, true);
    }

    let candidate = FileCandidate::from_path(&file)?;
    orchestrator.select_file(candidate)?;

    let events = orchestrator.events();
    tokio::task::spawn_blocking(move || {
        while let Ok(event) = events.recv() {
            match event {
                AnalysisEvent::UploadProgress { progress, .. } if progress % 25 == 0 => {
                    info!("upload {progress}%");
                }
                AnalysisEvent::Uploaded { remote_id, .. } => {
                    info!("uploaded as {remote_id}, analysis starting");
                }
                AnalysisEvent::Completed { .. } => info!("analysis finished"),
                AnalysisEvent::Failed { reason, .. } => warn!("analysis failed: {reason}"),
                _ => {}
            }
        }
    });

    info!("Analyzing {:?}", file);
    let report = orchestrator.upload_and_analyze().await?;

    if let Some(path) = output {
        report.save(&path)?;
        info!("Report written to {:?}", path);
    } else {
        println!("{}", report.to_json_pretty()?);
    }
    Ok(())
}

async fn list_command(api_url: String, token: Option<String>) -> Result<()> {
    let mut config = PipelineConfig::new(api_url);
    if let Some(token) = token {
        config = config.with_bearer_token(token);
    }
    let gateway = Arc::new(HttpGateway::from_config(&config));
    let orchestrator = AnalysisOrchestrator::new(QueueStore::new(), gateway, config);

    let added = orchestrator.seed_from_listing().await?;
    info!("{added} uploads found");

    for item in orchestrator.store().snapshot() {
        println!(
            "{}  {}  uploaded {}",
            item.id,
            item.name,
            item.upload_time.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn delete_command(id: String, api_url: String, token: Option<String>) -> Result<()> {
    let mut config = PipelineConfig::new(api_url);
    if let Some(token) = token {
        config = config.with_bearer_token(token);
    }
    let gateway = Arc::new(HttpGateway::from_config(&config));
    let orchestrator = AnalysisOrchestrator::new(QueueStore::new(), gateway, config);

    orchestrator.seed_from_listing().await?;
    orchestrator.remove(&id).await?;
    info!("Upload {id} deleted");
    Ok(())
}

async fn demo_command(items: usize, ticks: u32, interval_ms: u64) -> Result<()> {
    let store = QueueStore::new();
    let kinds = [
        AnalysisKind::HighlightGeneration,
        AnalysisKind::PlayerTracking,
        AnalysisKind::TacticalAnalysis,
        AnalysisKind::PerformanceAnalysis,
        AnalysisKind::CrowdAnalysis,
    ];
    let sizes: [u64; 4] = [40 << 20, 120 << 20, 250 << 20, 420 << 20];

    for i in 0..items {
        let item = QueueItem::new(
            format!("round{:02}_q{}.mp4", i + 1, i % 4 + 1),
            kinds[i % kinds.len()],
            sizes[i % sizes.len()],
            i % 4,
            false,
        );
        store.enqueue(item)?;
    }

    let ticker = AmbientTicker::new(
        store.clone(),
        Arc::new(SimulatedDriver::new()),
        Duration::from_millis(interval_ms),
    );

    info!("Simulating {items} queue items over {ticks} passes");
    for pass in 1..=ticks {
        ticker.tick();
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        if pass % 10 == 0 {
            print_queue(&store, &format!("after pass {pass}"));
        }
    }

    // Give anything that got unlucky a second chance.
    let failed: Vec<String> = store
        .snapshot()
        .into_iter()
        .filter(|it| it.status == queue::ItemStatus::Failed)
        .map(|it| it.id)
        .collect();
    if !failed.is_empty() {
        info!("Retrying {} failed items", failed.len());
        for id in failed {
            store.retry(&id)?;
        }
        for _ in 0..ticks / 2 {
            ticker.tick();
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    print_queue(&store, "final");
    Ok(())
}

fn print_queue(store: &QueueStore, label: &str) {
    println!("\nQueue ({label}):");
    println!(
        "  {:<22} {:<20} {:<10} {:>4}  {:<18} err/retry",
        "name", "kind", "status", "%", "stage"
    );
    for item in store.snapshot() {
        println!(
            "  {:<22} {:<20} {:<10} {:>4}  {:<18} {}/{}",
            item.name,
            item.kind.to_string(),
            item.status.to_string(),
            item.progress,
            item.processing_stage,
            item.error_count,
            item.retry_count,
        );
    }
}

fn parse_kind(kind: &str) -> AnalysisKind {
    match kind {
        "highlights" => AnalysisKind::HighlightGeneration,
        "player" => AnalysisKind::PlayerTracking,
        "tactics" => AnalysisKind::TacticalAnalysis,
        "performance" => AnalysisKind::PerformanceAnalysis,
        "crowd" => AnalysisKind::CrowdAnalysis,
        other => {
            warn!("Unknown analysis kind '{}', using highlights", other);
            AnalysisKind::HighlightGeneration
        }
    }
}
