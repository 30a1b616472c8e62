//! Cord - coordinate a tree of LLM-agent subprocesses toward one goal

mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cord_engine::{Driver, EngineConfig};
use cord_store::Store;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cord", about = "Cord - agent-tree coordination engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a goal to termination and print the final root result
    Run {
        /// Goal text, or a path to a file whose contents become the goal
        goal: String,
        /// Per-process budget cap in USD, passed through to agents
        #[arg(long)]
        budget: Option<f64>,
        /// Model name passed through to agents
        #[arg(long)]
        model: Option<String>,
        /// Agent CLI binary launched per node
        #[arg(long, default_value = "claude")]
        runtime: String,
        /// Global cap on concurrent agent processes
        #[arg(long, default_value = "4")]
        max_agents: usize,
        /// Store file (default: a fresh store under the temp dir)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Scheduler inter-tick sleep in milliseconds
        #[arg(long, default_value = "1000")]
        tick_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cord=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            goal,
            budget,
            model,
            runtime,
            max_agents,
            store,
            tick_ms,
        } => run(goal, budget, model, runtime, max_agents, store, tick_ms).await,
    }
}

async fn run(
    goal: String,
    budget: Option<f64>,
    model: Option<String>,
    runtime: String,
    max_agents: usize,
    store_path: Option<PathBuf>,
    tick_ms: u64,
) -> anyhow::Result<()> {
    // A readable regular file becomes the goal text; anything else is the
    // goal itself.
    let path = Path::new(&goal);
    let text = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        goal.clone()
    };
    let label = goal_label(&text);

    let run_dir = match &store_path {
        Some(p) => p
            .parent()
            .map(|d| d.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
        None => std::env::temp_dir().join(format!("cord-{}", std::process::id())),
    };
    std::fs::create_dir_all(&run_dir)?;
    let store_file = store_path.unwrap_or_else(|| run_dir.join("cord.db"));

    let store = Arc::new(Store::open(&store_file)?);
    let config = EngineConfig {
        runtime,
        model,
        budget,
        max_agents,
        tick: Duration::from_millis(tick_ms),
        run_dir,
        max_runtime: None,
    };

    let driver = Driver::new(store.clone(), config);
    let outcome = driver.run(&label, &text).await?;

    render::print_tree(&store.snapshot()?);
    if let Some(result) = &outcome.result {
        println!("{}", result);
    }

    if !outcome.succeeded() {
        // The store survives for inspection of the failing branch.
        eprintln!(
            "root {} ended {}; store: {}",
            outcome.root,
            outcome.status,
            store_file.display()
        );
        std::process::exit(1);
    }
    Ok(())
}

/// Short human-readable label: the first line, bounded.
fn goal_label(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > 80 {
        let mut label: String = line.chars().take(77).collect();
        label.push_str("...");
        label
    } else {
        line.to_string()
    }
}
