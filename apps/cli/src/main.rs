//! Vantage command-line interface.
//!
//! The process composition root: loads configuration, builds the shared
//! router/ledger/cache once via `AgentService`, and exposes query, status,
//! cost, and background-task commands on top of it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vantage_orchestrator::api::QueryRequest;
use vantage_orchestrator::citations::EvidenceSnippet;
use vantage_orchestrator::routing::OrchestratorConfig;
use vantage_orchestrator::{AgentService, StaticRetriever};

#[derive(Parser)]
#[command(name = "vantage", about = "Competitive-intelligence AI orchestration", version)]
struct Cli {
    /// Path to the orchestrator configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a JSON file of evidence snippets served by the built-in
    /// retriever (the production deployment wires a real retrieval backend).
    #[arg(long, global = true)]
    evidence: Option<PathBuf>,

    /// User identifier recorded on ledger entries.
    #[arg(long, global = true, default_value = "cli")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a query and run the selected agent.
    Query {
        /// The natural-language query.
        text: String,
    },
    /// Run a specific agent, bypassing classification.
    Agent {
        /// Agent name (dashboard, discovery, battlecard, news, comparison, research, chat).
        name: String,
        /// The natural-language query.
        text: String,
    },
    /// Show per-agent health and per-provider availability.
    Status,
    /// Show daily cost aggregates.
    Cost {
        /// UTC date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Submit a query as a background task and poll until it finishes.
    Task {
        /// The natural-language query.
        text: String,
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 250)]
        poll_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => OrchestratorConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => OrchestratorConfig::default(),
    };

    let snippets: Vec<EvidenceSnippet> = match &cli.evidence {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading evidence from {}", path.display()))?;
            serde_json::from_str(&content).context("parsing evidence snippets")?
        }
        None => Vec::new(),
    };

    let service = AgentService::from_config(&config, Arc::new(StaticRetriever::new(snippets)))
        .await
        .context("building the agent service")?;

    match cli.command {
        Command::Query { text } => {
            let request = QueryRequest { query: text, user_id: cli.user, session_id: None };
            match service.query(request).await {
                Ok(response) => print_json(&response)?,
                Err(envelope) => print_error(&envelope),
            }
        }
        Command::Agent { name, text } => {
            let request = QueryRequest { query: text, user_id: cli.user, session_id: None };
            match service.query_agent(&name, request).await {
                Ok(response) => print_json(&response)?,
                Err(envelope) => print_error(&envelope),
            }
        }
        Command::Status => {
            print_json(&service.status().await)?;
        }
        Command::Cost { date } => {
            print_json(&service.cost(date))?;
        }
        Command::Task { text, poll_ms } => {
            let request = QueryRequest { query: text, user_id: cli.user, session_id: None };
            let submitted = service.submit_task(request).await;
            eprintln!("task {} submitted", submitted.task_id);

            loop {
                tokio::time::sleep(Duration::from_millis(poll_ms)).await;
                let task = service
                    .task(&submitted.task_id)
                    .await
                    .map_err(|e| anyhow::anyhow!("{}: {}", e.kind, e.message))?;
                if task.status.is_terminal() {
                    print_json(&task)?;
                    break;
                }
                eprintln!("task {} is {}", task.id, task.status);
            }
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_error(envelope: &vantage_orchestrator::ErrorEnvelope) -> ! {
    eprintln!("error ({}): {}", envelope.kind, envelope.message);
    std::process::exit(1);
}
