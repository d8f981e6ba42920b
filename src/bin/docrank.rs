#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docrank::config::{OracleConfig, RankConfig};
use docrank::criteria::{default_criteria, validate_criteria};
use docrank::gateway::{JudgeOracle, ProviderGateway};
use docrank::rank::{
    rank_with_trace, summarize, JsonlTraceSink, RankOutcome, RankRequest, TraceSink,
};

#[derive(Parser)]
#[command(name = "docrank", version, about = "Rank documents by pairwise LLM judgment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank documents from a JSON request (LLM calls)
    Rank {
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Also write summary tables
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Write one JSONL line per criterion judgment
        #[arg(long)]
        trace: Option<PathBuf>,
        #[arg(long)]
        max_concurrency: Option<usize>,
    },
    /// Recompute summary tables from a saved outcome
    Summarize {
        #[arg(long)]
        outcome: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write the default criteria catalog
    Criteria {
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docrank=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            request,
            out,
            summary,
            trace,
            max_concurrency,
        } => {
            let req: RankRequest = read_json(&request)?;
            let criteria = req.resolved_criteria();
            validate_criteria(&criteria)?;

            let mut oracle_config = OracleConfig::from_env()?;
            if let Some(model) = &req.model {
                oracle_config = oracle_config.model(model.clone());
            }
            let mut config = RankConfig::from_env()?;
            if let Some(n) = max_concurrency.or(req.max_concurrency) {
                config = config.max_concurrency(n);
            }

            let ids: Vec<String> = req.documents.iter().map(|d| d.id.clone()).collect();
            let documents: HashMap<String, String> = req
                .documents
                .into_iter()
                .map(|d| (d.id, d.text))
                .collect();
            if documents.len() != ids.len() {
                return Err("document ids must be unique".into());
            }

            let oracle: Arc<dyn JudgeOracle> = Arc::new(ProviderGateway::from_config(&oracle_config)?);

            let (trace_sink, trace_worker) = match trace {
                Some(path) => {
                    let (sink, worker) = JsonlTraceSink::new(path)?;
                    (Some(Arc::new(sink) as Arc<dyn TraceSink>), Some(worker))
                }
                None => (None, None),
            };

            let outcome =
                rank_with_trace(&ids, &documents, &criteria, oracle, &config, trace_sink).await;

            if let Some(worker) = trace_worker {
                worker.join()?;
            }

            write_json(&out, &outcome)?;
            if let Some(path) = summary {
                write_json(&path, &summarize(&outcome.ranked, &outcome.log))?;
            }
            println!("{}", outcome.ranked.join("\n"));
        }
        Commands::Summarize { outcome, out } => {
            let outcome: RankOutcome = read_json(&outcome)?;
            write_json(&out, &summarize(&outcome.ranked, &outcome.log))?;
        }
        Commands::Criteria { out } => {
            write_json(&out, &default_criteria())?;
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
