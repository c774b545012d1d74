use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kbsearch_core::config::Config;
use kbsearch_core::types::SearchRequest;
use kbsearch_hybrid::{handle_line, handle_request, HybridSearchEngine};

/// Hybrid semantic and keyword search over a knowledge-base index.
#[derive(Parser)]
#[command(name = "kbsearch", version, about)]
struct Cli {
    /// Directory holding config.toml; relative paths resolve against it
    #[arg(long, env = "KBSEARCH_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one query and print the reply as JSON
    Query {
        text: String,
        /// Number of results (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,
        /// Equality filter, e.g. `--filter product=Mail --filter internal=false`
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },
    /// Serve JSON-lines `{"type":"query",...}` messages on stdin
    Stdio,
}

fn parse_filters(raw: &[String]) -> anyhow::Result<Option<BTreeMap<String, serde_json::Value>>> {
    if raw.is_empty() { return Ok(None); }
    let mut map = BTreeMap::new();
    for item in raw {
        let (key, value) = item.split_once('=').ok_or_else(|| anyhow!("filter '{}' is not KEY=VALUE", item))?;
        let value = match value.trim() {
            "true" => serde_json::Value::Bool(true),
            "false" => serde_json::Value::Bool(false),
            other => serde_json::Value::String(other.to_string()),
        };
        map.insert(key.trim().to_string(), value);
    }
    Ok(Some(map))
}

fn serve_stdio<L, V>(engine: &HybridSearchEngine<L, V>) -> anyhow::Result<()>
where
    L: kbsearch_core::traits::LexicalIndex,
    V: kbsearch_core::traits::VectorIndex,
{
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let Some(reply) = handle_line(engine, &line?) else { continue };
        serde_json::to_writer(&mut stdout, &reply)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }
    info!("stdin closed, exiting");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config_dir)?;
    let settings = config.settings()?;
    let engine = HybridSearchEngine::open(&cli.config_dir, &settings)
        .inspect_err(|e| error!(error = %e, "startup failed"))
        .context("search engine failed to start")?;

    match cli.command {
        Command::Query { text, k, filters } => {
            let request = SearchRequest { text, k, filters: parse_filters(&filters)? };
            let reply = handle_request(&engine, &request);
            println!("{}", serde_json::to_string_pretty(&reply)?);
            if !reply.success { std::process::exit(2); }
        }
        Command::Stdio => serve_stdio(&engine)?,
    }
    Ok(())
}
