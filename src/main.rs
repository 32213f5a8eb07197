use anyhow::Context;
use clap::Parser;
use proposal_cache::config::Config;
use proposal_cache::db::Database;
use proposal_cache::indexer::EmbeddingIndexer;
use proposal_cache::subgraph::{MemorySource, ProposalSource, SubgraphClient};
use proposal_cache::tools::{ToolContext, ToolExecutor, ToolRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Command};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn build_source(config: &Config, from_file: Option<&std::path::Path>) -> anyhow::Result<Option<Arc<dyn ProposalSource>>> {
    if let Some(path) = from_file {
        let source = MemorySource::from_json_file(path)?;
        info!("Loaded {} proposals from {}", source.len(), path.display());
        return Ok(Some(Arc::new(source)));
    }

    match config.subgraph_target() {
        Ok((url, dao)) => {
            let client = SubgraphClient::new(url, dao, config.subgraph_timeout_secs)?;
            Ok(Some(Arc::new(client)))
        }
        Err(_) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(database) = args.database {
        config.database_url = database;
    }

    let db = Database::new(&config)
        .with_context(|| format!("Failed to open database at {}", config.database_url))?;
    db.execute_init().context("Failed to initialize database")?;

    let from_file = match &args.command {
        Command::Sync { from_file, .. } => from_file.clone(),
        _ => None,
    };
    let source = build_source(&config, from_file.as_deref())?;
    let embedder = proposal_cache::embeddings::from_config(&config);
    let ctx = ToolContext::new(&config, db, embedder, source);
    let executor = ToolExecutor::new(Arc::new(ToolRegistry::with_builtins(&ctx)));

    let (tool, params): (&str, Value) = match args.command {
        Command::Sync { full, .. } => ("sync_proposals", json!({ "full": full })),
        Command::Index {
            watch: true,
            interval_secs,
            ..
        } => {
            let indexer = EmbeddingIndexer::new(
                ctx.db.clone(),
                ctx.embedder.clone(),
                ctx.chunk_policy,
                ctx.embedding_timeout_secs,
            );
            info!("Indexing every {}s; Ctrl-C to stop", interval_secs);
            tokio::select! {
                _ = indexer.run(Duration::from_secs(interval_secs.max(1))) => {}
                _ = tokio::signal::ctrl_c() => info!("Stopping indexer"),
            }
            return Ok(());
        }
        Command::Index {
            stale, proposal, ..
        } => (
            "index_embeddings",
            json!({ "stale": stale, "proposal": proposal }),
        ),
        Command::Search {
            query,
            status,
            limit,
            threshold,
        } => (
            "search_proposals",
            json!({ "query": query, "status": status, "limit": limit, "threshold": threshold }),
        ),
        Command::List {
            status,
            limit,
            offset,
            order,
        } => (
            "list_proposals",
            json!({ "status": status, "limit": limit, "offset": offset, "order": order }),
        ),
        Command::Get { id } => ("get_proposal", json!({ "id": id })),
        Command::Votes {
            proposal_number,
            support,
            limit,
            offset,
        } => (
            "get_votes",
            json!({
                "proposal_number": proposal_number,
                "support": support,
                "limit": limit,
                "offset": offset
            }),
        ),
        Command::Summary { proposal_number } => {
            ("get_vote_summary", json!({ "proposal_number": proposal_number }))
        }
        Command::Status {} => ("cache_status", json!({})),
        Command::Tools { name: None, .. } => {
            let definitions = executor.registry().get_definitions();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
            return Ok(());
        }
        Command::Tools {
            name: Some(name),
            params,
        } => {
            let params: Value =
                serde_json::from_str(&params).context("--params must be a JSON object")?;
            let result = executor.execute(&name, params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }
    };

    let result = executor
        .execute(tool, params)
        .await
        .with_context(|| format!("{} failed", tool))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
