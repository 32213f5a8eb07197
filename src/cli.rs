use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Local cache and semantic search for DAO proposals", long_about = None)]
pub struct Args {
    /// Override DATABASE_URL
    #[clap(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull proposals and votes from the subgraph
    Sync {
        /// Re-read the whole history instead of the recent window
        #[clap(long, default_value = "false")]
        full: bool,

        /// Import a saved `proposals` query result instead of calling the subgraph
        #[clap(long)]
        from_file: Option<PathBuf>,
    },
    /// Embed proposals that have no vectors yet
    Index {
        /// Also refresh proposals whose text changed since they were embedded
        #[clap(long, default_value = "false")]
        stale: bool,

        /// Re-embed a single proposal (id or number)
        #[clap(long)]
        proposal: Option<String>,

        /// Keep running, indexing new proposals periodically
        #[clap(long, default_value = "false")]
        watch: bool,

        /// Seconds between passes with --watch
        #[clap(long, default_value = "300")]
        interval_secs: u64,
    },
    /// Semantic search over proposal text
    Search {
        query: String,

        #[clap(short, long)]
        status: Option<String>,

        #[clap(short, long)]
        limit: Option<usize>,

        /// Minimum similarity score
        #[clap(short, long)]
        threshold: Option<f32>,
    },
    /// List cached proposals
    List {
        #[clap(short, long)]
        status: Option<String>,

        #[clap(short, long, default_value = "20")]
        limit: usize,

        #[clap(short, long, default_value = "0")]
        offset: usize,

        /// asc or desc
        #[clap(long, default_value = "desc")]
        order: String,
    },
    /// Show one proposal by id or number
    Get { id: String },
    /// List votes on a proposal
    Votes {
        proposal_number: String,

        /// FOR, AGAINST or ABSTAIN
        #[clap(short, long)]
        support: Option<String>,

        #[clap(short, long, default_value = "20")]
        limit: usize,

        #[clap(short, long, default_value = "0")]
        offset: usize,
    },
    /// Distinct voter counts for a proposal
    Summary { proposal_number: String },
    /// Last sync time and embedding coverage
    Status {},
    /// Print tool definitions, or call a tool with JSON parameters
    Tools {
        name: Option<String>,

        /// JSON object of parameters
        #[clap(long, default_value = "{}")]
        params: String,
    },
}
