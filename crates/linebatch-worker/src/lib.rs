//! linebatch Worker Library
//!
//! Stateless worker that pulls batches of dataset lines from the coordinator, embeds the
//! usable records and upserts them into a vector store.
//!
//! # Overview
//!
//! - **Random mode**: pull random pending batches and report each one complete
//!   (`linebatch-worker random`)
//! - **Sequential mode**: walk the dataset from the coordinator's cursor and advance it
//!   (`linebatch-worker sequential`)
//! - **Operations**: inspect coordinator state (`status`) and skip a stuck sequential
//!   batch (`skip`)
//! - **Standalone**: ingest a local file without a coordinator (`local`) and look up the
//!   records closest to an idea (`search`)

pub mod api;
pub mod commands;
pub mod error;
pub mod local;
pub mod pipeline;
pub mod runner;
pub mod search;

// Re-export commonly used types
pub use error::{Result, WorkerError};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::client::{DEFAULT_COORDINATOR_URL, DEFAULT_TIMEOUT_SECS};
use crate::local::DEFAULT_LOCAL_BATCH_SIZE;
use crate::pipeline::embedder::{
    DEFAULT_EMBEDDER_URL, DEFAULT_EMBED_BATCH_SIZE, DEFAULT_PASSAGE_PREFIX, DEFAULT_QUERY_PREFIX,
};
use crate::pipeline::store::{
    DEFAULT_COLLECTION, DEFAULT_QDRANT_URL, DEFAULT_SEARCH_LIMIT, DEFAULT_VECTOR_SIZE,
};
use crate::runner::{
    RunnerConfig, DEFAULT_FAILURE_BACKOFF_SECS, DEFAULT_NETWORK_BACKOFF_SECS,
    DEFAULT_SERVER_ERROR_BACKOFF_SECS,
};

/// linebatch worker - embed dataset batches handed out by the coordinator
#[derive(Parser, Debug)]
#[command(name = "linebatch-worker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the CLI reference as Markdown and exit
    #[arg(long, hide = true)]
    pub markdown_help: bool,

    #[command(flatten)]
    pub worker: WorkerArgs,
}

/// Available worker commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Process random pending batches until the pool is empty
    Random,

    /// Process batches in order, advancing the coordinator's cursor
    Sequential {
        /// Start at this batch instead of the coordinator's progress
        #[arg(long)]
        start: Option<u64>,
    },

    /// Show the coordinator's line count, pool size and cursor
    Status,

    /// Skip the next sequential batch without processing it
    Skip {
        /// Batch to skip; must be the cursor's next batch
        batch_index: u64,

        /// Why the batch is skipped, recorded in the coordinator's skip ledger
        #[arg(long)]
        reason: Option<String>,
    },

    /// Ingest a dataset file directly, without a coordinator
    Local {
        /// Newline-delimited JSON file
        dataset: PathBuf,

        /// Lines per embed-and-upsert round
        #[arg(long, default_value_t = DEFAULT_LOCAL_BATCH_SIZE)]
        batch_size: usize,
    },

    /// List the stored records closest to an idea
    Search {
        /// Free-text description of the idea
        text: String,

        /// Number of matches to show
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
}

/// Connection and processing settings shared by all commands
#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Coordinator base URL
    #[arg(long, env = "LINEBATCH_COORDINATOR_URL", default_value = DEFAULT_COORDINATOR_URL, global = true)]
    pub coordinator_url: String,

    /// Embedding endpoint accepting {"inputs": [...]}
    #[arg(long, env = "LINEBATCH_EMBEDDER_URL", default_value = DEFAULT_EMBEDDER_URL, global = true)]
    pub embedder_url: String,

    /// Qdrant REST base URL
    #[arg(long, env = "LINEBATCH_QDRANT_URL", default_value = DEFAULT_QDRANT_URL, global = true)]
    pub qdrant_url: String,

    /// Vector collection name
    #[arg(long, env = "LINEBATCH_COLLECTION", default_value = DEFAULT_COLLECTION, global = true)]
    pub collection: String,

    /// Embedding dimension, used when the collection has to be created
    #[arg(long, env = "LINEBATCH_VECTOR_SIZE", default_value_t = DEFAULT_VECTOR_SIZE, global = true)]
    pub vector_size: usize,

    /// Payload `type` stored with every record
    #[arg(long, env = "LINEBATCH_SOURCE_TYPE", default_value = linebatch_common::record::DEFAULT_SOURCE_TYPE, global = true)]
    pub source_type: String,

    /// Prefix prepended to every text before embedding
    #[arg(long, env = "LINEBATCH_PASSAGE_PREFIX", default_value = DEFAULT_PASSAGE_PREFIX, global = true)]
    pub passage_prefix: String,

    /// Prefix prepended to search queries before embedding
    #[arg(long, env = "LINEBATCH_QUERY_PREFIX", default_value = DEFAULT_QUERY_PREFIX, global = true)]
    pub query_prefix: String,

    /// Texts per embedding request
    #[arg(long, env = "LINEBATCH_EMBED_BATCH_SIZE", default_value_t = DEFAULT_EMBED_BATCH_SIZE, global = true)]
    pub embed_batch_size: usize,

    /// HTTP timeout for every request, in seconds
    #[arg(long, env = "LINEBATCH_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout_secs: u64,

    /// Wait after a network failure, in seconds
    #[arg(long, env = "LINEBATCH_NETWORK_BACKOFF_SECS", default_value_t = DEFAULT_NETWORK_BACKOFF_SECS, global = true)]
    pub network_backoff_secs: u64,

    /// Wait after a coordinator error status, in seconds
    #[arg(long, env = "LINEBATCH_SERVER_ERROR_BACKOFF_SECS", default_value_t = DEFAULT_SERVER_ERROR_BACKOFF_SECS, global = true)]
    pub server_error_backoff_secs: u64,

    /// Wait after a batch failed to process in random mode, in seconds
    #[arg(long, env = "LINEBATCH_FAILURE_BACKOFF_SECS", default_value_t = DEFAULT_FAILURE_BACKOFF_SECS, global = true)]
    pub failure_backoff_secs: u64,

    /// Stop after this many batches
    #[arg(long, env = "LINEBATCH_MAX_BATCHES", global = true)]
    pub max_batches: Option<u64>,
}

impl WorkerArgs {
    pub fn validate(&self) -> Result<()> {
        if self.embed_batch_size == 0 {
            return Err(WorkerError::config("--embed-batch-size must be greater than 0"));
        }
        if self.vector_size == 0 {
            return Err(WorkerError::config("--vector-size must be greater than 0"));
        }
        if self.timeout_secs == 0 {
            return Err(WorkerError::config("--timeout-secs must be greater than 0"));
        }
        for (flag, url) in [
            ("--coordinator-url", &self.coordinator_url),
            ("--embedder-url", &self.embedder_url),
            ("--qdrant-url", &self.qdrant_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WorkerError::config(format!("{} must be an http(s) URL, got '{}'", flag, url)));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            network_backoff: Duration::from_secs(self.network_backoff_secs),
            server_error_backoff: Duration::from_secs(self.server_error_backoff_secs),
            failure_backoff: Duration::from_secs(self.failure_backoff_secs),
            max_batches: self.max_batches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["linebatch-worker", "random"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Random));
        assert_eq!(cli.worker.collection, "idea-db");
        assert_eq!(cli.worker.vector_size, 768);
        assert_eq!(cli.worker.passage_prefix, "passage: ");
        assert_eq!(cli.worker.embed_batch_size, 32);

        let runner = cli.worker.runner_config();
        assert_eq!(runner.network_backoff, Duration::from_secs(60));
        assert_eq!(runner.server_error_backoff, Duration::from_secs(5));
        assert_eq!(runner.max_batches, None);
        assert!(cli.worker.validate().is_ok());
    }

    #[test]
    fn test_sequential_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "linebatch-worker",
            "sequential",
            "--start",
            "12",
            "--coordinator-url",
            "http://10.0.0.2:8000",
            "--max-batches",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.command, Some(Commands::Sequential { start: Some(12) }));
        assert_eq!(cli.worker.coordinator_url, "http://10.0.0.2:8000");
        assert_eq!(cli.worker.runner_config().max_batches, Some(3));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cli = Cli::try_parse_from(["linebatch-worker", "random"]).unwrap();
        cli.worker.embed_batch_size = 0;
        assert!(matches!(cli.worker.validate(), Err(WorkerError::Config(_))));

        let mut cli = Cli::try_parse_from(["linebatch-worker", "random"]).unwrap();
        cli.worker.qdrant_url = "localhost:6333".to_string();
        assert!(matches!(cli.worker.validate(), Err(WorkerError::Config(_))));
    }

    #[test]
    fn test_standalone_commands() {
        let cli = Cli::try_parse_from(["linebatch-worker", "search", "cheap sodium cathodes"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Search {
                text: "cheap sodium cathodes".to_string(),
                limit: 3
            })
        );
        assert_eq!(cli.worker.query_prefix, "query: ");

        let cli = Cli::try_parse_from([
            "linebatch-worker",
            "local",
            "/data/arxiv.json",
            "--batch-size",
            "64",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Local {
                dataset: PathBuf::from("/data/arxiv.json"),
                batch_size: 64
            })
        );
    }
}
