//! Command implementations

use linebatch_common::protocol::{AckResponse, StatusResponse};
use reqwest::Client;
use tracing::info;

use crate::api::CoordinatorClient;
use crate::error::{Result, WorkerError};
use crate::local;
use crate::pipeline::{BatchProcessor, HttpEmbedder, QdrantStore, VectorStore};
use crate::runner::{self, RunSummary};
use crate::search;
use crate::{Commands, WorkerArgs};

/// Execute one worker command
pub async fn execute(command: &Commands, args: &WorkerArgs) -> Result<()> {
    args.validate()?;

    let http = Client::builder().timeout(args.timeout()).build()?;
    let client = CoordinatorClient::with_client(http.clone(), args.coordinator_url.clone());

    match command {
        Commands::Random => {
            let processor = build_processor(http, args).await?;
            let summary = runner::run_random(&client, &processor, &args.runner_config()).await?;
            report(&summary);
            Ok(())
        },
        Commands::Sequential { start } => {
            let processor = build_processor(http, args).await?;
            let summary =
                runner::run_sequential(&client, &processor, &args.runner_config(), *start).await?;
            report(&summary);
            Ok(())
        },
        Commands::Local {
            dataset,
            batch_size,
        } => {
            let processor = build_processor(http, args).await?;
            let summary =
                local::run_local(&processor, dataset, *batch_size, &args.runner_config()).await?;
            report(&summary);
            Ok(())
        },
        Commands::Search { text, limit } => {
            let (embedder, store) = collaborators(http, args).await?;
            let matches = search::find_similar(&embedder, &store, text, *limit).await?;
            print!("{}", search::render(&matches));
            Ok(())
        },
        Commands::Status => status(&client).await,
        Commands::Skip {
            batch_index,
            reason,
        } => skip(&client, *batch_index, reason.clone()).await,
    }
}

/// Embedder and store, with the collection created if needed
async fn collaborators(http: Client, args: &WorkerArgs) -> Result<(HttpEmbedder, QdrantStore)> {
    let store = QdrantStore::new(http.clone(), args.qdrant_url.clone(), args.collection.clone());
    store.ensure_collection(args.vector_size).await?;

    let embedder = HttpEmbedder::new(
        http,
        args.embedder_url.clone(),
        args.passage_prefix.clone(),
        args.embed_batch_size,
    )
    .with_query_prefix(args.query_prefix.clone());

    Ok((embedder, store))
}

async fn build_processor(
    http: Client,
    args: &WorkerArgs,
) -> Result<BatchProcessor<HttpEmbedder, QdrantStore>> {
    let (embedder, store) = collaborators(http, args).await?;
    BatchProcessor::new(embedder, store, args.source_type.clone())
}

async fn status(client: &CoordinatorClient) -> Result<()> {
    match client.status().await? {
        StatusResponse::Ok(snapshot) => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        },
        StatusResponse::Error { message } => Err(WorkerError::Coordinator(message)),
    }
}

async fn skip(client: &CoordinatorClient, batch_index: u64, reason: Option<String>) -> Result<()> {
    match client.skip_batch(batch_index, reason).await? {
        AckResponse::Ok { message } => {
            println!("{}", message);
            Ok(())
        },
        AckResponse::Error { message } => Err(WorkerError::Coordinator(message)),
    }
}

fn report(summary: &RunSummary) {
    info!(
        batches = summary.batches,
        records = summary.records,
        stopped = ?summary.stopped,
        "Worker finished"
    );
}
