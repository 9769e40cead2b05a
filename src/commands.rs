use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::agent::{Agent, Runner};
use crate::chat::{ChatSession, TerminalFrontEnd, prompt_line};
use crate::config::Config;
use crate::database::{QdrantStore, VectorBackend, VectorStore, open_vector_store};
use crate::embeddings::{Embedder, GeminiEmbedder};
use crate::indexer::{IngestReport, Ingestor};
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::retrieval::{Retriever, SearchKnowledgeBase};

/// Chunk, embed and store the configured document (or `document` when given)
#[inline]
pub async fn ingest(config: &Config, document: Option<PathBuf>) -> Result<IngestReport> {
    let path = document.unwrap_or_else(|| config.ingest.document.clone());
    info!("Starting ingestion of {}", path.display());

    let embedder: Arc<dyn Embedder> =
        Arc::new(GeminiEmbedder::new(config).context("Failed to create embedding client")?);
    let store = open_vector_store(config)
        .await
        .context("Failed to open vector store")?;
    let ingestor = Ingestor::new(config, embedder, store);

    let spinner = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    spinner.set_message(format!(
        "Ingesting {} into '{}'",
        path.display(),
        ingestor.collection()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = ingestor.ingest_file(&path).await;
    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!("Ingestion of {} failed: {}", path.display(), e);
            return Err(e).with_context(|| format!("Failed to ingest {}", path.display()));
        }
    };

    println!("{}", style("✓ Ingestion complete").green());
    println!("  Source: {}", report.source);
    println!("  Chunks: {}", report.chunks);
    println!("  Upserted: {}", report.upserted);
    println!(
        "  Collection '{}' now holds {} points{}",
        ingestor.collection(),
        report.points_in_collection,
        if report.created_collection {
            " (created)"
        } else {
            ""
        }
    );

    Ok(report)
}

/// Wire the chat model, the retrieval tool and the agent from configuration
#[inline]
pub async fn build_agent(config: &Config) -> Result<(Agent, Runner)> {
    let (_, model_name, _) = config.llm.require()?;
    let model: Arc<dyn ChatModel> =
        Arc::new(OpenAiChatModel::new(config).context("Failed to create chat model client")?);

    let embedder: Arc<dyn Embedder> =
        Arc::new(GeminiEmbedder::new(config).context("Failed to create embedding client")?);
    let store = open_vector_store(config)
        .await
        .context("Failed to open vector store")?;

    let search = SearchKnowledgeBase::new(Retriever::from_config(config, embedder, store))
        .with_default_top_k(config.agent.top_k);
    let agent = Agent::from_config(&config.agent, model_name).with_tool(Arc::new(search));
    let runner = Runner::new(model).with_max_turns(config.agent.max_turns);

    Ok((agent, runner))
}

/// Answer one query and print the result
#[inline]
pub async fn ask(config: &Config, query: Option<String>) -> Result<String> {
    let (agent, runner) = build_agent(config).await?;

    let query = match query {
        Some(query) => query,
        None => tokio::task::spawn_blocking(|| prompt_line("Enter your query", false))
            .await?
            .context("Failed to read query")?
            .filter(|query| !query.trim().is_empty())
            .context("No query given")?,
    };

    let result = runner
        .run(&agent, query.as_str())
        .await
        .context("Agent run failed")?;
    info!("Answered in {} turns", result.turns);

    println!("Response: {}", result.final_output);
    Ok(result.final_output)
}

/// Interactive terminal chat
#[inline]
pub async fn chat(config: &Config) -> Result<()> {
    let (agent, runner) = build_agent(config).await?;
    let session = ChatSession::new(agent, runner, config.agent.greeting.clone());
    TerminalFrontEnd::new(session).run().await
}

/// Configuration summary, vector store reachability and collection size
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 RAG Assistant Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("⚙️  Configuration:");
    println!(
        "   Config file: {}",
        config.config_file_path().display()
    );
    println!(
        "   Chat model: {} at {}",
        config.llm.model.as_deref().unwrap_or("(not set)"),
        config.llm.base_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "   Embedding model: {} ({} dimensions)",
        config.embedding.model, config.embedding.dimension
    );
    println!(
        "   Chunking: {} chars, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );
    println!("   Document: {}", config.ingest.document.display());
    println!();

    println!("🔍 Vector Store Status:");
    let store: Option<Arc<dyn VectorStore>> = match config.vector_store.backend {
        VectorBackend::Qdrant => match QdrantStore::new(config) {
            Ok(qdrant) => {
                if qdrant.is_reachable().await {
                    println!("   ✅ Qdrant: Connected ({})", qdrant.base_url());
                    Some(Arc::new(qdrant) as Arc<dyn VectorStore>)
                } else {
                    println!("   ❌ Qdrant: Unreachable at {}", qdrant.base_url());
                    None
                }
            }
            Err(e) => {
                println!("   ❌ Qdrant: Invalid configuration - {}", e);
                None
            }
        },
        VectorBackend::Lance => match open_vector_store(config).await {
            Ok(store) => {
                println!(
                    "   ✅ LanceDB: Opened ({})",
                    config.vector_database_path().display()
                );
                Some(store)
            }
            Err(e) => {
                println!("   ❌ LanceDB: Failed to open - {}", e);
                None
            }
        },
    };

    if let Some(store) = store {
        match store.count(&config.vector_store.collection).await {
            Ok(count) => println!(
                "   📄 Collection '{}': {} points",
                config.vector_store.collection, count
            ),
            Err(e) => {
                warn!("Could not count points: {}", e);
                println!(
                    "   ⚠️  Collection '{}': not available - {}",
                    config.vector_store.collection, e
                );
            }
        }
    }

    Ok(())
}
