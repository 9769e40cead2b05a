// Indexer module
// One-shot ingestion: markdown document -> chunks -> embeddings -> vector store


use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::database::{Distance, Payload, Point, PointId, VectorStore};
use crate::embeddings::{ChunkingConfig, ContentChunk, Embedder, chunk_markdown};
use crate::{RagError, Result};

/// First id handed out by [`IdStrategy::Sequential`]
pub const DEFAULT_ID_OFFSET: u64 = 97;

/// How point ids are assigned to chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// `offset + chunk_index`. Re-ingesting overwrites by position.
    #[default]
    Sequential,
    /// UUIDv5 of the source name and chunk text. Re-ingesting identical
    /// content overwrites instead of duplicating.
    Content,
}

impl IdStrategy {
    #[inline]
    pub fn point_id(self, offset: u64, source: &str, chunk: &ContentChunk) -> PointId {
        match self {
            Self::Sequential => PointId::Num(offset + chunk.chunk_index as u64),
            Self::Content => {
                let name = format!("{}\n{}", source, chunk.content);
                PointId::Uuid(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
            }
        }
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source: String,
    pub chunks: usize,
    pub upserted: usize,
    pub points_in_collection: u64,
    pub created_collection: bool,
}

/// Chunks a document, embeds every chunk and writes the points in a single upsert
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
    distance: Distance,
    dimension: usize,
    chunking: ChunkingConfig,
    id_strategy: IdStrategy,
    id_offset: u64,
}

impl Ingestor {
    #[inline]
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            collection: config.vector_store.collection.clone(),
            distance: config.vector_store.distance,
            dimension: config.embedding.dimension as usize,
            chunking: config.chunking,
            id_strategy: config.ingest.id_strategy,
            id_offset: config.ingest.id_offset,
        }
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ingest a markdown file from disk
    #[inline]
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let created_collection = self.ensure_collection().await?;

        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            ))
        })?;

        self.ingest(&path.display().to_string(), &text, created_collection)
            .await
    }

    /// Ingest an in-memory document. `source` names it in logs and seeds
    /// content-derived ids.
    #[inline]
    pub async fn ingest_text(&self, source: &str, text: &str) -> Result<IngestReport> {
        let created_collection = self.ensure_collection().await?;
        self.ingest(source, text, created_collection).await
    }

    async fn ensure_collection(&self) -> Result<bool> {
        self.store
            .ensure_collection(&self.collection, self.dimension, self.distance)
            .await
    }

    async fn ingest(
        &self,
        source: &str,
        text: &str,
        created_collection: bool,
    ) -> Result<IngestReport> {
        info!("Ingesting {} into '{}'", source, self.collection);

        let chunks = chunk_markdown(text, &self.chunking)?;
        debug!("Split {} into {} chunks", source, chunks.len());

        let points = self.embed_chunks(source, &chunks).await?;
        let upserted = points.len();

        self.store.upsert(&self.collection, points).await?;
        let points_in_collection = self.store.count(&self.collection).await?;

        info!(
            "Ingested {} chunks from {}; '{}' now holds {} points",
            upserted, source, self.collection, points_in_collection
        );

        Ok(IngestReport {
            source: source.to_string(),
            chunks: chunks.len(),
            upserted,
            points_in_collection,
            created_collection,
        })
    }

    async fn embed_chunks(&self, source: &str, chunks: &[ContentChunk]) -> Result<Vec<Point>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| Point {
                id: self.id_strategy.point_id(self.id_offset, source, chunk),
                vector,
                payload: Payload::new(chunk.content.clone()),
            })
            .collect())
    }
}
