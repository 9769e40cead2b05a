// Retrieval module
// Query embedding + nearest-neighbour lookup, exposed to the agent as a tool


use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::Tool;
use crate::config::Config;
use crate::config::settings::DEFAULT_TOP_K;
use crate::database::{ScoredPoint, VectorStore};
use crate::embeddings::Embedder;
use crate::llm::ToolDefinition;
use crate::{RagError, Result};

/// Name the retrieval tool is advertised under
pub const SEARCH_TOOL_NAME: &str = "search_knowledge_base";

/// Embeds a query and returns the stored points closest to it
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    #[inline]
    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self::new(embedder, store, config.vector_store.collection.clone())
    }

    /// Top-`top_k` points for `query`, in the store's ranking order
    #[inline]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredPoint>> {
        let vector = self.embedder.embed(query).await?;
        let points = self.store.query(&self.collection, &vector, top_k).await?;

        info!(
            "Retrieved {} points from '{}' for query ({} chars)",
            points.len(),
            self.collection,
            query.len()
        );
        Ok(points)
    }
}

/// The `search_knowledge_base` tool
pub struct SearchKnowledgeBase {
    retriever: Retriever,
    default_top_k: usize,
}

impl SearchKnowledgeBase {
    #[inline]
    pub fn new(retriever: Retriever) -> Self {
        Self {
            retriever,
            default_top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }
}

#[async_trait]
impl Tool for SearchKnowledgeBase {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search the knowledge base for passages relevant to a query.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Number of results to return",
                        "default": self.default_top_k
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| RagError::Agent("Missing required argument 'query'".to_string()))?;

        let top_k = match arguments.get("top_k").and_then(Value::as_i64) {
            Some(requested) => usize::try_from(requested.max(1)).unwrap_or(self.default_top_k),
            None => self.default_top_k,
        };

        debug!("Searching knowledge base: top_k={}", top_k);
        let points = self.retriever.search(query, top_k).await?;

        Ok(json!({ "points": points }))
    }
}
