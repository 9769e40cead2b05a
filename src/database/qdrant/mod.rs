// Qdrant vector store
// Talks to the Qdrant REST API through the shared JSON client

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use super::{Distance, Point, ScoredPoint, VectorStore};
use crate::config::{Config, ConfigError};
use crate::http::{HttpError, JsonHttpClient, normalize_base_url};
use crate::{RagError, Result};

/// Vector store backed by a Qdrant server
#[derive(Debug, Clone)]
pub struct QdrantStore {
    base_url: Url,
    http: JsonHttpClient,
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Debug, Serialize)]
struct UpsertPoints<'a> {
    points: &'a [Point],
}

#[derive(Debug, Serialize)]
struct QueryPoints<'a> {
    query: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    points: Vec<ScoredPoint>,
}

#[derive(Debug, Serialize)]
struct CountPoints {
    exact: bool,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

impl QdrantStore {
    /// Build a store from the `vector_store` section. The `api-key` header is
    /// only sent when `QDRANT_API_KEY` was provided.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = normalize_base_url(&config.vector_store.url)
            .map_err(|_| ConfigError::InvalidUrl(config.vector_store.url.clone()))?;

        let mut http = JsonHttpClient::new(Duration::from_secs(config.http.timeout_seconds))
            .with_retry_attempts(config.http.retry_attempts);
        if let Some(api_key) = config
            .vector_store
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
        {
            http = http.with_header("api-key", api_key);
        }

        Ok(Self { base_url, http })
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether the server answers at all
    #[inline]
    pub async fn is_reachable(&self) -> bool {
        self.list_collections().await.is_ok()
    }

    #[inline]
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let url = self.url(&["collections"])?;
        let response: QdrantResponse<CollectionsResult> =
            self.http.get(&url).await.map_err(store_error)?;

        Ok(response
            .result
            .collections
            .into_iter()
            .map(|collection| collection.name)
            .collect())
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RagError::Config(format!("Qdrant URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<bool> {
        let existing = self.list_collections().await?;
        if existing.iter().any(|name| name == collection) {
            debug!("Collection '{}' already exists", collection);
            return Ok(false);
        }

        let url = self.url(&["collections", collection])?;
        let body = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: qdrant_distance(distance),
            },
        };
        let _: QdrantResponse<serde_json::Value> =
            self.http.put(&url, &body).await.map_err(store_error)?;

        info!(
            "Created collection '{}' ({} dimensions, {} distance)",
            collection, dimension, distance
        );
        Ok(true)
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            debug!("No points to upsert");
            return Ok(());
        }

        let mut url = self.url(&["collections", collection, "points"])?;
        url.set_query(Some("wait=true"));

        let body = UpsertPoints { points: &points };
        let _: QdrantResponse<serde_json::Value> =
            self.http.put(&url, &body).await.map_err(store_error)?;

        info!("Upserted {} points into '{}'", points.len(), collection);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let url = self.url(&["collections", collection, "points", "query"])?;
        let body = QueryPoints {
            query: vector,
            limit: top_k,
            with_payload: true,
        };

        let response: QdrantResponse<QueryResult> =
            self.http.post(&url, &body).await.map_err(store_error)?;

        debug!(
            "Query on '{}' returned {} points",
            collection,
            response.result.points.len()
        );
        Ok(response.result.points)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let url = self.url(&["collections", collection, "points", "count"])?;
        let response: QdrantResponse<CountResult> = self
            .http
            .post(&url, &CountPoints { exact: true })
            .await
            .map_err(store_error)?;

        Ok(response.result.count)
    }
}

fn qdrant_distance(distance: Distance) -> &'static str {
    match distance {
        Distance::Cosine => "Cosine",
        Distance::Euclid => "Euclid",
        Distance::Dot => "Dot",
    }
}

fn store_error(err: HttpError) -> RagError {
    error!("Qdrant request failed: {}", err);
    match err {
        HttpError::Transport { .. } | HttpError::Join(_) => RagError::Network(err.to_string()),
        _ => RagError::VectorStore(err.to_string()),
    }
}
