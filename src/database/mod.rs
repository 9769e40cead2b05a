// Database module
// Vector storage behind one trait: a remote Qdrant server or an embedded LanceDB table

pub mod lancedb;
pub mod qdrant;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::config::Config;

pub use self::lancedb::LanceStore;
pub use self::qdrant::QdrantStore;

/// Point identifier, either an unsigned integer or a UUID string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl From<u64> for PointId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::Num(id)
    }
}

impl fmt::Display for PointId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(id) => write!(f, "{}", id),
            Self::Uuid(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub text: String,
}

impl Payload {
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A stored (id, vector, payload) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A query hit. Higher scores are more similar, except for `Distance::Euclid`
/// where the score is the distance itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Payload,
}

/// Similarity metric declared when a collection is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    Euclid,
    Dot,
}

impl fmt::Display for Distance {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cosine => "cosine",
            Self::Euclid => "euclid",
            Self::Dot => "dot",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Qdrant,
    Lance,
}

impl fmt::Display for VectorBackend {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Qdrant => "qdrant",
            Self::Lance => "lance",
        })
    }
}

/// Named collections of points that answer nearest-neighbour queries
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection unless it already exists. Returns `true` when it
    /// was created by this call. An existing collection is not checked against
    /// `dimension` or `distance`.
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<bool>;

    /// Write points, overwriting any with the same id
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()>;

    /// Up to `top_k` points, most similar first
    async fn query(&self, collection: &str, vector: &[f32], top_k: usize)
    -> Result<Vec<ScoredPoint>>;

    /// Exact number of stored points
    async fn count(&self, collection: &str) -> Result<u64>;
}

/// Open the backend selected in the configuration
#[inline]
pub async fn open_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend {
        VectorBackend::Qdrant => Ok(Arc::new(QdrantStore::new(config)?)),
        VectorBackend::Lance => Ok(Arc::new(
            LanceStore::open(config.vector_database_path(), config.vector_store.distance).await?,
        )),
    }
}
