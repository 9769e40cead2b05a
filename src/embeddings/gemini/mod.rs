
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::Embedder;
use crate::config::{Config, ConfigError};
use crate::http::{HttpError, JsonHttpClient, normalize_base_url};
use crate::{RagError, Result};

pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;
/// Upper bound on requests per `batchEmbedContents` call
pub const MAX_BATCH_SIZE: u32 = 100;

/// Intended downstream use of an embedding, passed to the API as `taskType`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    SemanticSimilarity,
    RetrievalQuery,
    RetrievalDocument,
    Classification,
    Clustering,
}

#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    base_url: Url,
    model: String,
    task_type: TaskType,
    batch_size: usize,
    dimension: Option<usize>,
    http: JsonHttpClient,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiEmbedder {
    /// Build an embedder from the loaded configuration
    ///
    /// Fails when `GEMINI_API_KEY` was not provided.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .embedding
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingCredential("GEMINI_API_KEY"))?;

        let base_url = normalize_base_url(&config.embedding.base_url)
            .map_err(|_| ConfigError::InvalidUrl(config.embedding.base_url.clone()))?;

        let http = JsonHttpClient::new(Duration::from_secs(config.http.timeout_seconds))
            .with_retry_attempts(config.http.retry_attempts)
            .with_header("x-goog-api-key", api_key);

        Ok(Self {
            base_url,
            model: qualified_model_name(&config.embedding.model),
            task_type: config.embedding.task_type,
            batch_size: config.embedding.batch_size.clamp(1, MAX_BATCH_SIZE) as usize,
            dimension: Some(config.embedding.dimension as usize),
            http,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{}:{}", self.model, method))
            .map_err(|e| RagError::Config(format!("Failed to build embedding URL: {}", e)))
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            content: Content {
                parts: [Part { text }],
            },
            task_type: self.task_type,
        }
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(RagError::Embedding(
                "Embedding response contained an empty vector".to_string(),
            ));
        }

        match self.dimension {
            Some(expected) if expected != vector.len() => Err(RagError::Embedding(format!(
                "Expected {}-dimensional embeddings, got {}",
                expected,
                vector.len()
            ))),
            _ => Ok(()),
        }
    }

    async fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("batchEmbedContents")?;
        let request = BatchEmbedRequest {
            requests: texts.iter().map(|text| self.request(text)).collect(),
        };

        let response: BatchEmbedResponse = self
            .http
            .post(&url, &request)
            .await
            .map_err(embedding_error)?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        response
            .embeddings
            .into_iter()
            .map(|embedding| {
                self.check_vector(&embedding.values)?;
                Ok(embedding.values)
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.endpoint("embedContent")?;
        let response: EmbedResponse = self
            .http
            .post(&url, &self.request(text))
            .await
            .map_err(embedding_error)?;

        self.check_vector(&response.embedding.values)?;

        debug!(
            "Generated embedding with {} dimensions",
            response.embedding.values.len()
        );
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_single_batch(batch).await?);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

/// The API addresses models as `models/<name>`
#[inline]
pub fn qualified_model_name(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn embedding_error(err: HttpError) -> RagError {
    error!("Embedding request failed: {}", err);
    match err {
        HttpError::Transport { .. } | HttpError::Join(_) => RagError::Network(err.to_string()),
        _ => RagError::Embedding(err.to_string()),
    }
}
