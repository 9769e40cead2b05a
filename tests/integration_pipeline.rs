#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! Ingestion and retrieval end to end against an embedded LanceDB store
use async_trait::async_trait;
use rag_assistant::Result;
use rag_assistant::agent::Tool;
use rag_assistant::config::Config;
use rag_assistant::database::{Distance, LanceStore, PointId, VectorStore};
use rag_assistant::embeddings::{ChunkingConfig, Embedder, chunk_markdown};
use rag_assistant::indexer::Ingestor;
use rag_assistant::retrieval::{Retriever, SearchKnowledgeBase};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const KEYWORDS: [&str; 4] = ["agent", "sidecar", "actor", "cloud"];

/// Keyword-count embedding, so related texts land close to each other
struct KeywordEmbedder;

impl KeywordEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .map(|keyword| lower.matches(keyword).count() as f32 + 0.1)
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }

    fn dimension(&self) -> Option<usize> {
        Some(KEYWORDS.len())
    }
}

fn guide() -> &'static str {
    "# Agents\n\nEvery agent agent agent answers questions and calls tools.\n\n\
     # Sidecars\n\nA sidecar runs next to the service; the sidecar sidecar handles state.\n\n\
     # Actors\n\nEach actor actor actor owns its state and processes one message at a time.\n"
}

struct Fixture {
    config: Config,
    store: Arc<LanceStore>,
    _temp_dir: TempDir,
}

async fn fixture() -> Fixture {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::default();
    config.embedding.dimension = KEYWORDS.len() as u32;
    config.chunking = ChunkingConfig::new(120, 20);
    config.vector_store.collection = "daca-guide".to_string();

    let store = Arc::new(
        LanceStore::open(temp_dir.path().join("vectors"), Distance::Cosine)
            .await
            .expect("should open store"),
    );

    Fixture {
        config,
        store,
        _temp_dir: temp_dir,
    }
}

#[tokio::test]
async fn three_chunk_document_end_to_end() {
    let fixture = fixture().await;
    let chunks = chunk_markdown(guide(), &fixture.config.chunking).expect("should chunk");
    assert_eq!(chunks.len(), 3);

    let ingestor = Ingestor::new(
        &fixture.config,
        Arc::new(KeywordEmbedder),
        fixture.store.clone(),
    );
    let report = ingestor
        .ingest_text("comprehensive_guide_daca.md", guide())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.points_in_collection, 3);
    assert_eq!(
        fixture
            .store
            .count("daca-guide")
            .await
            .expect("should count"),
        3
    );

    let retriever = Retriever::from_config(
        &fixture.config,
        Arc::new(KeywordEmbedder),
        fixture.store.clone(),
    );
    let hits = retriever
        .search(&chunks[1].content, 3)
        .await
        .expect("search should succeed");

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, PointId::Num(98));
    assert_eq!(hits[0].payload.text, chunks[1].content);

    let mut ids: Vec<PointId> = hits.into_iter().map(|hit| hit.id).collect();
    ids.sort_by_key(|id| id.to_string());
    assert_eq!(
        ids,
        vec![PointId::Num(97), PointId::Num(98), PointId::Num(99)]
    );
}

#[tokio::test]
async fn reingesting_keeps_three_points() {
    let fixture = fixture().await;
    let ingestor = Ingestor::new(
        &fixture.config,
        Arc::new(KeywordEmbedder),
        fixture.store.clone(),
    );

    let first = ingestor
        .ingest_text("guide.md", guide())
        .await
        .expect("first run");
    let second = ingestor
        .ingest_text("guide.md", guide())
        .await
        .expect("second run");

    assert!(first.created_collection);
    assert!(!second.created_collection);
    assert_eq!(second.points_in_collection, 3);
}

#[tokio::test]
async fn search_tool_over_ingested_guide() {
    let fixture = fixture().await;
    Ingestor::new(
        &fixture.config,
        Arc::new(KeywordEmbedder),
        fixture.store.clone(),
    )
    .ingest_text("guide.md", guide())
    .await
    .expect("ingestion should succeed");

    let tool = SearchKnowledgeBase::new(Retriever::from_config(
        &fixture.config,
        Arc::new(KeywordEmbedder),
        fixture.store.clone(),
    ));
    let output = tool
        .call(json!({ "query": "How does an actor handle state?", "top_k": 1 }))
        .await
        .expect("tool call should succeed");

    let points = output["points"].as_array().expect("points array");
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["id"], 99);
    assert!(
        points[0]["payload"]["text"]
            .as_str()
            .expect("text payload")
            .starts_with("# Actors")
    );
}
