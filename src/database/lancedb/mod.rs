// LanceDB vector database module
// Embedded vector storage: one table per collection, kept on local disk


use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use super::{Distance, Payload, Point, PointId, ScoredPoint, VectorStore};
use crate::{RagError, Result};

/// Vector store using an embedded LanceDB database
pub struct LanceStore {
    connection: Connection,
    default_distance: Distance,
    distances: RwLock<HashMap<String, Distance>>,
}

impl LanceStore {
    /// Open (or create) the database directory at `path`
    ///
    /// `default_distance` is used to query collections this handle did not
    /// create itself.
    #[inline]
    pub async fn open(path: impl AsRef<Path>, default_distance: Distance) -> Result<Self> {
        let db_path = path.as_ref();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::VectorStore(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().into_owned();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            default_distance,
            distances: RwLock::new(HashMap::new()),
        })
    }

    /// Create schema with the specified vector dimension
    fn schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
        ]))
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to list tables: {}", e)))
    }

    async fn open_table(&self, collection: &str) -> Result<Table> {
        self.connection
            .open_table(collection)
            .execute()
            .await
            .map_err(|e| {
                RagError::VectorStore(format!("Failed to open collection '{}': {}", collection, e))
            })
    }

    /// Detect vector dimension from the table schema
    async fn table_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => Some(*size as usize),
                _ => None,
            })
            .ok_or_else(|| {
                RagError::VectorStore(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    fn distance_for(&self, collection: &str) -> Distance {
        self.distances
            .read()
            .ok()
            .and_then(|distances| distances.get(collection).copied())
            .unwrap_or(self.default_distance)
    }

    /// Create a RecordBatch from points
    fn record_batch(points: &[Point], dimension: usize) -> Result<RecordBatch> {
        let ids: Vec<String> = points.iter().map(|point| point.id.to_string()).collect();
        let texts: Vec<&str> = points
            .iter()
            .map(|point| point.payload.text.as_str())
            .collect();

        let mut flat_values = Vec::with_capacity(points.len() * dimension);
        for point in points {
            flat_values.extend_from_slice(&point.vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, dimension as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    RagError::VectorStore(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
        ];

        RecordBatch::try_new(Self::schema(dimension), arrays)
            .map_err(|e| RagError::VectorStore(format!("Failed to create record batch: {}", e)))
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch, distance: Distance) -> Result<Vec<ScoredPoint>> {
        let ids = string_column(batch, "id")?;
        let texts = string_column(batch, "text")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let raw = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            results.push(ScoredPoint {
                id: parse_point_id(ids.value(row)),
                score: similarity(distance, raw),
                payload: Payload::new(texts.value(row)),
            });
        }

        Ok(results)
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<bool> {
        if let Ok(mut distances) = self.distances.write() {
            distances.insert(collection.to_string(), distance);
        }

        if self.table_names().await?.iter().any(|name| name == collection) {
            debug!("Collection '{}' already exists", collection);
            return Ok(false);
        }

        self.connection
            .create_empty_table(collection, Self::schema(dimension))
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to create table: {}", e)))?;

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

        let table = self.open_table(collection).await?;
        let dimension = Self::table_dimension(&table).await?;

        if let Some(point) = points.iter().find(|point| point.vector.len() != dimension) {
            return Err(RagError::VectorStore(format!(
                "Point {} has {} dimensions, collection '{}' expects {}",
                point.id,
                point.vector.len(),
                collection,
                dimension
            )));
        }

        let record_batch = Self::record_batch(&points, dimension)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge_insert = table.merge_insert(&["id"]);
        merge_insert
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge_insert
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to upsert points: {}", e)))?;

        info!("Upserted {} points into '{}'", points.len(), collection);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let distance = self.distance_for(collection);
        let table = self.open_table(collection).await?;

        let mut results = table
            .vector_search(vector)
            .map_err(|e| RagError::VectorStore(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(distance_type(distance))
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to execute search: {}", e)))?;

        let mut points = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to read result stream: {}", e)))?
        {
            points.extend(Self::parse_search_batch(&batch, distance)?);
        }

        debug!("Query on '{}' returned {} points", collection, points.len());
        Ok(points)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let table = self.open_table(collection).await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::VectorStore(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::VectorStore(format!("Invalid {} column type", name)))
}

fn distance_type(distance: Distance) -> DistanceType {
    match distance {
        Distance::Cosine => DistanceType::Cosine,
        Distance::Euclid => DistanceType::L2,
        Distance::Dot => DistanceType::Dot,
    }
}

/// Turn a raw LanceDB distance into the score Qdrant would report
///
/// Cosine and dot give a similarity (higher is closer). Euclid gives the
/// distance itself (lower is closer), since LanceDB reports it squared.
fn similarity(distance: Distance, raw: f32) -> f32 {
    match distance {
        Distance::Cosine | Distance::Dot => 1.0 - raw,
        Distance::Euclid => raw.max(0.0).sqrt(),
    }
}

fn parse_point_id(raw: &str) -> PointId {
    raw.parse::<u64>()
        .map_or_else(|_| PointId::Uuid(raw.to_string()), PointId::Num)
}
