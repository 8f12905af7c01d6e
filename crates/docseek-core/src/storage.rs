//! Qdrant Edge storage for document chunk vectors

use std::collections::HashMap;
use std::path::Path;

use edge::EdgeShard;
use segment::data_types::vectors::{NamedQuery, VectorInternal, VectorStructInternal};
use segment::types::{
    Distance, ExtendedPointId, Payload, PayloadStorageType, SegmentConfig, VectorDataConfig,
    VectorStorageType, WithPayloadInterface, WithVector,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shard::count::CountRequestInternal;
use shard::operations::CollectionUpdateOperations;
use shard::operations::point_ops::{
    PointInsertOperationsInternal, PointOperations, PointStructPersisted,
};
use shard::query::query_enum::QueryEnum;
use shard::query::{ScoringQuery, ShardQueryRequest};

use crate::{DsError, Result};

/// Named vector slot for chunk embeddings
const VECTOR_NAME: &str = "chunks";

/// Payload of a document chunk point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocChunkPayload {
    /// Absolute path of the document
    pub path: String,
    /// Root the document was indexed under
    pub root: String,
    /// File type label (TXT, PDF, ...)
    pub file_type: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// The chunk text
    pub text: String,
    /// Blake3 hash of the whole document content
    pub content_hash: String,
}

/// A scored chunk returned by a vector query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Cosine similarity
    pub score: f32,
    pub payload: DocChunkPayload,
}

/// A Qdrant Edge shard holding one vector per document chunk.
pub struct Storage {
    shard: EdgeShard,
}

fn storage_error(e: impl ToString) -> DsError {
    DsError::Storage(e.to_string())
}

impl Storage {
    /// Open the shard at `dir`, creating it with `dimension`-sized cosine
    /// vectors if it does not exist yet.
    pub fn open(dir: &Path, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let chunk_vectors = VectorDataConfig {
            size: dimension,
            distance: Distance::Cosine,
            storage_type: VectorStorageType::ChunkedMmap,
            index: Default::default(),
            quantization_config: None,
            multivector_config: None,
            datatype: None,
        };
        let segment_config = SegmentConfig {
            vector_data: HashMap::from([(VECTOR_NAME.to_string(), chunk_vectors)]),
            sparse_vector_data: HashMap::new(),
            payload_storage_type: PayloadStorageType::Mmap,
        };

        let shard = EdgeShard::load(dir, Some(segment_config)).map_err(storage_error)?;
        Ok(Self { shard })
    }

    fn apply(&self, operation: PointOperations) -> Result<()> {
        self.shard
            .update(CollectionUpdateOperations::PointOperation(operation))
            .map_err(storage_error)?;
        Ok(())
    }

    /// Insert or replace chunk points.
    pub fn upsert(&self, points: Vec<(u64, Vec<f32>, DocChunkPayload)>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let points = points
            .into_iter()
            .map(|(id, vector, chunk)| {
                Ok(PointStructPersisted {
                    id: ExtendedPointId::NumId(id),
                    vector: VectorStructInternal::Named(HashMap::from([(
                        VECTOR_NAME.to_string(),
                        VectorInternal::from(vector),
                    )]))
                    .into(),
                    payload: Some(chunk_to_payload(&chunk)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.apply(PointOperations::UpsertPoints(
            PointInsertOperationsInternal::PointsList(points),
        ))
    }

    /// Nearest chunks to `query`, best first. Points whose payload does not
    /// decode are skipped.
    pub fn search(&self, query: Vec<f32>, limit: usize) -> Result<Vec<ScoredChunk>> {
        let request = ShardQueryRequest {
            prefetches: vec![],
            query: Some(ScoringQuery::Vector(QueryEnum::Nearest(NamedQuery {
                query: VectorInternal::from(query),
                using: Some(VECTOR_NAME.to_string()),
            }))),
            filter: None,
            score_threshold: None,
            limit,
            offset: 0,
            params: None,
            with_vector: WithVector::Bool(false),
            with_payload: WithPayloadInterface::Bool(true),
        };

        let scored = self.shard.query(request).map_err(storage_error)?;
        Ok(scored
            .into_iter()
            .filter_map(|point| {
                let payload = payload_to_chunk(point.payload.as_ref()?).ok()?;
                Some(ScoredChunk {
                    score: point.score,
                    payload,
                })
            })
            .collect())
    }

    pub fn delete(&self, ids: Vec<u64>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.apply(PointOperations::DeletePoints {
            ids: ids.into_iter().map(ExtendedPointId::NumId).collect(),
        })
    }

    /// Exact number of stored points.
    pub fn count(&self) -> Result<usize> {
        let request = CountRequestInternal {
            filter: None,
            exact: true,
        };
        self.shard.count(request).map_err(storage_error)
    }

    pub fn flush(&self) {
        self.shard.flush();
    }
}

fn chunk_to_payload(chunk: &DocChunkPayload) -> Result<Payload> {
    match serde_json::to_value(chunk)? {
        Value::Object(map) => Ok(Payload(map)),
        other => Err(storage_error(format!("chunk payload is not an object: {other}"))),
    }
}

fn payload_to_chunk(payload: &Payload) -> Result<DocChunkPayload> {
    Ok(serde_json::from_value(Value::Object(payload.0.clone()))?)
}
