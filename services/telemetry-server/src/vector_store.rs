//! Vector Store Facade (spec §4.8) over `qdrant-client`.
//!
//! Mirrors the teacher's repository pattern (`server::repo::races`): a
//! thin struct around the driver handle, with every public method mapping
//! driver errors onto this module's own error type so qdrant types never
//! leak past this boundary (spec §4.8, §7).

use fireline_protocol::query::{QueryFilter, SimilarQueryResult};
use fireline_protocol::vector::VECTOR_LEN;
use fireline_protocol::FirelineErrorKind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, SetPayloadPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("vector store unavailable: {0}")]
    Transient(String),
    #[error("point not found")]
    NotFound,
    #[error("vector shape mismatch: {0}")]
    SchemaMismatch(String),
}

impl From<VectorStoreError> for FirelineErrorKind {
    fn from(e: VectorStoreError) -> Self {
        match e {
            VectorStoreError::Transient(m) => FirelineErrorKind::Transient(m),
            VectorStoreError::NotFound => FirelineErrorKind::NotFound("window point".to_owned()),
            VectorStoreError::SchemaMismatch(m) => FirelineErrorKind::SchemaMismatch(m),
        }
    }
}

fn map_qdrant_err(e: qdrant_client::QdrantError) -> VectorStoreError {
    VectorStoreError::Transient(e.to_string())
}

pub struct WindowPayload {
    pub session_id: Uuid,
    pub bucket_start: String,
    pub label: Option<String>,
    pub foot_count: u32,
    pub accel_count: u32,
}

/// Aggregate counts across every window stored for a session (spec §6.4
/// session-detail counts), summed by scrolling every point's payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowCounts {
    pub window_count: i64,
    pub foot_reading_count: i64,
    pub accel_reading_count: i64,
}

pub struct VectorStore {
    client: Qdrant,
    collection: String,
}

impl VectorStore {
    pub fn new(client: Qdrant, collection: impl Into<String>) -> Self {
        VectorStore {
            client,
            collection: collection.into(),
        }
    }

    /// Creates the collection if it does not already exist. Idempotent;
    /// safe to call on every server startup.
    pub async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(map_qdrant_err)?;
        if exists {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(VECTOR_LEN as u64, Distance::Cosine)),
            )
            .await
            .map_err(map_qdrant_err)?;
        Ok(())
    }

    /// Idempotent on `point_id` (spec §4.8): re-upserting the same id
    /// overwrites the previous vector and payload.
    pub async fn upsert(
        &self,
        point_id: Uuid,
        vector: &[f64; VECTOR_LEN],
        payload: WindowPayload,
    ) -> Result<(), VectorStoreError> {
        let vector_f32: Vec<f32> = vector.iter().map(|&v| v as f32).collect();
        let payload: Payload = json!({
            "session_id": payload.session_id.to_string(),
            "bucket_start": payload.bucket_start,
            "label": payload.label,
            "foot_count": payload.foot_count,
            "accel_count": payload.accel_count,
        })
        .try_into()
        .map_err(|e: serde_json::Error| VectorStoreError::SchemaMismatch(e.to_string()))?;

        let point = PointStruct::new(point_id.to_string(), vector_f32, payload);
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await
            .map_err(map_qdrant_err)?;
        Ok(())
    }

    /// Streaming iteration over points matching an equality filter (spec
    /// §4.8). `cursor` is an opaque offset id echoed back in the response.
    pub async fn scroll(
        &self,
        filter: &QueryFilter,
        limit: u32,
        cursor: Option<String>,
    ) -> Result<(Vec<SimilarQueryResult>, Option<String>), VectorStoreError> {
        let mut builder = ScrollPointsBuilder::new(&self.collection)
            .limit(limit)
            .filter(build_filter(filter))
            .with_payload(true);
        if let Some(offset) = &cursor {
            builder = builder.offset(offset.clone());
        }

        let resp = self
            .client
            .scroll(builder)
            .await
            .map_err(map_qdrant_err)?;

        let results = resp
            .result
            .iter()
            .filter_map(point_to_result)
            .collect();
        let next_cursor = resp.next_page_offset.map(|id| format!("{id:?}"));
        Ok((results, next_cursor))
    }

    /// Sums `window_count`/`foot_reading_count`/`accel_reading_count` across
    /// every window stored for a session, by scrolling the same way
    /// `http::export` does (spec §6.4 session-detail counts).
    pub async fn count_windows(&self, session_id: Uuid) -> Result<WindowCounts, VectorStoreError> {
        let filter = QueryFilter {
            session_id: Some(session_id),
            label: None,
        };
        let mut totals = WindowCounts::default();
        let mut cursor = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(256)
                .filter(build_filter(&filter))
                .with_payload(true);
            if let Some(offset) = &cursor {
                builder = builder.offset(offset.clone());
            }
            let resp = self.client.scroll(builder).await.map_err(map_qdrant_err)?;

            let done = resp.result.is_empty() || resp.next_page_offset.is_none();
            for point in &resp.result {
                totals.window_count += 1;
                totals.foot_reading_count += payload_u32(&point.payload, "foot_count").unwrap_or(0) as i64;
                totals.accel_reading_count += payload_u32(&point.payload, "accel_count").unwrap_or(0) as i64;
            }
            if done {
                break;
            }
            cursor = resp.next_page_offset.map(|id| format!("{id:?}"));
        }
        Ok(totals)
    }

    /// k-nearest-neighbours by cosine similarity to an existing point's
    /// vector (spec §4.8 `search`).
    pub async fn search(
        &self,
        reference_point_id: Uuid,
        limit: u32,
        filter: &QueryFilter,
    ) -> Result<Vec<SimilarQueryResult>, VectorStoreError> {
        let reference = self.fetch_vector(reference_point_id).await?;

        let resp = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, reference, limit as u64)
                    .filter(build_filter(filter))
                    .with_payload(true),
            )
            .await
            .map_err(map_qdrant_err)?;

        Ok(resp
            .result
            .iter()
            .filter_map(|scored| {
                let payload = &scored.payload;
                let session_id = payload_uuid(payload, "session_id")?;
                Some(SimilarQueryResult {
                    window_id: point_uuid(&scored.id),
                    session_id,
                    score: scored.score,
                    start_time: payload_string(payload, "bucket_start").unwrap_or_default(),
                    label: payload_string(payload, "label"),
                })
            })
            .collect())
    }

    /// Overwrites the `label` payload field on one point, keeping a
    /// window's Qdrant payload in sync with its `window_labels` row after
    /// the post-hoc labeling workflow (spec §4.9 `update_labels`). Leaves
    /// the vector and every other payload field untouched.
    pub async fn set_label(&self, point_id: Uuid, label: &str) -> Result<(), VectorStoreError> {
        let payload: Payload = json!({ "label": label })
            .try_into()
            .map_err(|e: serde_json::Error| VectorStoreError::SchemaMismatch(e.to_string()))?;

        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(&self.collection, payload)
                    .points(vec![point_id.to_string().into()]),
            )
            .await
            .map_err(map_qdrant_err)?;
        Ok(())
    }

    /// Removes every point matching an equality filter, used when a
    /// session is deleted (spec §4.9 `delete`).
    pub async fn delete_by(&self, filter: &QueryFilter) -> Result<(), VectorStoreError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(build_filter(filter)),
            )
            .await
            .map_err(map_qdrant_err)?;
        Ok(())
    }

    async fn fetch_vector(&self, point_id: Uuid) -> Result<Vec<f32>, VectorStoreError> {
        let resp = self
            .client
            .get_points(
                qdrant_client::qdrant::GetPointsBuilder::new(
                    &self.collection,
                    vec![point_id.to_string().into()],
                )
                .with_vectors(true),
            )
            .await
            .map_err(map_qdrant_err)?;

        let point = resp.result.into_iter().next().ok_or(VectorStoreError::NotFound)?;
        let vectors = point.vectors.ok_or(VectorStoreError::NotFound)?;
        match vectors.vectors_options {
            Some(qdrant_client::qdrant::vectors::VectorsOptions::Vector(v)) => Ok(v.data),
            _ => Err(VectorStoreError::SchemaMismatch(
                "expected a dense vector".to_owned(),
            )),
        }
    }
}

fn build_filter(filter: &QueryFilter) -> Filter {
    let mut conditions = Vec::new();
    if let Some(session_id) = filter.session_id {
        conditions.push(Condition::matches("session_id", session_id.to_string()));
    }
    if let Some(label) = &filter.label {
        conditions.push(Condition::matches("label", label.clone()));
    }
    Filter::must(conditions)
}

fn point_uuid(id: &Option<qdrant_client::qdrant::PointId>) -> Uuid {
    id.as_ref()
        .and_then(|id| match &id.point_id_options {
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s)) => s.parse().ok(),
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                Some(Uuid::from_u128(*n as u128))
            }
            None => None,
        })
        .unwrap_or(Uuid::nil())
}

fn payload_string(
    payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str().map(String::from))
}

fn payload_u32(
    payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Option<u32> {
    payload.get(key).and_then(|v| v.as_integer()).map(|n| n as u32)
}

fn payload_uuid(
    payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Option<Uuid> {
    payload_string(payload, key).and_then(|s| s.parse().ok())
}

fn point_to_result(
    point: &qdrant_client::qdrant::RetrievedPoint,
) -> Option<SimilarQueryResult> {
    let session_id = payload_uuid(&point.payload, "session_id")?;
    Some(SimilarQueryResult {
        window_id: point_uuid(&point.id),
        session_id,
        score: 0.0,
        start_time: payload_string(&point.payload, "bucket_start").unwrap_or_default(),
        label: payload_string(&point.payload, "label"),
    })
}
