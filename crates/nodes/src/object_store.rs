//! Object store seam for binary node payloads — put/get/presign against a
//! blob storage backend, with only the interface specified here. The
//! in-memory implementation exists for tests and local/dev mode; a
//! production backend (S3, GCS, ...) plugs in by implementing the same
//! trait.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::value::BlobReference;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(Uuid),
    #[error("object store backend error: {0}")]
    Backend(String),
}

/// Metadata recorded alongside an object's bytes: id, mime type, owning
/// organization, and the optional execution/filename it came from.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub id: Uuid,
    pub mime_type: String,
    pub organization_id: String,
    pub execution_id: Option<String>,
    pub filename: Option<String>,
}

/// A write request: the bytes plus the scoping metadata the store records.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub data: bytes::Bytes,
    pub mime_type: String,
    pub organization_id: String,
    pub execution_id: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetObject {
    pub data: bytes::Bytes,
    pub metadata: ObjectMetadata,
}

/// Default presigned-URL expiry and bounds.
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 604_800;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write bytes, returning the newly minted blob reference.
    async fn write(&self, object: PutObject) -> Result<BlobReference, ObjectStoreError>;

    /// Fetch bytes for a previously written id.
    async fn read(&self, id: Uuid) -> Result<GetObject, ObjectStoreError>;

    /// Produce a time-limited GET URL. `expiry_secs` is clamped to
    /// `[1, MAX_PRESIGN_EXPIRY_SECS]` by implementations.
    async fn presign(&self, id: Uuid, expiry_secs: u64) -> Result<String, ObjectStoreError>;

    /// Convenience: write then presign in one call, as node implementations
    /// that both produce and want to hand back a URL commonly need.
    async fn write_and_presign(
        &self,
        object: PutObject,
        expiry_secs: u64,
    ) -> Result<(BlobReference, String), ObjectStoreError> {
        let reference = self.write(object).await?;
        let url = self.presign(reference.id, expiry_secs).await?;
        Ok((reference, url))
    }
}

/// In-memory `ObjectStore`, keyed `objects/<id>/object.data` conceptually;
/// bytes live in a `DashMap` rather than on a filesystem or in S3.
/// Sufficient for tests and single-process dev mode; blob ids are UUIDv4,
/// collision-free without locking.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<Uuid, GetObject>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn write(&self, object: PutObject) -> Result<BlobReference, ObjectStoreError> {
        let id = Uuid::new_v4();
        let metadata = ObjectMetadata {
            id,
            mime_type: object.mime_type.clone(),
            organization_id: object.organization_id,
            execution_id: object.execution_id,
            filename: object.filename.clone(),
        };
        self.objects.insert(
            id,
            GetObject {
                data: object.data,
                metadata,
            },
        );
        Ok(BlobReference {
            id,
            mime_type: object.mime_type,
            filename: object.filename,
        })
    }

    async fn read(&self, id: Uuid) -> Result<GetObject, ObjectStoreError> {
        self.objects
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ObjectStoreError::NotFound(id))
    }

    async fn presign(&self, id: Uuid, expiry_secs: u64) -> Result<String, ObjectStoreError> {
        if !self.objects.contains_key(&id) {
            return Err(ObjectStoreError::NotFound(id));
        }
        let expiry = expiry_secs.clamp(1, MAX_PRESIGN_EXPIRY_SECS);
        Ok(format!("mem://objects/{id}/object.data?expires_in={expiry}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips_bytes() {
        let store = InMemoryObjectStore::new();
        let reference = store
            .write(PutObject {
                data: bytes::Bytes::from_static(b"hello"),
                mime_type: "text/plain".into(),
                organization_id: "org_1".into(),
                execution_id: None,
                filename: None,
            })
            .await
            .unwrap();

        let fetched = store.read(reference.id).await.unwrap();
        assert_eq!(fetched.data, bytes::Bytes::from_static(b"hello"));
        assert_eq!(fetched.metadata.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn read_of_unknown_id_fails() {
        let store = InMemoryObjectStore::new();
        let err = store.read(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn presign_clamps_expiry() {
        let store = InMemoryObjectStore::new();
        let reference = store
            .write(PutObject {
                data: bytes::Bytes::from_static(b"x"),
                mime_type: "application/octet-stream".into(),
                organization_id: "org_1".into(),
                execution_id: None,
                filename: None,
            })
            .await
            .unwrap();

        let url = store.presign(reference.id, 999_999_999).await.unwrap();
        assert!(url.contains(&format!("expires_in={MAX_PRESIGN_EXPIRY_SECS}")));
    }
}
