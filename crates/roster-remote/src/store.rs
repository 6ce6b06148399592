//! The abstract CRUD service consumed by the sync layer.

use crate::{Draft, Record, RecordId, RemoteError};
use async_trait::async_trait;

/// Remote record service.
///
/// Implementations map each method onto one service call:
/// `GET /students`, `POST /students`, `PUT /students/{id}` and
/// `DELETE /students/{id}`. Timeouts and retries are the transport's concern.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch every record.
    async fn list(&self) -> Result<Vec<Record>, RemoteError>;

    /// Create a record; the service assigns `id` and `createdAt`.
    async fn create(&self, draft: &Draft) -> Result<Record, RemoteError>;

    /// Replace the identified record.
    async fn update(&self, id: &RecordId, draft: &Draft) -> Result<Record, RemoteError>;

    /// Delete the identified record.
    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError>;
}
