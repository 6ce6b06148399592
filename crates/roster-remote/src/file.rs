//! Record service backed by a JSON file.
//!
//! The file holds a JSON array of records. Every mutation rewrites the whole
//! file through a temporary sibling and a rename.

use crate::memory::validate_draft;
use crate::{Draft, Endpoint, Record, RecordId, RemoteError, RemoteStore};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// JSON-file implementation of [`RemoteStore`].
pub struct JsonFileRemote {
    path: PathBuf,
    gate: Mutex<()>,
}

impl JsonFileRemote {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Record>, RemoteError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, records: &[Record]) -> Result<(), RemoteError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), records = records.len(), "Record file written");
        Ok(())
    }
}

fn next_id(records: &[Record]) -> RecordId {
    let max = records
        .iter()
        .filter_map(|r| r.id.as_number())
        .max()
        .unwrap_or(0);
    RecordId::Number(max + 1)
}

#[async_trait]
impl RemoteStore for JsonFileRemote {
    async fn list(&self) -> Result<Vec<Record>, RemoteError> {
        debug!(endpoint = %Endpoint::List, "Remote call");
        let _guard = self.gate.lock().await;
        self.read_all().await
    }

    async fn create(&self, draft: &Draft) -> Result<Record, RemoteError> {
        debug!(endpoint = %Endpoint::Create, "Remote call");
        validate_draft(draft)?;

        let _guard = self.gate.lock().await;
        let mut records = self.read_all().await?;
        let record = Record::from_draft(next_id(&records), draft, Some(Utc::now()));
        records.push(record.clone());
        self.write_all(&records).await?;

        info!(id = %record.id, "Record created");
        Ok(record)
    }

    async fn update(&self, id: &RecordId, draft: &Draft) -> Result<Record, RemoteError> {
        debug!(endpoint = %Endpoint::Update(id.clone()), "Remote call");
        validate_draft(draft)?;

        let _guard = self.gate.lock().await;
        let mut records = self.read_all().await?;
        let current = records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RemoteError::not_found(id.clone()))?;
        *current = Record::from_draft(id.clone(), draft, current.created_at);
        let updated = current.clone();
        self.write_all(&records).await?;

        info!(id = %id, "Record updated");
        Ok(updated)
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        debug!(endpoint = %Endpoint::Delete(id.clone()), "Remote call");

        let _guard = self.gate.lock().await;
        let mut records = self.read_all().await?;
        let before = records.len();
        records.retain(|r| &r.id != id);
        if records.len() == before {
            return Err(RemoteError::not_found(id.clone()));
        }
        self.write_all(&records).await?;

        info!(id = %id, "Record deleted");
        Ok(())
    }
}
