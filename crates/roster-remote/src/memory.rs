//! In-process record service.
//!
//! Behaves like the real service (sequential ids, server-side validation,
//! `createdAt` stamping) and adds knobs for exercising client behaviour:
//! per-call latency, one-shot faults and call counters.

use crate::{
    Draft, Endpoint, EndpointKind, ErrorBody, Record, RecordId, RemoteError, RemoteStore,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// A failure to inject into the next call of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Respond as if the payload was rejected
    Rejected(Option<String>),
    /// Respond with not-found for the targeted id
    Missing,
    /// Fail in transit
    Unavailable(Option<String>),
}

impl Fault {
    /// The HTTP status and body the service would answer with.
    fn response(&self) -> (u16, Vec<u8>) {
        let (status, message) = match self {
            Fault::Rejected(message) => (422, message.as_deref()),
            Fault::Missing => (404, None),
            Fault::Unavailable(message) => (503, message.as_deref()),
        };
        let body = message
            .and_then(|m| serde_json::to_vec(&ErrorBody::new(m)).ok())
            .unwrap_or_default();
        (status, body)
    }
}

#[derive(Default)]
struct ServiceState {
    records: Vec<Record>,
    next_id: i64,
}

/// In-memory implementation of [`RemoteStore`].
pub struct MemoryRemote {
    state: Mutex<ServiceState>,
    latency: Option<Duration>,
    faults: Mutex<HashMap<EndpointKind, Fault>>,
    calls: Mutex<HashMap<EndpointKind, usize>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Create an empty service.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServiceState {
                records: Vec::new(),
                next_id: 1,
            }),
            latency: None,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Delay every call by `latency` before it takes effect.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replace the service's records. Numeric ids advance the id sequence.
    pub fn seed(&self, records: Vec<Record>) {
        let mut state = self.state.lock();
        let max_id = records
            .iter()
            .filter_map(|r| r.id.as_number())
            .max()
            .unwrap_or(0);
        state.next_id = max_id + 1;
        state.records = records;
    }

    /// Fail the next call to `kind` with `fault`.
    pub fn fail_next(&self, kind: EndpointKind, fault: Fault) {
        self.faults.lock().insert(kind, fault);
    }

    /// Number of calls received by an endpoint kind.
    pub fn calls(&self, kind: EndpointKind) -> usize {
        self.calls.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Current records held by the service.
    pub fn records(&self) -> Vec<Record> {
        self.state.lock().records.clone()
    }

    async fn enter(&self, endpoint: &Endpoint) -> Result<(), RemoteError> {
        *self.calls.lock().entry(endpoint.kind()).or_insert(0) += 1;
        debug!(endpoint = %endpoint, "Remote call");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let fault = self.faults.lock().remove(&endpoint.kind());
        match fault {
            None => Ok(()),
            Some(fault) => {
                let (status, body) = fault.response();
                Err(RemoteError::from_response(status, &body, endpoint.target()))
            }
        }
    }
}

/// Server-side draft validation shared by the bundled services.
pub(crate) fn validate_draft(draft: &Draft) -> Result<(), RemoteError> {
    let missing = draft.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RemoteError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list(&self) -> Result<Vec<Record>, RemoteError> {
        self.enter(&Endpoint::List).await?;
        Ok(self.state.lock().records.clone())
    }

    async fn create(&self, draft: &Draft) -> Result<Record, RemoteError> {
        self.enter(&Endpoint::Create).await?;
        validate_draft(draft)?;

        let mut state = self.state.lock();
        let id = RecordId::Number(state.next_id);
        state.next_id += 1;

        let record = Record::from_draft(id, draft, Some(Utc::now()));
        state.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &RecordId, draft: &Draft) -> Result<Record, RemoteError> {
        self.enter(&Endpoint::Update(id.clone())).await?;
        validate_draft(draft)?;

        let mut state = self.state.lock();
        let current = state
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RemoteError::not_found(id.clone()))?;

        *current = Record::from_draft(id.clone(), draft, current.created_at);
        Ok(current.clone())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.enter(&Endpoint::Delete(id.clone())).await?;

        let mut state = self.state.lock();
        let before = state.records.len();
        state.records.retain(|r| &r.id != id);
        if state.records.len() == before {
            return Err(RemoteError::not_found(id.clone()));
        }
        Ok(())
    }
}
