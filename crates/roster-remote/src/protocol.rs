//! Wire types shared by the record service and its clients.
//!
//! Records travel as JSON objects with camelCase keys. Identifiers are
//! assigned by the service and may be numbers or strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque record identifier assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Numeric value, if the id is numeric.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            RecordId::Number(n) => Some(*n),
            RecordId::Text(_) => None,
        }
    }

    /// Parse an id typed by a user: digits become numeric ids.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(n) => RecordId::Number(n),
            Err(_) => RecordId::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Text(s)
    }
}

/// One student record as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Build a record from a draft and a service-assigned identity.
    pub fn from_draft(id: RecordId, draft: &Draft, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id,
            name: draft.name.clone(),
            email: draft.email.clone(),
            phone: Some(draft.phone.clone()),
            course: Some(draft.course.clone()),
            created_at,
        }
    }

    /// Phone, treating blank values as absent.
    pub fn phone(&self) -> Option<&str> {
        non_blank(self.phone.as_deref())
    }

    /// Course, treating blank values as absent.
    pub fn course(&self) -> Option<&str> {
        non_blank(self.course.as_deref())
    }

    /// Creation time, or now when the service never supplied one.
    pub fn created_or_observed(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or_else(Utc::now)
    }

    /// Creation date as shown on cards, e.g. "Mar 5, 2024".
    pub fn display_date(&self) -> String {
        self.created_or_observed().format("%b %-d, %Y").to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Request body for create and full-replacement update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
}

impl Draft {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        course: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            course: course.into(),
        }
    }

    /// Prefill a draft from an existing record (edit form).
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone().unwrap_or_default(),
            course: record.course.clone().unwrap_or_default(),
        }
    }

    /// Required fields that are blank after trimming, in form order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("course", &self.course),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Error payload returned by the service on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Extract a usable message from a raw response body.
    ///
    /// Returns `None` for non-JSON bodies, non-string messages and blank
    /// messages.
    pub fn message_from_slice(body: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        let message = value.get("message")?.as_str()?.trim();
        if message.is_empty() {
            None
        } else {
            Some(message.to_string())
        }
    }
}

/// The service's CRUD endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    List,
    Create,
    Update(RecordId),
    Delete(RecordId),
}

impl Endpoint {
    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::List => "GET",
            Endpoint::Create => "POST",
            Endpoint::Update(_) => "PUT",
            Endpoint::Delete(_) => "DELETE",
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::List | Endpoint::Create => "/students".to_string(),
            Endpoint::Update(id) | Endpoint::Delete(id) => format!("/students/{}", id),
        }
    }

    /// Endpoint kind without its id, used to key per-endpoint bookkeeping.
    pub fn kind(&self) -> EndpointKind {
        match self {
            Endpoint::List => EndpointKind::List,
            Endpoint::Create => EndpointKind::Create,
            Endpoint::Update(_) => EndpointKind::Update,
            Endpoint::Delete(_) => EndpointKind::Delete,
        }
    }

    /// The record a call targets, if any.
    pub fn target(&self) -> Option<&RecordId> {
        match self {
            Endpoint::List | Endpoint::Create => None,
            Endpoint::Update(id) | Endpoint::Delete(id) => Some(id),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    List,
    Create,
    Update,
    Delete,
}
