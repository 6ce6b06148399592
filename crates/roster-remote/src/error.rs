//! Remote service error types

use crate::{ErrorBody, RecordId};
use thiserror::Error;

/// Errors reported by a [`RemoteStore`](crate::RemoteStore).
///
/// `message` holds the service's own message when it supplied a usable one.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service rejected the payload
    #[error("Validation failed: {}", .message.as_deref().unwrap_or("invalid payload"))]
    Validation { message: Option<String> },

    /// The targeted record does not exist on the service
    #[error("Record not found: {id}")]
    NotFound {
        id: RecordId,
        message: Option<String>,
    },

    /// Network or service failure
    #[error("Transport error: {}", .message.as_deref().unwrap_or("request failed"))]
    Transport { message: Option<String> },

    /// IO error in a file-backed service
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed payload
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    pub fn validation(message: impl Into<String>) -> Self {
        RemoteError::Validation {
            message: Some(message.into()),
        }
    }

    pub fn not_found(id: RecordId) -> Self {
        RemoteError::NotFound { id, message: None }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        RemoteError::Transport {
            message: Some(message.into()),
        }
    }

    /// Classify a non-2xx response.
    ///
    /// 400 and 422 are validation failures, 404 is not-found when the request
    /// targeted a record, everything else is a transport failure.
    pub fn from_response(status: u16, body: &[u8], id: Option<&RecordId>) -> Self {
        let message = ErrorBody::message_from_slice(body);
        match (status, id) {
            (400 | 422, _) => RemoteError::Validation { message },
            (404, Some(id)) => RemoteError::NotFound {
                id: id.clone(),
                message,
            },
            _ => RemoteError::Transport { message },
        }
    }

    /// The service-supplied message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            RemoteError::Validation { message }
            | RemoteError::NotFound { message, .. }
            | RemoteError::Transport { message } => message.as_deref(),
            RemoteError::Io(_) | RemoteError::Json(_) => None,
        }
    }
}
