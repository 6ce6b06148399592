//! Error types for the Roster core.

use crate::sync::OpTarget;
use roster_remote::RecordId;
use thiserror::Error;

/// Errors that can occur in store, sync and session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// Draft or merged record is malformed or incomplete
    #[error("{0}")]
    Validation(String),

    /// Operation targets an id that does not exist
    #[error("Student not found: {0}")]
    NotFound(RecordId),

    /// Record id already present in the collection
    #[error("Duplicate student id: {0}")]
    DuplicateId(RecordId),

    /// Service or network failure
    #[error("{0}")]
    Transport(String),

    /// Another operation on the same target is still pending
    #[error("An operation is already pending for {0}")]
    Busy(OpTarget),

    /// A record operation was issued before the initial load started
    #[error("Students have not been loaded")]
    NotLoaded,

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl RosterError {
    /// True for local invariant violations that the sync flow should prevent.
    pub fn is_defect(&self) -> bool {
        matches!(self, RosterError::DuplicateId(_))
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = RosterError::NotFound(RecordId::Number(3));
        assert_eq!(format!("{}", err), "Student not found: 3");
    }

    #[test]
    fn test_error_display_is_verbatim_for_remote_messages() {
        let err = RosterError::Transport("Error deleting student".to_string());
        assert_eq!(format!("{}", err), "Error deleting student");
    }

    #[test]
    fn test_error_display_busy() {
        let err = RosterError::Busy(OpTarget::Record(RecordId::Number(1)));
        let msg = format!("{}", err);
        assert!(msg.contains("already pending"));
        assert!(msg.contains("student 1"));
    }

    #[test]
    fn test_duplicate_is_defect() {
        assert!(RosterError::DuplicateId(RecordId::Number(1)).is_defect());
        assert!(!RosterError::NotLoaded.is_defect());
    }
}
