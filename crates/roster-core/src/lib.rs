//! Roster Client Core
//!
//! This crate keeps the local student collection, derives the grouped and
//! filtered view from it, and synchronizes mutations with the remote record
//! service.

mod config;
mod debounce;
mod deriver;
mod error;
mod metrics;
mod session;
mod store;
mod sync;
mod view;

pub use config::RosterConfig;
pub use debounce::DebounceTimer;
pub use deriver::ViewDeriver;
pub use error::{Result, RosterError};
pub use metrics::{DeriveMetrics, DeriveStats, SyncMetrics, SyncStats};
pub use session::{Modal, Notice, NoticeLevel, Session};
pub use store::{Collection, RecordPatch, RecordStore, SnapshotObserver};
pub use sync::{LoadStatus, OpState, OpTarget, RemoteSync, SyncOp};
pub use view::{derive, matches, Group, GroupKeyPolicy, View, UNASSIGNED};
