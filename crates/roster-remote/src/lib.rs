//! Roster Remote Record Service
//!
//! This crate defines the CRUD contract between the Roster client core and
//! the record service, along with an in-process service and a JSON-file
//! backed service.

mod error;
mod file;
mod memory;
mod protocol;
mod store;

pub use error::RemoteError;
pub use file::JsonFileRemote;
pub use memory::{Fault, MemoryRemote};
pub use protocol::*;
pub use store::RemoteStore;
