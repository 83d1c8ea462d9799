#![forbid(unsafe_code)]

pub mod codec;
pub mod repository;
pub mod sqlite;

pub use codec::CodecError;
pub use repository::{SNAPSHOT_KEY, SnapshotStore, Storage, StorageError};
