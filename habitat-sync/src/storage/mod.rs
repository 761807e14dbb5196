//! Durable room storage.
//!
//! Rooms are persisted as their canonical JSON documents — the same
//! encoding that travels in `roomUpdate` snapshots — so a stored room can
//! be inspected with any JSON tool and survives schema evolution through
//! [`habitat_room::migrate_room_state`].

use habitat_room::{migrate_room_state, RoomError, RoomId, RoomState};

pub mod memory;
pub mod rocks;

pub use memory::MemoryRoomStore;
pub use rocks::{RocksRoomStore, RoomMetadata, StoreConfig};

/// Storage errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// RocksDB internal error
    Database(String),
    /// Serialization/deserialization failed
    Serialization(String),
    /// Compression error
    Compression(String),
    /// The stored document is newer than this build understands
    UnsupportedVersion(u32),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {e}"),
            StoreError::Serialization(e) => write!(f, "serialization error: {e}"),
            StoreError::Compression(e) => write!(f, "compression error: {e}"),
            StoreError::UnsupportedVersion(v) => {
                write!(f, "stored room document has unsupported version {v}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Durable storage for room documents.
///
/// `put` overwrites the whole document; the host calls it after every
/// successfully applied mutating operation, so the stored state always
/// matches some prefix of the operation history.
pub trait RoomStore: Send + Sync {
    fn get(&self, id: &RoomId) -> Result<Option<RoomState>, StoreError>;
    fn put(&self, state: &RoomState) -> Result<(), StoreError>;
    fn list(&self) -> Result<Vec<RoomId>, StoreError>;
}

/// Parses and migrates a stored JSON document.
pub(crate) fn decode_room(bytes: &[u8]) -> Result<RoomState, StoreError> {
    let doc: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
    migrate_room_state(doc).map_err(|e| match e {
        RoomError::SchemaVersionUnsupported(v) => StoreError::UnsupportedVersion(v),
        other => StoreError::Serialization(other.to_string()),
    })
}

/// Encodes a room as its canonical JSON document.
pub(crate) fn encode_room(state: &RoomState) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(&state.canonical()).map_err(|e| StoreError::Serialization(e.to_string()))
}
