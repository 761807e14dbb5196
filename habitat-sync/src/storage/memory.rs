//! In-memory room store for tests and storage-less servers.

use std::collections::HashMap;
use std::sync::RwLock;

use habitat_room::{RoomId, RoomState};

use super::{decode_room, encode_room, RoomStore, StoreError};

/// Stores rooms as their canonical JSON documents in a map, exercising
/// the same encode/migrate path as the RocksDB store.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Vec<u8>>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RoomStore for MemoryRoomStore {
    fn get(&self, id: &RoomId) -> Result<Option<RoomState>, StoreError> {
        let rooms = self
            .rooms
            .read()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))?;
        match rooms.get(id) {
            Some(bytes) => decode_room(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put(&self, state: &RoomState) -> Result<(), StoreError> {
        let doc = encode_room(state)?;
        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))?;
        rooms.insert(state.id.clone(), doc);
        Ok(())
    }

    fn list(&self) -> Result<Vec<RoomId>, StoreError> {
        let rooms = self
            .rooms
            .read()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))?;
        Ok(rooms.keys().cloned().collect())
    }
}
