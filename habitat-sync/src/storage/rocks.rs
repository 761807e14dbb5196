//! RocksDB-backed room store.
//!
//! Column families:
//! - `rooms`    — Canonical room JSON documents (LZ4 compressed)
//! - `metadata` — Per-room bookkeeping (bincode: sizes, timestamps)
//!
//! Keys in both families are the room id string (`r-<uuid>`), so the
//! database can be inspected with the RocksDB CLI tools.

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode,
    IteratorMode, Options, SingleThreaded, WriteBatch, WriteOptions,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use habitat_room::{RoomId, RoomState};

use super::{decode_room, encode_room, RoomStore, StoreError};

const CF_ROOMS: &str = "rooms";
const CF_METADATA: &str = "metadata";

const COLUMN_FAMILIES: &[&str] = &[CF_ROOMS, CF_METADATA];

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: i32,
    /// Enable fsync on every write (default: false)
    pub sync_writes: bool,
    /// Max open files for RocksDB (default: 256)
    pub max_open_files: i32,
    /// Write buffer size per column family (default: 16MB)
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("habitat_data"),
            block_cache_size: 64 * 1024 * 1024,
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 256,
            write_buffer_size: 16 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    /// Config for testing: small caches, caller-provided temp directory.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 64,
            write_buffer_size: 2 * 1024 * 1024,
        }
    }
}

/// Bookkeeping stored alongside each room document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMetadata {
    pub room_id: String,
    /// Uncompressed document size in bytes
    pub doc_size: u64,
    /// Compressed document size in bytes
    pub compressed_size: u64,
    /// Number of writes to this room since creation
    pub write_count: u64,
    /// Seconds since epoch
    pub created_at: u64,
    pub updated_at: u64,
}

impl RoomMetadata {
    fn new(room_id: &RoomId) -> Self {
        let now = now_secs();
        Self {
            room_id: room_id.as_str().to_string(),
            doc_size: 0,
            compressed_size: 0,
            write_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let (meta, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(meta)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// RocksDB-backed room store.
///
/// LZ4-compressed documents, bloom filters for point lookup, and atomic
/// write batches keeping document and metadata in step.
pub struct RocksRoomStore {
    /// RocksDB instance (single-threaded mode — concurrency via tokio)
    db: DBWithThreadMode<SingleThreaded>,
    config: StoreConfig,
}

impl RocksRoomStore {
    /// Opens the store, creating the database and column families if
    /// missing.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_keep_log_file_num(5);
        db_opts.increase_parallelism(num_cpus());

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(&config)))
            .collect();

        let db = DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(
            &db_opts,
            &config.path,
            cf_descriptors,
        )?;

        Ok(Self { db, config })
    }

    fn cf_options(config: &StoreConfig) -> Options {
        let mut opts = Options::default();

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(config.bloom_filter_bits as f64, false);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_compression_type(DBCompressionType::Lz4);
        opts.set_write_buffer_size(config.write_buffer_size);
        // whole-document reads by room id, never range scans
        opts.optimize_for_point_lookup(config.block_cache_size as u64);

        opts
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family '{name}' not found")))
    }

    /// Per-room bookkeeping, if the room has ever been written.
    pub fn metadata(&self, id: &RoomId) -> Result<Option<RoomMetadata>, StoreError> {
        let cf = self.cf(CF_METADATA)?;
        match self.db.get_cf(&cf, id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(RoomMetadata::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl RoomStore for RocksRoomStore {
    fn get(&self, id: &RoomId) -> Result<Option<RoomState>, StoreError> {
        let cf = self.cf(CF_ROOMS)?;
        match self.db.get_cf(&cf, id.as_str().as_bytes())? {
            Some(compressed) => {
                let bytes = lz4_flex::decompress_size_prepended(&compressed)
                    .map_err(|e| StoreError::Compression(e.to_string()))?;
                decode_room(&bytes).map(Some)
            }
            None => Ok(None),
        }
    }

    fn put(&self, state: &RoomState) -> Result<(), StoreError> {
        let cf_rooms = self.cf(CF_ROOMS)?;
        let cf_meta = self.cf(CF_METADATA)?;

        let doc = encode_room(state)?;
        let compressed = lz4_flex::compress_prepend_size(&doc);

        let mut meta = self
            .metadata(&state.id)?
            .unwrap_or_else(|| RoomMetadata::new(&state.id));
        meta.doc_size = doc.len() as u64;
        meta.compressed_size = compressed.len() as u64;
        meta.write_count += 1;
        meta.updated_at = now_secs();

        // atomic batch: document + metadata together
        let key = state.id.as_str().as_bytes();
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_rooms, key, &compressed);
        batch.put_cf(&cf_meta, key, &meta.encode()?);

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        Ok(())
    }

    fn list(&self) -> Result<Vec<RoomId>, StoreError> {
        let cf = self.cf(CF_ROOMS)?;
        let mut ids = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let text = std::str::from_utf8(&key)
                .map_err(|_| StoreError::Serialization("non-utf8 room key".into()))?;
            let id: RoomId = text
                .parse()
                .map_err(|e: habitat_room::IdError| StoreError::Serialization(e.to_string()))?;
            ids.push(id);
        }
        Ok(ids)
    }
}

fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use habitat_room::{apply_operation, demo_room_state, Operation};

    fn open_temp() -> (tempfile::TempDir, RocksRoomStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksRoomStore::open(StoreConfig::for_testing(dir.path().join("db"))).unwrap();
        (dir, store)
    }

    #[test]
    fn put_get_round_trip() {
        let (_dir, store) = open_temp();
        let state = demo_room_state(RoomId::generate());

        store.put(&state).unwrap();
        let loaded = store.get(&state.id).unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn missing_room_is_none() {
        let (_dir, store) = open_temp();
        assert!(store.get(&RoomId::generate()).unwrap().is_none());
    }

    #[test]
    fn put_overwrites_and_counts_writes() {
        let (_dir, store) = open_temp();
        let mut state = demo_room_state(RoomId::generate());
        store.put(&state).unwrap();

        let op = Operation::update_planes(state.id.clone(), vec![], 1);
        apply_operation(&mut state, &op).unwrap();
        store.put(&state).unwrap();

        let loaded = store.get(&state.id).unwrap().unwrap();
        assert!(loaded.planes.is_empty());

        let meta = store.metadata(&state.id).unwrap().unwrap();
        assert_eq!(meta.write_count, 2);
        assert_eq!(meta.room_id, state.id.as_str());
        assert!(meta.compressed_size > 0);
    }

    #[test]
    fn list_returns_all_rooms() {
        let (_dir, store) = open_temp();
        let a = demo_room_state(RoomId::generate());
        let b = demo_room_state(RoomId::generate());
        store.put(&a).unwrap();
        store.put(&b).unwrap();

        let ids = store.list().unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.id));
        assert!(ids.contains(&b.id));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::for_testing(dir.path().join("db"));
        let state = demo_room_state(RoomId::generate());

        {
            let store = RocksRoomStore::open(config.clone()).unwrap();
            store.put(&state).unwrap();
        }

        let store = RocksRoomStore::open(config).unwrap();
        let loaded = store.get(&state.id).unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn editor_state_is_never_persisted() {
        let (_dir, store) = open_temp();
        let mut state = demo_room_state(RoomId::generate());
        state.editor = Some(habitat_room::EditorState::default());

        store.put(&state).unwrap();
        let loaded = store.get(&state.id).unwrap().unwrap();
        assert!(loaded.editor.is_none());
    }
}
