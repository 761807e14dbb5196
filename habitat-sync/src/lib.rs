//! # habitat-sync — Multi-device sync layer for collaborative room editing
//!
//! Provides WebSocket-based synchronization of [`habitat_room::RoomState`]
//! between devices, with one authoritative single-writer host per room.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌─────────────┐
//! │ RoomClient  │ ◄─────────────────► │ SyncServer  │
//! │ (per device)│     JSON frames     │ (central)   │
//! └──────┬──────┘                     └──────┬──────┘
//!        │                                   │
//!        ▼                                   ▼
//! ┌─────────────┐                     ┌─────────────┐
//! │ RoomState   │                     │ RoomHost    │
//! │ (optimistic)│                     │ (authority) │
//! └─────────────┘                     └──────┬──────┘
//!                                            │
//!                                    ┌───────┴───────┐
//!                                    │SessionRegistry│     RocksDB
//!                                    │ (fan-out)     │   (room docs)
//!                                    └───────────────┘
//! ```
//!
//! Every mutation flows through a room's host task, which applies it with
//! the shared reducer, persists the document, and fans the operation out to
//! the other devices in the room. Devices apply the same operations to
//! their local replicas, so everyone converges on the host's ordering.
//!
//! ## Modules
//!
//! - [`protocol`] — JSON wire protocol (camelCase-tagged messages)
//! - [`host`] — single-writer room host task
//! - [`broadcast`] — per-room session fan-out
//! - [`server`] — WebSocket sync server
//! - [`client`] — WebSocket sync client with undo and offline queue
//! - [`storage`] — RocksDB-backed room document store

pub mod broadcast;
pub mod client;
pub mod host;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-exports for convenience
pub use broadcast::{Frame, SessionRegistry};
pub use client::{ClientError, ConnectionState, OfflineQueue, RoomClient, SyncEvent};
pub use host::{ApplyFailure, ApplyReport, HostConfig, HostHandle, RoomHost};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage, SessionId};
pub use server::{ServerConfig, ServerStats, SyncServer};
pub use storage::{
    MemoryRoomStore, RocksRoomStore, RoomMetadata, RoomStore, StoreConfig, StoreError,
};
