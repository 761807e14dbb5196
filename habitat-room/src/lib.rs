//! # habitat-room — Spatial room state for collaborative interior design
//!
//! The pure data model shared by every device and by the sync host: what a
//! room *is* (planes, layouts, furniture, lights), the closed set of
//! operations that may change it, and the reducer that applies them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   Operation    ┌──────────────┐
//! │ device edit  │ ──────────────►│   reducer    │
//! │ or scan      │                │ (pure, sync) │
//! └──────────────┘                └──────┬───────┘
//!                                        │
//!                       ┌────────────────┼───────────────┐
//!                       ▼                ▼               ▼
//!                ┌────────────┐   ┌────────────┐  ┌────────────┐
//!                │ RoomState  │   │ undo stack │  │ plane      │
//!                │ (document) │   │ (inverses) │  │ reconcile  │
//!                └────────────┘   └────────────┘  └────────────┘
//! ```
//!
//! Everything here is runtime-free: no async, no I/O, no clocks inside the
//! reducer. The same code drives the authoritative host and each device's
//! optimistic local copy, which is what keeps them convergent.
//!
//! ## Modules
//!
//! - [`state`] — the `RoomState` document schema and version migration
//! - [`ops`] — the `Operation` sum type and patch structs
//! - [`reducer`] — `apply_operation`, the single write path
//! - [`undo`] — inverse-operation generation and the undo stack
//! - [`planes`] — scan reconciliation keeping plane identity stable
//! - [`ids`] — prefixed entity ids
//! - [`defaults`] — empty and demo room documents

pub mod defaults;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod ops;
pub mod planes;
pub mod reducer;
pub mod state;
pub mod undo;

// Re-exports for convenience
pub use defaults::{demo_room_state, empty_room_state};
pub use error::{codes, RoomError};
pub use geometry::{Quat, Vec3};
pub use ids::{
    FurnitureId, FurniturePlacementId, IdError, LayoutId, LightPlacementId, ObjectId, OperationId,
    PlaneId, RoomId,
};
pub use ops::{
    new_layout, FurniturePlacementPatch, GlobalLightingPatch, LayoutPatch, LightPlacementPatch,
    Operation,
};
pub use planes::{merge_planes, scan_is_due, PLANE_STALENESS_MS};
pub use reducer::apply_operation;
pub use state::{
    migrate_room_state, now_ms, EditorMode, EditorState, GlobalLighting, ObservedPlane,
    RoomFurniturePlacement, RoomLayout, RoomLightPlacement, RoomPlaneData, RoomState,
    ROOM_STATE_VERSION,
};
pub use undo::{compute_inverse, UndoStack, DEFAULT_UNDO_CAPACITY};
