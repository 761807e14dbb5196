//! Error taxonomy for room operations.
//!
//! Codes are stable and travel on the wire in `error` messages, so clients
//! can branch on them without parsing messages.

use std::fmt;

/// Stable numeric error codes.
pub mod codes {
    /// Malformed operation or message shape, rejected before the reducer.
    pub const VALIDATION: u32 = 40000;
    /// An operation referenced a nonexistent layout/furniture/light id.
    pub const NOT_FOUND: u32 = 40400;
    /// A create targeted an id that already exists, or a mutation conflicts
    /// with a state invariant.
    pub const CONFLICT: u32 = 40900;
    /// A persisted document is newer than this build understands.
    pub const UNSUPPORTED_VERSION: u32 = 42600;
    /// Internal failure (persistence, transport).
    pub const INTERNAL: u32 = 50000;
}

/// Failure applying or validating an operation against room state.
///
/// All variants leave the state untouched: the reducer validates before the
/// first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// The operation shape is invalid for the current state (e.g. targets
    /// the wrong room).
    Validation(String),
    /// A referenced layout/furniture/light does not exist.
    NotFound(String),
    /// A create targeted an existing id, or the mutation would violate a
    /// state invariant (e.g. deleting a room's last layout).
    Conflict(String),
    /// A persisted document carries a schema version newer than
    /// [`crate::state::ROOM_STATE_VERSION`]. No forward migration is
    /// attempted.
    SchemaVersionUnsupported(u32),
}

impl RoomError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RoomError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        RoomError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        RoomError::Conflict(msg.into())
    }

    /// The stable wire code for this error.
    pub fn code(&self) -> u32 {
        match self {
            RoomError::Validation(_) => codes::VALIDATION,
            RoomError::NotFound(_) => codes::NOT_FOUND,
            RoomError::Conflict(_) => codes::CONFLICT,
            RoomError::SchemaVersionUnsupported(_) => codes::UNSUPPORTED_VERSION,
        }
    }
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::Validation(msg) => write!(f, "invalid operation: {msg}"),
            RoomError::NotFound(msg) => write!(f, "not found: {msg}"),
            RoomError::Conflict(msg) => write!(f, "conflict: {msg}"),
            RoomError::SchemaVersionUnsupported(v) => {
                write!(f, "unsupported room state version {v}")
            }
        }
    }
}

impl std::error::Error for RoomError {}
