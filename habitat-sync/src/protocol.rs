//! JSON wire protocol between devices and the sync host.
//!
//! Messages travel as WebSocket text frames carrying one camelCase-tagged
//! JSON object each:
//! ```text
//! {"type": "applyOperations", "messageId": "…", "operations": [{"type": "addLight", …}]}
//! ```
//!
//! The protocol is deliberately small: a device joins one room per
//! connection, submits operation batches, and receives either full room
//! snapshots or operation streams back. There is no delta encoding — the
//! operations *are* the deltas.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use habitat_room::{Operation, RoomId, RoomLayout, RoomState};

/// Identity of one connected device session, minted by the server at
/// accept time. Never travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Messages a device sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Liveness probe; the host answers with an ack.
    Ping(PingMessage),
    /// Join a room and request its current snapshot. First message on
    /// every connection; also used to resync after a reconnect.
    RequestRoom(RequestRoomMessage),
    /// Submit a batch of operations against the joined room.
    ApplyOperations(ApplyOperationsMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PingMessage {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestRoomMessage {
    pub message_id: String,
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApplyOperationsMessage {
    pub message_id: String,
    pub operations: Vec<Operation>,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl ClientMessage {
    pub fn ping() -> Self {
        ClientMessage::Ping(PingMessage { message_id: new_message_id() })
    }

    pub fn request_room(room_id: RoomId) -> Self {
        ClientMessage::RequestRoom(RequestRoomMessage {
            message_id: new_message_id(),
            room_id,
        })
    }

    pub fn apply_operations(operations: Vec<Operation>) -> Self {
        ClientMessage::ApplyOperations(ApplyOperationsMessage {
            message_id: new_message_id(),
            operations,
        })
    }

    /// Correlation id echoed back as `responseTo` in the host's reply.
    pub fn message_id(&self) -> &str {
        match self {
            ClientMessage::Ping(msg) => &msg.message_id,
            ClientMessage::RequestRoom(msg) => &msg.message_id,
            ClientMessage::ApplyOperations(msg) => &msg.message_id,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// Messages the host sends to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// The previous client message was accepted.
    Ack(AckMessage),
    /// The previous client message was rejected; the code is one of
    /// [`habitat_room::codes`].
    Error(ErrorMessage),
    /// Full canonical snapshot of the joined room.
    RoomUpdate(RoomUpdateMessage),
    /// Sent only to the submitter when its batch created a layout, so the
    /// device can immediately select what it just created.
    LayoutCreated(LayoutCreatedMessage),
    /// Operations applied by another session in the same room.
    SyncOperations(SyncOperationsMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AckMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ErrorMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
    pub code: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomUpdateMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
    pub data: RoomState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LayoutCreatedMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
    pub data: RoomLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncOperationsMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
    pub operations: Vec<Operation>,
}

impl ServerMessage {
    pub fn ack(response_to: Option<String>) -> Self {
        ServerMessage::Ack(AckMessage { response_to })
    }

    pub fn error(response_to: Option<String>, code: u32, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            response_to,
            code,
            message: message.into(),
        })
    }

    /// Snapshot reply; the room is stripped of ephemeral editor state.
    pub fn room_update(response_to: Option<String>, room: &RoomState) -> Self {
        ServerMessage::RoomUpdate(RoomUpdateMessage {
            response_to,
            data: room.canonical(),
        })
    }

    pub fn layout_created(response_to: Option<String>, data: RoomLayout) -> Self {
        ServerMessage::LayoutCreated(LayoutCreatedMessage { response_to, data })
    }

    /// Broadcast of an applied batch; never correlated to one request.
    pub fn sync_operations(operations: Vec<Operation>) -> Self {
        ServerMessage::SyncOperations(SyncOperationsMessage {
            response_to: None,
            operations,
        })
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    Serialization(String),
    Deserialization(String),
    ConnectionClosed,
    NotJoined,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
            Self::Deserialization(e) => write!(f, "deserialization error: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::NotJoined => write!(f, "no room joined on this connection"),
        }
    }
}

impl std::error::Error for ProtocolError {}
