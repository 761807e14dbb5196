//! WebSocket sync client for one device editing one room.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect, resync)
//! - Optimistic local application: operations mutate the local replica
//!   immediately and travel to the host in the background
//! - Undo/redo over the device's own operations
//! - Offline queue for operations submitted while disconnected

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use futures_util::StreamExt;

use habitat_room::{
    apply_operation, compute_inverse, empty_room_state, EditorState, Operation, OperationId,
    RoomError, RoomId, RoomState, UndoStack, DEFAULT_UNDO_CAPACITY,
};

use crate::protocol::{ClientMessage, ProtocolError, ServerMessage};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Events emitted by the sync client.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Connection established and the room requested
    Connected,
    /// Connection lost
    Disconnected,
    /// Full room snapshot received (initial join or resync)
    RoomSnapshot(RoomState),
    /// Operations applied by another device in the same room
    RemoteOperations(Vec<Operation>),
    /// The host accepted our last batch
    Acked,
    /// The host rejected a message; the code is one of
    /// [`habitat_room::codes`]
    ServerError { code: u32, message: String },
    /// Our batch created this layout on the host
    LayoutCreated(habitat_room::RoomLayout),
}

/// Client errors.
#[derive(Debug, Clone)]
pub enum ClientError {
    /// An operation failed local validation and was not submitted.
    Rejected(RoomError),
    /// The offline queue is full.
    QueueFull,
    /// Wire or connection failure.
    Protocol(ProtocolError),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Rejected(e) => write!(f, "operation rejected locally: {e}"),
            ClientError::QueueFull => write!(f, "offline queue full"),
            ClientError::Protocol(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        ClientError::Protocol(e)
    }
}

/// Queue for operations submitted while disconnected.
///
/// Queued operations are already applied to the local replica; they are
/// flushed to the host in order on reconnection.
pub struct OfflineQueue {
    queue: VecDeque<Operation>,
    max_size: usize,
}

impl OfflineQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Queues an operation for later flush. Returns false when full.
    pub fn enqueue(&mut self, op: Operation) -> bool {
        if self.queue.len() >= self.max_size {
            return false;
        }
        self.queue.push_back(op);
        true
    }

    /// Drains all queued operations in submission order.
    pub fn drain(&mut self) -> Vec<Operation> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

/// The sync client.
///
/// Owns an optimistic local replica of one room. Submitted operations are
/// applied locally first, recorded for undo, and then sent (or queued) for
/// the host. Remote operations arriving from peers are applied to the
/// replica and surfaced as [`SyncEvent::RemoteOperations`].
pub struct RoomClient {
    /// Room this client edits
    room_id: RoomId,

    /// Optimistic local replica, editor state included
    state: Arc<RwLock<RoomState>>,

    /// Connection state
    connection: Arc<RwLock<ConnectionState>>,

    /// Undo history over this device's own operations
    undo: Arc<Mutex<UndoStack>>,

    /// Op ids this device minted, for echo suppression after a resync
    own_ops: Arc<Mutex<HashSet<OperationId>>>,

    /// Operations submitted while disconnected
    offline_queue: Arc<Mutex<OfflineQueue>>,

    /// Channel to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<String>>,

    /// Event receiver for the application
    event_rx: Option<mpsc::Receiver<SyncEvent>>,

    /// Event sender (cloned into the reader task)
    event_tx: mpsc::Sender<SyncEvent>,

    /// Server URL
    server_url: String,
}

impl RoomClient {
    pub fn new(room_id: RoomId, server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let mut state = empty_room_state(room_id.clone());
        state.editor = Some(EditorState::default());
        Self {
            room_id,
            state: Arc::new(RwLock::new(state)),
            connection: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            undo: Arc::new(Mutex::new(UndoStack::new(DEFAULT_UNDO_CAPACITY))),
            own_ops: Arc::new(Mutex::new(HashSet::new())),
            offline_queue: Arc::new(Mutex::new(OfflineQueue::new(10_000))),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Takes the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Connects to the server, joins the room, and flushes any queued
    /// operations.
    ///
    /// Spawns background tasks for reading/writing WebSocket messages.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        {
            let mut conn = self.connection.write().await;
            *conn = if *conn == ConnectionState::Disconnected {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            };
        }

        let ws_stream = match tokio_tungstenite::connect_async(&self.server_url).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(_) => {
                *self.connection.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward the outgoing channel to the socket
        let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
        self.outgoing_tx = Some(out_tx.clone());
        tokio::spawn(async move {
            use futures_util::SinkExt;
            while let Some(text) = out_rx.recv().await {
                if ws_writer
                    .send(tokio_tungstenite::tungstenite::Message::Text(text.into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        // Join the room; the snapshot comes back through the reader
        let join = ClientMessage::request_room(self.room_id.clone()).encode()?;
        out_tx
            .send(join)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;

        *self.connection.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(SyncEvent::Connected).await;

        // Flush operations submitted while offline, as one batch
        {
            let mut queue = self.offline_queue.lock().await;
            let queued = queue.drain();
            if !queued.is_empty() {
                log::info!("flushing {} queued operations", queued.len());
                let msg = ClientMessage::apply_operations(queued).encode()?;
                out_tx
                    .send(msg)
                    .await
                    .map_err(|_| ProtocolError::ConnectionClosed)?;
                // the join snapshot predates the flush; ask for a fresh one
                // so the replica converges on the post-flush document
                let resync = ClientMessage::request_room(self.room_id.clone()).encode()?;
                out_tx
                    .send(resync)
                    .await
                    .map_err(|_| ProtocolError::ConnectionClosed)?;
            }
        }

        // Reader task: apply server messages to the local replica and
        // surface them as events
        let event_tx = self.event_tx.clone();
        let connection = self.connection.clone();
        let state = self.state.clone();
        let own_ops = self.own_ops.clone();
        let resync_tx = out_tx;
        let room_id = self.room_id.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(tokio_tungstenite::tungstenite::Message::Text(text)) => {
                        let server_msg = match ServerMessage::decode(&text) {
                            Ok(msg) => msg,
                            Err(e) => {
                                log::warn!("undecodable server message: {e}");
                                continue;
                            }
                        };

                        let event = match server_msg {
                            ServerMessage::RoomUpdate(update) => {
                                Self::absorb_snapshot(&state, &own_ops, update.data.clone())
                                    .await;
                                Some(SyncEvent::RoomSnapshot(update.data))
                            }
                            ServerMessage::SyncOperations(sync) => {
                                let mut local = state.write().await;
                                let mut own = own_ops.lock().await;
                                let mut remote = Vec::with_capacity(sync.operations.len());
                                let mut diverged = false;
                                for op in sync.operations {
                                    // after a resync the host may echo our own ops back
                                    if own.remove(op.op_id()) {
                                        continue;
                                    }
                                    if let Err(e) = apply_operation(&mut local, &op) {
                                        log::warn!(
                                            "remote operation {} no longer applies: {e}",
                                            op.op_id()
                                        );
                                        diverged = true;
                                        break;
                                    }
                                    remote.push(op);
                                }
                                drop(own);
                                drop(local);
                                if diverged {
                                    // replica diverged from the host; ask for a snapshot
                                    if let Ok(msg) =
                                        ClientMessage::request_room(room_id.clone()).encode()
                                    {
                                        let _ = resync_tx.send(msg).await;
                                    }
                                }
                                if remote.is_empty() {
                                    None
                                } else {
                                    Some(SyncEvent::RemoteOperations(remote))
                                }
                            }
                            ServerMessage::Ack(_) => Some(SyncEvent::Acked),
                            ServerMessage::Error(err) => Some(SyncEvent::ServerError {
                                code: err.code,
                                message: err.message,
                            }),
                            ServerMessage::LayoutCreated(created) => {
                                Some(SyncEvent::LayoutCreated(created.data))
                            }
                        };

                        if let Some(evt) = event {
                            let _ = event_tx.send(evt).await;
                        }
                    }
                    Ok(tokio_tungstenite::tungstenite::Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            *connection.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(SyncEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Replaces the replica with a host snapshot, preserving the local
    /// editor state. The snapshot already reflects everything the host
    /// accepted, so pending echo-suppression ids are dropped with it.
    async fn absorb_snapshot(
        state: &RwLock<RoomState>,
        own_ops: &Mutex<HashSet<OperationId>>,
        snapshot: RoomState,
    ) {
        let mut local = state.write().await;
        let editor = local.editor.take();
        *local = snapshot;
        local.editor = editor;
        drop(local);
        own_ops.lock().await.clear();
    }

    /// Submits a batch of operations.
    ///
    /// Each operation is validated and applied to the local replica first;
    /// a local rejection rolls back the whole batch, nothing reaches the
    /// host. Accepted operations are recorded for undo and sent, or queued
    /// when disconnected.
    pub async fn submit(&self, operations: Vec<Operation>) -> Result<(), ClientError> {
        let mut accepted = Vec::with_capacity(operations.len());
        let mut inverses = Vec::with_capacity(operations.len());
        {
            let mut local = self.state.write().await;
            let checkpoint = local.clone();
            for op in operations {
                let inverse = compute_inverse(&local, &op);
                if let Err(e) = apply_operation(&mut local, &op) {
                    // the already-applied prefix must not outlive the
                    // batch: it was never sent, so keeping it would fork
                    // the replica from the host
                    *local = checkpoint;
                    return Err(ClientError::Rejected(e));
                }
                if let Some(inverse) = inverse {
                    inverses.push((op.clone(), inverse));
                }
                accepted.push(op);
            }
            let mut undo = self.undo.lock().await;
            for (op, inverse) in inverses {
                undo.record(op, inverse);
            }
        }
        if accepted.is_empty() {
            return Ok(());
        }

        {
            let mut own = self.own_ops.lock().await;
            for op in &accepted {
                own.insert(op.op_id().clone());
            }
        }

        self.send_or_queue(accepted).await
    }

    /// Undoes this device's most recent operation. Returns false when
    /// there is nothing to undo.
    pub async fn undo(&self) -> Result<bool, ClientError> {
        let inverse = {
            let mut undo = self.undo.lock().await;
            match undo.undo() {
                Some(inverse) => inverse,
                None => return Ok(false),
            }
        };
        self.replay(inverse).await?;
        Ok(true)
    }

    /// Re-applies the most recently undone operation. Returns false when
    /// there is nothing to redo.
    pub async fn redo(&self) -> Result<bool, ClientError> {
        let op = {
            let mut undo = self.undo.lock().await;
            match undo.redo() {
                Some(op) => op,
                None => return Ok(false),
            }
        };
        self.replay(op).await?;
        Ok(true)
    }

    /// Applies an undo/redo operation locally and submits it, without
    /// recording it in the history again.
    async fn replay(&self, op: Operation) -> Result<(), ClientError> {
        {
            let mut local = self.state.write().await;
            if let Err(e) = apply_operation(&mut local, &op) {
                // a peer removed the referent since; drop the step
                log::warn!("history operation {} no longer applies: {e}", op.op_id());
                return Ok(());
            }
        }
        {
            let mut own = self.own_ops.lock().await;
            own.insert(op.op_id().clone());
        }
        self.send_or_queue(vec![op]).await
    }

    async fn send_or_queue(&self, operations: Vec<Operation>) -> Result<(), ClientError> {
        let connected = *self.connection.read().await == ConnectionState::Connected;
        if !connected {
            let mut queue = self.offline_queue.lock().await;
            for op in operations {
                if !queue.enqueue(op) {
                    return Err(ClientError::QueueFull);
                }
            }
            return Ok(());
        }

        let msg = ClientMessage::apply_operations(operations)
            .encode()
            .map_err(ClientError::Protocol)?;
        match &self.outgoing_tx {
            Some(tx) => tx
                .send(msg)
                .await
                .map_err(|_| ClientError::Protocol(ProtocolError::ConnectionClosed)),
            None => Err(ClientError::Protocol(ProtocolError::ConnectionClosed)),
        }
    }

    /// Sends a liveness ping.
    pub async fn ping(&self) -> Result<(), ProtocolError> {
        if *self.connection.read().await != ConnectionState::Connected {
            return Ok(());
        }
        let msg = ClientMessage::ping().encode()?;
        match &self.outgoing_tx {
            Some(tx) => tx.send(msg).await.map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Requests a fresh snapshot from the host.
    pub async fn resync(&self) -> Result<(), ProtocolError> {
        let msg = ClientMessage::request_room(self.room_id.clone()).encode()?;
        match &self.outgoing_tx {
            Some(tx) => tx.send(msg).await.map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Clone of the current local replica.
    pub async fn room(&self) -> RoomState {
        self.state.read().await.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection.read().await
    }

    pub async fn can_undo(&self) -> bool {
        self.undo.lock().await.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.undo.lock().await.can_redo()
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn offline_queue_len(&self) -> usize {
        self.offline_queue.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habitat_room::{LightPlacementId, RoomLightPlacement, Vec3};

    fn add_light_op(room_id: &RoomId) -> (Operation, LightPlacementId) {
        let light = RoomLightPlacement {
            id: LightPlacementId::generate(),
            position: Vec3::new(0.0, 2.0, 0.0),
        };
        let id = light.id.clone();
        (Operation::add_light(room_id.clone(), light), id)
    }

    #[test]
    fn client_creation() {
        let room_id = RoomId::generate();
        let client = RoomClient::new(room_id.clone(), "ws://localhost:9098");
        assert_eq!(client.room_id(), &room_id);
        assert_eq!(client.server_url(), "ws://localhost:9098");
    }

    #[tokio::test]
    async fn initial_state() {
        let client = RoomClient::new(RoomId::generate(), "ws://localhost:9098");
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
        assert_eq!(client.offline_queue_len().await, 0);
        assert!(!client.can_undo().await);
        assert!(client.room().await.editor.is_some());
    }

    #[tokio::test]
    async fn offline_submit_applies_locally_and_queues() {
        let room_id = RoomId::generate();
        let client = RoomClient::new(room_id.clone(), "ws://localhost:9098");

        let (op, light_id) = add_light_op(&room_id);
        client.submit(vec![op]).await.unwrap();

        assert_eq!(client.offline_queue_len().await, 1);
        assert!(client.room().await.lights.contains_key(&light_id));
        assert!(client.can_undo().await);
    }

    #[tokio::test]
    async fn locally_invalid_operation_is_rejected_not_queued() {
        let room_id = RoomId::generate();
        let client = RoomClient::new(room_id.clone(), "ws://localhost:9098");

        let op = Operation::remove_light(room_id, LightPlacementId::generate());
        match client.submit(vec![op]).await {
            Err(ClientError::Rejected(RoomError::NotFound(_))) => {}
            other => panic!("expected local rejection, got {other:?}"),
        }
        assert_eq!(client.offline_queue_len().await, 0);
        assert!(!client.can_undo().await);
    }

    #[tokio::test]
    async fn mid_batch_rejection_rolls_back_the_applied_prefix() {
        let room_id = RoomId::generate();
        let client = RoomClient::new(room_id.clone(), "ws://localhost:9098");

        let (good, light_id) = add_light_op(&room_id);
        let bad = Operation::remove_light(room_id, LightPlacementId::generate());
        match client.submit(vec![good, bad]).await {
            Err(ClientError::Rejected(RoomError::NotFound(_))) => {}
            other => panic!("expected local rejection, got {other:?}"),
        }

        // the prefix that applied before the rejection is gone again:
        // not on the replica, not queued, not undoable
        assert!(!client.room().await.lights.contains_key(&light_id));
        assert_eq!(client.offline_queue_len().await, 0);
        assert!(!client.can_undo().await);
    }

    #[tokio::test]
    async fn snapshot_resets_echo_suppression() {
        let room_id = RoomId::generate();
        let client = RoomClient::new(room_id.clone(), "ws://localhost:9098");

        let (op, light_id) = add_light_op(&room_id);
        client.submit(vec![op]).await.unwrap();
        assert_eq!(client.own_ops.lock().await.len(), 1);

        let snapshot = client.room().await.canonical();
        RoomClient::absorb_snapshot(&client.state, &client.own_ops, snapshot).await;

        assert!(client.own_ops.lock().await.is_empty());
        let room = client.room().await;
        assert!(room.lights.contains_key(&light_id));
        // snapshots never carry editor state; the local one survives
        assert!(room.editor.is_some());
    }

    #[tokio::test]
    async fn undo_reverts_the_local_replica() {
        let room_id = RoomId::generate();
        let client = RoomClient::new(room_id.clone(), "ws://localhost:9098");

        let (op, light_id) = add_light_op(&room_id);
        client.submit(vec![op]).await.unwrap();
        assert!(client.room().await.lights.contains_key(&light_id));

        assert!(client.undo().await.unwrap());
        assert!(!client.room().await.lights.contains_key(&light_id));
        assert!(client.can_redo().await);

        assert!(client.redo().await.unwrap());
        assert!(client.room().await.lights.contains_key(&light_id));
    }

    #[tokio::test]
    async fn undo_with_empty_history_is_false() {
        let client = RoomClient::new(RoomId::generate(), "ws://localhost:9098");
        assert!(!client.undo().await.unwrap());
        assert!(!client.redo().await.unwrap());
    }

    #[tokio::test]
    async fn undo_and_redo_travel_to_the_host_too() {
        let room_id = RoomId::generate();
        let client = RoomClient::new(room_id.clone(), "ws://localhost:9098");

        let (op, _) = add_light_op(&room_id);
        client.submit(vec![op]).await.unwrap();
        client.undo().await.unwrap();
        client.redo().await.unwrap();

        // original + inverse + redo, all queued while offline
        assert_eq!(client.offline_queue_len().await, 3);
    }

    #[test]
    fn offline_queue_capacity() {
        let room_id = RoomId::generate();
        let mut queue = OfflineQueue::new(2);
        let (a, _) = add_light_op(&room_id);
        let (b, _) = add_light_op(&room_id);
        let (c, _) = add_light_op(&room_id);

        assert!(queue.enqueue(a));
        assert!(queue.enqueue(b));
        assert!(!queue.enqueue(c));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn take_event_rx_only_once() {
        let mut client = RoomClient::new(RoomId::generate(), "ws://localhost:9098");
        assert!(client.take_event_rx().is_some());
        assert!(client.take_event_rx().is_none());
    }
}
