//! The single-writer room host.
//!
//! Every room gets exactly one host task that owns the canonical
//! [`RoomState`] and its [`SessionRegistry`]. All mutations arrive through
//! the host's command channel, so operations are applied strictly one at a
//! time with no locking — ordering disputes between devices are settled by
//! arrival order at this channel.
//!
//! A batch is not a transaction: each operation is applied and persisted
//! individually, and the first failure stops the batch while the already
//! applied prefix stays committed and is broadcast to peers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

use habitat_room::{
    apply_operation, codes, demo_room_state, empty_room_state, now_ms, Operation, RoomId,
    RoomLayout, RoomState,
};

use crate::broadcast::{Frame, SessionRegistry};
use crate::protocol::{ProtocolError, ServerMessage, SessionId};
use crate::storage::{RoomStore, StoreError};

/// Host behavior knobs.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Frames buffered per session before a slow connection starts
    /// dropping and must resync.
    pub broadcast_capacity: usize,
    /// Sessions silent longer than this are pruned.
    pub max_idle: Duration,
    /// How often the idle sweep runs.
    pub prune_interval: Duration,
    /// Seed unknown rooms with the synthetic demo geometry instead of an
    /// empty room.
    pub seed_demo_room: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 256,
            max_idle: Duration::from_secs(300),
            prune_interval: Duration::from_secs(30),
            seed_demo_room: true,
        }
    }
}

/// Outcome of one `applyOperations` batch.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// Operations applied (and, where mutating, persisted).
    pub applied: usize,
    /// Layouts created by this batch, reported back to the submitter so
    /// it can select what it just created.
    pub created_layouts: Vec<RoomLayout>,
    /// The failure that stopped the batch, if any.
    pub failure: Option<ApplyFailure>,
}

/// Why a batch stopped early.
#[derive(Debug, Clone)]
pub struct ApplyFailure {
    pub code: u32,
    pub message: String,
}

enum HostCommand {
    Join {
        session: SessionId,
        reply: oneshot::Sender<broadcast::Receiver<Frame>>,
    },
    Leave {
        session: SessionId,
    },
    Touch {
        session: SessionId,
    },
    Snapshot {
        reply: oneshot::Sender<RoomState>,
    },
    Apply {
        session: SessionId,
        operations: Vec<Operation>,
        reply: oneshot::Sender<ApplyReport>,
    },
}

/// Cheap cloneable handle to a room's host task.
#[derive(Clone)]
pub struct HostHandle {
    room_id: RoomId,
    tx: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub async fn join(&self, session: SessionId) -> Result<broadcast::Receiver<Frame>, ProtocolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HostCommand::Join { session, reply })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        rx.await.map_err(|_| ProtocolError::ConnectionClosed)
    }

    pub async fn leave(&self, session: SessionId) {
        let _ = self.tx.send(HostCommand::Leave { session }).await;
    }

    pub async fn touch(&self, session: SessionId) {
        let _ = self.tx.send(HostCommand::Touch { session }).await;
    }

    /// Canonical snapshot of the room.
    pub async fn snapshot(&self) -> Result<RoomState, ProtocolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HostCommand::Snapshot { reply })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        rx.await.map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Submits a batch for application. The host broadcasts the applied
    /// prefix to all other sessions before replying.
    pub async fn apply(
        &self,
        session: SessionId,
        operations: Vec<Operation>,
    ) -> Result<ApplyReport, ProtocolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HostCommand::Apply { session, operations, reply })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        rx.await.map_err(|_| ProtocolError::ConnectionClosed)
    }
}

/// The host task state.
pub struct RoomHost {
    state: RoomState,
    sessions: SessionRegistry,
    store: Arc<dyn RoomStore>,
    config: HostConfig,
    rx: mpsc::Receiver<HostCommand>,
}

impl RoomHost {
    /// Loads (or seeds) the room and spawns its host task.
    pub fn spawn(
        room_id: RoomId,
        store: Arc<dyn RoomStore>,
        config: HostConfig,
    ) -> Result<HostHandle, StoreError> {
        let state = match store.get(&room_id)? {
            Some(state) => state,
            None => {
                let seeded = if config.seed_demo_room {
                    demo_room_state(room_id.clone())
                } else {
                    empty_room_state(room_id.clone())
                };
                store.put(&seeded)?;
                log::info!("seeded new room {room_id}");
                seeded
            }
        };

        let (tx, rx) = mpsc::channel(256);
        let host = RoomHost {
            sessions: SessionRegistry::new(config.broadcast_capacity),
            state,
            store,
            config,
            rx,
        };
        let handle = HostHandle { room_id: room_id.clone(), tx };
        tokio::spawn(host.run());
        log::info!("room host started for {room_id}");
        Ok(handle)
    }

    async fn run(mut self) {
        let mut prune = tokio::time::interval(self.config.prune_interval);
        prune.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }
                _ = prune.tick() => {
                    for session in self.sessions.prune_idle(self.config.max_idle) {
                        log::debug!("pruned idle session {session} from room {}", self.state.id);
                    }
                }
            }
        }
        log::info!("room host stopped for {}", self.state.id);
    }

    fn handle(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::Join { session, reply } => {
                let rx = self.sessions.join(session);
                log::debug!(
                    "session {session} joined room {} ({} sessions)",
                    self.state.id,
                    self.sessions.session_count()
                );
                let _ = reply.send(rx);
            }
            HostCommand::Leave { session } => {
                if self.sessions.leave(session) {
                    log::debug!(
                        "session {session} left room {} ({} sessions)",
                        self.state.id,
                        self.sessions.session_count()
                    );
                }
            }
            HostCommand::Touch { session } => self.sessions.touch(session),
            HostCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.canonical());
            }
            HostCommand::Apply { session, operations, reply } => {
                let report = self.apply_batch(session, operations);
                let _ = reply.send(report);
            }
        }
    }

    fn apply_batch(&mut self, session: SessionId, operations: Vec<Operation>) -> ApplyReport {
        self.sessions.touch(session);

        let mut applied: Vec<Operation> = Vec::with_capacity(operations.len());
        let mut created_layouts = Vec::new();
        let mut failure = None;

        for op in operations {
            // rollback point for a persist failure mid-batch
            let checkpoint = self.state.clone();

            if let Err(err) = apply_operation(&mut self.state, &op) {
                log::debug!("rejected operation {} on room {}: {err}", op.op_id(), self.state.id);
                failure = Some(ApplyFailure { code: err.code(), message: err.to_string() });
                break;
            }

            if op.mutates_room() {
                self.state.updated_at = now_ms();
                if let Err(err) = self.store.put(&self.state) {
                    log::error!("failed to persist room {}: {err}", self.state.id);
                    self.state = checkpoint;
                    failure = Some(ApplyFailure {
                        code: codes::INTERNAL,
                        message: format!("persistence failure: {err}"),
                    });
                    break;
                }
            }

            if let Some(layout) = op.created_layout() {
                created_layouts.push(layout.clone());
            }
            applied.push(op);
        }

        let applied_count = applied.len();
        if applied_count > 0 {
            match ServerMessage::sync_operations(applied).encode() {
                Ok(encoded) => {
                    self.sessions.broadcast(Some(session), Arc::new(encoded));
                }
                Err(err) => {
                    log::error!("failed to encode broadcast for room {}: {err}", self.state.id);
                }
            }
        }

        ApplyReport { applied: applied_count, created_layouts, failure }
    }
}
