//! WebSocket sync server with one host task per room.
//!
//! Architecture:
//! ```text
//! Device A ──┐
//!             ├── SyncServer ── RoomHost (room r-…) ── RoomState
//! Device B ──┘        │              │                    │
//!                     │              ├── SessionRegistry  │
//!                     │              │      (fan-out)     │
//!                     │              └── RoomStore ───────┘
//!                     │                   (RocksDB)
//!              host directory
//!              (lazy spawn per room)
//! ```
//!
//! Each connection serves exactly one device in exactly one room. The
//! connection task decodes client messages, forwards them to the room's
//! host, and pumps broadcast frames back out — it never touches room
//! state directly.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use habitat_room::{codes, RoomId};

use crate::broadcast::Frame;
use crate::host::{HostConfig, HostHandle, RoomHost};
use crate::protocol::{ClientMessage, ServerMessage, SessionId};
use crate::storage::{MemoryRoomStore, RocksRoomStore, RoomStore, StoreConfig, StoreError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Persistence storage path (None = in-memory only)
    pub storage_path: Option<PathBuf>,
    /// Per-room host behavior
    pub host: HostConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9098".to_string(),
            storage_path: None,
            host: HostConfig::default(),
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_messages: u64,
    pub total_bytes: u64,
    pub active_rooms: usize,
}

/// The sync server.
pub struct SyncServer {
    config: ServerConfig,
    /// Host directory: room id → host handle, spawned lazily on first join
    hosts: Arc<RwLock<HashMap<RoomId, HostHandle>>>,
    stats: Arc<RwLock<ServerStats>>,
    store: Arc<dyn RoomStore>,
}

impl SyncServer {
    /// Creates a server. Opens RocksDB when a storage path is configured,
    /// otherwise rooms live in memory only.
    pub fn new(config: ServerConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn RoomStore> = match &config.storage_path {
            Some(path) => {
                let store_config = StoreConfig { path: path.clone(), ..StoreConfig::default() };
                Arc::new(RocksRoomStore::open(store_config)?)
            }
            None => Arc::new(MemoryRoomStore::new()),
        };

        Ok(Self {
            config,
            hosts: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(ServerStats::default())),
            store,
        })
    }

    /// In-memory server with default configuration.
    pub fn with_defaults() -> Self {
        // a memory store cannot fail to open
        match Self::new(ServerConfig::default()) {
            Ok(server) => server,
            Err(_) => unreachable!("in-memory server construction is infallible"),
        }
    }

    /// Persistent server at the given bind address and storage path.
    pub fn with_storage(
        bind_addr: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        Self::new(ServerConfig {
            bind_addr: bind_addr.into(),
            storage_path: Some(path.into()),
            ..ServerConfig::default()
        })
    }

    /// Runs the accept loop. Call from an async runtime; never returns
    /// except on listener failure.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("sync server listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("new TCP connection from {addr}");

            let hosts = self.hosts.clone();
            let stats = self.stats.clone();
            let config = self.config.clone();
            let store = self.store.clone();

            tokio::spawn(async move {
                if let Err(e) =
                    Self::handle_connection(stream, addr, hosts, stats, config, store).await
                {
                    log::error!("connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Looks up a room's host, spawning it (and loading or seeding the
    /// room) on first contact.
    async fn get_or_spawn_host(
        hosts: &Arc<RwLock<HashMap<RoomId, HostHandle>>>,
        store: &Arc<dyn RoomStore>,
        host_config: &HostConfig,
        room_id: &RoomId,
    ) -> Result<HostHandle, StoreError> {
        {
            let hosts_r = hosts.read().await;
            if let Some(handle) = hosts_r.get(room_id) {
                return Ok(handle.clone());
            }
        }

        let mut hosts_w = hosts.write().await;
        // double-check after acquiring the write lock
        if let Some(handle) = hosts_w.get(room_id) {
            return Ok(handle.clone());
        }

        let handle = RoomHost::spawn(room_id.clone(), store.clone(), host_config.clone())?;
        hosts_w.insert(room_id.clone(), handle.clone());
        Ok(handle)
    }

    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        hosts: Arc<RwLock<HashMap<RoomId, HostHandle>>>,
        stats: Arc<RwLock<ServerStats>>,
        config: ServerConfig,
        store: Arc<dyn RoomStore>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let session = SessionId::generate();
        log::info!("session {session} connected from {addr}");

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        // The room this connection joined, if any. One room per connection.
        let mut joined: Option<HostHandle> = None;
        let mut frame_rx: Option<tokio::sync::broadcast::Receiver<Frame>> = None;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            {
                                let mut s = stats.write().await;
                                s.total_messages += 1;
                                s.total_bytes += text.len() as u64;
                            }

                            let client_msg = match ClientMessage::decode(&text) {
                                Ok(msg) => msg,
                                Err(e) => {
                                    // a malformed message is the sender's problem,
                                    // not grounds for dropping the connection
                                    log::warn!("bad message from session {session}: {e}");
                                    let reply = ServerMessage::error(
                                        None,
                                        codes::VALIDATION,
                                        format!("malformed message: {e}"),
                                    );
                                    ws_sender.send(Message::Text(reply.encode()?.into())).await?;
                                    continue;
                                }
                            };

                            match client_msg {
                                ClientMessage::Ping(ping) => {
                                    if let Some(host) = &joined {
                                        host.touch(session).await;
                                    }
                                    let reply = ServerMessage::ack(Some(ping.message_id));
                                    ws_sender.send(Message::Text(reply.encode()?.into())).await?;
                                }

                                ClientMessage::RequestRoom(req) => {
                                    // re-requesting is a resync; switching rooms
                                    // leaves the old one first
                                    if let Some(old) = &joined {
                                        if old.room_id() != &req.room_id {
                                            old.leave(session).await;
                                            joined = None;
                                            frame_rx = None;
                                        }
                                    }

                                    let host_result = Self::get_or_spawn_host(
                                        &hosts, &store, &config.host, &req.room_id,
                                    )
                                    .await;
                                    let host = match host_result {
                                        Ok(host) => host,
                                        Err(StoreError::UnsupportedVersion(v)) => {
                                            let reply = ServerMessage::error(
                                                Some(req.message_id),
                                                codes::UNSUPPORTED_VERSION,
                                                format!("room document version {v} is not supported"),
                                            );
                                            ws_sender.send(Message::Text(reply.encode()?.into())).await?;
                                            continue;
                                        }
                                        Err(e) => {
                                            log::error!("failed to open room {}: {e}", req.room_id);
                                            let reply = ServerMessage::error(
                                                Some(req.message_id),
                                                codes::INTERNAL,
                                                "failed to open room",
                                            );
                                            ws_sender.send(Message::Text(reply.encode()?.into())).await?;
                                            continue;
                                        }
                                    };

                                    if joined.is_none() {
                                        frame_rx = Some(host.join(session).await?);
                                        {
                                            let mut s = stats.write().await;
                                            s.active_rooms = hosts.read().await.len();
                                        }
                                    }
                                    let snapshot = host.snapshot().await?;
                                    joined = Some(host);

                                    let reply =
                                        ServerMessage::room_update(Some(req.message_id), &snapshot);
                                    ws_sender.send(Message::Text(reply.encode()?.into())).await?;
                                }

                                ClientMessage::ApplyOperations(batch) => {
                                    let host = match &joined {
                                        Some(host) => host,
                                        None => {
                                            let reply = ServerMessage::error(
                                                Some(batch.message_id),
                                                codes::VALIDATION,
                                                "no room joined; send requestRoom first",
                                            );
                                            ws_sender.send(Message::Text(reply.encode()?.into())).await?;
                                            continue;
                                        }
                                    };

                                    let report = host.apply(session, batch.operations).await?;

                                    for layout in report.created_layouts {
                                        let note = ServerMessage::layout_created(
                                            Some(batch.message_id.clone()),
                                            layout,
                                        );
                                        ws_sender.send(Message::Text(note.encode()?.into())).await?;
                                    }

                                    let reply = match report.failure {
                                        Some(failure) => ServerMessage::error(
                                            Some(batch.message_id),
                                            failure.code,
                                            failure.message,
                                        ),
                                        None => ServerMessage::ack(Some(batch.message_id)),
                                    };
                                    ws_sender.send(Message::Text(reply.encode()?.into())).await?;
                                }
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("session {session} disconnected ({addr})");
                            break;
                        }

                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                        }

                        Some(Err(e)) => {
                            log::warn!("websocket error from session {session}: {e}");
                            break;
                        }

                        _ => {}
                    }
                }

                frame = async {
                    match frame_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        // not joined yet — wait forever
                        None => std::future::pending().await,
                    }
                } => {
                    match frame {
                        Ok(frame) => {
                            if frame.is_for(session) {
                                ws_sender
                                    .send(Message::Text(frame.payload.as_str().to_string().into()))
                                    .await?;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            // fell behind the fan-out; resync with a fresh snapshot
                            log::warn!("session {session} lagged by {n} frames, resyncing");
                            if let Some(host) = &joined {
                                let snapshot = host.snapshot().await?;
                                let reply = ServerMessage::room_update(None, &snapshot);
                                ws_sender.send(Message::Text(reply.encode()?.into())).await?;
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        }

        if let Some(host) = &joined {
            host.leave(session).await;
        }
        {
            let mut s = stats.write().await;
            s.active_connections = s.active_connections.saturating_sub(1);
        }

        Ok(())
    }

    /// Server-wide statistics snapshot.
    pub async fn stats(&self) -> ServerStats {
        self.stats.read().await.clone()
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Rooms with a running host.
    pub async fn active_rooms(&self) -> Vec<RoomId> {
        self.hosts.read().await.keys().cloned().collect()
    }

    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }
}
