//! Parlor production server.
//!
//! This crate provides the production runtime around `parlor-core`:
//! - Tokio TCP transport with a line-oriented text protocol
//! - Channel-backed sessions with bounded outbound queues
//! - OS-entropy environment for the dice/coin commands
//! - File-backed mute-list persistence
//!
//! ## Architecture
//!
//! ```text
//! parlor-server
//!   ├─ SystemEnv        (OS entropy via getrandom)
//!   ├─ TCP listener     (one task per connection, semaphore-capped)
//!   ├─ ChannelSession   (bounded outbound queue + writer task)
//!   ├─ FileMuteStore    (one mute-list file per owner)
//!   └─ parlor-core      (RoomDirectory, Room, command grammar)
//! ```
//!
//! ## Wire protocol
//!
//! UTF-8 lines. The first non-empty line from a client registers its
//! display name; every later line is routed to the session's current room,
//! where the in-band `/` commands apply. Outbound chat is
//! `<sender>: <body>`, system events are `* <name> <detail>` lines.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod session;
mod storage;
mod system_env;

use std::sync::Arc;

pub use error::ServerError;
use parlor_core::{Environment, RoomDirectory, SessionId, SessionRef};
pub use session::{ChannelSession, OUTBOUND_CAPACITY};
pub use storage::FileMuteStore;
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::Semaphore,
};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3000")
    pub bind_address: String,
    /// Name of the default room sessions land in
    pub default_room: String,
    /// Directory holding persisted mute lists
    pub mute_dir: std::path::PathBuf,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            default_room: "lobby".to_string(),
            mute_dir: std::path::PathBuf::from("mute-lists"),
            max_connections: 10000,
        }
    }
}

/// Production Parlor server.
///
/// Owns the room directory for its process lifetime and accepts
/// line-protocol TCP connections into it.
pub struct Server {
    listener: TcpListener,
    directory: Arc<RoomDirectory>,
    env: Arc<SystemEnv>,
    semaphore: Arc<Semaphore>,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be positive".to_string()));
        }
        let listener = TcpListener::bind(&config.bind_address).await?;
        let env = Arc::new(SystemEnv::new());
        let mute_store = Arc::new(FileMuteStore::new(config.mute_dir));
        let directory = RoomDirectory::new(&config.default_room, env.clone(), mute_store);

        Ok(Self {
            listener,
            directory,
            env,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the room directory.
    pub fn directory(&self) -> Arc<RoomDirectory> {
        Arc::clone(&self.directory)
    }

    /// Run the server, accepting connections and routing their lines.
    ///
    /// This method runs until an unrecoverable listener error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server listening on {}", self.listener.local_addr()?);

        loop {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))?;

            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!("accepted connection from {addr}");
                    let directory = Arc::clone(&self.directory);
                    let env = Arc::clone(&self.env);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, directory, env).await {
                            tracing::debug!("connection error: {e}");
                        }
                        drop(permit);
                    });
                },
                Err(e) => {
                    tracing::error!("accept error: {e}");
                },
            }
        }
    }
}

/// Handle a single client connection.
///
/// The session is placed in the default room immediately (nameless, so no
/// roster sync yet); the first non-empty line registers its display name
/// and triggers the join protocol. Every later line goes to the current
/// room. Disconnect, read errors, and a dead writer all end in the same
/// place: the session leaves its room.
async fn handle_connection(
    stream: TcpStream,
    directory: Arc<RoomDirectory>,
    env: Arc<SystemEnv>,
) -> Result<(), ServerError> {
    let peer = stream.peer_addr()?;
    let (read_half, mut write_half) = stream.into_split();

    let id = SessionId(env.random_u64());
    let (session, mut outbound) = ChannelSession::new(id);
    let session_ref: SessionRef = session.clone();

    // Writer task: drain the bounded queue onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(line) = outbound.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\r\n").await.is_err() {
                break;
            }
        }
    });

    directory.join_default_room(&session_ref);
    tracing::debug!("session {id} from {peer} placed in {}", directory.default_room().name());

    let mut lines = BufReader::new(read_half).lines();
    let mut registered = false;

    while let Ok(Some(line)) = lines.next_line().await {
        if !registered {
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            session.set_display_name(name);
            registered = true;
            tracing::info!("session {id} registered as {name}");
            if let Some(room) = session_ref.current_room() {
                room.sync_client(&session_ref);
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        match session_ref.current_room() {
            Some(room) => room.send_message(&session_ref, &line),
            None => {
                // Stranded: the room closed under us. Migrate to the
                // default room and route there.
                directory.join_default_room(&session_ref);
                if let Some(room) = session_ref.current_room() {
                    room.send_message(&session_ref, &line);
                }
            },
        }
    }

    if let Some(room) = session_ref.current_room() {
        room.remove_client(&session_ref);
    }
    tracing::debug!("session {id} disconnected");
    writer.abort();

    Ok(())
}
