//! Connection Layer: one pipelined RESP connection run as an actor.
//!
//! Callers hand a command plus a oneshot reply to the actor. The actor writes
//! commands in arrival order and completes replies FIFO, since the server
//! answers a single connection strictly in order.

use std::collections::VecDeque;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_util::codec::Framed;

use crate::config::StoreConfig;
use crate::store::protocol::{RespCodec, RespCommand, RespValue};
use crate::store::{StoreError, StoreResult};

// ==========================================
// ACTOR COMMANDS
// ==========================================

struct Request {
    command: RespCommand,
    reply: oneshot::Sender<StoreResult<RespValue>>,
}

// ==========================================
// CONNECTION HANDLE
// ==========================================

/// Cheap to clone: all clones share the same actor.
#[derive(Clone)]
pub struct RespConnection {
    tx: mpsc::Sender<Request>,
}

impl RespConnection {
    /// Open the TCP connection, spawn the actor, then authenticate and select the database.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = time::timeout(config.connect_timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| StoreError::Timeout(config.connect_timeout_ms))?
            .map_err(|e| StoreError::Connection(format!("{}: {}", addr, e)))?;
        let _ = stream.set_nodelay(true);

        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        tokio::spawn(run_connection(Framed::new(stream, RespCodec::new()), rx));
        let conn = Self { tx };

        if let Some(password) = &config.password {
            conn.call(RespCommand::new(["AUTH", password.as_str()])).await?;
        }
        if config.db != 0 {
            conn.call(RespCommand::new(["SELECT".to_string(), config.db.to_string()])).await?;
        }

        tracing::info!("[Store] Connected to {} (db {})", addr, config.db);
        Ok(conn)
    }

    /// Send one command and wait for its reply. Error replies become `StoreError::Server`.
    pub async fn call(&self, command: RespCommand) -> StoreResult<RespValue> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| StoreError::Disconnected)?;
        rx.await.map_err(|_| StoreError::Disconnected)?
    }

    /// True once the actor has stopped; the handle must be replaced.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ==========================================
// ACTOR LOOP
// ==========================================

async fn run_connection(
    mut framed: Framed<TcpStream, RespCodec>,
    mut rx: mpsc::Receiver<Request>,
) {
    let mut pending: VecDeque<oneshot::Sender<StoreResult<RespValue>>> = VecDeque::new();

    loop {
        tokio::select! {
            request = rx.recv() => {
                let Some(request) = request else { break };
                let name = request.command.name();
                if let Err(err) = framed.send(request.command).await {
                    tracing::warn!(command = %name, "[Store] Write failed: {}", err);
                    let _ = request.reply.send(Err(StoreError::Protocol(err)));
                    break;
                }
                pending.push_back(request.reply);
            }
            frame = framed.next(), if !pending.is_empty() => {
                match frame {
                    Some(Ok(value)) => {
                        if let Some(reply) = pending.pop_front() {
                            let result = match value {
                                RespValue::Error(msg) => Err(StoreError::Server(msg)),
                                other => Ok(other),
                            };
                            let _ = reply.send(result);
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!("[Store] Read failed: {}", err);
                        break;
                    }
                    None => {
                        tracing::warn!("[Store] Connection closed by server");
                        break;
                    }
                }
            }
        }
    }

    // Stop accepting before failing the backlog so callers reconnect
    rx.close();
    for reply in pending {
        let _ = reply.send(Err(StoreError::Disconnected));
    }
    while let Ok(request) = rx.try_recv() {
        let _ = request.reply.send(Err(StoreError::Disconnected));
    }
}
