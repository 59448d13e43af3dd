//! AGV session (C7): per-(AGV, port-role) TCP socket lifecycle, framing, and send API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, info, trace, warn};

use crate::error::SessionError;
use crate::protocol::frame::{self, Reframer, SequenceCounter};
use crate::protocol::registry::PortRole;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const READ_TIMEOUT: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Event a session's receive task reports back to the bridge supervisor. A narrow
/// one-way channel, per the "cyclic supervisor-session references" design note: the
/// session never holds a reference back into the supervisor.
#[derive(Debug)]
pub enum SessionEvent {
    Frame {
        serial: String,
        port_role: PortRole,
        message_type: u16,
        body: Vec<u8>,
    },
    PortOpened {
        serial: String,
        port_role: PortRole,
    },
    PortClosed {
        serial: String,
        port_role: PortRole,
    },
}

/// Per-socket write lock: held only across a single `write_all`, so sends are
/// serialised on the wire without ever spanning more than one frame's worth of I/O.
struct PortHandle {
    write_half: AsyncMutex<Option<OwnedWriteHalf>>,
    sequence: SyncMutex<SequenceCounter>,
    state: SyncMutex<SessionState>,
}

impl PortHandle {
    fn new() -> Self {
        Self {
            write_half: AsyncMutex::new(None),
            sequence: SyncMutex::new(SequenceCounter::default()),
            state: SyncMutex::new(SessionState::Disconnected),
        }
    }
}

/// Per-AGV bundle of the five functional TCP sessions.
pub struct AgvSession {
    pub serial: String,
    pub ip: String,
    pub ports: HashMap<PortRole, u16>,
    handles: HashMap<PortRole, Arc<PortHandle>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    shutdown: watch::Receiver<bool>,
}

impl AgvSession {
    pub fn new(
        serial: String,
        ip: String,
        ports: HashMap<PortRole, u16>,
        events: mpsc::UnboundedSender<SessionEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let handles = PortRole::ALL.iter().map(|r| (*r, Arc::new(PortHandle::new()))).collect();
        Self {
            serial,
            ip,
            ports,
            handles,
            events,
            shutdown,
        }
    }

    pub fn state(&self, role: PortRole) -> SessionState {
        *self.handles[&role].state.lock()
    }

    pub fn is_healthy(&self) -> bool {
        PortRole::ALL.iter().any(|r| self.state(*r) == SessionState::Connected)
    }

    /// Attempts to open every port role in parallel. Returns the roles that connected.
    pub async fn open_all(self: &Arc<Self>) -> Vec<PortRole> {
        let mut tasks = Vec::new();
        for role in PortRole::ALL {
            let this = Arc::clone(self);
            tasks.push(tokio::spawn(async move { (role, this.open(role).await.is_ok()) }));
        }
        let mut opened = Vec::new();
        for task in tasks {
            if let Ok((role, ok)) = task.await {
                if ok {
                    opened.push(role);
                }
            }
        }
        opened
    }

    /// Opens a single port role: bounded TCP connect, then spawns the receive task.
    /// Transitions the port's state machine per §4.7.
    pub async fn open(self: &Arc<Self>, role: PortRole) -> Result<(), SessionError> {
        let handle = Arc::clone(&self.handles[&role]);
        *handle.state.lock() = SessionState::Connecting;

        let Some(&port) = self.ports.get(&role) else {
            *handle.state.lock() = SessionState::Failed;
            return Err(SessionError::Closed);
        };
        let addr = format!("{}:{port}", self.ip);

        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                *handle.state.lock() = SessionState::Failed;
                return Err(SessionError::Connect { addr, source: e });
            }
            Err(_) => {
                *handle.state.lock() = SessionState::Failed;
                return Err(SessionError::Connect {
                    addr,
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
                });
            }
        };

        let (read_half, write_half) = stream.into_split();
        *handle.write_half.lock().await = Some(write_half);
        *handle.state.lock() = SessionState::Connected;
        info!(serial = %self.serial, port_role = %role, %addr, "port connected");

        let _ = self.events.send(SessionEvent::PortOpened {
            serial: self.serial.clone(),
            port_role: role,
        });

        let serial = self.serial.clone();
        let events = self.events.clone();
        let shutdown = self.shutdown.clone();
        let handle_for_task = Arc::clone(&handle);
        tokio::spawn(receive_loop(serial, role, read_half, events, shutdown, handle_for_task));

        Ok(())
    }

    /// Sends a body on the given port role, wrapping it in the vendor frame header.
    pub async fn send(&self, role: PortRole, message_type: u16, body: &[u8]) -> Result<(), SessionError> {
        let handle = &self.handles[&role];
        let seq = handle.sequence.lock().next();
        let bytes = frame::encode(seq, message_type, body);

        let mut guard = handle.write_half.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(SessionError::Closed);
        };
        trace!(serial = %self.serial, port_role = %role, message_type, len = bytes.len(), "sending frame");
        if let Err(e) = writer.write_all(&bytes).await {
            *guard = None;
            drop(guard);
            *handle.state.lock() = SessionState::Disconnected;
            return Err(SessionError::Write(e));
        }
        Ok(())
    }

    pub async fn close_all(&self) {
        for role in PortRole::ALL {
            let handle = &self.handles[&role];
            *handle.write_half.lock().await = None;
            *handle.state.lock() = SessionState::Disconnected;
        }
    }
}

async fn receive_loop(
    serial: String,
    role: PortRole,
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
    handle: Arc<PortHandle>,
) {
    let mut reframer = Reframer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!(%serial, port_role = %role, "receive task shutting down");
                    break;
                }
            }
            read = tokio::time::timeout(READ_TIMEOUT, read_half.read(&mut chunk)) => {
                match read {
                    Ok(Ok(0)) => {
                        warn!(%serial, port_role = %role, "remote closed socket");
                        break;
                    }
                    Ok(Ok(n)) => {
                        for f in reframer.feed(&chunk[..n]) {
                            trace!(%serial, port_role = %role, message_type = f.message_type, "frame received");
                            let _ = events.send(SessionEvent::Frame {
                                serial: serial.clone(),
                                port_role: role,
                                message_type: f.message_type,
                                body: f.body,
                            });
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(%serial, port_role = %role, error = %e, "read error");
                        break;
                    }
                    Err(_) => continue, // periodic timeout, just re-check shutdown
                }
            }
        }
    }

    *handle.write_half.lock().await = None;
    *handle.state.lock() = SessionState::Disconnected;
    let _ = events.send(SessionEvent::PortClosed { serial, port_role: role });
}
