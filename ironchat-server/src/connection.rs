//! Per-connection read/respond state machine.
//!
//! A connection reads one line at a time and reacts to it according to its
//! [`ConnectionState`]. Everything it writes goes through its own outbound
//! queue, which a single writer task drains into the transport, so frames
//! from different broadcasters are never interleaved on the wire.

use crate::builder::ServerEvent;
use crate::registry::Registry;
use crate::session::SessionManager;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use ironchat_channel::outbound::{self, OutboundReceiver, OutboundSender};
use ironchat_channel::{ChannelError, EventSender};
use ironchat_core::{ChatLine, ConnectionId, Inbound};
use ironchat_transport::tcp::{LineReader, LineWriter, TcpConnection, shutdown_writer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the first non-empty line, taken as the display name.
    AwaitingName,
    /// Registered; every non-empty line is broadcast.
    Chatting {
        /// Display name the connection registered with.
        name: String,
    },
    /// Finished. No further lines are processed.
    Terminated,
}

impl ConnectionState {
    /// Returns the registered name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Chatting { name } => Some(name),
            Self::AwaitingName | Self::Terminated => None,
        }
    }
}

/// Non-owning handle to a connection, stored in the registry.
///
/// Delivering through a `Peer` never touches the transport directly: the
/// frame is queued and written by the connection's own writer.
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    outbound: OutboundSender,
}

impl Peer {
    /// Creates a handle for connection `id` feeding `outbound`.
    #[must_use]
    pub fn new(id: ConnectionId, outbound: OutboundSender) -> Self {
        Self { id, outbound }
    }

    /// Returns the connection ID.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an encoded frame for the connection.
    ///
    /// # Errors
    /// Returns the frame if the connection's writer has stopped.
    pub fn deliver(&self, frame: Bytes) -> Result<(), ChannelError<Bytes>> {
        self.outbound.send(frame)
    }
}

/// State shared by every connection of one server run.
pub(crate) struct ServerContext {
    pub(crate) registry: Registry<Peer>,
    pub(crate) sessions: SessionManager,
    events: EventSender<ServerEvent>,
}

impl ServerContext {
    pub(crate) fn new(events: EventSender<ServerEvent>) -> Self {
        Self {
            registry: Registry::new(),
            sessions: SessionManager::new(),
            events,
        }
    }

    /// Reports an event to the observer. Never blocks.
    pub(crate) fn emit(&self, event: ServerEvent) {
        if let Err(e) = self.events.emit(event) {
            tracing::trace!("Observer event not delivered: {}", e);
        }
    }
}

/// What the read loop does after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Terminate,
}

pub(crate) struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    peer: Peer,
    ctx: Arc<ServerContext>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, outbound: OutboundSender, ctx: Arc<ServerContext>) -> Self {
        Self {
            id,
            state: ConnectionState::AwaitingName,
            peer: Peer::new(id, outbound),
            ctx,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Handles one inbound line, delimiter already removed.
    pub(crate) fn on_line(&mut self, line: &str) -> Flow {
        match Inbound::classify(line) {
            Inbound::Empty => {
                tracing::trace!("Session {} sent an empty line", self.id);
                Flow::Continue
            }
            Inbound::Exit => {
                tracing::debug!("Session {} sent the exit sentinel", self.id);
                Flow::Terminate
            }
            Inbound::Text(text) => match &self.state {
                ConnectionState::AwaitingName => {
                    self.register(text);
                    Flow::Continue
                }
                ConnectionState::Chatting { name } => {
                    broadcast(&self.ctx.registry, name, text);
                    Flow::Continue
                }
                ConnectionState::Terminated => Flow::Terminate,
            },
        }
    }

    fn register(&mut self, name: &str) {
        if let Some(displaced) = self.ctx.registry.insert(name, self.peer.clone()) {
            tracing::info!(
                "Session {} took over name {:?} from session {}",
                self.id,
                name,
                displaced.id()
            );
        }
        self.ctx.sessions.set_name(self.id, name);
        tracing::info!("Session {} registered as {:?}", self.id, name);

        self.state = ConnectionState::Chatting {
            name: name.to_owned(),
        };
        self.ctx
            .emit(ServerEvent::Registered(self.id, name.to_owned()));
    }

    /// Moves to `Terminated`, removing the registry entry if it is still ours.
    pub(crate) fn deregister(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Terminated);
        if let ConnectionState::Chatting { name } = previous {
            let id = self.id;
            if self
                .ctx
                .registry
                .remove_if(&name, |peer| peer.id() == id)
                .is_some()
            {
                tracing::debug!("Session {} deregistered {:?}", id, name);
            }
        }
    }
}

/// Queues `"<sender>: <text>\n"` for every registered peer but `sender`.
///
/// Returns the number of peers the line was queued for.
fn broadcast(registry: &Registry<Peer>, sender: &str, text: &str) -> usize {
    let frame = match ChatLine::new(sender, text) {
        Ok(line) => line.encode(),
        Err(e) => {
            tracing::warn!("Not broadcasting line from {:?}: {}", sender, e);
            return 0;
        }
    };

    let mut queued = 0;
    for (name, peer) in registry.snapshot_excluding(sender) {
        match peer.deliver(frame.clone()) {
            Ok(()) => queued += 1,
            Err(e) => tracing::debug!(
                "Line for {:?} (session {}) dropped: {}",
                name,
                peer.id(),
                e
            ),
        }
    }
    tracing::trace!("Line from {:?} queued for {} peers", sender, queued);
    queued
}

/// Drives one accepted connection until it terminates.
///
/// The session entry `id` must already exist; `serve` releases it.
pub(crate) async fn serve(
    conn: TcpConnection,
    id: ConnectionId,
    close: CancellationToken,
    ctx: Arc<ServerContext>,
) {
    let peer_addr = conn.peer_addr();
    tracing::info!("Session {} connected from {}", id, peer_addr);
    ctx.emit(ServerEvent::SessionCreated(id, peer_addr));

    let (reader, writer) = conn.into_split();
    let (outbound, queue) = outbound::channel();
    let stop_writer = CancellationToken::new();
    let writer_task = tokio::spawn(write_loop(id, writer, queue, stop_writer.clone()));

    let mut connection = Connection::new(id, outbound, Arc::clone(&ctx));
    read_loop(&mut connection, reader, &close).await;

    // Registry entry goes first so no broadcast can target a dying transport
    connection.deregister();
    drop(connection);

    stop_writer.cancel();
    match writer_task.await {
        Ok(mut writer) => {
            if let Err(e) = shutdown_writer(&mut writer).await {
                if e.is_disconnect() {
                    tracing::debug!("Session {} shutdown: {}", id, e);
                } else {
                    tracing::warn!("Session {} shutdown failed: {}", id, e);
                }
            }
        }
        Err(e) => tracing::warn!("Session {} writer task failed: {}", id, e),
    }

    ctx.sessions.release(id);
    tracing::info!("Session {} disconnected", id);
    ctx.emit(ServerEvent::SessionClosed(id));
}

async fn read_loop(connection: &mut Connection, mut reader: LineReader, close: &CancellationToken) {
    let id = connection.id;
    loop {
        let next = tokio::select! {
            biased;
            () = close.cancelled() => {
                tracing::debug!("Session {} closed by server", id);
                return;
            }
            next = reader.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                tracing::trace!("Session {} read {} bytes", id, line.len());
                if connection.on_line(&line) == Flow::Terminate {
                    return;
                }
            }
            Some(Err(e)) if e.is_disconnect() => {
                tracing::debug!("Session {} read ended: {}", id, e);
                return;
            }
            Some(Err(e)) => {
                tracing::warn!("Session {} read error: {}", id, e);
                return;
            }
            None => {
                tracing::debug!("Session {} closed by peer", id);
                return;
            }
        }
    }
}

/// Drains the outbound queue, one write at a time, until told to stop.
///
/// Hands the writer back so the caller can shut the transport down.
async fn write_loop(
    id: ConnectionId,
    mut writer: LineWriter,
    mut queue: OutboundReceiver,
    stop: CancellationToken,
) -> LineWriter {
    loop {
        let frame = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let written = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            written = writer.send(frame) => written,
        };

        if let Err(e) = written {
            if e.is_disconnect() {
                tracing::debug!("Session {} write ended: {}", id, e);
            } else {
                tracing::warn!("Session {} write error: {}", id, e);
            }
            break;
        }
    }

    queue.close();
    writer
}
