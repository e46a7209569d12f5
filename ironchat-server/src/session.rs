//! Connection table.
//!
//! Every accepted connection gets an entry keyed by its [`ConnectionId`].
//! The connection's task owns the transport; the table owns the bookkeeping
//! and the token used to ask the connection to terminate. Removing the entry
//! is the single release point of a connection.

use ironchat_core::ConnectionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Session information.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID.
    pub id: ConnectionId,
    /// Peer address.
    pub peer_addr: SocketAddr,
    /// Creation timestamp (nanos since epoch).
    pub created_at: u64,
    /// Registered display name, once the handshake line has arrived.
    pub name: Option<String>,
}

struct Entry {
    session: Session,
    close: CancellationToken,
}

/// Manages live connections.
pub struct SessionManager {
    sessions: RwLock<HashMap<ConnectionId, Entry>>,
    next_id: AtomicU64,
    /// Parent of every per-session token.
    closing: CancellationToken,
    drained: Notify,
}

impl SessionManager {
    /// Creates a new session manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closing: CancellationToken::new(),
            drained: Notify::new(),
        }
    }

    /// Creates a new session.
    ///
    /// Returns its ID and the token the connection must watch; the token
    /// fires when the session is asked to close.
    pub fn create_session(&self, peer_addr: SocketAddr) -> (ConnectionId, CancellationToken) {
        let mut sessions = self.sessions.write();
        self.insert_entry(&mut sessions, peer_addr)
    }

    /// Creates a new session unless `max` sessions are already live.
    ///
    /// The count and the insert happen under one lock, so concurrent callers
    /// never exceed the limit.
    pub fn try_create_session(
        &self,
        peer_addr: SocketAddr,
        max: Option<usize>,
    ) -> Option<(ConnectionId, CancellationToken)> {
        let mut sessions = self.sessions.write();
        if max.is_some_and(|max| sessions.len() >= max) {
            return None;
        }
        Some(self.insert_entry(&mut sessions, peer_addr))
    }

    fn insert_entry(
        &self,
        sessions: &mut HashMap<ConnectionId, Entry>,
        peer_addr: SocketAddr,
    ) -> (ConnectionId, CancellationToken) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let close = self.closing.child_token();

        let session = Session {
            id,
            peer_addr,
            created_at: now_nanos(),
            name: None,
        };

        sessions.insert(
            id,
            Entry {
                session,
                close: close.clone(),
            },
        );
        (id, close)
    }

    /// Records the display name of a session.
    pub fn set_name(&self, id: ConnectionId, name: &str) {
        if let Some(entry) = self.sessions.write().get_mut(&id) {
            entry.session.name = Some(name.to_owned());
        }
    }

    /// Asks one session to terminate. Returns false if it is unknown.
    pub fn request_close(&self, id: ConnectionId) -> bool {
        match self.sessions.read().get(&id) {
            Some(entry) => {
                entry.close.cancel();
                true
            }
            None => false,
        }
    }

    /// Asks every current and future session to terminate.
    ///
    /// Returns the number of sessions open at the time of the call.
    pub fn close_all(&self) -> usize {
        self.closing.cancel();
        self.count()
    }

    /// Returns true once `close_all` has been called.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Removes a session from the table.
    ///
    /// Called by the connection itself as the last step of its teardown.
    pub fn release(&self, id: ConnectionId) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(&id).map(|entry| entry.session);
        if sessions.is_empty() {
            self.drained.notify_waiters();
        }
        removed
    }

    /// Waits until the table is empty.
    pub async fn wait_until_empty(&self) {
        loop {
            // Registered before the check so a release in between is not missed
            let notified = self.drained.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Gets a session by ID.
    #[must_use]
    pub fn get_session(&self, id: ConnectionId) -> Option<Session> {
        self.sessions.read().get(&id).map(|entry| entry.session.clone())
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns all session IDs.
    #[must_use]
    pub fn session_ids(&self) -> Vec<ConnectionId> {
        self.sessions.read().keys().copied().collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
