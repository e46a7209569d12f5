//! Server builder and main server implementation.

use crate::acceptor::Acceptor;
use crate::connection::ServerContext;
use crate::error::ServerError;
use ironchat_channel::events::{self, EventReceiver};
use ironchat_core::{ConnectionId, DEFAULT_MAX_LINE_LENGTH};
use ironchat_transport::Executor;
use ironchat_transport::tcp::{TcpServer, TcpServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3333;

/// Default number of executor worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 3;

/// Builder for configuring and creating a server.
#[derive(Debug, Clone)]
pub struct ServerBuilder {
    bind_addr: SocketAddr,
    worker_threads: usize,
    max_connections: Option<usize>,
    max_line_length: usize,
    event_capacity: usize,
    drain_timeout: Duration,
    shutdown_grace: Duration,
    tcp_nodelay: bool,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            worker_threads: DEFAULT_WORKER_THREADS,
            max_connections: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            event_capacity: 4096,
            drain_timeout: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(5),
            tcp_nodelay: true,
        }
    }

    /// Sets the bind address.
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the number of executor worker threads.
    #[must_use]
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count;
        self
    }

    /// Limits the number of simultaneous connections. Unlimited by default.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Sets the maximum line length, delimiter excluded.
    #[must_use]
    pub fn max_line_length(mut self, size: usize) -> Self {
        self.max_line_length = size;
        self
    }

    /// Sets the observer event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets how long `stop` waits for open connections to wind down.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Sets how long `stop` waits for worker threads to exit.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Enables or disables `TCP_NODELAY` on accepted connections.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Returns the configured bind address.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Builds the server and handle. Nothing is bound until [`Server::start`].
    #[must_use]
    pub fn build(self) -> (Server, ServerHandle) {
        let (event_tx, event_rx) = events::channel(self.event_capacity);
        let ctx = Arc::new(ServerContext::new(event_tx));
        let accepting = CancellationToken::new();

        let handle = ServerHandle {
            ctx: Arc::clone(&ctx),
            accepting: accepting.clone(),
            event_rx,
        };

        let server = Server {
            config: self,
            ctx,
            accepting,
            executor: None,
            local_addr: None,
            stopped: false,
        };

        (server, handle)
    }

    fn validate(&self) -> Result<(), ServerError> {
        if self.worker_threads == 0 {
            return Err(ServerError::config("worker_threads must be at least 1"));
        }
        if self.max_line_length == 0 {
            return Err(ServerError::config("max_line_length must be at least 1"));
        }
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The main server instance.
///
/// Owns the executor for one run: [`start`](Self::start) binds and begins
/// accepting, [`stop`](Self::stop) closes every connection and joins the
/// worker threads. A stopped server cannot be restarted.
pub struct Server {
    config: ServerBuilder,
    ctx: Arc<ServerContext>,
    accepting: CancellationToken,
    executor: Option<Executor>,
    local_addr: Option<SocketAddr>,
    stopped: bool,
}

impl Server {
    /// Binds the listening endpoint and starts accepting on the executor.
    ///
    /// Returns the address actually bound, which differs from the configured
    /// one when port 0 was requested.
    ///
    /// # Errors
    /// Returns `ServerError` if the server is already running or stopped,
    /// the configuration is invalid, the executor cannot start or the
    /// address cannot be bound.
    pub fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.executor.is_some() {
            return Err(ServerError::AlreadyStarted);
        }
        if self.stopped {
            return Err(ServerError::Shutdown);
        }
        self.config.validate()?;

        let executor = Executor::start(self.config.worker_threads)?;
        let bind_addr = self.config.bind_addr;
        let tcp_config = TcpServerConfig::new(bind_addr)
            .max_line_length(self.config.max_line_length)
            .tcp_nodelay(self.config.tcp_nodelay);

        let bound = {
            let _guard = executor.enter();
            TcpServer::bind(tcp_config).and_then(|server| {
                let local = server.local_addr()?;
                Ok((server, local))
            })
        };
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                tracing::error!("Failed to bind {}: {}", bind_addr, source);
                release_executor(executor, self.config.shutdown_grace);
                return Err(ServerError::Bind {
                    addr: bind_addr,
                    source,
                });
            }
        };

        let acceptor = Acceptor::new(
            listener,
            Arc::clone(&self.ctx),
            self.accepting.clone(),
            self.config.max_connections,
        );
        executor.spawn(acceptor.run());

        tracing::info!(
            "Server listening on {} with {} worker threads",
            local_addr,
            executor.worker_threads()
        );
        self.ctx.emit(ServerEvent::Listening(local_addr));

        self.executor = Some(executor);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Stops the server.
    ///
    /// Stops accepting, asks every connection to terminate, waits up to the
    /// drain timeout for them to finish, then stops the executor. No-op if
    /// the server is not running.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous context.
    pub fn stop(&mut self) {
        let Some(executor) = self.executor.take() else {
            return;
        };
        self.stopped = true;

        self.accepting.cancel();
        let open = self.ctx.sessions.close_all();
        tracing::info!("Stopping server, closing {} sessions", open);

        let ctx = Arc::clone(&self.ctx);
        let drain = self.config.drain_timeout;
        let drained = executor.block_on(async move {
            tokio::time::timeout(drain, ctx.sessions.wait_until_empty())
                .await
                .is_ok()
        });
        if !drained {
            tracing::warn!(
                "{} sessions still open after {:?}, dropping them",
                self.ctx.sessions.count(),
                drain
            );
        }

        executor.stop(self.config.shutdown_grace);
        tracing::info!("Server stopped");
    }

    /// Returns the bound address while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns true between a successful `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.executor.is_some()
    }

    /// Returns the number of executor threads alive, zero when not running.
    #[must_use]
    pub fn live_threads(&self) -> usize {
        self.executor.as_ref().map_or(0, Executor::live_threads)
    }

    /// Returns the executor's live thread counter, `None` when not running.
    ///
    /// The counter outlives the executor, so it still reports after `stop`.
    #[must_use]
    pub fn live_threads_counter(&self) -> Option<Arc<AtomicUsize>> {
        self.executor.as_ref().map(Executor::live_threads_counter)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.executor.is_none() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            // Blocking is not allowed here, skip the drain
            self.accepting.cancel();
            self.ctx.sessions.close_all();
            if let Some(executor) = self.executor.take() {
                executor.stop_background();
            }
        } else {
            self.stop();
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("bind_addr", &self.config.bind_addr)
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .finish()
    }
}

fn release_executor(executor: Executor, grace: Duration) {
    if tokio::runtime::Handle::try_current().is_ok() {
        executor.stop_background();
    } else {
        executor.stop(grace);
    }
}

/// Handle for observing and controlling the server from outside.
pub struct ServerHandle {
    ctx: Arc<ServerContext>,
    accepting: CancellationToken,
    event_rx: EventReceiver<ServerEvent>,
}

impl ServerHandle {
    /// Stops accepting new connections.
    ///
    /// Takes effect after the next accept completes. Open connections are
    /// left alone.
    pub fn shutdown(&self) {
        self.accepting.cancel();
    }

    /// Asks one connection to terminate. Returns false if it is unknown.
    pub fn close_session(&self, id: ConnectionId) -> bool {
        self.ctx.sessions.request_close(id)
    }

    /// Returns the number of registered names.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.ctx.registry.len()
    }

    /// Returns true if a connection is registered under `name`.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.ctx.registry.contains(name)
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.ctx.sessions.count()
    }

    /// Polls for server events.
    pub fn poll_events(&self) -> impl Iterator<Item = ServerEvent> + '_ {
        std::iter::from_fn(|| self.event_rx.try_recv())
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ServerEvent> {
        self.event_rx.recv_timeout(timeout)
    }

    /// Waits up to `timeout` for an event matching `predicate`, discarding
    /// the ones that do not.
    pub fn wait_for_event<F>(&self, timeout: Duration, predicate: F) -> Option<ServerEvent>
    where
        F: FnMut(&ServerEvent) -> bool,
    {
        self.event_rx.wait_for(timeout, predicate)
    }

    /// Returns the number of events dropped because nobody was polling.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.event_rx.dropped()
    }
}

/// Events emitted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The listener is bound.
    Listening(SocketAddr),
    /// A new session was created.
    SessionCreated(ConnectionId, SocketAddr),
    /// A session registered a display name.
    Registered(ConnectionId, String),
    /// A session was closed.
    SessionClosed(ConnectionId),
    /// An error occurred.
    Error(String),
}
