//! Client builder and main client implementation.

use crate::error::ClientError;
use crate::session::{self, Outgoing};
use ironchat_channel::events::{self, EventReceiver};
use ironchat_core::DEFAULT_MAX_LINE_LENGTH;
use ironchat_transport::tcp::{self, TcpClientConfig};
use ironchat_transport::{Executor, TransportError};
use std::io::BufRead;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default number of executor worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 5;

/// Builder for configuring and creating a client.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    server_addr: SocketAddr,
    connect_timeout: Duration,
    worker_threads: usize,
    input_capacity: usize,
    event_capacity: usize,
    max_line_length: usize,
    tcp_nodelay: bool,
    shutdown_grace: Duration,
}

impl ClientBuilder {
    /// Creates a new client builder for the specified server address.
    #[must_use]
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            connect_timeout: Duration::from_secs(5),
            worker_threads: DEFAULT_WORKER_THREADS,
            input_capacity: 1,
            event_capacity: 4096,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            tcp_nodelay: true,
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the number of executor worker threads.
    #[must_use]
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count;
        self
    }

    /// Sets how many input lines may wait for the writer.
    #[must_use]
    pub fn input_capacity(mut self, capacity: usize) -> Self {
        self.input_capacity = capacity;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the maximum line length, delimiter excluded.
    #[must_use]
    pub fn max_line_length(mut self, size: usize) -> Self {
        self.max_line_length = size;
        self
    }

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Sets how long dropping the client waits for worker threads to exit.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Returns the configured server address.
    #[must_use]
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Starts the executor, connects and starts the duplex session.
    ///
    /// # Errors
    /// Returns `ClientError` if the configuration is invalid, the executor
    /// cannot start, or the connection fails or times out.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous context.
    pub fn connect(self) -> Result<(Client, ClientHandle), ClientError> {
        if self.input_capacity == 0 {
            return Err(ClientError::config("input_capacity must be at least 1"));
        }
        if self.worker_threads == 0 {
            return Err(ClientError::config("worker_threads must be at least 1"));
        }

        let executor = Executor::start(self.worker_threads)?;
        let tcp_config = TcpClientConfig::new(self.server_addr)
            .connect_timeout(self.connect_timeout)
            .max_line_length(self.max_line_length)
            .tcp_nodelay(self.tcp_nodelay);

        let conn = match executor.block_on(tcp::connect(&tcp_config)) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("Failed to connect to {}: {}", self.server_addr, e);
                executor.stop(self.shutdown_grace);
                return Err(match e {
                    TransportError::ConnectTimeout => ClientError::ConnectTimeout,
                    other => ClientError::Transport(other),
                });
            }
        };
        tracing::info!("Connected to {}", conn.peer_addr());

        let (event_tx, event_rx) = events::channel(self.event_capacity);
        let (input_tx, input_rx) = mpsc::channel(self.input_capacity);
        let closing = executor.shutdown_token().child_token();

        if event_tx.emit(ClientEvent::Connected).is_err() {
            tracing::trace!("Connected event not delivered");
        }

        let (reader, writer) = conn.into_split();
        let read_task = executor.spawn(session::read_loop(
            reader,
            event_tx.clone(),
            closing.clone(),
        ));
        let write_task = executor.spawn(session::write_loop(
            writer,
            input_rx,
            event_tx,
            closing.clone(),
        ));

        let client = Client {
            server_addr: self.server_addr,
            executor: Some(executor),
            closing,
            read_task: Some(read_task),
            write_task: Some(write_task),
            shutdown_grace: self.shutdown_grace,
        };
        let handle = ClientHandle {
            input: input_tx,
            event_rx,
        };

        Ok((client, handle))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 3333)))
    }
}

/// The main client instance.
///
/// Owns the executor running the read and write loops. Dropping the client
/// shuts it down.
pub struct Client {
    server_addr: SocketAddr,
    executor: Option<Executor>,
    closing: CancellationToken,
    read_task: Option<JoinHandle<()>>,
    write_task: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl Client {
    /// Returns the server address.
    #[must_use]
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Returns true while the read loop is running.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.read_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Returns true once both loops have ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let done = |task: &Option<JoinHandle<()>>| task.as_ref().is_none_or(JoinHandle::is_finished);
        done(&self.read_task) && done(&self.write_task)
    }

    /// Blocks until the server closes the connection, up to `timeout`.
    ///
    /// Returns true if the read loop has ended.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous context.
    pub fn wait_for_disconnect(&mut self, timeout: Duration) -> bool {
        let (Some(executor), Some(task)) = (self.executor.as_ref(), self.read_task.as_mut()) else {
            return true;
        };
        if task.is_finished() {
            return true;
        }
        executor.block_on(async { tokio::time::timeout(timeout, task).await.is_ok() })
    }

    /// Shuts the client down.
    ///
    /// Stops both loops, lets the write loop shut the transport down once,
    /// then stops the executor, waiting up to `grace` for each step.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous context.
    pub fn shutdown(&mut self, grace: Duration) {
        let Some(executor) = self.executor.take() else {
            return;
        };
        self.closing.cancel();

        if let Some(task) = self.write_task.take() {
            match executor.block_on(async { tokio::time::timeout(grace, task).await }) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Write loop failed: {}", e),
                Err(_) => tracing::warn!("Write loop still running after {:?}", grace),
            }
        }
        self.read_task = None;

        executor.stop(grace);
        tracing::info!("Client stopped");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if tokio::runtime::Handle::try_current().is_ok() {
            self.closing.cancel();
            if let Some(executor) = self.executor.take() {
                executor.stop_background();
            }
        } else {
            self.shutdown(self.shutdown_grace);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_addr", &self.server_addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Handle for sending lines and receiving events.
pub struct ClientHandle {
    input: mpsc::Sender<Outgoing>,
    event_rx: EventReceiver<ClientEvent>,
}

impl ClientHandle {
    /// Queues one line for the server, waiting while the writer is busy.
    ///
    /// The delimiter is appended by the writer.
    ///
    /// # Errors
    /// Returns `ClientError::ConnectionClosed` once the write loop has ended.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous context.
    pub fn send(&self, line: impl Into<String>) -> Result<(), ClientError> {
        self.input
            .blocking_send(Outgoing::new(line.into()))
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Queues one line without waiting.
    ///
    /// # Errors
    /// Returns `ClientError::Channel` if the writer is busy, or
    /// `ClientError::ConnectionClosed` once the write loop has ended.
    pub fn try_send(&self, line: impl Into<String>) -> Result<(), ClientError> {
        self.input.try_send(Outgoing::new(line.into())).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ClientError::Channel,
            mpsc::error::TrySendError::Closed(_) => ClientError::ConnectionClosed,
        })
    }

    /// Returns true once the write loop has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.input.is_closed()
    }

    /// Starts a thread forwarding every line of `source` to the server.
    ///
    /// The next line is read from `source` only after the previous one has
    /// been written. The thread ends at end of input, after the exit
    /// sentinel, or once the session has ended. A read blocked on `source`
    /// is not interrupted.
    ///
    /// # Errors
    /// Returns IO error if the thread cannot be spawned.
    pub fn spawn_input<R>(&self, source: R) -> std::io::Result<std::thread::JoinHandle<()>>
    where
        R: BufRead + Send + 'static,
    {
        let input = self.input.clone();
        std::thread::Builder::new()
            .name("ironchat-input".to_string())
            .spawn(move || forward_lines(source, &input))
    }

    /// Polls for events (non-blocking).
    #[inline]
    pub fn poll(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv()
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.event_rx.recv_timeout(timeout)
    }

    /// Waits up to `timeout` for an event matching `predicate`, discarding
    /// the ones that do not.
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> Option<ClientEvent>
    where
        F: FnMut(&ClientEvent) -> bool,
    {
        self.event_rx.wait_for(timeout, predicate)
    }

    /// Drains all available events.
    pub fn drain(&self) -> impl Iterator<Item = ClientEvent> + '_ {
        self.event_rx.drain()
    }

    /// Returns the number of events dropped because nobody was polling.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.event_rx.dropped()
    }
}

fn forward_lines<R: BufRead>(source: R, input: &mpsc::Sender<Outgoing>) {
    for line in source.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Input read error: {}", e);
                return;
            }
        };
        let (outgoing, written) = Outgoing::acknowledged(line);
        if input.blocking_send(outgoing).is_err() || written.blocking_recv().is_err() {
            tracing::debug!("Session ended, dropping input");
            return;
        }
    }
    tracing::debug!("End of input");
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connected to the server.
    Connected,
    /// Disconnected from the server.
    Disconnected,
    /// Received a line from the server, delimiter removed.
    Message(String),
    /// An error occurred.
    Error(String),
}
