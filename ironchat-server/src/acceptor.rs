//! Connection acceptor.

use crate::builder::ServerEvent;
use crate::connection::{ServerContext, serve};
use ironchat_transport::tcp::{TcpConnection, TcpServer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause after the `failures`-th accept error in a row.
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_MIN
        .saturating_mul(1 << failures.saturating_sub(1).min(16))
        .min(ACCEPT_BACKOFF_MAX)
}

/// Owns the listening endpoint and starts one connection per accept.
pub(crate) struct Acceptor {
    server: TcpServer,
    ctx: Arc<ServerContext>,
    stop: CancellationToken,
    max_connections: Option<usize>,
}

impl Acceptor {
    pub(crate) fn new(
        server: TcpServer,
        ctx: Arc<ServerContext>,
        stop: CancellationToken,
        max_connections: Option<usize>,
    ) -> Self {
        Self {
            server,
            ctx,
            stop,
            max_connections,
        }
    }

    /// Accepts until stopped.
    ///
    /// The stop flag is checked after every completed accept, never while
    /// one is pending. The listener is closed on return.
    pub(crate) async fn run(self) {
        let local = self.server.local_addr().ok();
        let mut failures = 0u32;
        loop {
            match self.server.accept().await {
                Ok(conn) => {
                    failures = 0;
                    self.on_accept(conn);
                }
                Err(e) => {
                    // Errors such as EMFILE repeat until a descriptor frees up
                    failures = failures.saturating_add(1);
                    let pause = accept_backoff(failures);
                    tracing::warn!("Accept error: {} (retrying in {:?})", e, pause);
                    self.ctx.emit(ServerEvent::Error(e.to_string()));
                    tokio::time::sleep(pause).await;
                }
            }

            if self.stop.is_cancelled() {
                break;
            }
        }

        drop(self.server);
        match local {
            Some(addr) => tracing::info!("Stopped accepting on {}", addr),
            None => tracing::info!("Stopped accepting"),
        }
    }

    /// Takes the session slot before the connection task starts, so a burst
    /// of accepts cannot overshoot `max_connections`.
    fn on_accept(&self, conn: TcpConnection) {
        let peer_addr = conn.peer_addr();
        let Some((id, close)) = self
            .ctx
            .sessions
            .try_create_session(peer_addr, self.max_connections)
        else {
            tracing::warn!(
                "Max connections ({}) reached, rejecting {}",
                self.max_connections.unwrap_or_default(),
                peer_addr
            );
            return;
        };

        tokio::spawn(serve(conn, id, close, Arc::clone(&self.ctx)));
    }
}
