//! Duplex session: the read and write directions of one connection, each
//! driven by its own task.

use crate::builder::ClientEvent;
use futures::{SinkExt, StreamExt};
use ironchat_channel::EventSender;
use ironchat_core::line::{is_exit, strip_carriage_return};
use ironchat_transport::TransportError;
use ironchat_transport::tcp::{LineReader, LineWriter, shutdown_writer};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// One line waiting for the write loop.
#[derive(Debug)]
pub(crate) struct Outgoing {
    pub(crate) line: String,
    written: Option<oneshot::Sender<()>>,
}

impl Outgoing {
    pub(crate) fn new(line: String) -> Self {
        Self {
            line,
            written: None,
        }
    }

    /// Creates a line whose sender is told once the write attempt is over.
    ///
    /// The receiver errors instead if the line is dropped unwritten.
    pub(crate) fn acknowledged(line: String) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                line,
                written: Some(tx),
            },
            rx,
        )
    }

    pub(crate) fn complete(self) {
        if let Some(written) = self.written {
            let _ = written.send(());
        }
    }
}

fn emit(events: &EventSender<ClientEvent>, event: ClientEvent) {
    if let Err(e) = events.emit(event) {
        tracing::trace!("Client event not delivered: {}", e);
    }
}

/// Reports every non-empty inbound line until the server goes away or the
/// client is shut down. Never reconnects.
pub(crate) async fn read_loop(
    mut reader: LineReader,
    events: EventSender<ClientEvent>,
    closing: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = closing.cancelled() => break,
            next = reader.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                let line = strip_carriage_return(&line);
                if !line.is_empty() {
                    emit(&events, ClientEvent::Message(line.to_owned()));
                }
            }
            Some(Err(e)) if e.is_disconnect() => {
                tracing::info!("Connection lost: {}", e);
                break;
            }
            Some(Err(e)) => {
                tracing::warn!("Read error: {}", e);
                emit(&events, ClientEvent::Error(e.to_string()));
                break;
            }
            None => {
                tracing::info!("Server closed the connection");
                break;
            }
        }
    }
    emit(&events, ClientEvent::Disconnected);
}

/// Writes input lines one at a time, each completing before the next is
/// taken from the channel.
///
/// Ends after the exit sentinel went out, when the input channel closes or
/// on shutdown, and then shuts the write direction down.
pub(crate) async fn write_loop(
    mut writer: LineWriter,
    mut input: mpsc::Receiver<Outgoing>,
    events: EventSender<ClientEvent>,
    closing: CancellationToken,
) {
    loop {
        let outgoing = tokio::select! {
            biased;
            () = closing.cancelled() => break,
            next = input.recv() => match next {
                Some(outgoing) => outgoing,
                None => {
                    tracing::debug!("Input closed");
                    break;
                }
            },
        };

        let sent = tokio::select! {
            biased;
            () = closing.cancelled() => break,
            sent = writer.send(outgoing.line.as_str()) => sent,
        };

        // Lines dropped unacknowledged below stop the input thread
        match sent {
            Ok(()) if is_exit(&outgoing.line) => {
                tracing::debug!("Exit sentinel sent");
                break;
            }
            Ok(()) => outgoing.complete(),
            Err(e @ (TransportError::LineTooLong { .. } | TransportError::InvalidLine { .. })) => {
                tracing::warn!("Line not sent: {}", e);
                emit(&events, ClientEvent::Error(e.to_string()));
                outgoing.complete();
            }
            Err(e) if e.is_disconnect() => {
                tracing::debug!("Write ended: {}", e);
                break;
            }
            Err(e) => {
                tracing::warn!("Write error: {}", e);
                emit(&events, ClientEvent::Error(e.to_string()));
                break;
            }
        }
    }

    // Blocked producers fail their next send from here on
    input.close();
    if let Err(e) = shutdown_writer(&mut writer).await {
        tracing::warn!("Shutdown failed: {}", e);
    }
}
