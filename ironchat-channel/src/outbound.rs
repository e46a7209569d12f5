//! Per-connection outbound queues.
//!
//! Every connection owns exactly one queue and one task draining it into the
//! transport. Any number of other connections may enqueue concurrently;
//! frames from one producer come out in the order they were enqueued, and
//! no two frames are ever written at the same time.

use crate::ChannelError;
use bytes::Bytes;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Creates an outbound queue.
#[must_use]
pub fn channel() -> (OutboundSender, OutboundReceiver) {
    let (tx, rx) = unbounded_channel();
    (OutboundSender { inner: tx }, OutboundReceiver { inner: rx })
}

/// Enqueuing half. Holding one does not keep the connection alive: once the
/// writer is gone every send fails.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    inner: UnboundedSender<Bytes>,
}

impl OutboundSender {
    /// Enqueues one encoded frame without waiting for it to be written.
    ///
    /// # Errors
    /// Returns the frame if the writer has stopped.
    #[inline]
    pub fn send(&self, frame: Bytes) -> Result<(), ChannelError<Bytes>> {
        self.inner
            .send(frame)
            .map_err(|e| ChannelError::Disconnected(e.0))
    }

    /// Returns true if the writer has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Returns true if both senders feed the same queue.
    #[must_use]
    pub fn same_queue(&self, other: &Self) -> bool {
        self.inner.same_channel(&other.inner)
    }
}

/// Draining half, owned by the connection's writer.
#[derive(Debug)]
pub struct OutboundReceiver {
    inner: UnboundedReceiver<Bytes>,
}

impl OutboundReceiver {
    /// Waits for the next frame.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inner.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.inner.try_recv().ok()
    }

    /// Rejects further sends. Frames already queued can still be received.
    pub fn close(&mut self) {
        self.inner.close();
    }

    /// Returns the number of queued frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_send_preserves_order() {
        let (tx, mut rx) = channel();
        for i in 0..3u8 {
            tx.send(Bytes::from(vec![i])).unwrap();
        }

        assert_eq!(rx.len(), 3);
        assert_eq!(rx.try_recv().unwrap()[..], [0]);
        assert_eq!(rx.try_recv().unwrap()[..], [1]);
        assert_eq!(rx.try_recv().unwrap()[..], [2]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = channel();
        drop(rx);

        assert!(tx.is_closed());
        let err = tx.send(Bytes::from_static(b"late\n")).unwrap_err();
        assert!(err.is_disconnected());
        assert_eq!(&err.into_inner()[..], b"late\n");
    }

    #[test]
    fn test_close_keeps_queued_frames() {
        let (tx, mut rx) = channel();
        tx.send(Bytes::from_static(b"a\n")).unwrap();
        rx.close();

        assert!(tx.send(Bytes::from_static(b"b\n")).is_err());
        assert_eq!(&rx.try_recv().unwrap()[..], b"a\n");
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_same_queue() {
        let (tx, _rx) = channel();
        let (other, _other_rx) = channel();

        assert!(tx.same_queue(&tx.clone()));
        assert!(!tx.same_queue(&other));
    }

    #[tokio::test]
    async fn test_concurrent_producers_keep_per_producer_order() {
        let (tx, mut rx) = channel();

        let producers: Vec<_> = (0..4u8)
            .map(|p| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for n in 0..50u8 {
                        tx.send(Bytes::from(vec![p, n])).unwrap();
                    }
                })
            })
            .collect();
        drop(tx);
        for producer in producers {
            producer.join().unwrap();
        }

        let mut last = [None::<u8>; 4];
        let mut total = 0;
        while let Some(frame) = rx.recv().await {
            let (p, n) = (frame[0] as usize, frame[1]);
            if let Some(prev) = last[p] {
                assert!(n > prev);
            }
            last[p] = Some(n);
            total += 1;
        }
        assert_eq!(total, 200);
    }
}
