//! Observer event channels.
//!
//! Engine components report lifecycle events (connections, registrations,
//! disconnects) to whoever holds the receiving end. Emitting never blocks:
//! when the observer falls behind and the channel is full, the event is
//! dropped and counted.

use crate::ChannelError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Creates a bounded event channel pair.
///
/// # Arguments
/// * `capacity` - Maximum number of undelivered events kept
#[must_use]
pub fn channel<T: Send>(capacity: usize) -> (EventSender<T>, EventReceiver<T>) {
    let (sender, receiver) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            inner: sender,
            dropped: Arc::clone(&dropped),
        },
        EventReceiver {
            inner: receiver,
            dropped,
        },
    )
}

/// Emitting half of an event channel. Cheap to clone.
pub struct EventSender<T> {
    inner: Sender<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<T> EventSender<T> {
    /// Emits an event without blocking.
    ///
    /// # Errors
    /// Returns the event if the channel is full (the drop is counted) or the
    /// receiver is gone.
    pub fn emit(&self, event: T) -> Result<(), ChannelError<T>> {
        match self.inner.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(ChannelError::Full(event))
            }
            Err(TrySendError::Disconnected(event)) => Err(ChannelError::Disconnected(event)),
        }
    }

    /// Returns the number of events dropped because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Observing half of an event channel.
pub struct EventReceiver<T> {
    inner: Receiver<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> EventReceiver<T> {
    /// Non-blocking receive.
    #[inline]
    pub fn try_recv(&self) -> Option<T> {
        self.inner.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// Returns `None` on timeout or once every sender is gone and the queue
    /// is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.inner.recv_timeout(timeout).ok()
    }

    /// Waits up to `timeout` for the first event matching `predicate`.
    ///
    /// Events that do not match are consumed and discarded.
    pub fn wait_for<F>(&self, timeout: Duration, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inner.recv_timeout(remaining) {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Drains all currently queued events.
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(|| self.inner.try_recv().ok())
    }

    /// Returns the number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no events are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of events dropped because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_emit_and_receive() {
        let (tx, rx) = channel::<u32>(4);
        tx.emit(1).unwrap();
        tx.emit(2).unwrap();

        assert_eq!(rx.len(), 2);
        assert_eq!(rx.try_recv(), Some(1));
        assert_eq!(rx.try_recv(), Some(2));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_channel_drops_and_counts() {
        let (tx, rx) = channel::<u32>(1);
        tx.emit(1).unwrap();

        let err = tx.emit(2).unwrap_err();
        assert_eq!(err, ChannelError::Full(2));
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.dropped(), 1);
        assert_eq!(rx.drain().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (tx, rx) = channel::<u32>(4);
        drop(rx);

        assert!(tx.emit(1).unwrap_err().is_disconnected());
        assert_eq!(tx.dropped(), 0);
    }

    #[test]
    fn test_wait_for_skips_non_matching() {
        let (tx, rx) = channel::<u32>(8);
        let producer = thread::spawn(move || {
            for i in 0..5 {
                tx.emit(i).unwrap();
            }
        });

        let found = rx.wait_for(Duration::from_secs(2), |e| *e == 3);
        producer.join().unwrap();

        assert_eq!(found, Some(3));
        assert_eq!(rx.try_recv(), Some(4));
    }

    #[test]
    fn test_wait_for_times_out() {
        let (_tx, rx) = channel::<u32>(8);
        let found = rx.wait_for(Duration::from_millis(20), |_| true);
        assert!(found.is_none());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (tx, rx) = channel::<u32>(0);
        tx.emit(9).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Some(9));
    }
}
