//! Synthetic chat traffic.

use bytes::{BufMut, BytesMut};
use ironchat_channel::outbound::{self, OutboundReceiver};
use ironchat_core::{ConnectionId, DELIMITER};
use ironchat_server::{Peer, Registry};

/// Generates `count` chat lines of `len` printable bytes each.
#[must_use]
pub fn chat_lines(count: usize, len: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let mut line = format!("message {i} ");
            while line.len() < len {
                line.push((b'a' + (line.len() % 26) as u8) as char);
            }
            line.truncate(len);
            line
        })
        .collect()
}

/// Concatenates `lines` into one delimited byte stream, as read off a socket.
#[must_use]
pub fn wire_stream(lines: &[String]) -> BytesMut {
    let total = lines.iter().map(|l| l.len() + 1).sum();
    let mut buf = BytesMut::with_capacity(total);
    for line in lines {
        buf.put_slice(line.as_bytes());
        buf.put_u8(DELIMITER);
    }
    buf
}

/// A registry populated with `peers` connections named `user-<n>`.
///
/// The queues are returned so the peers stay reachable; drain them between
/// iterations to keep memory flat.
#[must_use]
pub fn populated_registry(peers: usize) -> (Registry<Peer>, Vec<OutboundReceiver>) {
    let registry = Registry::new();
    let mut queues = Vec::with_capacity(peers);
    for n in 0..peers {
        let (tx, rx) = outbound::channel();
        registry.insert(format!("user-{n}"), Peer::new(ConnectionId::new(n as u64), tx));
        queues.push(rx);
    }
    (registry, queues)
}

/// Empties every queue, returning the number of frames discarded.
pub fn drain_queues(queues: &mut [OutboundReceiver]) -> usize {
    queues
        .iter_mut()
        .map(|queue| std::iter::from_fn(|| queue.try_recv()).count())
        .sum()
}
