//! Connection handles: how the rest of the server reaches a socket.
//!
//! The socket itself is owned by two tasks in the server crate — a reader
//! (the dispatcher loop) and a writer draining an outbound channel. This
//! module defines the handle both registries and watchdogs hold instead:
//! a sender for encoded frames plus a close signal that terminates both
//! tasks, even a reader blocked mid-`read_exact`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};

use crate::SessionError;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique identifier for a connection.
///
/// A relogin swaps the handle stored on a player record; comparing ids is
/// how watchdogs and cleanup paths detect that they are looking at a
/// connection that has since been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Cheap-clone handle to one client connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiving ends for the connection's tasks:
    /// the outbound frame stream for the writer and a close watch both
    /// tasks select on.
    pub fn new() -> (
        Self,
        mpsc::UnboundedReceiver<Vec<u8>>,
        watch::Receiver<bool>,
    ) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (closed, closed_rx) = watch::channel(false);
        let handle = Self {
            id: ConnectionId::next(),
            outbound,
            closed: Arc::new(closed),
        };
        (handle, outbound_rx, closed_rx)
    }

    /// Returns this connection's unique id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an encoded frame for the writer task. Never blocks.
    ///
    /// # Errors
    /// [`SessionError::ConnectionGone`] if the writer task has exited.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        self.outbound
            .send(frame)
            .map_err(|_| SessionError::ConnectionGone(self.id))
    }

    /// Signals both connection tasks to shut down and close the socket.
    ///
    /// Idempotent; safe to call from any task.
    pub fn close(&self) {
        let _ = self.closed.send(true);
    }

    /// Subscribes to the close signal.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let (a, _rx_a, _ca) = ConnectionHandle::new();
        let (b, _rx_b, _cb) = ConnectionHandle::new();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_send_delivers_to_receiver() {
        let (handle, mut rx, _closed) = ConnectionHandle::new();
        handle.send(b"frame".to_vec()).unwrap();
        assert_eq!(rx.recv().await, Some(b"frame".to_vec()));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_connection_gone() {
        let (handle, rx, _closed) = ConnectionHandle::new();
        drop(rx);
        let err = handle.send(vec![]).unwrap_err();
        assert!(matches!(err, SessionError::ConnectionGone(id) if id == handle.id()));
    }

    #[tokio::test]
    async fn test_close_wakes_subscribers_and_sticks() {
        let (handle, _rx, mut closed) = ConnectionHandle::new();
        assert!(!handle.is_closed());

        handle.close();
        closed.changed().await.unwrap();
        assert!(*closed.borrow());
        assert!(handle.is_closed());

        // A subscriber created after the fact still observes the close.
        assert!(*handle.closed().borrow());
    }
}
