//! Connection Handle: the registry's view of one client.
//!
//! The handle never touches the socket. `send` pushes onto an unbounded
//! outbound queue drained by the connection's writer task, so a broadcast
//! never waits on a peer's network I/O.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_core::{ConnectionId, SendError};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Receiving end of a connection's outbound queue, owned by its writer.
pub type Outbound = mpsc::UnboundedReceiver<Arc<String>>;

/// A live client connection.
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Arc<String>>,
    closed: CancellationToken,
    connected_at: Instant,
}

impl ConnectionHandle {
    /// Create a handle with a fresh ID plus its outbound queue.
    pub fn new() -> (Self, Outbound) {
        Self::with_id(ConnectionId::new())
    }

    /// Create a handle with a specific ID.
    pub fn with_id(id: ConnectionId) -> (Self, Outbound) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id,
            tx,
            closed: CancellationToken::new(),
            connected_at: Instant::now(),
        };
        (handle, rx)
    }

    /// Registry identity.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue one encoded message for the peer.
    ///
    /// Fails once the handle is closed or the writer has dropped its queue.
    pub fn send(&self, frame: Arc<String>) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }
        self.tx.send(frame).map_err(|_| SendError::Closed)
    }

    /// Release the connection. Idempotent.
    ///
    /// Wakes the writer (which sends a Close frame and drops the socket
    /// sink) and the reader (which stops waiting for frames).
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the handle is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Time since the handle was created.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_queues_frame() {
        let (conn, mut rx) = ConnectionHandle::new();
        conn.send(Arc::new("hello".into())).unwrap();
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn send_preserves_order() {
        let (conn, mut rx) = ConnectionHandle::new();
        for i in 0..5 {
            conn.send(Arc::new(format!("msg_{i}"))).unwrap();
        }
        for i in 0..5 {
            assert_eq!(*rx.recv().await.unwrap(), format!("msg_{i}"));
        }
    }

    #[test]
    fn send_after_close_fails() {
        let (conn, _rx) = ConnectionHandle::new();
        conn.close();
        assert_eq!(conn.send(Arc::new("x".into())), Err(SendError::Closed));
    }

    #[test]
    fn send_after_writer_gone_fails() {
        let (conn, rx) = ConnectionHandle::new();
        drop(rx);
        assert_eq!(conn.send(Arc::new("x".into())), Err(SendError::Closed));
    }

    #[test]
    fn close_is_idempotent() {
        let (conn, _rx) = ConnectionHandle::new();
        assert!(!conn.is_closed());
        conn.close();
        conn.close();
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn closed_future_resolves() {
        let (conn, _rx) = ConnectionHandle::new();
        let conn = Arc::new(conn);
        let waiter = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.closed().await })
        };
        conn.close();
        waiter.await.unwrap();
    }

    #[test]
    fn with_id_keeps_identity() {
        let (conn, _rx) = ConnectionHandle::with_id("conn_a".into());
        assert_eq!(conn.id().as_str(), "conn_a");
    }
}
