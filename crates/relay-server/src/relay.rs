//! The relay: shared state plus the per-connection session lifecycle.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use futures::{Sink, Stream};
use metrics::{counter, gauge};
use relay_core::Board;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::websocket::broadcaster::Broadcaster;
use crate::websocket::connection::ConnectionHandle;
use crate::websocket::dispatch::{DispatchSender, dispatch_queue};
use crate::websocket::reader::{Disconnect, Inbound, run_reader};
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::writer::run_writer;

/// Registry, dispatch producer and board shared by every connection.
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    dispatch: DispatchSender,
    board: Board,
    closing: CancellationToken,
}

impl Relay {
    /// Create the relay and the broadcaster that drains its queue.
    ///
    /// The broadcaster must be driven (see [`Broadcaster::run`]) for any
    /// message to reach a peer.
    pub fn new() -> (Arc<Self>, Broadcaster) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (dispatch, queue) = dispatch_queue();
        let broadcaster = Broadcaster::new(registry.clone(), queue);
        let board = Board::initial();
        debug!(pieces = board.occupied(), "board set to opening layout");
        let relay = Arc::new(Self {
            registry,
            dispatch,
            board,
            closing: CancellationToken::new(),
        });
        (relay, broadcaster)
    }

    /// Live connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The board. Never mutated by relayed moves.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Close every registered connection. Each session then tears itself
    /// down and sends its peer a Close frame. Returns how many were closed.
    ///
    /// The relay stays closing: a session that registers afterwards is
    /// closed as soon as it joins.
    pub async fn disconnect_all(&self) -> usize {
        self.closing.cancel();
        let members = self.registry.snapshot().await;
        for conn in &members {
            conn.close();
        }
        members.len()
    }

    /// Run one connection from registration to teardown.
    ///
    /// The connection is registered before its first read, so it receives
    /// every message broadcast after this point, its own included.
    pub async fn serve<S, K, E>(&self, stream: S, sink: K) -> Disconnect
    where
        S: Stream<Item = Result<WsMessage, E>> + Unpin,
        E: Display,
        K: Sink<WsMessage> + Unpin + Send + 'static,
        K::Error: Display + Send,
    {
        let (handle, outbound) = ConnectionHandle::new();
        let connection = Arc::new(handle);
        let conn_id = connection.id().clone();

        self.registry.add(connection.clone()).await;
        // registered after (or during) disconnect_all's snapshot
        if self.closing.is_cancelled() {
            connection.close();
        }
        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        info!(%conn_id, "client connected");

        let writer = tokio::spawn(run_writer(sink, outbound, connection.clone()));
        let reason = run_reader(Inbound::new(stream), &connection, &self.dispatch).await;

        let _ = self.registry.remove(&conn_id).await;
        connection.close();
        let _ = writer.await;

        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        info!(
            %conn_id,
            reason = ?reason,
            connected_secs = connection.age().as_secs(),
            "client disconnected"
        );
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use futures::StreamExt;
    use futures::channel::mpsc as fmpsc;
    use relay_core::{Message, ReceiveError};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    type Frame = Result<WsMessage, std::io::Error>;

    struct Peer {
        frames: fmpsc::UnboundedSender<Frame>,
        received: fmpsc::UnboundedReceiver<WsMessage>,
        session: tokio::task::JoinHandle<Disconnect>,
    }

    impl Peer {
        async fn connect(relay: &Arc<Relay>) -> Self {
            let (frames, stream) = fmpsc::unbounded::<Frame>();
            let (sink, received) = fmpsc::unbounded::<WsMessage>();
            let before = relay.registry().len().await;
            let relay = relay.clone();
            let registry = relay.registry().clone();
            let session = tokio::spawn(async move { relay.serve(stream, sink).await });
            tokio::time::timeout(Duration::from_secs(1), async {
                while registry.len().await == before {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .unwrap();
            Self {
                frames,
                received,
                session,
            }
        }

        fn say(&self, json: &str) {
            self.frames
                .unbounded_send(Ok(WsMessage::Text(json.to_owned().into())))
                .unwrap();
        }

        async fn next_message(&mut self) -> Message {
            let frame = tokio::time::timeout(Duration::from_secs(1), self.received.next())
                .await
                .unwrap()
                .unwrap();
            match frame {
                WsMessage::Text(text) => Message::from_json(text.as_str()).unwrap(),
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    fn start() -> (Arc<Relay>, CancellationToken) {
        let (relay, broadcaster) = Relay::new();
        let cancel = CancellationToken::new();
        drop(tokio::spawn(broadcaster.run(cancel.clone())));
        (relay, cancel)
    }

    #[tokio::test]
    async fn board_is_initial_position() {
        let (relay, _) = Relay::new();
        assert_eq!(relay.board(), &Board::initial());
    }

    #[tokio::test]
    async fn every_peer_including_sender_receives_message() {
        let (relay, _cancel) = start();
        let mut a = Peer::connect(&relay).await;
        let mut b = Peer::connect(&relay).await;
        let mut c = Peer::connect(&relay).await;
        assert_eq!(relay.registry().len().await, 3);

        a.say(r#"{"player":"p1","move":"e2e4","chat":""}"#);
        let expected = Message::player_move("p1", "e2e4");
        assert_eq!(a.next_message().await, expected);
        assert_eq!(b.next_message().await, expected);
        assert_eq!(c.next_message().await, expected);
    }

    #[tokio::test]
    async fn malformed_payload_ends_only_that_session() {
        let (relay, _cancel) = start();
        let bad = Peer::connect(&relay).await;
        let mut good = Peer::connect(&relay).await;

        bad.say("not json");
        let reason = tokio::time::timeout(Duration::from_secs(1), bad.session)
            .await
            .unwrap()
            .unwrap();
        assert_matches!(reason, Disconnect::Receive(ReceiveError::Malformed(_)));
        assert_eq!(relay.registry().len().await, 1);

        good.say(r#"{"chat":"still here"}"#);
        assert_eq!(good.next_message().await.chat, "still here");
    }

    #[tokio::test]
    async fn peer_close_unregisters_and_sends_close_frame() {
        let (relay, _cancel) = start();
        let mut a = Peer::connect(&relay).await;
        a.frames.unbounded_send(Ok(WsMessage::Close(None))).unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(1), a.session)
            .await
            .unwrap()
            .unwrap();
        assert_matches!(reason, Disconnect::Receive(ReceiveError::Closed));
        assert!(relay.registry().is_empty().await);
        assert_matches!(a.received.next().await, Some(WsMessage::Close(None)));
    }

    #[tokio::test]
    async fn disconnect_all_ends_every_session() {
        let (relay, _cancel) = start();
        let a = Peer::connect(&relay).await;
        let b = Peer::connect(&relay).await;

        assert_eq!(relay.disconnect_all().await, 2);
        for peer in [a, b] {
            let reason = tokio::time::timeout(Duration::from_secs(1), peer.session)
                .await
                .unwrap()
                .unwrap();
            assert_matches!(reason, Disconnect::Evicted);
        }
        assert!(relay.registry().is_empty().await);
    }

    #[tokio::test]
    async fn dead_writer_is_pruned_on_next_broadcast() {
        let (relay, _cancel) = start();
        let mut a = Peer::connect(&relay).await;
        let dead = Peer::connect(&relay).await;
        drop(dead.received);

        // first message fails the dead peer's write and closes its handle
        a.say(r#"{"chat":"one"}"#);
        assert_eq!(a.next_message().await.chat, "one");

        let reason = tokio::time::timeout(Duration::from_secs(1), dead.session)
            .await
            .unwrap()
            .unwrap();
        assert_matches!(reason, Disconnect::Evicted);
        assert_eq!(relay.registry().len().await, 1);

        a.say(r#"{"chat":"two"}"#);
        assert_eq!(a.next_message().await.chat, "two");
    }

    #[tokio::test]
    async fn session_joining_after_disconnect_all_is_closed() {
        let (relay, _cancel) = start();
        assert_eq!(relay.disconnect_all().await, 0);

        let (_frames, stream) = fmpsc::unbounded::<Frame>();
        let (sink, mut received) = fmpsc::unbounded::<WsMessage>();
        let late = relay.clone();
        let session = tokio::spawn(async move { late.serve(stream, sink).await });

        let reason = tokio::time::timeout(Duration::from_secs(1), session)
            .await
            .unwrap()
            .unwrap();
        assert_matches!(reason, Disconnect::Evicted);
        assert!(relay.registry().is_empty().await);
        assert_matches!(received.next().await, Some(WsMessage::Close(None)));
    }
}
