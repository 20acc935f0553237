//! Inbound Reader: decodes frames from one connection onto the dispatch queue.
//!
//! Any receive failure is terminal. A malformed payload ends the connection
//! exactly like a transport error; nothing is reported back to the client.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use futures::{Stream, StreamExt};
use metrics::counter;
use relay_core::{Message, ReceiveError};
use tracing::{debug, info, warn};

use crate::metrics::{MESSAGES_MALFORMED_TOTAL, MESSAGES_RECEIVED_TOTAL};
use super::connection::ConnectionHandle;
use super::dispatch::DispatchSender;

/// Read half of a connection's transport.
pub struct Inbound<S> {
    stream: S,
}

impl<S, E> Inbound<S>
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    /// Wrap a frame stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Wait for the next well-formed message.
    ///
    /// Text frames and UTF-8 binary frames carry messages; ping/pong frames
    /// are skipped. A Close frame or end of stream is [`ReceiveError::Closed`].
    pub async fn receive(&mut self) -> Result<Message, ReceiveError> {
        loop {
            let frame = match self.stream.next().await {
                None => return Err(ReceiveError::Closed),
                Some(Err(e)) => return Err(ReceiveError::Transport(e.to_string())),
                Some(Ok(frame)) => frame,
            };
            match frame {
                WsMessage::Text(text) => return Message::from_json(text.as_str()),
                WsMessage::Binary(data) => {
                    let text = std::str::from_utf8(&data).map_err(|_| ReceiveError::NonUtf8)?;
                    return Message::from_json(text);
                }
                WsMessage::Close(_) => return Err(ReceiveError::Closed),
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            }
        }
    }
}

/// Why a reader stopped.
#[derive(Debug)]
pub enum Disconnect {
    /// The read side failed or the peer closed.
    Receive(ReceiveError),
    /// The handle was closed elsewhere (e.g. pruned after a failed write).
    Evicted,
    /// The dispatch queue is gone; the relay is shutting down.
    QueueClosed,
}

/// Pump messages from `inbound` onto `dispatch` until the connection ends.
pub async fn run_reader<S, E>(
    mut inbound: Inbound<S>,
    connection: &Arc<ConnectionHandle>,
    dispatch: &DispatchSender,
) -> Disconnect
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let conn_id = connection.id();
    loop {
        let received = tokio::select! {
            () = connection.closed() => return Disconnect::Evicted,
            received = inbound.receive() => received,
        };

        match received {
            Ok(message) => {
                counter!(MESSAGES_RECEIVED_TOTAL).increment(1);
                debug!(%conn_id, player = %message.player, "message received");
                if !dispatch.enqueue(conn_id.clone(), message) {
                    warn!(%conn_id, "dispatch queue closed, dropping connection");
                    return Disconnect::QueueClosed;
                }
            }
            Err(err) if err.is_clean_close() => {
                info!(%conn_id, "client closed connection");
                return Disconnect::Receive(err);
            }
            Err(err @ (ReceiveError::Malformed(_) | ReceiveError::NonUtf8)) => {
                counter!(MESSAGES_MALFORMED_TOTAL).increment(1);
                warn!(%conn_id, error = %err, "malformed payload, dropping connection");
                return Disconnect::Receive(err);
            }
            Err(err) => {
                warn!(%conn_id, error = %err, "read failed, dropping connection");
                return Disconnect::Receive(err);
            }
        }
    }
}
