//! Outbound writer: drains one connection's queue into its socket.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use futures::{Sink, SinkExt};
use tracing::{debug, warn};

use super::connection::{ConnectionHandle, Outbound};

/// Forward queued frames to `sink` until the connection closes.
///
/// A failed write closes the handle, which makes the broadcaster's next
/// `send` fail and prune the connection. A write that never completes is
/// abandoned as soon as the handle is closed.
pub async fn run_writer<K>(mut sink: K, mut outbound: Outbound, connection: Arc<ConnectionHandle>)
where
    K: Sink<WsMessage> + Unpin,
    K::Error: Display,
{
    let conn_id = connection.id().clone();
    let mut abandoned = false;
    loop {
        let frame = tokio::select! {
            biased;
            () = connection.closed() => break,
            frame = outbound.recv() => frame,
        };
        let Some(frame) = frame else { break };

        let written = tokio::select! {
            biased;
            () = connection.closed() => {
                abandoned = true;
                break;
            }
            written = sink.send(WsMessage::Text(String::clone(&frame).into())) => written,
        };
        if let Err(e) = written {
            warn!(%conn_id, error = %e, "write failed, closing connection");
            connection.close();
            return;
        }
    }

    debug!(%conn_id, abandoned, "writer finished");
    // a sink with an abandoned write is wedged; dropping it is all we can do
    if !abandoned {
        let _ = sink.send(WsMessage::Close(None)).await;
        let _ = sink.close().await;
    }
}
