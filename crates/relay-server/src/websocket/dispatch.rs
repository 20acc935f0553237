//! Dispatch Queue: ordered, unbounded hand-off from readers to the broadcaster.

use relay_core::{ConnectionId, Message};
use tokio::sync::mpsc;

/// A decoded message awaiting fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatch {
    /// Connection the message was read from.
    pub origin: ConnectionId,
    /// The message, relayed unchanged.
    pub message: Message,
}

/// Producer side, cloned into every reader.
#[derive(Clone, Debug)]
pub struct DispatchSender {
    tx: mpsc::UnboundedSender<Dispatch>,
}

/// Consumer side, owned by the broadcaster.
#[derive(Debug)]
pub struct DispatchReceiver {
    rx: mpsc::UnboundedReceiver<Dispatch>,
}

/// Create a connected queue.
pub fn dispatch_queue() -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DispatchSender { tx }, DispatchReceiver { rx })
}

impl DispatchSender {
    /// Enqueue a message. Returns `false` if the broadcaster is gone.
    pub fn enqueue(&self, origin: ConnectionId, message: Message) -> bool {
        self.tx.send(Dispatch { origin, message }).is_ok()
    }
}

impl DispatchReceiver {
    /// Next message in FIFO order; `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<Dispatch> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<Dispatch> {
        self.rx.try_recv().ok()
    }
}
