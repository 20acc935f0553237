//! Broadcaster: the single consumer of the dispatch queue.
//!
//! For each message: encode once, snapshot the registry, hand the frame to
//! every member (the sender included) and prune members whose send fails
//! in the same pass. Sends only enqueue onto per-connection writers, so no
//! peer can stall delivery to the others.

use std::sync::Arc;

use metrics::counter;
use relay_core::ConnectionId;
use relay_core::errors::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{BROADCASTS_TOTAL, DELIVERIES_TOTAL, PRUNED_TOTAL};
use super::dispatch::{Dispatch, DispatchReceiver};
use super::registry::ConnectionRegistry;

/// Outcome of fanning out one message.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Members in the snapshot.
    pub recipients: usize,
    /// Members the frame was handed to.
    pub delivered: usize,
    /// Members closed and removed because the send failed.
    pub pruned: Vec<ConnectionId>,
}

/// Sole consumer of the dispatch queue.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    queue: DispatchReceiver,
}

impl Broadcaster {
    /// Create a broadcaster over `registry` fed by `queue`.
    pub fn new(registry: Arc<ConnectionRegistry>, queue: DispatchReceiver) -> Self {
        Self { registry, queue }
    }

    /// Deliver queued messages until cancelled or every sender is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("broadcaster started");
        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => break,
                next = self.queue.recv() => next,
            };
            let Some(dispatch) = next else { break };
            if let Err(e) = self.deliver(&dispatch).await {
                warn!(origin = %dispatch.origin, error = %e, "failed to encode message, skipping");
            }
        }
        info!("broadcaster stopped");
    }

    /// Fan one message out to the current membership.
    pub async fn deliver(&self, dispatch: &Dispatch) -> Result<Delivery> {
        let frame = Arc::new(dispatch.message.to_json()?);
        let members = self.registry.snapshot().await;

        let mut delivery = Delivery {
            recipients: members.len(),
            ..Delivery::default()
        };
        for conn in members {
            match conn.send(Arc::clone(&frame)) {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    warn!(conn_id = %conn.id(), error = %e, "send failed, pruning connection");
                    conn.close();
                    let _ = self.registry.remove(conn.id()).await;
                    delivery.pruned.push(conn.id().clone());
                }
            }
        }

        counter!(BROADCASTS_TOTAL).increment(1);
        counter!(DELIVERIES_TOTAL).increment(delivery.delivered as u64);
        counter!(PRUNED_TOTAL).increment(delivery.pruned.len() as u64);
        debug!(
            origin = %dispatch.origin,
            recipients = delivery.recipients,
            delivered = delivery.delivered,
            pruned = delivery.pruned.len(),
            "broadcast message"
        );
        Ok(delivery)
    }
}
