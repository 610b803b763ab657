//! Fulfillment that hands claimed units to the waiting requester.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::coordinator::Claim;
use crate::services::{DeliveryOutcome, Fulfillment};

/// Delivers one claim over a oneshot channel to whoever made the request.
///
/// Delivery is confirmed only if the receiver is still there to take the
/// units. A requester that went away before the commit finished makes the
/// delivery fail, and the purchase is compensated. Nothing is kept after
/// the handoff.
#[derive(Debug)]
pub struct HandoffFulfillment {
    sender: Mutex<Option<oneshot::Sender<Claim>>>,
}

impl HandoffFulfillment {
    /// Creates the fulfillment and the receiver the requester waits on.
    pub fn channel() -> (Self, oneshot::Receiver<Claim>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(sender)),
            },
            receiver,
        )
    }
}

#[async_trait]
impl Fulfillment for HandoffFulfillment {
    async fn deliver(&self, claim: &Claim) -> DeliveryOutcome {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(sender) = sender else {
            return DeliveryOutcome::Failed("Claim already handed over".to_string());
        };
        match sender.send(claim.clone()) {
            Ok(()) => DeliveryOutcome::Confirmed,
            Err(_) => DeliveryOutcome::Failed("Requester is gone".to_string()),
        }
    }
}
