//! Collaborators the ledger talks to after a commit.

pub mod fulfillment;
pub mod handoff;

pub use fulfillment::{DeliveryOutcome, Fulfillment, InMemoryFulfillment};
pub use handoff::HandoffFulfillment;
