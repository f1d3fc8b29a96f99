//! Live donation fan-out.
//!
//! Viewers of the ranking display hold a WebSocket open and get a [`PayNotification`] the moment a donation that
//! matches their filter is confirmed. Delivery is best effort: there is no replay, so a viewer that reconnects catches
//! up through the rankings API.
mod hub;
mod notification;

use async_trait::async_trait;
pub use hub::{BroadcastHub, ConnId, SubscriberFilter, SubscriberInfo, DEFAULT_SEND_ATTEMPTS};
pub use notification::{PayNotification, PAY_SUCCESS};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BroadcastError {
    #[error("Could not serialize the notification. {0}")]
    Serialization(String),
    #[error("Could not deliver to subscriber. {0}")]
    Delivery(String),
    #[error("The subscriber connection is closed")]
    Closed,
}

/// The sending half of a subscriber connection.
#[async_trait]
pub trait SubscriberSink: Send + Sync + 'static {
    async fn send_text(&self, text: String) -> Result<(), BroadcastError>;

    async fn close(&self);
}
