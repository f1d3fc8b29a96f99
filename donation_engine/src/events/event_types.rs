use crate::db_types::Order;

/// Published once, when an order first reaches `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationConfirmedEvent {
    pub order: Order,
    /// The payer id reported by the gateway, when it sent one
    pub payer_uid: Option<String>,
}

impl DonationConfirmedEvent {
    pub fn new(order: Order) -> Self {
        let payer_uid = order.payer_uid.clone();
        Self { order, payer_uid }
    }
}

/// Published once, when an order first reaches `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationFailedEvent {
    pub order: Order,
}

impl DonationFailedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    DonationConfirmed(DonationConfirmedEvent),
    DonationFailed(DonationFailedEvent),
}
