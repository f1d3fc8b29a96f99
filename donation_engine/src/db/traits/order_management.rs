use async_trait::async_trait;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    traits::{DonationDbError, InsertOrderResult, TransitionResult},
};

/// Storage for donation orders.
#[async_trait]
pub trait OrderManagement {
    /// Stores a new order with status `Pending`. If an order with the same order id already exists, it is returned
    /// unchanged.
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, DonationDbError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, DonationDbError>;

    /// Moves the order to `status`, unless it already has that status or is in a terminal state.
    ///
    /// The check and the write must be a single atomic operation. `payer_uid`, when supplied, is recorded alongside
    /// the status change.
    async fn transition_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        payer_uid: Option<&str>,
    ) -> Result<TransitionResult, DonationDbError>;
}
