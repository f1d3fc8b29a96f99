use log::*;

use crate::{
    db_types::{OrderId, OrderStatusType},
    dpe_api::poller::PollerSupervisor,
    events::{DonationConfirmedEvent, DonationFailedEvent, EventProducers},
    traits::{DonationDbError, OrderManagement, TransitionResult},
};

/// Which reconciliation path asked for a status change. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Poller,
    PollerExpiry,
    Webhook,
}

/// The single write path for order status.
///
/// Both the poller and the webhook reconciler go through [`StatusUpdater::apply`]. The database refuses to move an
/// order out of a terminal state, and only a write that actually changed something comes back as
/// [`TransitionResult::Applied`]. Events are published on that result alone, which is what makes each donation
/// broadcast at most once no matter how many times the gateway tells us about it.
pub struct StatusUpdater<B> {
    db: B,
    producers: EventProducers,
    supervisor: PollerSupervisor,
}

impl<B: Clone> Clone for StatusUpdater<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone(), supervisor: self.supervisor.clone() }
    }
}

impl<B> StatusUpdater<B> {
    pub fn new(db: B, producers: EventProducers, supervisor: PollerSupervisor) -> Self {
        Self { db, producers, supervisor }
    }
}

impl<B> StatusUpdater<B>
where B: OrderManagement + Clone + Send + Sync + 'static
{
    pub async fn apply(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        payer_uid: Option<&str>,
        source: UpdateSource,
    ) -> Result<TransitionResult, DonationDbError> {
        let result = self.db.transition_order_status(order_id, status, payer_uid).await?;
        match &result {
            TransitionResult::Applied(order) => {
                info!("🔄️📦️ Order {order_id} is now {} ({source:?})", order.status);
                if order.status.is_terminal() && self.supervisor.cancel(order_id) {
                    debug!("🔄️📦️ Poller for order {order_id} stopped");
                }
                match order.status {
                    OrderStatusType::Completed => {
                        self.producers.publish_donation_confirmed(DonationConfirmedEvent::new(order.clone())).await
                    },
                    OrderStatusType::Failed => {
                        self.producers.publish_donation_failed(DonationFailedEvent::new(order.clone())).await
                    },
                    _ => {},
                }
            },
            TransitionResult::Unchanged(order) if order.status.is_terminal() && order.status != status => {
                warn!(
                    "🔄️📦️ {source:?} reported {status} for order {order_id}, but it was already {}. Ignoring.",
                    order.status
                );
            },
            TransitionResult::Unchanged(order) => {
                debug!("🔄️📦️ Order {order_id} is already {}. Nothing to do ({source:?})", order.status);
            },
            TransitionResult::NotFound => {
                warn!("🔄️📦️ {source:?} reported {status} for order {order_id}, which does not exist");
            },
        }
        Ok(result)
    }
}
