use std::{fmt::Debug, sync::Arc};

use chrono::Local;
use dpg_common::Fen;
use log::*;
use rand::Rng;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, TenantConfig},
    dpe_api::{
        config_resolver::ConfigResolver,
        errors::OrderFlowError,
        order_objects::{CallbackUrls, CreatedOrder, NewDonation},
        poller::{PollSchedule, Poller, PollerSupervisor},
        status_updater::StatusUpdater,
    },
    events::EventProducers,
    gateway::{GatewayApi, PayRequest, RefundReceipt, DONATION_OPERATOR},
    traits::{DonationDatabase, DonationDbError, InsertOrderResult},
};

/// The gateway rejects `client_sn` values longer than this.
pub const MAX_ORDER_ID_LEN: usize = 64;
/// The gateway truncates longer subjects on its payment page.
pub const MAX_SUBJECT_CHARS: usize = 50;
const ORDER_ID_ATTEMPTS: usize = 3;

/// `ORD` followed by the local time to the second and four random digits.
pub fn generate_order_id() -> OrderId {
    let suffix = rand::thread_rng().gen_range(0..10_000u16);
    OrderId(format!("ORD{}{suffix:04}", Local::now().format("%Y%m%d%H%M%S")))
}

fn payment_subject(config: &TenantConfig, category_name: &str) -> String {
    let store = if config.store_name.is_empty() { &config.merchant_name } else { &config.store_name };
    format!("捐款-{store}-{category_name}").chars().take(MAX_SUBJECT_CHARS).collect()
}

/// `OrderFlowApi` creates donation orders and starts the reconciliation that eventually settles them.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: Arc<G>,
    resolver: ConfigResolver<B, G>,
    supervisor: PollerSupervisor,
    updater: StatusUpdater<B>,
    poller: Poller<B, G>,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({} active pollers)", self.supervisor.active_count())
    }
}

impl<B: Clone, G> Clone for OrderFlowApi<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: Arc::clone(&self.gateway),
            resolver: self.resolver.clone(),
            supervisor: self.supervisor.clone(),
            updater: self.updater.clone(),
            poller: self.poller.clone(),
        }
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    pub fn new(
        db: B,
        gateway: Arc<G>,
        resolver: ConfigResolver<B, G>,
        producers: EventProducers,
        supervisor: PollerSupervisor,
    ) -> Self {
        let updater = StatusUpdater::new(db.clone(), producers, supervisor.clone());
        let poller =
            Poller::new(db.clone(), Arc::clone(&gateway), resolver.clone(), updater.clone(), PollSchedule::default());
        Self { db, gateway, resolver, supervisor, updater, poller }
    }

    /// Replaces the default polling schedule for orders created from now on.
    pub fn with_poll_schedule(mut self, schedule: PollSchedule) -> Self {
        self.poller = Poller::new(
            self.db.clone(),
            Arc::clone(&self.gateway),
            self.resolver.clone(),
            self.updater.clone(),
            schedule,
        );
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn resolver(&self) -> &ConfigResolver<B, G> {
        &self.resolver
    }

    pub fn supervisor(&self) -> &PollerSupervisor {
        &self.supervisor
    }

    /// The write path shared with the webhook reconciler.
    pub fn status_updater(&self) -> StatusUpdater<B> {
        self.updater.clone()
    }

    /// Validates a donation, stores it as a `Pending` order and returns the gateway URL the donor should be sent to.
    ///
    /// A poller for the new order is started in the background before this returns. The daily gateway sign-in is
    /// attempted on the way, but a failed sign-in does not stop the order from being created.
    pub async fn create_order(
        &self,
        donation: NewDonation,
        urls: &CallbackUrls,
    ) -> Result<CreatedOrder, OrderFlowError> {
        let amount = Fen::try_from_yuan(donation.amount)?;
        let config = self.resolver.resolve(&donation.tenant_config_id).await;
        let config = self.resolver.ensure_signed_in(config).await;
        if config.terminal_sn.is_empty() || config.terminal_key.is_empty() {
            return Err(OrderFlowError::IncompleteConfig(config.id.clone(), "the terminal is not activated".into()));
        }
        if config.gateway_url.is_empty() {
            return Err(OrderFlowError::IncompleteConfig(config.id.clone(), "no payment page URL".into()));
        }
        let category_name = match self.db.fetch_category(&donation.category_id).await {
            Ok(Some(category)) => category.name,
            Ok(None) => donation.category_id.clone(),
            Err(e) => {
                warn!("🔄️📦️ Could not look up category '{}'. {e}", donation.category_id);
                donation.category_id.clone()
            },
        };
        let order = self.insert_with_fresh_id(&donation, amount).await?;
        let order_id = order.order_id.clone();
        let request = PayRequest {
            method: donation.method,
            reflect: format!("{}-{}", donation.tenant_config_id, donation.category_id),
            terminal_sn: config.terminal_sn.clone(),
            order_id: order_id.clone(),
            total_amount: amount,
            subject: payment_subject(&config, &category_name),
            operator: DONATION_OPERATOR.to_string(),
            return_url: urls.return_url.clone(),
            notify_url: urls.notify_url.clone(),
        };
        let redirect_url = request.to_url(&config.gateway_url, &config.terminal_key);
        let poller = self.poller.clone();
        let poll_id = order_id.clone();
        self.supervisor.spawn(order_id.clone(), move |token| poller.run(poll_id, token));
        info!("🔄️📦️ Order {order_id} created for {amount} {} via {}", dpg_common::CURRENCY_CODE, donation.method);
        Ok(CreatedOrder { order_id, redirect_url })
    }

    async fn insert_with_fresh_id(&self, donation: &NewDonation, amount: Fen) -> Result<Order, OrderFlowError> {
        for _ in 0..ORDER_ID_ATTEMPTS {
            let order_id = generate_order_id();
            if order_id.as_str().len() > MAX_ORDER_ID_LEN {
                return Err(OrderFlowError::OrderIdTooLong(order_id.to_string()));
            }
            let order = NewOrder::new(order_id, amount, donation.method)
                .with_tenant(&donation.tenant_config_id)
                .with_category(&donation.category_id)
                .with_payer(&donation.payer_ref)
                .with_blessing(&donation.blessing);
            match self.db.insert_order(order).await? {
                InsertOrderResult::Inserted(order) => return Ok(order),
                InsertOrderResult::AlreadyExists(order) => {
                    debug!("🔄️📦️ Order id {} collided with an existing order. Trying another.", order.order_id);
                },
            }
        }
        Err(DonationDbError::QueryError("could not allocate a unique order id".into()).into())
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        Ok(self.db.fetch_order_by_order_id(order_id).await?)
    }

    /// Refunds a completed donation in full. The local order status is left as it is.
    pub async fn refund(&self, order_id: &OrderId) -> Result<RefundReceipt, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatusType::Completed {
            return Err(OrderFlowError::NotRefundable(order_id.clone(), order.status));
        }
        let config = self.resolver.resolve(&order.tenant_config_id).await;
        info!("🔄️📦️ Refunding {} for order {order_id}", order.amount);
        let receipt = self.gateway.refund_order(&config, order_id, order.amount).await?;
        Ok(receipt)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_ids() {
        let id = generate_order_id();
        let s = id.as_str();
        assert!(s.starts_with("ORD"));
        assert_eq!(s.len(), 3 + 14 + 4);
        assert!(s[3..].chars().all(|c| c.is_ascii_digit()));
        assert!(s.len() <= MAX_ORDER_ID_LEN);
    }

    #[test]
    fn subjects_are_truncated() {
        let config = TenantConfig { store_name: "Main Hall".into(), ..Default::default() };
        assert_eq!(payment_subject(&config, "Lamp"), "捐款-Main Hall-Lamp");
        let long = "灯".repeat(80);
        let subject = payment_subject(&config, &long);
        assert_eq!(subject.chars().count(), MAX_SUBJECT_CHARS);
        assert!(subject.starts_with("捐款-Main Hall-灯"));
    }

    #[test]
    fn subject_falls_back_to_merchant_name() {
        let config = TenantConfig { merchant_name: "Temple".into(), ..Default::default() };
        assert_eq!(payment_subject(&config, "3"), "捐款-Temple-3");
    }
}
