use std::sync::Arc;

use donation_engine::{
    broadcast::{BroadcastHub, PayNotification},
    events::{DonationConfirmedEvent, DonationFailedEvent, EventHandlers, EventHooks},
    IdentityEnricher,
};
use futures::future::BoxFuture;
use log::*;

pub const LIVE_FEED_EVENT_BUFFER_SIZE: usize = 25;

/// Wires donation events to the live feed.
///
/// 1. DonationConfirmedEvent - The donor's display details are looked up, and the donation is pushed to every
///    subscriber watching its tenant and category. A failed lookup shows the donation as anonymous; it never holds the
///    broadcast back.
/// 2. DonationFailedEvent - Logged. Viewers are not told about failed payments.
pub fn create_live_feed_event_handlers(hub: BroadcastHub, enricher: Arc<dyn IdentityEnricher>) -> EventHandlers {
    let mut hooks = EventHooks::default();
    // --- On DonationConfirmed Handler ---
    hooks.on_donation_confirmed(move |ev| {
        let hub = hub.clone();
        let enricher = Arc::clone(&enricher);
        Box::pin(async move { announce_donation(ev, &hub, enricher.as_ref()).await }) as BoxFuture<'static, ()>
    });
    // --- On DonationFailed Handler ---
    hooks.on_donation_failed(|ev: DonationFailedEvent| {
        info!("📣️ Order {} failed. It will not be shown on the live feed.", ev.order.order_id);
        no_op()
    });
    EventHandlers::new(LIVE_FEED_EVENT_BUFFER_SIZE, hooks)
}

pub async fn announce_donation(ev: DonationConfirmedEvent, hub: &BroadcastHub, enricher: &dyn IdentityEnricher) {
    let order = ev.order;
    let identity = match enricher.enrich(order.payment_method, &order.payer_ref).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("📣️ Could not look up the donor for order {}. Showing it as anonymous. {e}", order.order_id);
            None
        },
    };
    let notification = PayNotification::for_order(&order, identity.as_ref());
    match hub.broadcast_to_filtered(&notification, &order.tenant_config_id, &order.category_id) {
        Ok(sends) => info!("📣️ Order {} announced to {} subscribers", order.order_id, sends.len()),
        Err(e) => error!("📣️ Could not announce order {}. {e}", order.order_id),
    }
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
