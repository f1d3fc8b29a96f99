//! Background status polling.
//!
//! Every new order gets a [`Poller`] that asks the gateway for the order's status on a decaying schedule until the
//! order settles, the poller is cancelled, or the schedule runs out. Pollers are registered with a
//! [`PollerSupervisor`] under their order id, so the webhook path (or a shutdown) can stop them early.
use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use dashmap::DashMap;
use log::*;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::{OrderId, OrderStatusType},
    dpe_api::{
        config_resolver::ConfigResolver,
        status_updater::{StatusUpdater, UpdateSource},
    },
    gateway::GatewayApi,
    traits::DonationDatabase,
};

//--------------------------------------     PollSchedule      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Wait before the first query
    pub initial_delay: Duration,
    pub fast_interval: Duration,
    /// Queries use `fast_interval` while the elapsed time is within this window
    pub fast_window: Duration,
    pub slow_interval: Duration,
    /// After this, one final query is made and the poller stops
    pub max_elapsed: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            fast_interval: Duration::from_secs(3),
            fast_window: Duration::from_secs(60),
            slow_interval: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(360),
        }
    }
}

impl PollSchedule {
    /// How long to wait after a query made at `elapsed`. `None` means the polling budget is spent.
    pub fn next_interval(&self, elapsed: Duration) -> Option<Duration> {
        if elapsed > self.max_elapsed {
            None
        } else if elapsed <= self.fast_window {
            Some(self.fast_interval)
        } else {
            Some(self.slow_interval)
        }
    }
}

//--------------------------------------   PollerSupervisor    ---------------------------------------------------------
/// Keeps a cancellation token for every running poller.
#[derive(Clone, Default)]
pub struct PollerSupervisor {
    tasks: Arc<DashMap<OrderId, (u64, CancellationToken)>>,
    root: CancellationToken,
    generation: Arc<AtomicU64>,
}

impl PollerSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` with a fresh token registered under `order_id`. A poller already registered for the same order is
    /// cancelled. The registration is removed when the task ends.
    pub fn spawn<F, Fut>(&self, order_id: OrderId, task: F) -> JoinHandle<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.root.child_token();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some((_, previous)) = self.tasks.insert(order_id.clone(), (generation, token.clone())) {
            warn!("🕰️ A poller for order {order_id} was already running. Replacing it.");
            previous.cancel();
        }
        let fut = task(token);
        let tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            fut.await;
            tasks.remove_if(&order_id, |_, (g, _)| *g == generation);
        })
    }

    /// Stops the poller for `order_id`. Returns false if there was none.
    pub fn cancel(&self, order_id: &OrderId) -> bool {
        match self.tasks.remove(order_id) {
            Some((_, (_, token))) => {
                token.cancel();
                true
            },
            None => false,
        }
    }

    /// Cancels every poller, including any spawned after this call.
    pub fn shutdown(&self) {
        info!("🕰️ Stopping {} pollers", self.tasks.len());
        self.root.cancel();
        self.tasks.clear();
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_active(&self, order_id: &OrderId) -> bool {
        self.tasks.contains_key(order_id)
    }
}

//--------------------------------------        Poller         ---------------------------------------------------------
enum PollStep {
    Continue,
    Settled,
}

pub struct Poller<B, G> {
    db: B,
    gateway: Arc<G>,
    resolver: ConfigResolver<B, G>,
    updater: StatusUpdater<B>,
    schedule: PollSchedule,
}

impl<B: Clone, G> Clone for Poller<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: Arc::clone(&self.gateway),
            resolver: self.resolver.clone(),
            updater: self.updater.clone(),
            schedule: self.schedule,
        }
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

impl<B, G> Poller<B, G>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    pub fn new(
        db: B,
        gateway: Arc<G>,
        resolver: ConfigResolver<B, G>,
        updater: StatusUpdater<B>,
        schedule: PollSchedule,
    ) -> Self {
        Self { db, gateway, resolver, updater, schedule }
    }

    pub async fn run(self, order_id: OrderId, cancel: CancellationToken) {
        let start = Instant::now();
        debug!("🕰️ Poller for order {order_id} started");
        if !sleep_or_cancel(self.schedule.initial_delay, &cancel).await {
            debug!("🕰️ Poller for order {order_id} cancelled before its first query");
            return;
        }
        while let Some(interval) = self.schedule.next_interval(start.elapsed()) {
            if let PollStep::Settled = self.tick(&order_id).await {
                debug!("🕰️ Poller for order {order_id} finished after {}s", start.elapsed().as_secs());
                return;
            }
            if !sleep_or_cancel(interval, &cancel).await {
                debug!("🕰️ Poller for order {order_id} cancelled");
                return;
            }
        }
        self.expire(&order_id).await;
    }

    async fn tick(&self, order_id: &OrderId) -> PollStep {
        let order = match self.db.fetch_order_by_order_id(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!("🕰️ Order {order_id} has disappeared. Stopping its poller.");
                return PollStep::Settled;
            },
            Err(e) => {
                warn!("🕰️ Could not read order {order_id}. Retrying on the next tick. {e}");
                return PollStep::Continue;
            },
        };
        if order.status.is_terminal() {
            debug!("🕰️ Order {order_id} was settled elsewhere as {}", order.status);
            return PollStep::Settled;
        }
        let config = self.resolver.resolve(&order.tenant_config_id).await;
        let result = match self.gateway.query_order(&config, order_id).await {
            Ok(result) => result,
            Err(e) => {
                warn!("🕰️ Status query for order {order_id} failed. Retrying on the next tick. {e}");
                return PollStep::Continue;
            },
        };
        let status = result.status.to_order_status();
        trace!("🕰️ Gateway says order {order_id} is {:?}", result.status);
        match status {
            OrderStatusType::Pending => PollStep::Continue,
            OrderStatusType::Unknown => {
                self.record(order_id, status, None, UpdateSource::Poller).await;
                PollStep::Continue
            },
            OrderStatusType::Completed | OrderStatusType::Failed => {
                if self.record(order_id, status, result.payer_uid.as_deref(), UpdateSource::Poller).await {
                    PollStep::Settled
                } else {
                    PollStep::Continue
                }
            },
        }
    }

    /// The schedule has run out. Unless the order settled in the meantime, one last query decides it, and anything
    /// short of a definite answer leaves it `Unknown`.
    async fn expire(&self, order_id: &OrderId) {
        let order = match self.db.fetch_order_by_order_id(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return,
            Err(e) => {
                error!("🕰️ Could not read order {order_id} at expiry. Marking it Unknown. {e}");
                self.record(order_id, OrderStatusType::Unknown, None, UpdateSource::PollerExpiry).await;
                return;
            },
        };
        if order.status.is_terminal() {
            debug!("🕰️ Order {order_id} settled as {} before the poller expired", order.status);
            return;
        }
        let config = self.resolver.resolve(&order.tenant_config_id).await;
        let (status, payer_uid) = match self.gateway.query_order(&config, order_id).await {
            Ok(result) if result.status.to_order_status().is_terminal() => {
                (result.status.to_order_status(), result.payer_uid)
            },
            Ok(result) => {
                info!("🕰️ Order {order_id} is still {:?} after the polling window. Marking it Unknown.", result.status);
                (OrderStatusType::Unknown, None)
            },
            Err(e) => {
                warn!("🕰️ Final status query for order {order_id} failed. Marking it Unknown. {e}");
                (OrderStatusType::Unknown, None)
            },
        };
        self.record(order_id, status, payer_uid.as_deref(), UpdateSource::PollerExpiry).await;
    }

    async fn record(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        payer_uid: Option<&str>,
        source: UpdateSource,
    ) -> bool {
        match self.updater.apply(order_id, status, payer_uid, source).await {
            Ok(_) => true,
            Err(e) => {
                error!("🕰️ Could not record status {status} for order {order_id}. {e}");
                false
            },
        }
    }
}
