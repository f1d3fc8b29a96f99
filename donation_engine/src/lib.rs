//! Donation Payment Engine
//!
//! The donation engine reconciles the payment gateway's view of a donation with the locally stored order, and pushes
//! confirmed donations out to live viewers. It is independent of any web framework.
//!
//! The library is divided into these main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. Components depend on the traits
//!    in [`traits`], never on the backend directly. The data types used in the database are public and live in
//!    [`db_types`].
//! 2. The gateway ([`signature`] and [`gateway`]): request signing and verification, and the typed HTTP client for the
//!    gateway's terminal API.
//! 3. The engine public API ([`mod@dpe_api`]): order creation, per-tenant credentials, status polling, webhook
//!    reconciliation, rankings and refunds.
//! 4. Live fan-out ([`broadcast`]) to WebSocket subscribers.
//!
//! An order can be settled by either its poller or a webhook, whichever gets there first. Both go through one guarded
//! write, and only the write that actually settles the order emits a [`events::DonationConfirmedEvent`] or
//! [`events::DonationFailedEvent`]. Hook into those events to broadcast or enrich donations.
mod db;

pub mod broadcast;
pub mod db_types;
pub mod dpe_api;
pub mod events;
pub mod gateway;
pub mod signature;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits;
pub use dpe_api::{
    config_resolver::{ConfigResolver, DEFAULT_CONFIG_CACHE_TTL},
    enrichment::{IdentityEnricher, StoredIdentityEnricher},
    errors::{EnrichmentError, OrderFlowError, WebhookError},
    order_flow_api::OrderFlowApi,
    order_objects,
    poller::{PollSchedule, PollerSupervisor},
    rankings_api::{Pagination, RankingEntry, RankingsApi, RankingsPage},
    status_updater::StatusUpdater,
    webhook::{ReconcileOutcome, WebhookAck, WebhookReconciler, WEBHOOK_ACK, WEBHOOK_NACK},
};
pub use traits::{DonationDatabase, DonationDbError, OrderManagement, RankingsManagement, TenantManagement};
