//! # Donation payment engine public API
//!
//! The `dpe_api` module exposes the programmatic API of the donation engine. As with the database traits, the API is
//! modular and each part is created by handing it a backend that implements the traits it needs.
//!
//! * [`order_flow_api`] creates orders, starts their pollers and handles refunds.
//! * [`config_resolver`] caches per-tenant gateway credentials and keeps them signed in.
//! * [`poller`] polls the gateway for the status of open orders on a decaying schedule.
//! * [`webhook`] verifies and applies the gateway's payment notifications.
//! * [`status_updater`] is the single write path for order status shared by the two above, and the source of the
//!   donation events.
//! * [`rankings_api`] serves the public list of completed donations.
//! * [`enrichment`] is the seam for donor nicknames and avatars.
//!
//! # API usage
//!
//! ```rust,ignore
//! let db = SqliteDatabase::new_with_url(url, 25).await?;
//! let gateway = Arc::new(UpayClient::new(Duration::from_secs(10))?);
//! let resolver = ConfigResolver::new(db.clone(), gateway.clone(), default_config, DEFAULT_CONFIG_CACHE_TTL);
//! let api = OrderFlowApi::new(db, gateway, resolver, producers, PollerSupervisor::new());
//! let created = api.create_order(NewDonation::new(9.99, PaymentMethod::Wechat), &urls).await?;
//! ```

pub mod config_resolver;
pub mod enrichment;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod poller;
pub mod rankings_api;
pub mod status_updater;
pub mod webhook;
