//! #  Database management and control.
//!
//! This module defines the interface contracts of the donation engine database *backends*.
//!
//! * [`OrderManagement`] stores orders and guards their status transitions. Completed and Failed are terminal: a
//!   backend must refuse to move an order out of either state, and must do so atomically so that a poller tick and a
//!   webhook racing on the same order can never both "win".
//! * [`TenantManagement`] stores per-tenant gateway credentials and donation categories.
//! * [`RankingsManagement`] provides the read-only queries behind the public donation ranking, plus the payer identity
//!   records used to decorate it.
//! * [`DonationDatabase`] bundles the three for components that need all of them.
mod data_objects;
mod donation_database;
mod order_management;
mod rankings_management;
mod tenant_management;

pub use data_objects::{DonationRecord, InsertOrderResult, RankingQuery, TransitionResult};
pub use donation_database::{DonationDatabase, DonationDbError};
pub use order_management::OrderManagement;
pub use rankings_management::RankingsManagement;
pub use tenant_management::TenantManagement;
