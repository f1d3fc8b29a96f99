use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{OrderManagement, RankingsManagement, TenantManagement},
};

/// The highest level of behaviour for backends supporting the donation engine.
pub trait DonationDatabase: OrderManagement + TenantManagement + RankingsManagement + Clone + Send + Sync + 'static {
    /// The URL of the database
    fn url(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum DonationDbError {
    #[error("Database driver error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Cannot insert duplicate order {0}")]
    DuplicateOrder(OrderId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Tenant configuration '{0}' does not exist")]
    TenantConfigNotFound(String),
}
