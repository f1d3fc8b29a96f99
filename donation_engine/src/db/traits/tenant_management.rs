use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db_types::{Category, TenantConfig, TerminalCredentials},
    traits::DonationDbError,
};

/// Storage for tenant gateway credentials and donation categories.
#[async_trait]
pub trait TenantManagement {
    async fn fetch_tenant_config(&self, id: &str) -> Result<Option<TenantConfig>, DonationDbError>;

    /// Inserts the configuration, or replaces every field of an existing one with the same id.
    async fn save_tenant_config(&self, config: &TenantConfig) -> Result<(), DonationDbError>;

    /// Stores rotated terminal credentials. `signed_in_at` is set after a successful daily check-in, and left
    /// untouched after an activation.
    async fn update_terminal_credentials(
        &self,
        id: &str,
        credentials: &TerminalCredentials,
        signed_in_at: Option<DateTime<Utc>>,
    ) -> Result<(), DonationDbError>;

    async fn fetch_category(&self, id: &str) -> Result<Option<Category>, DonationDbError>;

    async fn fetch_categories(&self) -> Result<Vec<Category>, DonationDbError>;

    async fn save_category(&self, category: &Category) -> Result<(), DonationDbError>;
}
