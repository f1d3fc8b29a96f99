use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{categories, db_url, identities, new_pool, orders, tenants};
use crate::{
    db_types::{
        Category,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PayerIdentity,
        PaymentMethod,
        TenantConfig,
        TerminalCredentials,
    },
    traits::{
        DonationDatabase,
        DonationDbError,
        DonationRecord,
        InsertOrderResult,
        OrderManagement,
        RankingQuery,
        RankingsManagement,
        TenantManagement,
        TransitionResult,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl DonationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, DonationDbError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        match &result {
            InsertOrderResult::Inserted(o) => debug!("🗃️ Order {} has been saved in the DB with id {}", o.order_id, o.id),
            InsertOrderResult::AlreadyExists(o) => warn!("🗃️ Order {} already exists. Nothing was saved", o.order_id),
        }
        Ok(result)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn transition_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        payer_uid: Option<&str>,
    ) -> Result<TransitionResult, DonationDbError> {
        let mut tx = self.pool.begin().await?;
        let result = match orders::update_status_if_open(order_id, status, payer_uid, &mut tx).await? {
            Some(order) => TransitionResult::Applied(order),
            None => match orders::fetch_order_by_order_id(order_id, &mut tx).await? {
                Some(order) => TransitionResult::Unchanged(order),
                None => TransitionResult::NotFound,
            },
        };
        tx.commit().await?;
        Ok(result)
    }
}

#[async_trait]
impl TenantManagement for SqliteDatabase {
    async fn fetch_tenant_config(&self, id: &str) -> Result<Option<TenantConfig>, DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        tenants::fetch_tenant_config(id, &mut conn).await
    }

    async fn save_tenant_config(&self, config: &TenantConfig) -> Result<(), DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        tenants::upsert_tenant_config(config, &mut conn).await
    }

    async fn update_terminal_credentials(
        &self,
        id: &str,
        credentials: &TerminalCredentials,
        signed_in_at: Option<DateTime<Utc>>,
    ) -> Result<(), DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        tenants::update_terminal_credentials(id, credentials, signed_in_at, &mut conn).await
    }

    async fn fetch_category(&self, id: &str) -> Result<Option<Category>, DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        categories::fetch_category(id, &mut conn).await
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        categories::fetch_categories(&mut conn).await
    }

    async fn save_category(&self, category: &Category) -> Result<(), DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        categories::upsert_category(category, &mut conn).await
    }
}

#[async_trait]
impl RankingsManagement for SqliteDatabase {
    async fn fetch_completed_donations(&self, query: &RankingQuery) -> Result<Vec<DonationRecord>, DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        identities::fetch_completed_donations(query, &mut conn).await
    }

    async fn fetch_payer_identity(
        &self,
        method: PaymentMethod,
        payer_ref: &str,
    ) -> Result<Option<PayerIdentity>, DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        identities::fetch_payer_identity(method, payer_ref, &mut conn).await
    }

    async fn save_payer_identity(&self, identity: &PayerIdentity) -> Result<(), DonationDbError> {
        let mut conn = self.pool.acquire().await?;
        identities::upsert_payer_identity(identity, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `DPG_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, DonationDbError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, DonationDbError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), DonationDbError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DonationDbError::QueryError(format!("Migration failed: {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
