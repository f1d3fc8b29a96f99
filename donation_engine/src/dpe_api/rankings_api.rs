use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{ANONYMOUS_NICKNAME, DEFAULT_AVATAR_URL},
    traits::{DonationDbError, DonationRecord, RankingQuery, RankingsManagement},
};

/// One row of the public donation ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub order_id: String,
    /// In yuan
    pub amount: f64,
    pub payment: String,
    pub category: String,
    pub category_name: String,
    pub blessing: String,
    pub user_name: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<DonationRecord> for RankingEntry {
    fn from(record: DonationRecord) -> Self {
        let or_default = |s: String, default: &str| if s.is_empty() { default.to_string() } else { s };
        let order = record.order;
        Self {
            order_id: order.order_id.to_string(),
            amount: order.amount.to_yuan(),
            payment: order.tenant_config_id,
            category_name: or_default(record.category_name, &order.category_id),
            category: order.category_id,
            blessing: order.blessing,
            user_name: or_default(record.nickname, ANONYMOUS_NICKNAME),
            avatar_url: or_default(record.avatar_url, DEFAULT_AVATAR_URL),
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub page: i64,
    pub offset: i64,
    /// Number of entries on this page
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingsPage {
    pub rankings: Vec<RankingEntry>,
    pub pagination: Pagination,
}

/// Read-only view of completed donations. Subscribers that reconnect use this to catch up on what they missed.
pub struct RankingsApi<B> {
    db: B,
}

impl<B> RankingsApi<B>
where B: RankingsManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn rankings(&self, query: RankingQuery) -> Result<RankingsPage, DonationDbError> {
        let records = self.db.fetch_completed_donations(&query).await?;
        trace!("🗃️ Fetched {} ranking entries for {query:?}", records.len());
        let rankings = records.into_iter().map(RankingEntry::from).collect::<Vec<_>>();
        let pagination =
            Pagination { limit: query.limit, page: query.page, offset: query.offset(), total: rankings.len() as i64 };
        Ok(RankingsPage { rankings, pagination })
    }
}
