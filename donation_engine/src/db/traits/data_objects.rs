use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db_types::Order;

#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    Inserted(Order),
    AlreadyExists(Order),
}

/// The outcome of a guarded status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// The status changed. Carries the order as it is after the write.
    Applied(Order),
    /// Nothing was written, either because the order already had the requested status or because it is in a terminal
    /// state.
    Unchanged(Order),
    NotFound,
}

impl TransitionResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Filter and pagination for the public ranking query. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingQuery {
    pub limit: i64,
    pub page: i64,
    pub tenant_config_id: Option<String>,
    pub category_id: Option<String>,
}

pub const DEFAULT_RANKING_LIMIT: i64 = 10;
pub const MAX_RANKING_LIMIT: i64 = 100;

impl Default for RankingQuery {
    fn default() -> Self {
        Self { limit: DEFAULT_RANKING_LIMIT, page: 1, tenant_config_id: None, category_id: None }
    }
}

impl RankingQuery {
    /// Builds a query from raw request parameters. Out-of-range values fall back to the defaults and the limit is
    /// capped at 100. Empty filters are ignored.
    pub fn new(limit: Option<i64>, page: Option<i64>, tenant: Option<String>, category: Option<String>) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_RANKING_LIMIT),
            _ => DEFAULT_RANKING_LIMIT,
        };
        let page = match page {
            Some(p) if p > 0 => p,
            _ => 1,
        };
        let tenant_config_id = tenant.filter(|s| !s.is_empty());
        let category_id = category.filter(|s| !s.is_empty());
        Self { limit, page, tenant_config_id, category_id }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// A completed donation joined with its category name and the donor's display details, if known.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DonationRecord {
    #[sqlx(flatten)]
    pub order: Order,
    pub category_name: String,
    pub nickname: String,
    pub avatar_url: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ranking_query_defaults_and_limits() {
        let q = RankingQuery::new(None, None, Some(String::new()), None);
        assert_eq!(q, RankingQuery::default());
        let q = RankingQuery::new(Some(500), Some(3), Some("6".into()), Some("3".into()));
        assert_eq!(q.limit, 100);
        assert_eq!(q.offset(), 200);
        assert_eq!(q.tenant_config_id.as_deref(), Some("6"));
        let q = RankingQuery::new(Some(-1), Some(0), None, None);
        assert_eq!((q.limit, q.page, q.offset()), (10, 1, 0));
    }

    #[test]
    fn huge_pages_do_not_overflow() {
        let q = RankingQuery::new(Some(100), Some(i64::MAX), None, None);
        assert_eq!(q.offset(), i64::MAX);
    }
}
