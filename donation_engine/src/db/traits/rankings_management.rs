use async_trait::async_trait;

use crate::{
    db_types::{PayerIdentity, PaymentMethod},
    traits::{DonationDbError, DonationRecord, RankingQuery},
};

/// Read-side queries for the public donation ranking.
#[async_trait]
pub trait RankingsManagement {
    /// Completed donations matching the query, newest first.
    async fn fetch_completed_donations(&self, query: &RankingQuery) -> Result<Vec<DonationRecord>, DonationDbError>;

    async fn fetch_payer_identity(
        &self,
        method: PaymentMethod,
        payer_ref: &str,
    ) -> Result<Option<PayerIdentity>, DonationDbError>;

    async fn save_payer_identity(&self, identity: &PayerIdentity) -> Result<(), DonationDbError>;
}
