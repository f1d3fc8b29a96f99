//! Donor display details.
//!
//! Nicknames and avatars come from the wallet provider's profile API, which lives outside the engine. The engine only
//! asks an [`IdentityEnricher`] for them when it has a donation to show, and never waits on one to settle an order.
use async_trait::async_trait;
use log::*;

use crate::{
    db_types::{PayerIdentity, PaymentMethod, ANONYMOUS_PAYER},
    dpe_api::errors::EnrichmentError,
    traits::RankingsManagement,
};

#[async_trait]
pub trait IdentityEnricher: Send + Sync + 'static {
    /// Returns the display details for a payer, or `None` if there are none.
    async fn enrich(&self, method: PaymentMethod, payer_ref: &str) -> Result<Option<PayerIdentity>, EnrichmentError>;
}

/// Reads identities that the profile collaborator has already stored.
#[derive(Clone)]
pub struct StoredIdentityEnricher<B> {
    db: B,
}

impl<B> StoredIdentityEnricher<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

#[async_trait]
impl<B> IdentityEnricher for StoredIdentityEnricher<B>
where B: RankingsManagement + Send + Sync + 'static
{
    async fn enrich(&self, method: PaymentMethod, payer_ref: &str) -> Result<Option<PayerIdentity>, EnrichmentError> {
        if payer_ref.is_empty() || payer_ref == ANONYMOUS_PAYER {
            return Ok(None);
        }
        let identity = self.db.fetch_payer_identity(method, payer_ref).await?;
        if identity.is_none() {
            trace!("🔄️📦️ No stored identity for {method} payer {payer_ref}");
        }
        Ok(identity)
    }
}
