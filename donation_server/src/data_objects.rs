use std::str::FromStr;

use donation_engine::{
    db_types::{PaymentMethod, TenantConfig},
    order_objects::{CreatedOrder, NewDonation},
    traits::RankingQuery,
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// `?payment=<tenant>` on the donation and activation endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantParams {
    #[serde(default)]
    pub payment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationRequest {
    /// In yuan
    pub amount: f64,
    /// `wechat` or `alipay`
    pub payment: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub blessing: String,
}

impl DonationRequest {
    pub fn payment_method(&self) -> Result<PaymentMethod, ServerError> {
        PaymentMethod::from_str(&self.payment)
            .map_err(|_| ServerError::InvalidRequestBody(format!("'{}' is not a supported payment method", self.payment)))
    }

    pub fn into_donation(self, method: PaymentMethod, tenant: &str, payer_ref: &str) -> NewDonation {
        NewDonation::new(self.amount, method)
            .with_tenant(tenant)
            .with_category(&self.category)
            .with_payer(payer_ref)
            .with_blessing(&self.blessing)
    }
}

/// The same fields as [`DonationRequest`], posted from a plain HTML form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationForm {
    pub amount: String,
    pub payment: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub blessing: String,
    /// Overrides `?payment=` when present
    #[serde(default)]
    pub payment_config_id: String,
}

impl TryFrom<DonationForm> for DonationRequest {
    type Error = ServerError;

    fn try_from(form: DonationForm) -> Result<Self, Self::Error> {
        let amount = form
            .amount
            .trim()
            .parse::<f64>()
            .map_err(|e| ServerError::InvalidRequestBody(format!("Invalid amount '{}'. {e}", form.amount)))?;
        Ok(Self { amount, payment: form.payment, category: form.category, blessing: form.blessing })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationResponse {
    pub order_id: String,
    pub pay_url: String,
}

impl From<CreatedOrder> for DonationResponse {
    fn from(order: CreatedOrder) -> Self {
        Self { order_id: order.order_id.to_string(), pay_url: order.redirect_url }
    }
}

/// Query parameters for the rankings endpoint. Values that don't parse fall back to the defaults rather than failing
/// the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingParams {
    pub limit: Option<String>,
    pub page: Option<String>,
    pub payment: Option<String>,
    pub categories: Option<String>,
}

impl From<RankingParams> for RankingQuery {
    fn from(params: RankingParams) -> Self {
        let number = |s: Option<String>| s.and_then(|s| s.trim().parse::<i64>().ok());
        RankingQuery::new(number(params.limit), number(params.page), params.payment, params.categories)
    }
}

/// The public view of a tenant's payment configuration. Keys stay on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfigView {
    pub id: String,
    pub app_id: String,
    pub terminal_sn: String,
    pub merchant_name: String,
    pub store_name: String,
    pub device_id: String,
    pub is_active: bool,
}

impl From<TenantConfig> for PaymentConfigView {
    fn from(config: TenantConfig) -> Self {
        Self {
            id: config.id,
            app_id: config.app_id,
            terminal_sn: config.terminal_sn,
            merchant_name: config.merchant_name,
            store_name: config.store_name,
            device_id: config.device_id,
            is_active: config.is_active,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryParams {
    pub payment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub activation_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationResponse {
    pub message: String,
    pub terminal_sn: String,
}
