use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, PaymentMethod, ANONYMOUS_PAYER};

/// A donation as submitted by the donor, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDonation {
    /// In yuan, as entered
    pub amount: f64,
    pub method: PaymentMethod,
    pub tenant_config_id: String,
    pub category_id: String,
    pub payer_ref: String,
    pub blessing: String,
}

impl NewDonation {
    pub fn new(amount: f64, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            tenant_config_id: String::default(),
            category_id: String::default(),
            payer_ref: ANONYMOUS_PAYER.to_string(),
            blessing: String::default(),
        }
    }

    pub fn with_tenant(mut self, tenant_config_id: &str) -> Self {
        self.tenant_config_id = tenant_config_id.to_string();
        self
    }

    pub fn with_category(mut self, category_id: &str) -> Self {
        self.category_id = category_id.to_string();
        self
    }

    /// An empty reference keeps the donation anonymous.
    pub fn with_payer(mut self, payer_ref: &str) -> Self {
        if !payer_ref.is_empty() {
            self.payer_ref = payer_ref.to_string();
        }
        self
    }

    pub fn with_blessing(mut self, blessing: &str) -> Self {
        self.blessing = blessing.to_string();
        self
    }
}

/// Where the gateway sends the donor back to, and where it delivers the payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    pub notify_url: String,
    pub return_url: String,
}

impl CallbackUrls {
    /// Derives both URLs from the public base URL of the server.
    pub fn from_base_url(base_url: &str, tenant_config_id: &str, category_id: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            notify_url: format!("{base}/api/callback"),
            return_url: format!("{base}?payment={tenant_config_id}&categories={category_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub order_id: OrderId,
    pub redirect_url: String,
}
