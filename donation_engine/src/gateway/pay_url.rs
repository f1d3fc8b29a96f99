use dpg_common::Secret;

use crate::{
    db_types::{Fen, OrderId, PaymentMethod},
    signature::sign_params_md5,
};

/// Recorded as the cashier on every order created by this system.
pub const DONATION_OPERATOR: &str = "donation_system";

/// The parameters of a hosted-payment-page redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayRequest {
    pub method: PaymentMethod,
    pub reflect: String,
    pub terminal_sn: String,
    pub order_id: OrderId,
    pub total_amount: Fen,
    pub subject: String,
    pub operator: String,
    pub return_url: String,
    pub notify_url: String,
}

impl PayRequest {
    /// The parameters in the order the gateway expects them on the query string.
    pub fn ordered_params(&self) -> [(&'static str, String); 9] {
        [
            ("payway", self.method.payway().to_string()),
            ("reflect", self.reflect.clone()),
            ("terminal_sn", self.terminal_sn.clone()),
            ("client_sn", self.order_id.as_str().to_string()),
            ("total_amount", self.total_amount.value().to_string()),
            ("subject", self.subject.clone()),
            ("operator", self.operator.clone()),
            ("return_url", self.return_url.clone()),
            ("notify_url", self.notify_url.clone()),
        ]
    }

    pub fn sign(&self, terminal_key: &Secret<String>) -> String {
        sign_params_md5(self.ordered_params(), terminal_key.reveal())
    }

    /// Assembles the redirect URL. Every value is percent-encoded except the trailing `sign`, which is hex already.
    pub fn to_url(&self, gateway_url: &str, terminal_key: &Secret<String>) -> String {
        let sign = self.sign(terminal_key);
        let query = self
            .ordered_params()
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .chain(std::iter::once(format!("sign={sign}")))
            .collect::<Vec<String>>()
            .join("&");
        let separator = if gateway_url.contains('?') { '&' } else { '?' };
        format!("{gateway_url}{separator}{query}")
    }
}
