use dpg_common::Secret;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderStatusType, TerminalCredentials},
    gateway::GatewayError,
};

//--------------------------------------      Requests       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct CheckInRequest<'a> {
    pub terminal_sn: &'a str,
    pub device_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivateRequest<'a> {
    pub app_id: &'a str,
    pub code: &'a str,
    pub device_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub terminal_sn: &'a str,
    pub client_sn: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest<'a> {
    pub terminal_sn: &'a str,
    pub client_sn: String,
    pub orig_client_sn: &'a str,
    /// Minor units, as a decimal string
    pub refund_amount: String,
    pub operator: &'a str,
}

//--------------------------------------      Responses      ---------------------------------------------------------
/// The outer shape shared by every terminal API response.
///
/// The payload arrives under `biz_response` for most calls, and under `data` for some older terminal endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEnvelope<T> {
    #[serde(default)]
    pub result_code: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default, alias = "err_msg")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub biz_response: Option<T>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> GatewayEnvelope<T> {
    pub fn is_success(&self) -> bool {
        matches!(self.result_code.as_str(), "200" | "SUCCESS")
    }

    /// Checks the top-level result code and hands back the payload.
    pub fn into_payload(self) -> Result<T, GatewayError> {
        if self.message.as_deref() == Some("Not Found") {
            return Err(GatewayError::EndpointNotFound(self.message.unwrap_or_default()));
        }
        if !self.is_success() {
            let message = self.error_message.or(self.message).unwrap_or_else(|| "unknown error".to_string());
            let code = self.error_code.unwrap_or(self.result_code);
            return Err(GatewayError::Rejected { code, message });
        }
        self.biz_response.or(self.data).ok_or(GatewayError::EmptyResponse)
    }
}

/// The business-level layer inside `biz_response`, used by the order query and refund endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct BizResponse<T> {
    #[serde(default)]
    pub result_code: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> BizResponse<T> {
    /// Result codes such as `FAIL`, `QUERY_FAIL` or `REFUND_ERROR` mark a business failure.
    pub fn is_failure(&self) -> bool {
        self.result_code.as_deref().map(|c| c.ends_with("FAIL") || c.ends_with("ERROR")).unwrap_or(false)
    }

    pub fn into_data(self) -> Result<T, GatewayError> {
        if self.is_failure() {
            return Err(GatewayError::BusinessError {
                code: self.error_code.or(self.result_code).unwrap_or_default(),
                message: self.error_message.unwrap_or_default(),
            });
        }
        self.data.ok_or(GatewayError::EmptyResponse)
    }
}

/// Terminal details returned by activation and check-in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerminalData {
    #[serde(default)]
    pub terminal_sn: Option<String>,
    #[serde(default)]
    pub terminal_key: Option<String>,
    #[serde(default)]
    pub merchant_sn: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub store_sn: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
}

impl TerminalData {
    /// Merges the response with the credentials currently in use. Fields the gateway leaves out or empty keep their
    /// current value.
    pub fn into_credentials(self, current_sn: &str, current_key: &Secret<String>) -> TerminalCredentials {
        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());
        TerminalCredentials {
            terminal_sn: non_empty(self.terminal_sn).unwrap_or_else(|| current_sn.to_string()),
            terminal_key: non_empty(self.terminal_key).map(Secret::new).unwrap_or_else(|| current_key.clone()),
            merchant_name: non_empty(self.merchant_name),
            store_name: non_empty(self.store_name),
        }
    }
}

/// The order status codes the gateway reports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum GatewayOrderStatus {
    Paid,
    PayCanceled,
    Created,
    PayError,
    Other(String),
}

impl From<String> for GatewayOrderStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PAID" => Self::Paid,
            "PAY_CANCELED" => Self::PayCanceled,
            "CREATED" => Self::Created,
            "PAY_ERROR" => Self::PayError,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for GatewayOrderStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl GatewayOrderStatus {
    /// `PAID` completes an order and `PAY_CANCELED` fails it. `CREATED` and `PAY_ERROR` mean the donor may still pay.
    /// Anything else is unrecognised.
    pub fn to_order_status(&self) -> OrderStatusType {
        match self {
            Self::Paid => OrderStatusType::Completed,
            Self::PayCanceled => OrderStatusType::Failed,
            Self::Created | Self::PayError => OrderStatusType::Pending,
            Self::Other(_) => OrderStatusType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryOrderData {
    pub order_status: GatewayOrderStatus,
    #[serde(default)]
    pub sn: Option<String>,
    #[serde(default)]
    pub client_sn: Option<String>,
    #[serde(default)]
    pub total_amount: Option<String>,
    #[serde(default)]
    pub payer_uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQueryResult {
    pub status: GatewayOrderStatus,
    pub payer_uid: Option<String>,
}

impl From<QueryOrderData> for OrderQueryResult {
    fn from(data: QueryOrderData) -> Self {
        Self { status: data.order_status, payer_uid: data.payer_uid.filter(|s| !s.is_empty()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    #[serde(default)]
    pub order_status: String,
    #[serde(default)]
    pub sn: Option<String>,
    #[serde(default)]
    pub client_sn: Option<String>,
}
