use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use dpg_common::Fen;
use dpg_common::Secret;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

/// Payer reference recorded when the donor has not authorised with the wallet provider.
pub const ANONYMOUS_PAYER: &str = "anonymous";
/// Display name shown for donors without a stored identity.
pub const ANONYMOUS_NICKNAME: &str = "匿名施主";
pub const DEFAULT_AVATAR_URL: &str = "./static/avatar.jpeg";

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created and the gateway has not reported a final outcome yet.
    Pending,
    /// The gateway confirmed the payment. Terminal.
    Completed,
    /// The payment was cancelled or rejected. Terminal.
    Failed,
    /// The gateway never gave a usable answer before the polling budget ran out. A later webhook can still resolve it.
    Unknown,
}

impl OrderStatusType {
    /// Completed and Failed orders can never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Failed => write!(f, "Failed"),
            OrderStatusType::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Unknown" => Ok(Self::Unknown),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Unknown");
            OrderStatusType::Unknown
        })
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wechat,
    Alipay,
}

impl PaymentMethod {
    /// The gateway's `payway` code for this wallet.
    pub fn payway(&self) -> &'static str {
        match self {
            PaymentMethod::Wechat => "3",
            PaymentMethod::Alipay => "1",
        }
    }

    /// The cookie that holds the payer's wallet identity after an OAuth round trip.
    pub fn identity_cookie(&self) -> &'static str {
        match self {
            PaymentMethod::Wechat => "wechat_openid",
            PaymentMethod::Alipay => "alipay_user_id",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::Alipay => "alipay",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wechat" => Ok(Self::Wechat),
            "alipay" => Ok(Self::Alipay),
            s => Err(ConversionError(format!("Unsupported payment method: {s}"))),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub amount: Fen,
    pub payment_method: PaymentMethod,
    pub tenant_config_id: String,
    pub category_id: String,
    pub payer_ref: String,
    pub payer_uid: Option<String>,
    pub blessing: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub amount: Fen,
    pub payment_method: PaymentMethod,
    pub tenant_config_id: String,
    pub category_id: String,
    pub payer_ref: String,
    pub blessing: String,
}

impl NewOrder {
    pub fn new(order_id: OrderId, amount: Fen, payment_method: PaymentMethod) -> Self {
        Self {
            order_id,
            amount,
            payment_method,
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

    pub fn with_payer(mut self, payer_ref: &str) -> Self {
        self.payer_ref = payer_ref.to_string();
        self
    }

    pub fn with_blessing(mut self, blessing: &str) -> Self {
        self.blessing = blessing.to_string();
        self
    }
}

//--------------------------------------     TenantConfig      ---------------------------------------------------------
/// Gateway credentials for one merchant terminal.
///
/// Values are immutable once loaded. A sign-in that rotates the terminal credentials produces a new `TenantConfig`
/// rather than modifying a shared one, so concurrent requests always sign with a consistent set of keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantConfig {
    pub id: String,
    pub vendor_sn: String,
    pub vendor_key: Secret<String>,
    pub app_id: String,
    pub terminal_sn: String,
    pub terminal_key: Secret<String>,
    pub merchant_name: String,
    pub store_name: String,
    pub device_id: String,
    /// Base URL for the terminal API (check-in, activation, query, refund)
    pub api_url: String,
    /// Base URL for the hosted payment page the donor is redirected to
    pub gateway_url: String,
    pub is_active: bool,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl TenantConfig {
    /// Returns a copy of this configuration with rotated terminal credentials.
    pub fn with_terminal_credentials(&self, terminal_sn: &str, terminal_key: Secret<String>) -> Self {
        Self { terminal_sn: terminal_sn.to_string(), terminal_key, ..self.clone() }
    }

    pub fn signed_in_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_sign_in_at = Some(at);
        self
    }
}

/// Terminal credentials issued by the gateway after activation or a daily check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalCredentials {
    pub terminal_sn: String,
    pub terminal_key: Secret<String>,
    pub merchant_name: Option<String>,
    pub store_name: Option<String>,
}

//--------------------------------------       Category        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub tenant_config_id: String,
}

//--------------------------------------     PayerIdentity     ---------------------------------------------------------
/// Display details for a donor, supplied by the wallet provider's profile API.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PayerIdentity {
    pub payer_ref: String,
    pub payment_method: PaymentMethod,
    pub nickname: String,
    pub avatar_url: String,
}
