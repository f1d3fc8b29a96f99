use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, PayerIdentity, ANONYMOUS_NICKNAME, DEFAULT_AVATAR_URL};

pub const PAY_SUCCESS: &str = "pay_success";

/// The frame pushed to subscribers when a donation is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayNotification {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "orderNo")]
    pub order_no: String,
    /// In yuan
    pub amount: f64,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "Time")]
    pub time: String,
    /// Tenant config id
    pub payment: String,
    pub category: String,
    pub blessing: String,
    pub user_name: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

impl PayNotification {
    pub fn for_order(order: &Order, identity: Option<&PayerIdentity>) -> Self {
        let (user_name, avatar_url) = match identity {
            Some(id) if !id.nickname.is_empty() => {
                let avatar = if id.avatar_url.is_empty() { DEFAULT_AVATAR_URL } else { id.avatar_url.as_str() };
                (id.nickname.clone(), avatar.to_string())
            },
            _ => (ANONYMOUS_NICKNAME.to_string(), DEFAULT_AVATAR_URL.to_string()),
        };
        Self {
            kind: PAY_SUCCESS.to_string(),
            order_no: order.order_id.to_string(),
            amount: order.amount.to_yuan(),
            time: order.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
            payment: order.tenant_config_id.clone(),
            category: order.category_id.clone(),
            blessing: order.blessing.clone(),
            user_name,
            avatar_url,
            created_at: order.created_at,
        }
    }
}
