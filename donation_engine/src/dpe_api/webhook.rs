//! Inbound payment notifications.
//!
//! The gateway expects a fast answer, so [`WebhookReconciler::handle`] only verifies the signature before returning
//! the acknowledgement. The status update, and everything hanging off it via events, runs on a spawned task. Whatever
//! happens on that task cannot change the acknowledgement that was already given; it is logged and that is all.
use log::*;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::{
    db_types::{OrderId, OrderStatusType},
    dpe_api::{
        config_resolver::ConfigResolver,
        errors::WebhookError,
        status_updater::{StatusUpdater, UpdateSource},
    },
    gateway::GatewayApi,
    signature::{verify_params_md5, RsaVerifier, SignatureError},
    traits::{DonationDatabase, TransitionResult},
};

/// The literal body the gateway expects when a notification was accepted.
pub const WEBHOOK_ACK: &str = "success";
pub const WEBHOOK_NACK: &str = "fail";

/// Field names different callers use for our order id, most common first.
const ORDER_ID_FIELDS: [&str; 4] = ["client_sn", "order_id", "out_trade_no", "transaction_id"];
const STATUS_FIELDS: [&str; 3] = ["status", "order_status", "trade_status"];
const PAYER_FIELDS: [&str; 3] = ["payer_uid", "buyer_user_id", "openid"];
const SUCCESS_STATUSES: [&str; 3] = ["SUCCESS", "PAID", "TRADE_SUCCESS"];

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn first_of(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().filter_map(|name| fields.get(*name).and_then(as_text)).find(|v| !v.is_empty())
}

/// `reflect` comes back exactly as we sent it, usually as a JSON string. Older callers send an object.
fn reflect_payment(fields: &Map<String, Value>) -> Option<String> {
    let reflect = match fields.get("reflect")? {
        Value::String(s) => serde_json::from_str::<Value>(s).ok()?,
        other => other.clone(),
    };
    reflect.get("payment").and_then(as_text)
}

/// A decoded payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    /// The status text as the gateway sent it
    pub reported_status: String,
    pub payer_uid: Option<String>,
    pub reflect_payment: Option<String>,
    /// The embedded symmetric signature, if any
    pub sign: Option<String>,
    /// The top-level string fields. The symmetric signature covers these and nothing else.
    pub fields: Vec<(String, String)>,
}

impl WebhookNotification {
    pub fn from_slice(raw_body: &[u8]) -> Result<Self, WebhookError> {
        let value = serde_json::from_slice::<Value>(raw_body).map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, WebhookError> {
        let fields = value
            .as_object()
            .ok_or_else(|| WebhookError::MalformedPayload("the body is not a JSON object".into()))?;
        let order_id = first_of(fields, &ORDER_ID_FIELDS)
            .or_else(|| fields.get("wechat").and_then(|w| w.get("order_id")).and_then(as_text))
            .filter(|id| !id.is_empty())
            .map(OrderId::from)
            .ok_or(WebhookError::MissingOrderId)?;
        // A notification without a status is not a success
        let reported_status = first_of(fields, &STATUS_FIELDS).unwrap_or_default();
        let status = if SUCCESS_STATUSES.contains(&reported_status.to_ascii_uppercase().as_str()) {
            OrderStatusType::Completed
        } else {
            OrderStatusType::Failed
        };
        Ok(Self {
            order_id,
            status,
            reported_status,
            payer_uid: first_of(fields, &PAYER_FIELDS),
            reflect_payment: reflect_payment(fields),
            sign: fields.get("sign").and_then(as_text).filter(|s| !s.is_empty()),
            fields: fields.iter().filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string()))).collect(),
        })
    }
}

/// What the reconciliation tail ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(OrderStatusType),
    /// The order had already settled. Nothing was written.
    Duplicate,
    OrderNotFound,
    Failed(String),
}

/// An accepted notification. `body` goes back to the gateway straight away.
pub struct WebhookAck {
    pub body: &'static str,
    pub order_id: OrderId,
    pub reconciliation: JoinHandle<ReconcileOutcome>,
}

pub struct WebhookReconciler<B, G> {
    db: B,
    resolver: ConfigResolver<B, G>,
    updater: StatusUpdater<B>,
    verifier: Option<RsaVerifier>,
}

impl<B: Clone, G> Clone for WebhookReconciler<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            resolver: self.resolver.clone(),
            updater: self.updater.clone(),
            verifier: self.verifier.clone(),
        }
    }
}

impl<B, G> WebhookReconciler<B, G>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    /// Without a `verifier`, only the embedded symmetric signature is accepted.
    pub fn new(
        db: B,
        resolver: ConfigResolver<B, G>,
        updater: StatusUpdater<B>,
        verifier: Option<RsaVerifier>,
    ) -> Self {
        Self { db, resolver, updater, verifier }
    }

    /// Verifies the notification and, if it is genuine, starts reconciling it in the background.
    pub async fn handle(&self, raw_body: &[u8], authorization: Option<&str>) -> Result<WebhookAck, WebhookError> {
        let notification = WebhookNotification::from_slice(raw_body)?;
        self.verify(raw_body, authorization, &notification).await?;
        debug!(
            "🔄️📦️ Webhook for order {} reports '{}' (payment: {})",
            notification.order_id,
            notification.reported_status,
            notification.reflect_payment.as_deref().unwrap_or("-")
        );
        let order_id = notification.order_id.clone();
        let tail = self.clone();
        let reconciliation = tokio::spawn(async move { tail.reconcile(notification).await });
        Ok(WebhookAck { body: WEBHOOK_ACK, order_id, reconciliation })
    }

    /// Tries the RSA signature in the `Authorization` header first, then the embedded `sign` field.
    pub async fn verify(
        &self,
        raw_body: &[u8],
        authorization: Option<&str>,
        notification: &WebhookNotification,
    ) -> Result<(), WebhookError> {
        let header = authorization.map(str::trim).filter(|h| !h.is_empty());
        match (header, &self.verifier) {
            (Some(signature), Some(verifier)) => match verifier.verify(raw_body, signature) {
                Ok(()) => {
                    trace!("🔏️ Webhook for order {} carries a valid RSA signature", notification.order_id);
                    return Ok(());
                },
                Err(e) if notification.sign.is_some() => {
                    debug!("🔏️ RSA check failed ({e}). Trying the embedded signature instead.");
                },
                Err(e) => return Err(e.into()),
            },
            (Some(_), None) => debug!("🔏️ No gateway public key is configured. Ignoring the Authorization header."),
            _ => {},
        }
        let sign = notification.sign.as_deref().ok_or(SignatureError::MissingSignature)?;
        let tenant = match self.db.fetch_order_by_order_id(&notification.order_id).await {
            Ok(Some(order)) => order.tenant_config_id,
            Ok(None) => String::default(),
            Err(e) => {
                warn!("🔏️ Could not look up order {} to pick a key. Using the default. {e}", notification.order_id);
                String::default()
            },
        };
        let config = self.resolver.resolve(&tenant).await;
        let params = notification.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        if verify_params_md5(params, sign, config.terminal_key.reveal()) {
            trace!("🔏️ Webhook for order {} carries a valid MD5 signature", notification.order_id);
            Ok(())
        } else {
            warn!("🔏️ Webhook for order {} has an invalid signature", notification.order_id);
            Err(SignatureError::VerificationFailed.into())
        }
    }

    async fn reconcile(&self, notification: WebhookNotification) -> ReconcileOutcome {
        let order_id = &notification.order_id;
        match self.db.fetch_order_by_order_id(order_id).await {
            Ok(Some(order)) if order.status == OrderStatusType::Completed => {
                info!("🔄️📦️ Duplicate webhook for order {order_id}, which is already Completed");
                return ReconcileOutcome::Duplicate;
            },
            Ok(Some(_)) => {},
            Ok(None) => {
                warn!("🔄️📦️ Webhook refers to order {order_id}, which does not exist");
                return ReconcileOutcome::OrderNotFound;
            },
            Err(e) => {
                error!("🔄️📦️ Could not read order {order_id} while reconciling a webhook. {e}");
                return ReconcileOutcome::Failed(e.to_string());
            },
        }
        let result = self
            .updater
            .apply(order_id, notification.status, notification.payer_uid.as_deref(), UpdateSource::Webhook)
            .await;
        match result {
            Ok(TransitionResult::Applied(order)) => ReconcileOutcome::Applied(order.status),
            Ok(TransitionResult::Unchanged(_)) => ReconcileOutcome::Duplicate,
            Ok(TransitionResult::NotFound) => ReconcileOutcome::OrderNotFound,
            Err(e) => {
                error!("🔄️📦️ Could not record the webhook status for order {order_id}. {e}");
                ReconcileOutcome::Failed(e.to_string())
            },
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn order_id_aliases() {
        let n = WebhookNotification::from_json(&json!({"client_sn": "A", "order_id": "B", "status": "SUCCESS"})).unwrap();
        assert_eq!(n.order_id.as_str(), "A");
        let n = WebhookNotification::from_json(&json!({"out_trade_no": "C", "status": "SUCCESS"})).unwrap();
        assert_eq!(n.order_id.as_str(), "C");
        let n = WebhookNotification::from_json(&json!({"client_sn": "", "transaction_id": "D", "status": "x"})).unwrap();
        assert_eq!(n.order_id.as_str(), "D");
        let n = WebhookNotification::from_json(&json!({"wechat": {"order_id": "E"}, "status": "PAID"})).unwrap();
        assert_eq!(n.order_id.as_str(), "E");
        let err = WebhookNotification::from_json(&json!({"status": "SUCCESS"})).unwrap_err();
        assert!(matches!(err, WebhookError::MissingOrderId));
    }

    #[test]
    fn status_aliases() {
        let n = WebhookNotification::from_json(&json!({"client_sn": "A", "trade_status": "TRADE_SUCCESS"})).unwrap();
        assert_eq!(n.status, OrderStatusType::Completed);
        let n = WebhookNotification::from_json(&json!({"client_sn": "A", "order_status": "paid"})).unwrap();
        assert_eq!(n.status, OrderStatusType::Completed);
        let n = WebhookNotification::from_json(&json!({"client_sn": "A", "status": "PAY_CANCELED"})).unwrap();
        assert_eq!(n.status, OrderStatusType::Failed);
        assert_eq!(n.reported_status, "PAY_CANCELED");
        let n = WebhookNotification::from_json(&json!({"client_sn": "A"})).unwrap();
        assert_eq!(n.status, OrderStatusType::Failed);
        assert_eq!(n.reported_status, "");
    }

    #[test]
    fn payer_and_reflect() {
        let body = json!({
            "client_sn": "A",
            "status": "SUCCESS",
            "buyer_user_id": "2088",
            "reflect": "{\"payment\":\"6\"}",
            "sign": "ABC",
            "total_amount": 999
        });
        let n = WebhookNotification::from_json(&body).unwrap();
        assert_eq!(n.payer_uid.as_deref(), Some("2088"));
        assert_eq!(n.reflect_payment.as_deref(), Some("6"));
        assert_eq!(n.sign.as_deref(), Some("ABC"));
        assert!(n.fields.contains(&("buyer_user_id".to_string(), "2088".to_string())));
        assert!(n.fields.iter().all(|(k, _)| k != "total_amount"));
        let n = WebhookNotification::from_json(&json!({"client_sn": "A", "status": "x", "reflect": "6-3"})).unwrap();
        assert_eq!(n.reflect_payment, None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(WebhookNotification::from_slice(b"not json"), Err(WebhookError::MalformedPayload(_))));
        assert!(matches!(WebhookNotification::from_slice(b"[1,2]"), Err(WebhookError::MalformedPayload(_))));
    }
}
