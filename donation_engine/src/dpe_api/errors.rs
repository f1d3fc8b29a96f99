use dpg_common::FenConversionError;
use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    gateway::GatewayError,
    signature::SignatureError,
    traits::DonationDbError,
};

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Invalid donation amount. {0}")]
    InvalidAmount(#[from] FenConversionError),
    #[error("Unsupported payment method: {0}")]
    InvalidPaymentMethod(String),
    #[error("Order id {0} is longer than the gateway allows")]
    OrderIdTooLong(String),
    #[error("Tenant configuration '{0}' cannot take payments: {1}")]
    IncompleteConfig(String, String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} cannot be refunded while it is {1}")]
    NotRefundable(OrderId, OrderStatusType),
    #[error("Gateway error. {0}")]
    Gateway(#[from] GatewayError),
    #[error("Database error. {0}")]
    Database(#[from] DonationDbError),
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook signature rejected. {0}")]
    Signature(#[from] SignatureError),
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error("The webhook does not identify an order")]
    MissingOrderId,
}

#[derive(Debug, Clone, Error)]
pub enum EnrichmentError {
    #[error("Could not read the payer identity. {0}")]
    Database(String),
    #[error("The identity provider failed. {0}")]
    Provider(String),
}

impl From<DonationDbError> for EnrichmentError {
    fn from(e: DonationDbError) -> Self {
        Self::Database(e.to_string())
    }
}
