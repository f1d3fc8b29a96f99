use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use donation_engine::{gateway::GatewayError, traits::DonationDbError, OrderFlowError, WebhookError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Signature verification failed. {0}")]
    InvalidSignature(String),
    #[error("Could not communicate with the payment gateway. {0}")]
    GatewayError(String),
    #[error("The request took too long. {0}")]
    Timeout(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<DonationDbError> for ServerError {
    fn from(e: DonationDbError) -> Self {
        match e {
            DonationDbError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            DonationDbError::TenantConfigNotFound(id) => Self::NoRecordFound(format!("Tenant '{id}'")),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::TerminalNotActivated(_) => Self::ConfigurationError(e.to_string()),
            e => Self::GatewayError(e.to_string()),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::InvalidAmount(_) | OrderFlowError::InvalidPaymentMethod(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            OrderFlowError::NotRefundable(..) => Self::InvalidRequestBody(e.to_string()),
            OrderFlowError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            OrderFlowError::OrderIdTooLong(_) => Self::BackendError(e.to_string()),
            OrderFlowError::IncompleteConfig(..) => Self::ConfigurationError(e.to_string()),
            OrderFlowError::Gateway(e) => e.into(),
            OrderFlowError::Database(e) => e.into(),
        }
    }
}

impl From<WebhookError> for ServerError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::Signature(e) => Self::InvalidSignature(e.to_string()),
            e => Self::InvalidRequestBody(e.to_string()),
        }
    }
}
