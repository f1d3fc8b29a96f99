use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize gateway client: {0}")]
    Initialization(String),
    #[error("Could not reach the gateway: {0}")]
    Communication(String),
    #[error("Gateway endpoint not found: {0}")]
    EndpointNotFound(String),
    #[error("Gateway rejected the request. Code {code}. {message}")]
    Rejected { code: String, message: String },
    #[error("Gateway reported a business error. Code {code}. {message}")]
    BusinessError { code: String, message: String },
    #[error("Could not decode gateway response: {0}")]
    MalformedResponse(String),
    #[error("Gateway response did not contain the expected data")]
    EmptyResponse,
    #[error("Terminal for tenant '{0}' has not been activated")]
    TerminalNotActivated(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Communication(e.to_string())
    }
}
