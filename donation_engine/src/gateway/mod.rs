//! Outbound communication with the payment gateway.
//!
//! [`GatewayApi`] is the seam the rest of the engine talks to. [`UpayClient`] is the HTTP implementation. Every method
//! takes the tenant configuration to use as an argument, so callers decide which credentials are in effect and a
//! credential rotation in one request can never leak into another.
mod errors;
mod objects;
mod pay_url;
mod upay_client;

use async_trait::async_trait;
pub use errors::GatewayError;
pub use objects::{
    ActivateRequest,
    BizResponse,
    CheckInRequest,
    GatewayEnvelope,
    GatewayOrderStatus,
    OrderQueryResult,
    QueryOrderData,
    QueryRequest,
    RefundReceipt,
    RefundRequest,
    TerminalData,
};
pub use pay_url::{PayRequest, DONATION_OPERATOR};
pub use upay_client::UpayClient;

use crate::db_types::{Fen, OrderId, TenantConfig, TerminalCredentials};

#[async_trait]
pub trait GatewayApi: Send + Sync + 'static {
    /// Daily terminal check-in. The gateway may hand out a new terminal key, which must be used from then on.
    async fn check_in(&self, config: &TenantConfig) -> Result<TerminalCredentials, GatewayError>;

    /// One-off terminal activation with a code issued by the merchant back office. Signed with the vendor credentials.
    async fn activate(&self, config: &TenantConfig, code: &str) -> Result<TerminalCredentials, GatewayError>;

    async fn query_order(&self, config: &TenantConfig, order_id: &OrderId) -> Result<OrderQueryResult, GatewayError>;

    async fn refund_order(
        &self,
        config: &TenantConfig,
        order_id: &OrderId,
        amount: Fen,
    ) -> Result<RefundReceipt, GatewayError>;
}
