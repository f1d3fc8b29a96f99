use async_trait::async_trait;
use donation_engine::{
    db_types::{Fen, OrderId, TenantConfig, TerminalCredentials},
    gateway::{GatewayApi, GatewayError, OrderQueryResult, RefundReceipt},
};
use mockall::mock;

mock! {
    pub Gateway {}
    #[async_trait]
    impl GatewayApi for Gateway {
        async fn check_in(&self, config: &TenantConfig) -> Result<TerminalCredentials, GatewayError>;
        async fn activate(&self, config: &TenantConfig, code: &str) -> Result<TerminalCredentials, GatewayError>;
        async fn query_order(&self, config: &TenantConfig, order_id: &OrderId) -> Result<OrderQueryResult, GatewayError>;
        async fn refund_order(
            &self,
            config: &TenantConfig,
            order_id: &OrderId,
            amount: Fen,
        ) -> Result<RefundReceipt, GatewayError>;
    }
}
