use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use dpg_common::Secret;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    db_types::{Fen, OrderId, TenantConfig, TerminalCredentials},
    gateway::{
        objects::{
            ActivateRequest,
            BizResponse,
            CheckInRequest,
            GatewayEnvelope,
            OrderQueryResult,
            QueryOrderData,
            QueryRequest,
            RefundReceipt,
            RefundRequest,
            TerminalData,
        },
        GatewayApi,
        GatewayError,
        DONATION_OPERATOR,
    },
    signature::sign_body_md5,
};

/// HTTP client for the gateway's terminal API.
#[derive(Clone)]
pub struct UpayClient {
    client: Arc<Client>,
}

impl UpayClient {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Format", HeaderValue::from_static("json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { client: Arc::new(client) })
    }

    /// POSTs `request` as JSON. The `Authorization` header is `<serial number> <md5(body + key)>`, computed over the
    /// exact bytes that are sent.
    async fn post<Req, Resp>(
        &self,
        base_url: &str,
        path: &str,
        serial: &str,
        key: &Secret<String>,
        request: &Req,
    ) -> Result<GatewayEnvelope<Resp>, GatewayError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_string(request).map_err(|e| GatewayError::Initialization(e.to_string()))?;
        let sign = sign_body_md5(&body, key.reveal());
        let url = format!("{}{path}", base_url.trim_end_matches('/'));
        trace!("📡️ Sending gateway request: {url}");
        let response = self.client.post(&url).header(AUTHORIZATION, format!("{serial} {sign}")).body(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::EndpointNotFound(url));
        }
        trace!("📡️ Gateway response ({status}): {text}");
        serde_json::from_str::<GatewayEnvelope<Resp>>(&text)
            .map_err(|e| GatewayError::MalformedResponse(format!("{e}. Response body: {text}")))
    }
}

fn ensure_activated(config: &TenantConfig) -> Result<(), GatewayError> {
    if config.terminal_sn.is_empty() || config.terminal_key.is_empty() {
        return Err(GatewayError::TerminalNotActivated(config.id.clone()));
    }
    Ok(())
}

#[async_trait]
impl GatewayApi for UpayClient {
    async fn check_in(&self, config: &TenantConfig) -> Result<TerminalCredentials, GatewayError> {
        ensure_activated(config)?;
        let request = CheckInRequest { terminal_sn: &config.terminal_sn, device_id: &config.device_id };
        let envelope = self
            .post::<_, TerminalData>(
                &config.api_url,
                "/terminal/checkin",
                &config.terminal_sn,
                &config.terminal_key,
                &request,
            )
            .await?;
        let credentials = envelope.into_payload()?.into_credentials(&config.terminal_sn, &config.terminal_key);
        info!("📡️ Terminal {} checked in for tenant '{}'", credentials.terminal_sn, config.id);
        Ok(credentials)
    }

    async fn activate(&self, config: &TenantConfig, code: &str) -> Result<TerminalCredentials, GatewayError> {
        let request = ActivateRequest { app_id: &config.app_id, code, device_id: &config.device_id };
        let envelope = self
            .post::<_, TerminalData>(
                &config.api_url,
                "/terminal/activate",
                &config.vendor_sn,
                &config.vendor_key,
                &request,
            )
            .await?;
        let credentials = envelope.into_payload()?.into_credentials(&config.terminal_sn, &config.terminal_key);
        if credentials.terminal_sn.is_empty() || credentials.terminal_key.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        info!("📡️ Terminal {} activated for tenant '{}'", credentials.terminal_sn, config.id);
        Ok(credentials)
    }

    async fn query_order(&self, config: &TenantConfig, order_id: &OrderId) -> Result<OrderQueryResult, GatewayError> {
        ensure_activated(config)?;
        let request = QueryRequest { terminal_sn: &config.terminal_sn, client_sn: order_id.as_str() };
        let envelope = self
            .post::<_, BizResponse<QueryOrderData>>(
                &config.api_url,
                "/upay/v2/query",
                &config.terminal_sn,
                &config.terminal_key,
                &request,
            )
            .await?;
        let data = envelope.into_payload()?.into_data()?;
        trace!("📡️ Order {order_id} has gateway status {:?}", data.order_status);
        Ok(OrderQueryResult::from(data))
    }

    async fn refund_order(
        &self,
        config: &TenantConfig,
        order_id: &OrderId,
        amount: Fen,
    ) -> Result<RefundReceipt, GatewayError> {
        ensure_activated(config)?;
        let request = RefundRequest {
            terminal_sn: &config.terminal_sn,
            client_sn: format!("REFUND{}", Utc::now().timestamp()),
            orig_client_sn: order_id.as_str(),
            refund_amount: amount.value().to_string(),
            operator: DONATION_OPERATOR,
        };
        let envelope = self
            .post::<_, BizResponse<RefundReceipt>>(
                &config.api_url,
                "/upay/v2/refund",
                &config.terminal_sn,
                &config.terminal_key,
                &request,
            )
            .await?;
        let receipt = envelope.into_payload()?.into_data()?;
        info!("📡️ Refund of {amount} for order {order_id} returned status {}", receipt.order_status);
        Ok(receipt)
    }
}
