#![allow(dead_code)]
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use donation_engine::{
    db_types::{Category, Fen, Order, OrderId, OrderStatusType, TenantConfig, TerminalCredentials},
    events::{EventHandlers, EventHooks},
    gateway::{GatewayApi, GatewayError, OrderQueryResult, RefundReceipt},
    signature::RsaVerifier,
    ConfigResolver,
    DonationDatabase,
    OrderFlowApi,
    OrderManagement,
    PollSchedule,
    PollerSupervisor,
    SqliteDatabase,
    TenantManagement,
    WebhookReconciler,
    DEFAULT_CONFIG_CACHE_TTL,
};
use dpg_common::Secret;
use log::*;
use mockall::mock;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const PRIVATE_KEY: &str = include_str!("../../src/test_utils/keys/gateway_test_private.pem");
pub const PUBLIC_KEY: &str = include_str!("../../src/test_utils/keys/gateway_test_public.pem");
pub const TERMINAL_KEY: &str = "terminal-key-6";

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

/// Polls fast enough for a test to watch a whole poller lifetime.
pub fn quick_schedule() -> PollSchedule {
    PollSchedule {
        initial_delay: Duration::from_millis(30),
        fast_interval: Duration::from_millis(20),
        fast_window: Duration::from_millis(150),
        slow_interval: Duration::from_millis(40),
        max_elapsed: Duration::from_millis(300),
    }
}

#[derive(Default, Clone)]
pub struct HookCalled {
    called: Arc<AtomicUsize>,
}

impl HookCalled {
    pub fn called(&self) {
        self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.called.load(Ordering::SeqCst)
    }

    /// Waits up to a second for the hook to have fired `n` times.
    pub async fn wait_for(&self, n: usize) -> usize {
        for _ in 0..100 {
            if self.count() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.count()
    }
}

pub struct TestEngine {
    pub db: SqliteDatabase,
    pub api: OrderFlowApi<SqliteDatabase, MockGateway>,
    pub webhook: WebhookReconciler<SqliteDatabase, MockGateway>,
    pub supervisor: PollerSupervisor,
    pub confirmed: HookCalled,
    pub failed: HookCalled,
}

pub fn tenant_6() -> TenantConfig {
    TenantConfig {
        id: "6".into(),
        terminal_sn: "T600".into(),
        terminal_key: Secret::from(TERMINAL_KEY),
        store_name: "Main Hall".into(),
        api_url: "http://gateway.test".into(),
        gateway_url: "https://qr.gateway.test/gateway".into(),
        is_active: true,
        last_sign_in_at: Some(Utc::now()),
        ..Default::default()
    }
}

pub async fn setup(gateway: MockGateway) -> TestEngine {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    db.save_tenant_config(&tenant_6()).await.expect("Error saving tenant");
    db.save_category(&Category { id: "3".into(), name: "Lamp".into(), tenant_config_id: "6".into() })
        .await
        .expect("Error saving category");

    let confirmed = HookCalled::default();
    let failed = HookCalled::default();
    let mut hooks = EventHooks::default();
    let c = confirmed.clone();
    hooks.on_donation_confirmed(move |ev| {
        info!("🪝️ Donation confirmed: {}", ev.order.order_id);
        c.called();
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let f = failed.clone();
    hooks.on_donation_failed(move |ev| {
        info!("🪝️ Donation failed: {}", ev.order.order_id);
        f.called();
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let gateway = Arc::new(gateway);
    let resolver = ConfigResolver::new(db.clone(), Arc::clone(&gateway), TenantConfig::default(), DEFAULT_CONFIG_CACHE_TTL);
    let supervisor = PollerSupervisor::new();
    let api = OrderFlowApi::new(db.clone(), gateway, resolver.clone(), producers, supervisor.clone())
        .with_poll_schedule(quick_schedule());
    let verifier = RsaVerifier::from_pem(PUBLIC_KEY).expect("Error loading public key");
    let webhook = WebhookReconciler::new(db.clone(), resolver, api.status_updater(), Some(verifier));
    TestEngine { db, api, webhook, supervisor, confirmed, failed }
}

pub async fn tear_down(engine: TestEngine) {
    engine.supervisor.shutdown();
    let url = engine.db.url().to_string();
    engine.db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e:?}");
    }
}

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error connecting to database");
    db.run_migrations().await.expect("Error running DB migrations");
    db.close().await;
}

pub fn random_db_path() -> String {
    let dir = tempfile::tempdir().expect("Error creating temp dir").into_path();
    format!("sqlite://{}", dir.join("donations.db").display())
}

pub async fn fetch(db: &SqliteDatabase, order_id: &OrderId) -> Order {
    db.fetch_order_by_order_id(order_id).await.expect("Error fetching order").expect("Order does not exist")
}

/// Waits up to two seconds for the order to reach `status`.
pub async fn wait_for_status(db: &SqliteDatabase, order_id: &OrderId, status: OrderStatusType) -> Order {
    for _ in 0..200 {
        let order = fetch(db, order_id).await;
        if order.status == status {
            return order;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    fetch(db, order_id).await
}

pub async fn wait_for_pollers(supervisor: &PollerSupervisor) -> usize {
    for _ in 0..200 {
        if supervisor.active_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    supervisor.active_count()
}
