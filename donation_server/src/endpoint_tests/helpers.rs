use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use actix_web::{
    http::{header, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use async_trait::async_trait;
use chrono::Utc;
use donation_engine::{
    broadcast::{BroadcastError, BroadcastHub, SubscriberFilter, SubscriberSink},
    db_types::{Category, Order, OrderId, OrderStatusType, TenantConfig},
    signature::RsaVerifier,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path, tear_down},
        GATEWAY_TEST_PUBLIC_KEY,
    },
    ConfigResolver,
    OrderFlowApi,
    OrderManagement,
    PollerSupervisor,
    RankingsApi,
    SqliteDatabase,
    StoredIdentityEnricher,
    TenantManagement,
    WebhookReconciler,
    DEFAULT_CONFIG_CACHE_TTL,
};
use dpg_common::Secret;
use log::debug;

use super::mocks::MockGateway;
use crate::{
    config::ServerOptions,
    integrations::live_feed::create_live_feed_event_handlers,
    routes::{
        health,
        ActivateRoute,
        CategoriesRoute,
        CategoryRoute,
        DonateFormRoute,
        DonateLinkRoute,
        DonateRoute,
        PaymentCallbackRoute,
        PaymentConfigRoute,
        RankingsRoute,
        RefundRoute,
    },
};

pub const TERMINAL_KEY: &str = "terminal-key-6";
pub const GATEWAY_URL: &str = "https://qr.gateway.test/gateway";
pub const PUBLIC_BASE_URL: &str = "https://donate.test";

type Api = OrderFlowApi<SqliteDatabase, MockGateway>;

pub struct TestContext {
    pub db: SqliteDatabase,
    pub hub: BroadcastHub,
    supervisor: PollerSupervisor,
    orders_api: web::Data<Api>,
    resolver: web::Data<ConfigResolver<SqliteDatabase, MockGateway>>,
    reconciler: web::Data<WebhookReconciler<SqliteDatabase, MockGateway>>,
    rankings_api: web::Data<RankingsApi<SqliteDatabase>>,
    options: web::Data<ServerOptions>,
}

pub struct Reply {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Response is not JSON")
    }
}

pub fn tenant_6() -> TenantConfig {
    TenantConfig {
        id: "6".into(),
        terminal_sn: "T600".into(),
        terminal_key: Secret::from(TERMINAL_KEY),
        store_name: "Main Hall".into(),
        api_url: "http://gateway.test".into(),
        gateway_url: GATEWAY_URL.into(),
        is_active: true,
        last_sign_in_at: Some(Utc::now()),
        ..Default::default()
    }
}

impl TestContext {
    /// A fresh database holding tenant 6 with one category, "3".
    pub async fn new(gateway: MockGateway) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        db.save_tenant_config(&tenant_6()).await.expect("Error saving tenant");
        db.save_category(&Category { id: "3".into(), name: "Lamp".into(), tenant_config_id: "6".into() })
            .await
            .expect("Error saving category");

        let hub = BroadcastHub::default();
        let handlers = create_live_feed_event_handlers(hub.clone(), Arc::new(StoredIdentityEnricher::new(db.clone())));
        let producers = handlers.producers();
        handlers.start_handlers().await;

        let gateway = Arc::new(gateway);
        let resolver =
            ConfigResolver::new(db.clone(), Arc::clone(&gateway), TenantConfig::default(), DEFAULT_CONFIG_CACHE_TTL);
        let supervisor = PollerSupervisor::new();
        let orders_api = OrderFlowApi::new(db.clone(), gateway, resolver.clone(), producers, supervisor.clone());
        let verifier = RsaVerifier::from_pem(GATEWAY_TEST_PUBLIC_KEY).expect("Error loading public key");
        let reconciler = WebhookReconciler::new(db.clone(), resolver.clone(), orders_api.status_updater(), Some(verifier));
        let options = ServerOptions { public_base_url: PUBLIC_BASE_URL.into(), ..Default::default() };
        Self {
            rankings_api: web::Data::new(RankingsApi::new(db.clone())),
            db,
            hub,
            supervisor,
            orders_api: web::Data::new(orders_api),
            resolver: web::Data::new(resolver),
            reconciler: web::Data::new(reconciler),
            options: web::Data::new(options),
        }
    }

    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) + 'static {
        let db = web::Data::new(self.db.clone());
        let orders_api = self.orders_api.clone();
        let resolver = self.resolver.clone();
        let reconciler = self.reconciler.clone();
        let rankings_api = self.rankings_api.clone();
        let options = self.options.clone();
        move |cfg: &mut ServiceConfig| {
            cfg.app_data(db)
                .app_data(orders_api)
                .app_data(resolver)
                .app_data(reconciler)
                .app_data(rankings_api)
                .app_data(options)
                .service(health)
                .service(DonateRoute::<SqliteDatabase, MockGateway>::new())
                .service(DonateFormRoute::<SqliteDatabase, MockGateway>::new())
                .service(DonateLinkRoute::<SqliteDatabase, MockGateway>::new())
                .service(PaymentCallbackRoute::<SqliteDatabase, MockGateway>::new())
                .service(ActivateRoute::<SqliteDatabase, MockGateway>::new())
                .service(RefundRoute::<SqliteDatabase, MockGateway>::new())
                .service(RankingsRoute::<SqliteDatabase>::new())
                .service(CategoriesRoute::<SqliteDatabase>::new())
                .service(CategoryRoute::<SqliteDatabase>::new())
                .service(PaymentConfigRoute::<SqliteDatabase>::new());
        }
    }

    pub async fn send(&self, req: TestRequest) -> Reply {
        let app = App::new().configure(self.configure());
        let service = test::init_service(app).await;
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let location = res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).map(String::from);
        let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
        debug!("Response {status}: {body}");
        Reply { status, location, body }
    }

    pub async fn order(&self, order_id: &str) -> Order {
        self.db
            .fetch_order_by_order_id(&OrderId::from(order_id))
            .await
            .expect("Error fetching order")
            .expect("Order does not exist")
    }

    /// Waits up to two seconds for the order to reach `status`.
    pub async fn wait_for_status(&self, order_id: &str, status: OrderStatusType) -> Order {
        for _ in 0..200 {
            let order = self.order(order_id).await;
            if order.status == status {
                return order;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.order(order_id).await
    }

    pub fn watch(&self, tenant: &str) -> Arc<Inbox> {
        let inbox = Arc::new(Inbox::default());
        self.hub.register(inbox.clone(), SubscriberFilter::new(Some(tenant), None), None);
        inbox
    }

    pub async fn tear_down(self) {
        self.supervisor.shutdown();
        tear_down(self.db).await;
    }
}

/// Collects whatever the hub sends to a live feed viewer.
#[derive(Default)]
pub struct Inbox(Mutex<Vec<String>>);

impl Inbox {
    /// Waits up to a second for at least one frame to arrive.
    pub async fn frames(&self) -> Vec<serde_json::Value> {
        for _ in 0..100 {
            if !self.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.0.lock().unwrap().iter().map(|s| serde_json::from_str(s).unwrap()).collect()
    }
}

#[async_trait]
impl SubscriberSink for Inbox {
    async fn send_text(&self, text: String) -> Result<(), BroadcastError> {
        self.0.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&self) {}
}

pub fn donate_request(payment: &str, body: serde_json::Value) -> TestRequest {
    TestRequest::post().uri(&format!("/donate?payment={payment}")).set_json(body)
}
