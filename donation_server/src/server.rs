use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use donation_engine::{
    broadcast::BroadcastHub,
    gateway::UpayClient,
    signature::RsaVerifier,
    ConfigResolver,
    OrderFlowApi,
    PollerSupervisor,
    RankingsApi,
    SqliteDatabase,
    StoredIdentityEnricher,
    WebhookReconciler,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    heartbeat_worker::start_heartbeat_worker,
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
    ws::live_feed,
};

/// Everything the request handlers share.
pub struct AppState {
    pub db: SqliteDatabase,
    pub orders_api: OrderFlowApi<SqliteDatabase, UpayClient>,
    pub resolver: ConfigResolver<SqliteDatabase, UpayClient>,
    pub reconciler: WebhookReconciler<SqliteDatabase, UpayClient>,
    pub rankings_api: RankingsApi<SqliteDatabase>,
    pub hub: BroadcastHub,
    pub options: ServerOptions,
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = UpayClient::new(config.gateway_timeout).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = Arc::new(gateway);
    let resolver =
        ConfigResolver::new(db.clone(), Arc::clone(&gateway), config.default_tenant.clone(), config.config_cache_ttl);
    let supervisor = PollerSupervisor::new();
    let hub = BroadcastHub::default();
    let verifier = config.gateway_public_key.as_deref().and_then(|pem| match RsaVerifier::from_pem(pem) {
        Ok(v) => Some(v),
        Err(e) => {
            error!("🚀️ DPG_GATEWAY_PUBLIC_KEY could not be loaded. Only MD5 signed notifications will be accepted. {e}");
            None
        },
    });

    let enricher = Arc::new(StoredIdentityEnricher::new(db.clone()));
    let handlers = create_live_feed_event_handlers(hub.clone(), enricher);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let orders_api = OrderFlowApi::new(db.clone(), gateway, resolver.clone(), producers, supervisor.clone());
    let reconciler = WebhookReconciler::new(db.clone(), resolver.clone(), orders_api.status_updater(), verifier);
    let rankings_api = RankingsApi::new(db.clone());
    let _heartbeat = start_heartbeat_worker(hub.clone(), config.heartbeat_interval, config.heartbeat_timeout);

    let state = AppState {
        db,
        orders_api,
        resolver,
        reconciler,
        rankings_api,
        hub,
        options: ServerOptions::from_config(&config),
    };
    let srv = create_server_instance(&config, state)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    info!("🚀️ Server stopped. Cancelling {} active pollers", supervisor.active_count());
    supervisor.shutdown();
    result
}

pub fn create_server_instance(config: &ServerConfig, state: AppState) -> Result<Server, ServerError> {
    let db = web::Data::new(state.db);
    let orders_api = web::Data::new(state.orders_api);
    let resolver = web::Data::new(state.resolver);
    let reconciler = web::Data::new(state.reconciler);
    let rankings_api = web::Data::new(state.rankings_api);
    let hub = web::Data::new(state.hub);
    let options = web::Data::new(state.options);
    let srv = HttpServer::new(move || {
        let api_scope = web::scope("/api")
            .service(DonateRoute::<SqliteDatabase, UpayClient>::new())
            .service(DonateFormRoute::<SqliteDatabase, UpayClient>::new())
            .service(DonateLinkRoute::<SqliteDatabase, UpayClient>::new())
            .service(PaymentCallbackRoute::<SqliteDatabase, UpayClient>::new())
            .service(ActivateRoute::<SqliteDatabase, UpayClient>::new())
            .service(RefundRoute::<SqliteDatabase, UpayClient>::new())
            .service(RankingsRoute::<SqliteDatabase>::new())
            .service(CategoriesRoute::<SqliteDatabase>::new())
            .service(CategoryRoute::<SqliteDatabase>::new())
            .service(PaymentConfigRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dpg::access_log"))
            .app_data(db.clone())
            .app_data(orders_api.clone())
            .app_data(resolver.clone())
            .app_data(reconciler.clone())
            .app_data(rankings_api.clone())
            .app_data(hub.clone())
            .app_data(options.clone())
            .service(api_scope)
            .service(live_feed)
            .service(health)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
