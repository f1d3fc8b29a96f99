//! Request handlers.
//!
//! Handlers are generic over the database and the gateway client so the endpoint tests can swap in a mocked gateway.
//! actix-web cannot register generic functions directly, so each one gets a route struct from the [`route!`] macro.
//!
//! Every handler that touches the database or the gateway must stay async. A worker thread serves its requests one at
//! a time, so a blocking call in a handler stalls every request queued on that worker.
use actix_web::{get, http::header, web, HttpRequest, HttpResponse, Responder};
use donation_engine::{
    db_types::{Category, OrderId},
    gateway::GatewayApi,
    order_objects::CreatedOrder,
    traits::{DonationDatabase, RankingQuery, RankingsManagement, TenantManagement},
    ConfigResolver,
    OrderFlowApi,
    RankingsApi,
    WebhookError,
    WebhookReconciler,
    WEBHOOK_NACK,
};
use log::*;

use crate::{
    config::ServerOptions,
    data_objects::{
        ActivationRequest,
        ActivationResponse,
        CategoryParams,
        DonationForm,
        DonationRequest,
        DonationResponse,
        PaymentConfigView,
        RankingParams,
        TenantParams,
    },
    errors::ServerError,
    helpers::{callback_urls, get_remote_ip},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Donate  ----------------------------------------------------
route!(donate => Post "/donate" impl DonationDatabase, GatewayApi);
/// Creates a donation order and returns the URL of the gateway's payment page.
///
/// The tenant comes from `?payment=`. If the donor went through the wallet provider's OAuth flow earlier, their wallet
/// id is in a cookie and is attached to the order so the donation can be shown with their nickname.
pub async fn donate<B, G>(
    req: HttpRequest,
    tenant: web::Query<TenantParams>,
    options: web::Data<ServerOptions>,
    api: web::Data<OrderFlowApi<B, G>>,
    body: web::Json<DonationRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    trace!("💻️ Received donation request");
    let order = create_donation(&req, &tenant.payment, &options, &api, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DonationResponse::from(order)))
}

route!(donate_form => Post "/donate/form" impl DonationDatabase, GatewayApi);
/// The plain-HTML form version of [`donate`]. Redirects straight to the payment page.
pub async fn donate_form<B, G>(
    req: HttpRequest,
    tenant: web::Query<TenantParams>,
    options: web::Data<ServerOptions>,
    api: web::Data<OrderFlowApi<B, G>>,
    form: web::Form<DonationForm>,
) -> Result<HttpResponse, ServerError>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    trace!("💻️ Received donation form");
    let form = form.into_inner();
    let tenant_id = if form.payment_config_id.is_empty() { tenant.payment.clone() } else { form.payment_config_id.clone() };
    let request = DonationRequest::try_from(form)?;
    let order = create_donation(&req, &tenant_id, &options, &api, request).await?;
    Ok(HttpResponse::Found().insert_header((header::LOCATION, order.redirect_url)).finish())
}

route!(donate_link => Get "/donate/form" impl DonationDatabase, GatewayApi);
/// [`donate_form`] for a plain link or QR code. The form fields come from the query string, so `payment` is the payment
/// method here and the tenant must be given as `payment_config_id`.
pub async fn donate_link<B, G>(
    req: HttpRequest,
    options: web::Data<ServerOptions>,
    api: web::Data<OrderFlowApi<B, G>>,
    form: web::Query<DonationForm>,
) -> Result<HttpResponse, ServerError>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    trace!("💻️ Received donation link");
    let form = form.into_inner();
    let tenant_id = form.payment_config_id.clone();
    let request = DonationRequest::try_from(form)?;
    let order = create_donation(&req, &tenant_id, &options, &api, request).await?;
    Ok(HttpResponse::Found().insert_header((header::LOCATION, order.redirect_url)).finish())
}

async fn create_donation<B, G>(
    req: &HttpRequest,
    tenant: &str,
    options: &ServerOptions,
    api: &OrderFlowApi<B, G>,
    request: DonationRequest,
) -> Result<CreatedOrder, ServerError>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    let method = request.payment_method()?;
    let payer_ref = req.cookie(method.identity_cookie()).map(|c| c.value().to_string()).unwrap_or_default();
    let urls = callback_urls(req, options, tenant, &request.category);
    let donation = request.into_donation(method, tenant, &payer_ref);
    debug!("💻️ Donation of {} via {method} for tenant '{tenant}', category '{}'", donation.amount, donation.category_id);
    let order = tokio::time::timeout(options.donate_timeout, api.create_order(donation, &urls))
        .await
        .map_err(|_| ServerError::Timeout("The order could not be created in time. Please try again.".into()))??;
    Ok(order)
}

//----------------------------------------------   Callback  ----------------------------------------------------
route!(payment_callback => Post "/callback" impl DonationDatabase, GatewayApi);
/// The gateway's payment notification.
///
/// The body is kept as raw bytes, because the asymmetric signature is computed over exactly those bytes. The gateway is
/// answered as soon as the signature checks out; the order itself is updated in the background.
pub async fn payment_callback<B, G>(
    req: HttpRequest,
    options: web::Data<ServerOptions>,
    reconciler: web::Data<WebhookReconciler<B, G>>,
    body: web::Bytes,
) -> HttpResponse
where
    B: DonationDatabase,
    G: GatewayApi,
{
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    let authorization = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    info!("💻️ Payment notification received from {peer:?} ({} bytes)", body.len());
    trace!("💻️ Notification body: {}", String::from_utf8_lossy(&body));
    match reconciler.handle(&body, authorization).await {
        Ok(ack) => {
            debug!("💻️ Payment notification for order {} accepted", ack.order_id);
            HttpResponse::Ok().content_type("text/plain").body(ack.body)
        },
        Err(WebhookError::Signature(e)) => {
            warn!("💻️ Rejected a payment notification from {peer:?}. {e}");
            HttpResponse::Unauthorized().content_type("text/plain").body(WEBHOOK_NACK)
        },
        Err(e) => {
            warn!("💻️ Could not read a payment notification from {peer:?}. {e}");
            HttpResponse::BadRequest().content_type("text/plain").body(WEBHOOK_NACK)
        },
    }
}

//----------------------------------------------   Rankings  ----------------------------------------------------
route!(rankings => Get "/rankings" impl RankingsManagement);
pub async fn rankings<B: RankingsManagement>(
    params: web::Query<RankingParams>,
    api: web::Data<RankingsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = RankingQuery::from(params.into_inner());
    trace!("💻️ Fetching rankings for {query:?}");
    let page = api.rankings(query).await?;
    Ok(HttpResponse::Ok().json(page))
}

//----------------------------------------------   Activate  ----------------------------------------------------
route!(activate => Post "/activate" impl DonationDatabase, GatewayApi);
/// One-off activation of a tenant's terminal. The new terminal key is stored but never echoed back.
pub async fn activate<B, G>(
    tenant: web::Query<TenantParams>,
    resolver: web::Data<ConfigResolver<B, G>>,
    body: web::Json<ActivationRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    let code = body.activation_code.trim();
    if code.is_empty() {
        return Err(ServerError::InvalidRequestBody("activation_code is required".into()));
    }
    info!("💻️ Activating the terminal for tenant '{}'", tenant.payment);
    let config = resolver.activate(&tenant.payment, code).await?;
    let response =
        ActivationResponse { message: "Terminal activation successful".into(), terminal_sn: config.terminal_sn.clone() };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Refund  ----------------------------------------------------
route!(refund => Post "/refund/{order_id}" impl DonationDatabase, GatewayApi);
pub async fn refund<B, G>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: DonationDatabase,
    G: GatewayApi,
{
    let order_id = OrderId::from(path.into_inner());
    info!("💻️ Refund requested for order {order_id}");
    let receipt = api.refund(&order_id).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

//----------------------------------------------   Categories  ----------------------------------------------------
route!(categories => Get "/categories" impl TenantManagement);
pub async fn categories<B: TenantManagement>(
    params: web::Query<CategoryParams>,
    db: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let tenant = params.into_inner().payment.filter(|s| !s.is_empty());
    let categories = db
        .fetch_categories()
        .await?
        .into_iter()
        .filter(|c| tenant.as_ref().map_or(true, |t| &c.tenant_config_id == t))
        .collect::<Vec<Category>>();
    Ok(HttpResponse::Ok().json(categories))
}

route!(category => Get "/category/{id}" impl TenantManagement);
pub async fn category<B: TenantManagement>(
    path: web::Path<String>,
    db: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let category = db.fetch_category(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Category {id}")))?;
    Ok(HttpResponse::Ok().json(category))
}

//----------------------------------------------   Payment config  ----------------------------------------------------
route!(payment_config => Get "/payment-config/{id}" impl TenantManagement);
pub async fn payment_config<B: TenantManagement>(
    path: web::Path<String>,
    db: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let config =
        db.fetch_tenant_config(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Payment config {id}")))?;
    Ok(HttpResponse::Ok().json(PaymentConfigView::from(config)))
}
