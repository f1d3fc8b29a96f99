use actix_web::{cookie::Cookie, http::StatusCode, test::TestRequest};
use donation_engine::{
    db_types::{OrderStatusType, PaymentMethod, TerminalCredentials},
    TenantManagement,
};
use dpg_common::Secret;
use serde_json::json;

use super::{
    helpers::{donate_request, TestContext, GATEWAY_URL, PUBLIC_BASE_URL},
    mocks::MockGateway,
};

#[actix_web::test]
async fn health_check() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let reply = ctx.send(TestRequest::get().uri("/health")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "👍️\n");
    ctx.tear_down().await;
}

#[actix_web::test]
async fn donation_is_created_for_the_cookie_identity() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let req = donate_request("6", json!({"amount": 9.99, "payment": "wechat", "category": "3", "blessing": "平安"}))
        .cookie(Cookie::new("wechat_openid", "oUpF8"));
    let reply = ctx.send(req).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let body = reply.json();
    let order_id = body["order_id"].as_str().unwrap().to_string();
    let pay_url = body["pay_url"].as_str().unwrap();
    assert!(pay_url.starts_with(GATEWAY_URL), "{pay_url}");
    assert!(pay_url.contains("terminal_sn=T600"), "{pay_url}");

    let order = ctx.order(&order_id).await;
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.amount.value(), 999);
    assert_eq!(order.payment_method, PaymentMethod::Wechat);
    assert_eq!(order.tenant_config_id, "6");
    assert_eq!(order.category_id, "3");
    assert_eq!(order.payer_ref, "oUpF8");
    assert_eq!(order.blessing, "平安");
    ctx.tear_down().await;
}

#[actix_web::test]
async fn donor_without_a_cookie_is_anonymous() {
    let ctx = TestContext::new(MockGateway::new()).await;
    // The cookie for the other wallet provider does not count
    let req = donate_request("6", json!({"amount": 1, "payment": "alipay", "category": "3"}))
        .cookie(Cookie::new("wechat_openid", "oUpF8"));
    let reply = ctx.send(req).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let order = ctx.order(reply.json()["order_id"].as_str().unwrap()).await;
    assert_eq!(order.payer_ref, "anonymous");
    ctx.tear_down().await;
}

#[actix_web::test]
async fn invalid_donations_are_bad_requests() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let bad_method = donate_request("6", json!({"amount": 5, "payment": "paypal", "category": "3"}));
    let reply = ctx.send(bad_method).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["error"].as_str().unwrap().contains("paypal"));

    let bad_amount = donate_request("6", json!({"amount": 0, "payment": "wechat", "category": "3"}));
    assert_eq!(ctx.send(bad_amount).await.status, StatusCode::BAD_REQUEST);

    let missing_amount = donate_request("6", json!({"payment": "wechat"}));
    assert_eq!(ctx.send(missing_amount).await.status, StatusCode::BAD_REQUEST);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn donation_form_redirects_to_the_payment_page() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let form = [("amount", "20"), ("payment", "alipay"), ("category", "3"), ("payment_config_id", "6")];
    let req = TestRequest::post().uri("/donate/form?payment=does-not-matter").set_form(form);
    let reply = ctx.send(req).await;
    assert_eq!(reply.status, StatusCode::FOUND, "{}", reply.body);
    let location = reply.location.expect("No redirect");
    assert!(location.starts_with(GATEWAY_URL), "{location}");
    assert!(location.contains(&urlencoded(&format!("{PUBLIC_BASE_URL}/api/callback"))), "{location}");

    let bad = [("amount", "twenty"), ("payment", "alipay")];
    let reply = ctx.send(TestRequest::post().uri("/donate/form?payment=6").set_form(bad)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn donation_link_redirects_to_the_payment_page() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let req = TestRequest::get().uri("/donate/form?amount=5&payment=wechat&category=3&payment_config_id=6");
    let reply = ctx.send(req.cookie(Cookie::new("wechat_openid", "oUpF8"))).await;
    assert_eq!(reply.status, StatusCode::FOUND, "{}", reply.body);
    let location = reply.location.expect("No redirect");
    assert!(location.starts_with(GATEWAY_URL), "{location}");
    assert!(location.contains("total_amount=500&"), "{location}");

    let reply = ctx.send(TestRequest::get().uri("/donate/form?amount=5&payment_config_id=6")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn only_completed_donations_are_refunded() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let reply = ctx.send(donate_request("6", json!({"amount": 9.99, "payment": "wechat", "category": "3"}))).await;
    let order_id = reply.json()["order_id"].as_str().unwrap().to_string();

    let reply = ctx.send(TestRequest::post().uri(&format!("/refund/{order_id}"))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", reply.body);
    assert_eq!(ctx.order(&order_id).await.status, OrderStatusType::Pending);

    let reply = ctx.send(TestRequest::post().uri("/refund/NO_SUCH_ORDER")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn activation_stores_the_new_terminal() {
    let mut gateway = MockGateway::new();
    gateway.expect_activate().withf(|config, code| config.id == "6" && code == "81723355").times(1).returning(|_, _| {
        Ok(TerminalCredentials {
            terminal_sn: "T601".into(),
            terminal_key: Secret::from("fresh-key"),
            merchant_name: None,
            store_name: None,
        })
    });
    let ctx = TestContext::new(gateway).await;

    let req = TestRequest::post().uri("/activate?payment=6").set_json(json!({"activation_code": "81723355"}));
    let reply = ctx.send(req).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.json()["terminal_sn"], "T601");
    assert!(!reply.body.contains("fresh-key"));
    let stored = ctx.db.fetch_tenant_config("6").await.unwrap().unwrap();
    assert_eq!(stored.terminal_sn, "T601");
    assert_eq!(stored.terminal_key.reveal(), "fresh-key");

    let req = TestRequest::post().uri("/activate?payment=6").set_json(json!({"activation_code": " "}));
    assert_eq!(ctx.send(req).await.status, StatusCode::BAD_REQUEST);
    ctx.tear_down().await;
}

fn urlencoded(s: &str) -> String {
    s.replace(':', "%3A").replace('/', "%2F")
}
