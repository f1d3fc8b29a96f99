use actix_web::{http::StatusCode, test::TestRequest};
use donation_engine::{
    db_types::OrderStatusType,
    signature::RsaSigner,
    test_utils::GATEWAY_TEST_PRIVATE_KEY,
};
use serde_json::json;

use super::{
    helpers::{donate_request, TestContext},
    mocks::MockGateway,
};

async fn new_order(ctx: &TestContext) -> String {
    let reply = ctx.send(donate_request("6", json!({"amount": 9.99, "payment": "wechat", "category": "3"}))).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    reply.json()["order_id"].as_str().unwrap().to_string()
}

fn notification(order_id: &str, status: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "client_sn": order_id,
        "status": status,
        "payer_uid": "oUpF8",
        "total_amount": "999",
        "reflect": "6-3"
    }))
    .unwrap()
}

fn callback(body: Vec<u8>, signature: Option<String>) -> TestRequest {
    let req = TestRequest::post().uri("/callback").insert_header(("Content-Type", "application/json"));
    let req = match signature {
        Some(sig) => req.insert_header(("Authorization", sig)),
        None => req,
    };
    req.set_payload(body)
}

#[actix_web::test]
async fn signed_notification_completes_the_order_and_reaches_viewers() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let watching = ctx.watch("6");
    let elsewhere = ctx.watch("7");
    let order_id = new_order(&ctx).await;

    let body = notification(&order_id, "SUCCESS");
    let signature = RsaSigner::from_pem(GATEWAY_TEST_PRIVATE_KEY).unwrap().sign_bytes(&body);
    let reply = ctx.send(callback(body, Some(signature))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "success");

    let order = ctx.wait_for_status(&order_id, OrderStatusType::Completed).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.payer_uid.as_deref(), Some("oUpF8"));

    let frames = watching.frames().await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "pay_success");
    assert_eq!(frames[0]["orderNo"], order_id.as_str());
    assert_eq!(frames[0]["amount"], 9.99);
    assert!(elsewhere.frames().await.is_empty());

    let reply = ctx.send(TestRequest::get().uri("/rankings?payment=6&limit=5")).await;
    assert_eq!(reply.status, StatusCode::OK);
    let page = reply.json();
    assert_eq!(page["rankings"].as_array().unwrap().len(), 1);
    assert_eq!(page["rankings"][0]["order_id"], order_id.as_str());
    assert_eq!(page["rankings"][0]["category_name"], "Lamp");
    assert_eq!(page["pagination"]["limit"], 5);
    assert_eq!(page["pagination"]["total"], 1);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn forged_notification_is_rejected() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let order_id = new_order(&ctx).await;

    let signature = RsaSigner::from_pem(GATEWAY_TEST_PRIVATE_KEY).unwrap().sign_bytes(&notification(&order_id, "FAIL"));
    let reply = ctx.send(callback(notification(&order_id, "SUCCESS"), Some(signature))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, "fail");

    let reply = ctx.send(callback(notification(&order_id, "SUCCESS"), None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.order(&order_id).await.status, OrderStatusType::Pending);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn unreadable_notification_is_a_bad_request() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let reply = ctx.send(callback(b"client_sn=123".to_vec(), Some("c2lnbmF0dXJl".into()))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, "fail");

    let reply = ctx.send(callback(serde_json::to_vec(&json!({"status": "SUCCESS"})).unwrap(), None)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn rankings_tolerate_garbage_parameters() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let reply = ctx.send(TestRequest::get().uri("/rankings?limit=lots&page=-4")).await;
    assert_eq!(reply.status, StatusCode::OK);
    let page = reply.json();
    assert!(page["rankings"].as_array().unwrap().is_empty());
    assert_eq!(page["pagination"]["limit"], 10);
    assert_eq!(page["pagination"]["page"], 1);

    let reply = ctx.send(TestRequest::get().uri(&format!("/rankings?limit=100&page={}", i64::MAX))).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let page = reply.json();
    assert!(page["rankings"].as_array().unwrap().is_empty());
    assert_eq!(page["pagination"]["page"], i64::MAX);
    ctx.tear_down().await;
}
