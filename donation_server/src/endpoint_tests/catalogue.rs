use actix_web::{http::StatusCode, test::TestRequest};
use donation_engine::{db_types::Category, TenantManagement};

use super::{
    helpers::{TestContext, TERMINAL_KEY},
    mocks::MockGateway,
};

#[actix_web::test]
async fn categories_are_filtered_by_tenant() {
    let ctx = TestContext::new(MockGateway::new()).await;
    ctx.db
        .save_category(&Category { id: "9".into(), name: "Incense".into(), tenant_config_id: "7".into() })
        .await
        .unwrap();

    let reply = ctx.send(TestRequest::get().uri("/categories?payment=6")).await;
    assert_eq!(reply.status, StatusCode::OK);
    let categories: Vec<Category> = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(categories, vec![Category { id: "3".into(), name: "Lamp".into(), tenant_config_id: "6".into() }]);

    let reply = ctx.send(TestRequest::get().uri("/categories")).await;
    let categories: Vec<Category> = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(categories.len(), 2);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn single_category() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let reply = ctx.send(TestRequest::get().uri("/category/3")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["name"], "Lamp");

    let reply = ctx.send(TestRequest::get().uri("/category/99")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.json()["error"].as_str().unwrap().contains("Category 99"));
    ctx.tear_down().await;
}

#[actix_web::test]
async fn payment_config_is_shown_without_its_keys() {
    let ctx = TestContext::new(MockGateway::new()).await;
    let reply = ctx.send(TestRequest::get().uri("/payment-config/6")).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.json()["terminal_sn"], "T600");
    assert!(!reply.body.contains(TERMINAL_KEY), "{}", reply.body);
    assert!(!reply.body.contains("terminal_key"));

    let reply = ctx.send(TestRequest::get().uri("/payment-config/99")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    ctx.tear_down().await;
}
