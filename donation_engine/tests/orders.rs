use donation_engine::{
    db_types::{
        Fen,
        NewOrder,
        OrderId,
        OrderStatusType,
        PayerIdentity,
        PaymentMethod,
        ANONYMOUS_NICKNAME,
        DEFAULT_AVATAR_URL,
    },
    gateway::{GatewayError, GatewayOrderStatus, OrderQueryResult, RefundReceipt},
    order_objects::{CallbackUrls, NewDonation},
    signature::RsaSigner,
    traits::{RankingQuery, TransitionResult},
    DonationDatabase,
    OrderFlowError,
    OrderManagement,
    RankingsApi,
    RankingsManagement,
    ReconcileOutcome,
    SqliteDatabase,
};
use serde_json::json;

use crate::support::*;

mod support;

fn pending_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway
        .expect_query_order()
        .returning(|_, _| Ok(OrderQueryResult { status: GatewayOrderStatus::Created, payer_uid: None }));
    gateway
}

fn urls() -> CallbackUrls {
    CallbackUrls::from_base_url("https://donate.test", "6", "3")
}

fn donation(amount: f64) -> NewDonation {
    NewDonation::new(amount, PaymentMethod::Wechat).with_tenant("6").with_category("3")
}

async fn complete(engine: &TestEngine, order_id: &OrderId) {
    let body = serde_json::to_vec(&json!({"client_sn": order_id.as_str(), "status": "SUCCESS"})).unwrap();
    let signature = RsaSigner::from_pem(PRIVATE_KEY).unwrap().sign_bytes(&body);
    let ack = engine.webhook.handle(&body, Some(&signature)).await.expect("Webhook was rejected");
    assert_eq!(ack.reconciliation.await.unwrap(), ReconcileOutcome::Applied(OrderStatusType::Completed));
}

#[tokio::test]
async fn amounts_outside_the_donation_range_are_rejected() {
    let engine = setup(pending_gateway()).await;
    for amount in [0.009, 10_000.01, -5.0, f64::NAN] {
        let err = engine.api.create_order(donation(amount), &urls()).await.err().expect("Amount was accepted");
        assert!(matches!(err, OrderFlowError::InvalidAmount(_)), "{amount}: {err}");
    }
    assert_eq!(engine.supervisor.active_count(), 0);

    let smallest = engine.api.create_order(donation(0.01), &urls()).await.expect("0.01 was rejected");
    assert_eq!(fetch(&engine.db, &smallest.order_id).await.amount, Fen::from(1i64));
    let largest = engine.api.create_order(donation(10_000.0), &urls()).await.expect("10000 was rejected");
    assert_eq!(fetch(&engine.db, &largest.order_id).await.amount, Fen::from(1_000_000i64));
    assert_eq!(engine.supervisor.active_count(), 2);
    tear_down(engine).await;
}

#[tokio::test]
async fn redirect_url_carries_the_signed_payment_request() {
    let engine = setup(pending_gateway()).await;
    let created = engine.api.create_order(donation(9.99).with_blessing("平安"), &urls()).await.unwrap();
    let url = created.redirect_url;
    assert!(url.starts_with("https://qr.gateway.test/gateway?payway=3&reflect=6-3&terminal_sn=T600&"), "{url}");
    assert!(url.contains(&format!("client_sn={}", created.order_id)));
    assert!(url.contains("total_amount=999&"));
    assert!(url.contains(&format!("subject={}", urlencoding::encode("捐款-Main Hall-Lamp"))));
    assert!(url.contains("operator=donation_system"));
    let sign = url.rsplit_once("&sign=").map(|(_, s)| s).expect("No signature");
    assert_eq!(sign.len(), 32);
    assert!(sign.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

    let order = fetch(&engine.db, &created.order_id).await;
    assert_eq!(order.blessing, "平安");
    assert_eq!(order.payment_method, PaymentMethod::Wechat);
    tear_down(engine).await;
}

#[tokio::test]
async fn unknown_tenant_falls_back_to_an_unactivated_default() {
    let mut gateway = pending_gateway();
    gateway.expect_check_in().times(1).returning(|config| Err(GatewayError::TerminalNotActivated(config.id.clone())));
    let engine = setup(gateway).await;
    let donation = NewDonation::new(5.0, PaymentMethod::Alipay).with_tenant("99").with_category("3");
    let err = engine.api.create_order(donation, &urls()).await.err().expect("Order was created");
    assert!(matches!(err, OrderFlowError::IncompleteConfig(ref id, _) if id.is_empty()), "{err}");
    assert_eq!(engine.supervisor.active_count(), 0);
    tear_down(engine).await;
}

#[tokio::test]
async fn only_completed_orders_can_be_refunded() {
    let mut gateway = pending_gateway();
    gateway.expect_refund_order().times(1).withf(|config, _, amount| config.id == "6" && *amount == Fen::from(999i64)).returning(
        |_, order_id, _| {
            Ok(RefundReceipt {
                order_status: "REFUNDED".into(),
                sn: Some("7894259244067218".into()),
                client_sn: Some(order_id.to_string()),
            })
        },
    );
    let engine = setup(gateway).await;
    let created = engine.api.create_order(donation(9.99), &urls()).await.unwrap();
    let err = engine.api.refund(&created.order_id).await.err().expect("Pending order was refunded");
    assert!(matches!(err, OrderFlowError::NotRefundable(_, OrderStatusType::Pending)));
    let err = engine.api.refund(&"ORD-missing".into()).await.err().expect("Missing order was refunded");
    assert!(matches!(err, OrderFlowError::OrderNotFound(_)));

    complete(&engine, &created.order_id).await;
    let receipt = engine.api.refund(&created.order_id).await.expect("Refund failed");
    assert_eq!(receipt.order_status, "REFUNDED");
    assert_eq!(receipt.client_sn.as_deref(), Some(created.order_id.as_str()));
    // Refunds leave the local status alone
    assert_eq!(fetch(&engine.db, &created.order_id).await.status, OrderStatusType::Completed);
    tear_down(engine).await;
}

#[tokio::test]
async fn rankings_list_completed_donations_with_display_defaults() {
    let engine = setup(pending_gateway()).await;
    engine
        .db
        .save_payer_identity(&PayerIdentity {
            payer_ref: "openid-1".into(),
            payment_method: PaymentMethod::Wechat,
            nickname: "Lotus".into(),
            avatar_url: "https://img.test/lotus.png".into(),
        })
        .await
        .unwrap();
    let known = engine.api.create_order(donation(20.0).with_payer("openid-1"), &urls()).await.unwrap();
    let anonymous = engine.api.create_order(donation(9.99).with_blessing("平安"), &urls()).await.unwrap();
    let _pending = engine.api.create_order(donation(1.0), &urls()).await.unwrap();
    complete(&engine, &known.order_id).await;
    complete(&engine, &anonymous.order_id).await;

    let rankings = RankingsApi::new(engine.db.clone());
    let page = rankings.rankings(RankingQuery::default()).await.unwrap();
    assert_eq!(page.rankings.len(), 2);
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.pagination.offset, 0);
    let entry = page.rankings.iter().find(|r| r.order_id == known.order_id.as_str()).expect("Missing donation");
    assert_eq!(entry.user_name, "Lotus");
    assert_eq!(entry.avatar_url, "https://img.test/lotus.png");
    assert_eq!(entry.amount, 20.0);
    assert_eq!(entry.payment, "6");
    assert_eq!(entry.category_name, "Lamp");
    let entry = page.rankings.iter().find(|r| r.order_id == anonymous.order_id.as_str()).expect("Missing donation");
    assert_eq!(entry.user_name, ANONYMOUS_NICKNAME);
    assert_eq!(entry.avatar_url, DEFAULT_AVATAR_URL);
    assert_eq!(entry.amount, 9.99);
    assert_eq!(entry.blessing, "平安");

    let query = RankingQuery::new(Some(1), Some(2), Some("6".into()), Some("3".into()));
    let page = rankings.rankings(query).await.unwrap();
    assert_eq!(page.rankings.len(), 1);
    assert_eq!(page.pagination.offset, 1);

    let page = rankings.rankings(RankingQuery::new(None, None, Some("7".into()), None)).await.unwrap();
    assert!(page.rankings.is_empty());
    tear_down(engine).await;
}

#[tokio::test]
async fn status_transitions_are_visible_to_other_connections() {
    let engine = setup(pending_gateway()).await;
    let observer = SqliteDatabase::new_with_url(engine.db.url(), 1).await.expect("Error opening a second pool");
    for i in 0..50 {
        let order_id = OrderId::from(format!("ORD-durable-{i}"));
        let order = NewOrder::new(order_id.clone(), Fen::from(100i64), PaymentMethod::Alipay).with_tenant("6");
        engine.db.insert_order(order).await.expect("Error inserting order");
        let result = engine.db.transition_order_status(&order_id, OrderStatusType::Completed, Some("2088")).await;
        assert!(matches!(result, Ok(TransitionResult::Applied(_))), "{order_id}: {result:?}");
        let seen = observer.fetch_order_by_order_id(&order_id).await.unwrap().expect("Order is missing");
        assert_eq!(seen.status, OrderStatusType::Completed, "{order_id}");
        assert_eq!(seen.payer_uid.as_deref(), Some("2088"));

        let result = engine.db.transition_order_status(&order_id, OrderStatusType::Unknown, None).await;
        assert!(matches!(result, Ok(TransitionResult::Unchanged(_))), "{order_id}: {result:?}");
        assert_eq!(observer.fetch_order_by_order_id(&order_id).await.unwrap().unwrap().status, OrderStatusType::Completed);
    }
    let missing = engine.db.transition_order_status(&OrderId::from("ORD-nobody"), OrderStatusType::Failed, None).await;
    assert!(matches!(missing, Ok(TransitionResult::NotFound)));
    observer.close().await;
    tear_down(engine).await;
}
