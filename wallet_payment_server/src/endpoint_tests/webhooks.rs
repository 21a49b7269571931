use std::sync::atomic::Ordering;

use actix_web::{test::TestRequest, web};
use chrono::Utc;
use serde_json::{json, Value};
use wallet_payment_engine::{
    db_types::{
        IntentStatus,
        LedgerEntry,
        LedgerEntryKind,
        OrderId,
        PaymentIntent,
        PaymentProvider,
        Reference,
        Rupiah,
    },
    events::EventProducers,
    traits::{GatewayError, MappedStatus, SettleResult, SettlementEvent},
    SettlementApi,
};

use super::{
    helpers::public_request,
    mocks::{MockIntentManager, StubGateway, STUB_SIGNATURE, STUB_SIGNATURE_HEADER},
};
use crate::routes::PaymentWebhookRoute;

fn midtrans_gateway(report: Result<SettlementEvent, GatewayError>) -> StubGateway {
    StubGateway::new(PaymentProvider::Midtrans, report)
}

fn settlement_report(order_id: &str, amount: i64) -> SettlementEvent {
    SettlementEvent {
        provider: PaymentProvider::Midtrans,
        order_id: OrderId::from(order_id),
        raw_status: "settlement".to_string(),
        status: MappedStatus::Known(IntentStatus::Settlement),
        gross_amount: Some(Rupiah::from(amount)),
        provider_reference: Some("mt-ref-1".to_string()),
    }
}

fn intent(order_id: &str, amount: i64, status: IntentStatus) -> PaymentIntent {
    let now = Utc::now();
    PaymentIntent {
        order_id: OrderId::from(order_id),
        user_id: 42,
        gross_amount: Rupiah::from(amount),
        provider: PaymentProvider::Midtrans,
        provider_method: "bca_va".to_string(),
        provider_reference: Some("mt-ref-1".to_string()),
        status,
        ledger_entry_id: None,
        created_at: now,
        updated_at: now,
        settled_at: None,
    }
}

fn configure(db: MockIntentManager, gw: StubGateway) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = SettlementApi::new(db, EventProducers::default()).with_gateway(gw);
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockIntentManager, StubGateway>::new());
    }
}

fn notification(provider: &str, signature: Option<&str>) -> TestRequest {
    let req = TestRequest::post().uri(&format!("/webhook/{provider}")).set_payload(r#"{"order_id":"TOPUP-1"}"#);
    match signature {
        Some(sig) => req.insert_header((STUB_SIGNATURE_HEADER, sig)),
        None => req,
    }
}

#[actix_web::test]
async fn invalid_signature_is_rejected_before_parsing() {
    let _ = env_logger::try_init().ok();
    let gw = midtrans_gateway(Ok(settlement_report("TOPUP-1", 50_000)));
    let parsed = gw.parsed.clone();
    let mut db = MockIntentManager::new();
    db.expect_fetch_intent().never();
    let (status, body) = public_request(notification("midtrans", Some("forged")), configure(db, gw)).await;
    assert_eq!(status.as_u16(), 401);
    assert!(body.contains("signature"), "{body}");
    assert_eq!(parsed.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn missing_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let gw = midtrans_gateway(Ok(settlement_report("TOPUP-1", 50_000)));
    let parsed = gw.parsed.clone();
    let db = MockIntentManager::new();
    let (status, _) = public_request(notification("midtrans", None), configure(db, gw)).await;
    assert_eq!(status.as_u16(), 401);
    assert_eq!(parsed.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn unknown_provider_in_path() {
    let _ = env_logger::try_init().ok();
    let db = MockIntentManager::new();
    let gw = midtrans_gateway(Ok(settlement_report("TOPUP-1", 50_000)));
    let (status, _) = public_request(notification("paypal", Some(STUB_SIGNATURE)), configure(db, gw)).await;
    assert_eq!(status.as_u16(), 400);
}

#[actix_web::test]
async fn provider_without_a_configured_gateway() {
    let _ = env_logger::try_init().ok();
    let db = MockIntentManager::new();
    let gw = midtrans_gateway(Ok(settlement_report("TOPUP-1", 50_000)));
    let (status, body) = public_request(notification("tripay", Some(STUB_SIGNATURE)), configure(db, gw)).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("tripay"), "{body}");
}

#[actix_web::test]
async fn malformed_payload() {
    let _ = env_logger::try_init().ok();
    let gw = midtrans_gateway(Err(GatewayError::MalformedPayload("missing order_id".to_string())));
    let mut db = MockIntentManager::new();
    db.expect_fetch_intent().never();
    let (status, _) = public_request(notification("midtrans", Some(STUB_SIGNATURE)), configure(db, gw)).await;
    assert_eq!(status.as_u16(), 400);
}

#[actix_web::test]
async fn unknown_order_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let gw = midtrans_gateway(Ok(settlement_report("TOPUP-404", 50_000)));
    let mut db = MockIntentManager::new();
    db.expect_fetch_intent().times(1).returning(|_| Ok(None));
    db.expect_settle_intent().never();
    let (status, body) = public_request(notification("midtrans", Some(STUB_SIGNATURE)), configure(db, gw)).await;
    assert_eq!(status.as_u16(), 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Unknown order TOPUP-404"));
}

#[actix_web::test]
async fn settlement_credits_the_wallet() {
    let _ = env_logger::try_init().ok();
    let gw = midtrans_gateway(Ok(settlement_report("TOPUP-1", 50_000)));
    let mut db = MockIntentManager::new();
    db.expect_fetch_intent().returning(|id| Ok(Some(intent(id.as_str(), 50_000, IntentStatus::Pending))));
    db.expect_settle_intent()
        .withf(|id, source| id.as_str() == "TOPUP-1" && source.to_string() == "webhook:midtrans")
        .times(1)
        .returning(|id, _| {
            let mut settled = intent(id.as_str(), 50_000, IntentStatus::Settlement);
            settled.ledger_entry_id = Some(8);
            let entry = LedgerEntry {
                id: 8,
                user_id: 42,
                kind: LedgerEntryKind::Topup,
                amount: Rupiah::from(50_000),
                balance_after: Rupiah::from(50_000),
                reference: Reference::Order(id.clone()),
                description: "Wallet top-up via midtrans (bca_va)".to_string(),
                created_at: Utc::now(),
            };
            Ok(SettleResult::Settled { intent: settled, entry })
        });
    let (status, body) = public_request(notification("midtrans", Some(STUB_SIGNATURE)), configure(db, gw)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Order TOPUP-1 settled. Ledger entry #8 created"));
}

#[actix_web::test]
async fn redelivered_settlement_is_a_no_op() {
    let _ = env_logger::try_init().ok();
    let gw = midtrans_gateway(Ok(settlement_report("TOPUP-1", 50_000)));
    let mut db = MockIntentManager::new();
    db.expect_fetch_intent().returning(|id| Ok(Some(intent(id.as_str(), 50_000, IntentStatus::Settlement))));
    db.expect_settle_intent().never();
    db.expect_record_anomaly().never();
    let (status, body) = public_request(notification("midtrans", Some(STUB_SIGNATURE)), configure(db, gw)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    assert!(body.contains("already SETTLEMENT"), "{body}");
}
