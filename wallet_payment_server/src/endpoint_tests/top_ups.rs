use actix_web::{test::TestRequest, web};
use chrono::Utc;
use serde_json::{json, Value};
use wallet_payment_engine::{
    db_types::{IntentStatus, NewPaymentIntent, PaymentIntent, PaymentProvider, Rupiah},
    events::EventProducers,
    traits::{CloseResult, GatewayError, ProviderChargeResult},
    SettlementApi,
};

use super::{
    helpers::{api_request, as_user},
    mocks::{MockIntentManager, StubGateway},
};
use crate::routes::TopUpRoute;

fn stored(intent: NewPaymentIntent) -> PaymentIntent {
    let now = Utc::now();
    PaymentIntent {
        order_id: intent.order_id,
        user_id: intent.user_id,
        gross_amount: intent.gross_amount,
        provider: intent.provider,
        provider_method: intent.provider_method,
        provider_reference: None,
        status: IntentStatus::Pending,
        ledger_entry_id: None,
        created_at: now,
        updated_at: now,
        settled_at: None,
    }
}

fn gateway() -> StubGateway {
    StubGateway::new(PaymentProvider::Midtrans, Err(GatewayError::Timeout))
}

fn configure(db: MockIntentManager, gw: StubGateway) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = SettlementApi::new(db, EventProducers::default()).with_gateway(gw);
        cfg.app_data(web::Data::new(api)).service(TopUpRoute::<MockIntentManager, StubGateway>::new());
    }
}

fn top_up_request(body: Value) -> TestRequest {
    as_user(TestRequest::post().uri("/api/wallet/topup").set_json(body), 42, "user")
}

#[actix_web::test]
async fn top_up_starts_a_charge_for_a_pending_intent() {
    let _ = env_logger::try_init().ok();
    let charge = ProviderChargeResult {
        provider_reference: "mt-tx-9".to_string(),
        payment_url: None,
        pay_code: Some("8808123456789".to_string()),
        expires_at: None,
    };
    let gw = gateway().with_charge(Ok(charge));
    let charges = gw.charges.clone();
    let mut db = MockIntentManager::new();
    let charges_at_insert = charges.clone();
    db.expect_insert_intent()
        .withf(|i| {
            i.user_id == 42
                && i.gross_amount == Rupiah::from(100_000)
                && i.provider == PaymentProvider::Midtrans
                && i.provider_method == "bca_va"
                && i.order_id.as_str().starts_with("WTU-42-")
        })
        .times(1)
        .returning(move |i| {
            assert!(charges_at_insert.lock().unwrap().is_empty(), "The charge was created before the intent");
            Ok(stored(i))
        });
    db.expect_attach_provider_reference()
        .withf(|order_id, reference| order_id.as_str().starts_with("WTU-42-") && reference.to_string() == "mt-tx-9")
        .times(1)
        .returning(|order_id, reference| {
            let new_intent =
                NewPaymentIntent::new(order_id.clone(), 42, Rupiah::from(100_000), PaymentProvider::Midtrans, "bca_va");
            let mut intent = stored(new_intent);
            intent.provider_reference = Some(reference.to_string());
            Ok(intent)
        });
    db.expect_close_intent().never();

    let req = top_up_request(json!({ "amount": 100_000, "provider": "midtrans", "method": "bca_va" }));
    let (status, body) = api_request(req, configure(db, gw)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["intent"]["status"], json!("PENDING"));
    assert_eq!(body["intent"]["providerReference"], json!("mt-tx-9"));
    assert_eq!(body["charge"]["payCode"], json!("8808123456789"));

    let charges = charges.lock().unwrap();
    assert_eq!(charges.len(), 1);
    assert_eq!(Some(charges[0].order_id.as_str()), body["intent"]["orderId"].as_str());
    assert_eq!(charges[0].customer.name, "Wallet user 42");
}

#[actix_web::test]
async fn failed_charge_closes_the_intent_as_failed() {
    let _ = env_logger::try_init().ok();
    let gw = gateway().with_charge(Err(GatewayError::Unavailable("connection refused".into())));
    let mut db = MockIntentManager::new();
    db.expect_insert_intent().times(1).returning(|i| Ok(stored(i)));
    db.expect_close_intent()
        .withf(|order_id, status| order_id.as_str().starts_with("WTU-42-") && *status == IntentStatus::Fail)
        .times(1)
        .returning(|order_id, _| {
            let new_intent =
                NewPaymentIntent::new(order_id.clone(), 42, Rupiah::from(100_000), PaymentProvider::Midtrans, "gopay");
            let mut intent = stored(new_intent);
            intent.status = IntentStatus::Fail;
            Ok(CloseResult::Closed(intent))
        });
    db.expect_attach_provider_reference().never();

    let req = top_up_request(json!({ "amount": 100_000, "provider": "midtrans", "method": "gopay" }));
    let (status, body) = api_request(req, configure(db, gw)).await;
    assert_eq!(status.as_u16(), 503, "{body}");
    assert!(body.contains("Payment service unavailable"), "{body}");
}

#[actix_web::test]
async fn top_up_for_unconfigured_provider() {
    let _ = env_logger::try_init().ok();
    let mut db = MockIntentManager::new();
    db.expect_insert_intent().never();
    let req = top_up_request(json!({ "amount": 100_000, "provider": "tripay", "method": "BRIVA" }));
    let (status, body) = api_request(req, configure(db, gateway())).await;
    assert_eq!(status.as_u16(), 400, "{body}");
    assert!(body.contains("tripay"), "{body}");
}

#[actix_web::test]
async fn top_up_requires_the_user_role() {
    let _ = env_logger::try_init().ok();
    let mut db = MockIntentManager::new();
    db.expect_insert_intent().never();
    let body = json!({ "amount": 1000, "provider": "midtrans", "method": "gopay" });
    let req = as_user(TestRequest::post().uri("/api/wallet/topup").set_json(body), 42, "checkout");
    let (status, _) = api_request(req, configure(db, gateway())).await;
    assert_eq!(status.as_u16(), 403);
}
