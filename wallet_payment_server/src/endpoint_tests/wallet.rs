use actix_web::{test::TestRequest, web};
use chrono::{TimeZone, Utc};
use log::*;
use serde_json::{json, Value};
use wallet_payment_engine::{
    db_types::{LedgerEntry, LedgerEntryKind, OrderId, Page, Reference, Rupiah, Wallet, MAX_PAGE},
    events::EventProducers,
    traits::LedgerError,
    LedgerApi,
};

use super::{
    helpers::{api_request, as_user},
    mocks::MockLedgerManager,
};
use crate::{
    auth::PROXY_TOKEN_HEADER,
    routes::{MyLedgerRoute, MyWalletRoute, PurchaseDebitRoute},
};

fn wallet(user_id: i64, balance: i64) -> Wallet {
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
    Wallet { user_id, balance: Rupiah::from(balance), version: 3, created_at: ts, updated_at: ts }
}

fn configure_wallet(db: MockLedgerManager) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = LedgerApi::new(db, EventProducers::default());
        cfg.app_data(web::Data::new(api))
            .service(MyWalletRoute::<MockLedgerManager>::new())
            .service(MyLedgerRoute::<MockLedgerManager>::new())
            .service(PurchaseDebitRoute::<MockLedgerManager>::new());
    }
}

#[actix_web::test]
async fn fetch_own_wallet() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().withf(|id| *id == 42).times(1).returning(|id| Ok(Some(wallet(id, 150_000))));
    let req = as_user(TestRequest::get().uri("/api/wallet"), 42, "user");
    let (status, body) = api_request(req, configure_wallet(db)).await;
    info!("Response: {body}");
    assert_eq!(status.as_u16(), 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["balanceIDR"], json!(150_000));
    assert_eq!(body["lastUpdatedAt"], json!("2024-05-01T10:30:00Z"));
}

#[actix_web::test]
async fn new_user_sees_zero_balance() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().returning(|_| Ok(None));
    let req = as_user(TestRequest::get().uri("/api/wallet"), 7, "user");
    let (status, body) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["balanceIDR"], json!(0));
    assert!(body["lastUpdatedAt"].is_null());
}

#[actix_web::test]
async fn wallet_without_identity() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().never();
    let req = TestRequest::get().uri("/api/wallet").insert_header((PROXY_TOKEN_HEADER, super::helpers::PROXY_TOKEN));
    let (status, body) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 401);
    assert!(body.contains("No authenticated user"), "{body}");
}

#[actix_web::test]
async fn wallet_with_forged_identity() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().never();
    // Identity headers without the proxy token must not be trusted
    let req = TestRequest::get().uri("/api/wallet").insert_header(("X-Auth-User-Id", "1")).insert_header((
        "X-Auth-Roles",
        "user,admin",
    ));
    let (status, body) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 401);
    assert!(body.contains("authentication proxy"), "{body}");
}

#[actix_web::test]
async fn wallet_requires_user_role() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().never();
    let req = as_user(TestRequest::get().uri("/api/wallet"), 5, "checkout");
    let (status, body) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 403);
    assert!(body.contains("Insufficient Permissions"), "{body}");
}

#[actix_web::test]
async fn purchase_debit_is_negated() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_apply_ledger_entry()
        .withf(|entry, _| {
            entry.user_id == 42 &&
                entry.kind == LedgerEntryKind::Debit &&
                entry.amount == Rupiah::from(-25_000) &&
                entry.reference == Reference::Order(OrderId::from("ORD-1001"))
        })
        .times(1)
        .returning(|entry, _| {
            Ok(LedgerEntry {
                id: 17,
                user_id: entry.user_id,
                kind: entry.kind,
                amount: entry.amount,
                balance_after: Rupiah::from(75_000),
                reference: entry.reference,
                description: entry.description,
                created_at: Utc::now(),
            })
        });
    let req = as_user(TestRequest::post().uri("/api/purchase/debit"), 900, "checkout").set_json(json!({
        "userId": 42,
        "amount": 25_000,
        "orderId": "ORD-1001"
    }));
    let (status, body) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["amount"], json!(-25_000));
    assert_eq!(body["balanceAfter"], json!(75_000));
}

#[actix_web::test]
async fn purchase_debit_insufficient_balance() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_apply_ledger_entry().times(1).returning(|entry, _| {
        Err(LedgerError::InsufficientBalance {
            user_id: entry.user_id,
            balance: Rupiah::from(10_000),
            attempted: entry.amount,
            would_be: Rupiah::from(10_000) + entry.amount,
        })
    });
    let req = as_user(TestRequest::post().uri("/api/purchase/debit"), 900, "checkout").set_json(json!({
        "userId": 42,
        "amount": 25_000,
        "orderId": "ORD-1002"
    }));
    let (status, body) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 422);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["balance"], json!(10_000));
    assert_eq!(body["wouldBeBalance"], json!(-15_000));
}

#[actix_web::test]
async fn purchase_debit_rejects_non_positive_amounts() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_apply_ledger_entry().never();
    let req = as_user(TestRequest::post().uri("/api/purchase/debit"), 900, "checkout").set_json(json!({
        "userId": 42,
        "amount": -5_000,
        "orderId": "ORD-1003"
    }));
    let (status, body) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("must be positive"), "{body}");
}

#[actix_web::test]
async fn purchase_debit_is_checkout_only() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_apply_ledger_entry().never();
    let req = as_user(TestRequest::post().uri("/api/purchase/debit"), 42, "user").set_json(json!({
        "userId": 42,
        "amount": 1_000,
        "orderId": "ORD-1004"
    }));
    let (status, _) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 403);
}

#[actix_web::test]
async fn ledger_page_far_past_the_end() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_ledger_page()
        .withf(|id, q| *id == 42 && q.page == MAX_PAGE && q.offset() == (MAX_PAGE - 1) * 20)
        .times(1)
        .returning(|_, q| Ok(Page::new(vec![], 3, q.per_page)));
    let req = as_user(TestRequest::get().uri(&format!("/api/wallet/ledger?page={}", i64::MAX)), 42, "user");
    let (status, body) = api_request(req, configure_wallet(db)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["total"], json!(3));
    assert_eq!(body["totalPages"], json!(1));
}
