use actix_web::{test::TestRequest, web};
use chrono::Utc;
use serde_json::{json, Value};
use wallet_payment_engine::{
    db_types::{
        Actor,
        AuditAction,
        LedgerEntry,
        LedgerEntryKind,
        NewLedgerEntry,
        OrderId,
        Page,
        Reference,
        Rupiah,
        Wallet,
    },
    events::EventProducers,
    traits::PaymentIntentError,
    AdjustmentApi,
    LedgerApi,
    ReviewApi,
};

use super::{
    helpers::{api_request, as_user},
    mocks::{MockAuditTrail, MockIntentManager, MockLedgerManager},
};
use crate::routes::{AdminAdjustRoute, AdminAuditRoute, AdminRefundRoute, AdminWalletRoute, ResolveAnomalyRoute};

fn wallet(user_id: i64, balance: i64) -> Wallet {
    let now = Utc::now();
    Wallet { user_id, balance: Rupiah::from(balance), version: 1, created_at: now, updated_at: now }
}

fn saved_entry(id: i64, entry: NewLedgerEntry, balance_after: i64) -> LedgerEntry {
    LedgerEntry {
        id,
        user_id: entry.user_id,
        kind: entry.kind,
        amount: entry.amount,
        balance_after: Rupiah::from(balance_after),
        reference: entry.reference,
        description: entry.description,
        created_at: Utc::now(),
    }
}

fn configure_adjustments(db: MockLedgerManager) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = AdjustmentApi::new(db, EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(AdminAdjustRoute::<MockLedgerManager>::new());
    }
}

fn configure_ledger(db: MockLedgerManager) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = LedgerApi::new(db, EventProducers::default());
        cfg.app_data(web::Data::new(api))
            .service(AdminWalletRoute::<MockLedgerManager>::new())
            .service(AdminRefundRoute::<MockLedgerManager>::new());
    }
}

fn configure_review(db: MockIntentManager) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = ReviewApi::new(db);
        cfg.app_data(web::Data::new(api)).service(ResolveAnomalyRoute::<MockIntentManager>::new());
    }
}

fn configure_audit(db: MockAuditTrail) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = ReviewApi::new(db);
        cfg.app_data(web::Data::new(api)).service(AdminAuditRoute::<MockAuditTrail>::new());
    }
}

#[actix_web::test]
async fn deduction_beyond_balance_is_refused() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().returning(|id| Ok(Some(wallet(id, 30_000))));
    db.expect_apply_ledger_entry().never();
    let req = as_user(TestRequest::post().uri("/api/admin/wallets/42/adjust"), 1, "admin").set_json(json!({
        "amount": -80_000,
        "reason": "Chargeback from the card issuer"
    }));
    let (status, body) = api_request(req, configure_adjustments(db)).await;
    assert_eq!(status.as_u16(), 422, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["balance"], json!(30_000));
    assert_eq!(body["attempted"], json!(-80_000));
    assert_eq!(body["wouldBeBalance"], json!(-50_000));
}

#[actix_web::test]
async fn adjustment_records_the_admin() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().returning(|id| Ok(Some(wallet(id, 30_000))));
    db.expect_apply_ledger_entry()
        .withf(|entry, ctx| {
            entry.kind == LedgerEntryKind::Adjust &&
                entry.amount == Rupiah::from(-10_000) &&
                entry.reference == Reference::Admin("DEDUCT-CS-991".to_string()) &&
                ctx.actor == Actor::Admin(3) &&
                ctx.action == AuditAction::BalanceAdjustment
        })
        .times(1)
        .returning(|entry, _| Ok(saved_entry(55, entry, 20_000)));
    let req = as_user(TestRequest::post().uri("/api/admin/wallets/42/adjust"), 3, "admin").set_json(json!({
        "amount": -10_000,
        "reason": "Duplicate top-up",
        "reference": "DEDUCT-CS-991"
    }));
    let (status, body) = api_request(req, configure_adjustments(db)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["balanceAfter"], json!(20_000));
    assert_eq!(body["description"], json!("Duplicate top-up"));
}

#[actix_web::test]
async fn adjustment_needs_a_reason() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_apply_ledger_entry().never();
    let req = as_user(TestRequest::post().uri("/api/admin/wallets/42/adjust"), 3, "admin").set_json(json!({
        "amount": 10_000,
        "reason": "   "
    }));
    let (status, _) = api_request(req, configure_adjustments(db)).await;
    assert_eq!(status.as_u16(), 400);
}

#[actix_web::test]
async fn users_cannot_adjust_balances() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().never();
    db.expect_apply_ledger_entry().never();
    let req = as_user(TestRequest::post().uri("/api/admin/wallets/42/adjust"), 42, "user").set_json(json!({
        "amount": 1_000_000,
        "reason": "Free money"
    }));
    let (status, body) = api_request(req, configure_adjustments(db)).await;
    assert_eq!(status.as_u16(), 403);
    assert!(body.contains("Insufficient Permissions"), "{body}");
}

#[actix_web::test]
async fn wallet_overview_flags_drift() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_fetch_wallet().returning(|id| Ok(Some(wallet(id, 50_000))));
    db.expect_ledger_sum().returning(|_| Ok(Rupiah::from(45_000)));
    let req = as_user(TestRequest::get().uri("/api/admin/wallets/42"), 3, "admin");
    let (status, body) = api_request(req, configure_ledger(db)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["wallet"]["balance"], json!(50_000));
    assert_eq!(body["integrity"]["ledgerSum"], json!(45_000));
    assert_eq!(body["integrity"]["consistent"], json!(false));
}

#[actix_web::test]
async fn refund_credits_the_order_amount() {
    let _ = env_logger::try_init().ok();
    let mut db = MockLedgerManager::new();
    db.expect_apply_ledger_entry()
        .withf(|entry, ctx| {
            entry.kind == LedgerEntryKind::Refund &&
                entry.amount == Rupiah::from(25_000) &&
                entry.reference == Reference::Order(OrderId::from("ORD-1001")) &&
                ctx.action == AuditAction::PurchaseRefund
        })
        .times(1)
        .returning(|entry, _| Ok(saved_entry(60, entry, 100_000)));
    let req = as_user(TestRequest::post().uri("/api/admin/wallets/42/refund"), 3, "admin").set_json(json!({
        "amount": 25_000,
        "orderId": "ORD-1001",
        "reason": "Item out of stock"
    }));
    let (status, body) = api_request(req, configure_ledger(db)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["kind"], json!("REFUND"));
}

#[actix_web::test]
async fn resolving_a_missing_anomaly() {
    let _ = env_logger::try_init().ok();
    let mut db = MockIntentManager::new();
    db.expect_resolve_anomaly()
        .withf(|id, admin| *id == 99 && *admin == 3)
        .times(1)
        .returning(|id, _| Err(PaymentIntentError::AnomalyNotFound(id)));
    let req = as_user(TestRequest::post().uri("/api/admin/anomalies/99/resolve"), 3, "admin");
    let (status, body) = api_request(req, configure_review(db)).await;
    assert_eq!(status.as_u16(), 404);
    assert!(body.contains("Anomaly #99"), "{body}");
}

#[actix_web::test]
async fn audit_search_filters() {
    let _ = env_logger::try_init().ok();
    let mut db = MockAuditTrail::new();
    db.expect_fetch_audit_records()
        .withf(|q| q.target_user_id == Some(42) && q.admin_id == Some(3) && q.page == 2 && q.per_page == 10)
        .times(1)
        .returning(|_| Ok(Page { data: vec![], total: 12, total_pages: 2 }));
    let req = as_user(TestRequest::get().uri("/api/admin/audit?userId=42&actorId=3&page=2&perPage=10"), 3, "admin");
    let (status, body) = api_request(req, configure_audit(db)).await;
    assert_eq!(status.as_u16(), 200, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["total"], json!(12));
    assert_eq!(body["totalPages"], json!(2));
}
