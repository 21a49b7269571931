use std::time::Duration;

use cucumber::{then, when};
use regex::Regex;
use wallet_payment_engine::{
    db_types::{AnomalyKind, AuditQuery, IntentStatus, LedgerEntryKind, LedgerQuery, OrderId, PaymentProvider, Rupiah},
    settlement_objects::TransitionOutcome,
    AdjustmentError,
    AdminActor,
    PaymentIntentManagement,
    SettlementError,
};

use crate::{
    common::{ScriptedGateway, WEBHOOK_SECRET},
    cucumber::WalletWorld,
};

#[when(expr = "admin {int} adjusts the balance of user {int} by {int} IDR with reason {string}")]
async fn adjust_balance(world: &mut WalletWorld, admin_id: i64, user_id: i64, amount: i64, reason: String) {
    let admin = AdminActor::new(admin_id, Some("10.0.0.5".into()));
    let result = world.system().adjustments.adjust_balance(&admin, user_id, Rupiah::from(amount), &reason, None).await;
    world.last_entry = Some(result);
}

#[when(expr = "admin {int} tops up user {int} with {int} IDR and description {string}")]
async fn manual_top_up(world: &mut WalletWorld, admin_id: i64, user_id: i64, amount: i64, description: String) {
    let admin = AdminActor::new(admin_id, Some("10.0.0.5".into()));
    let result =
        world.system().adjustments.manual_top_up(&admin, user_id, Rupiah::from(amount), &description, None).await;
    world.last_entry = Some(result);
}

#[when(expr = "user {int} pays {int} IDR for order {word}")]
async fn purchase(world: &mut WalletWorld, user_id: i64, amount: i64, order_id: String) {
    world
        .system()
        .ledger
        .debit_for_purchase(user_id, Rupiah::from(amount), OrderId::from(order_id))
        .await
        .expect("Error debiting wallet");
}

#[when(expr = "a signed webhook reports {word} for order {word} with amount {int} IDR")]
async fn signed_webhook(world: &mut WalletWorld, status: String, order_id: String, amount: i64) {
    let payload = ScriptedGateway::webhook_payload(&order_id, &status, amount);
    let result = world.system().settlement.ingest_webhook(PaymentProvider::Midtrans, &payload, Some(WEBHOOK_SECRET)).await;
    world.last_webhook = Some(result);
}

#[when(expr = "a webhook with signature {string} reports {word} for order {word} with amount {int} IDR")]
async fn forged_webhook(world: &mut WalletWorld, signature: String, status: String, order_id: String, amount: i64) {
    let payload = ScriptedGateway::webhook_payload(&order_id, &status, amount);
    let result = world.system().settlement.ingest_webhook(PaymentProvider::Midtrans, &payload, Some(&signature)).await;
    world.last_webhook = Some(result);
}

#[when(expr = "user {int} checks the status of order {word}")]
async fn check_status(world: &mut WalletWorld, user_id: i64, order_id: String) {
    let order_id = OrderId::from(order_id);
    let result = world.system().settlement.check_and_settle_for_user(user_id, &order_id).await;
    world.last_status = Some(result);
}

#[when("the reconciliation sweep runs")]
async fn sweep(world: &mut WalletWorld) {
    run_sweep(world).await;
}

#[when(expr = "the reconciliation sweep runs {int} times")]
async fn repeated_sweeps(world: &mut WalletWorld, runs: usize) {
    for _ in 0..runs {
        run_sweep(world).await;
    }
}

async fn run_sweep(world: &mut WalletWorld) {
    tokio::time::sleep(Duration::from_millis(5)).await;
    let summary = world
        .system()
        .settlement
        .sweep_pending(Duration::ZERO, 50, Duration::ZERO)
        .await
        .expect("Error running reconciliation sweep");
    world.last_sweep = Some(summary);
}

#[when(expr = "admin {int} resolves every open anomaly")]
async fn resolve_open_anomalies(world: &mut WalletWorld, admin_id: i64) {
    let review = &world.system().review;
    for anomaly in review.anomalies(true).await.expect("Error fetching anomalies") {
        review.resolve_anomaly(anomaly.id, admin_id).await.expect("Error resolving anomaly");
    }
}

#[then(expr = "user {int} has a balance of {int} IDR")]
async fn check_balance(world: &mut WalletWorld, user_id: i64, amount: i64) {
    let summary = world.system().ledger.wallet_summary(user_id).await.expect("Error fetching wallet");
    assert_eq!(summary.balance_idr, Rupiah::from(amount));
}

#[then(expr = "user {int} has {int} ledger entries")]
async fn check_entry_count(world: &mut WalletWorld, user_id: i64, count: i64) {
    let page = world.system().ledger.ledger_page(user_id, LedgerQuery::default()).await.expect("Error fetching ledger");
    assert_eq!(page.total, count);
}

#[then(expr = "the wallet of user {int} is consistent")]
async fn check_integrity(world: &mut WalletWorld, user_id: i64) {
    let report = world.system().ledger.verify_integrity(user_id).await.expect("Error verifying wallet");
    assert!(report.consistent, "Balance {} does not match ledger sum {}", report.balance, report.ledger_sum);
}

#[then(expr = "the adjustment is rejected for insufficient balance with a would-be balance of {int} IDR")]
async fn check_insufficient(world: &mut WalletWorld, would_be_balance: i64) {
    match world.last_entry.as_ref().expect("No adjustment was made") {
        Err(AdjustmentError::InsufficientBalance { would_be, .. }) => assert_eq!(*would_be, Rupiah::from(would_be_balance)),
        other => panic!("Expected an insufficient balance error, got {other:?}"),
    }
}

#[then(expr = "the last ledger entry for user {int} is a {word} of {int} IDR with balance after {int} IDR")]
async fn check_last_entry(world: &mut WalletWorld, user_id: i64, kind: String, amount: i64, balance_after: i64) {
    let page = world.system().ledger.ledger_page(user_id, LedgerQuery::default()).await.expect("Error fetching ledger");
    let entry = page.data.first().expect("The ledger is empty");
    assert_eq!(entry.kind, kind.parse::<LedgerEntryKind>().expect("Not a ledger entry kind"));
    assert_eq!(entry.amount, Rupiah::from(amount));
    assert_eq!(entry.balance_after, Rupiah::from(balance_after));
}

#[then(expr = "the last ledger entry for user {int} has a reference matching {string}")]
async fn check_reference(world: &mut WalletWorld, user_id: i64, pattern: String) {
    let page = world.system().ledger.ledger_page(user_id, LedgerQuery::default()).await.expect("Error fetching ledger");
    let entry = page.data.first().expect("The ledger is empty");
    let re = Regex::new(&pattern).expect("Invalid pattern");
    assert!(re.is_match(entry.reference.value()), "{} does not match {pattern}", entry.reference);
}

#[then(expr = "the webhook outcome is {word}")]
async fn check_webhook_outcome(world: &mut WalletWorld, expected: String) {
    let outcome = world.last_webhook.as_ref().expect("No webhook was sent");
    let name = match outcome {
        Ok(TransitionOutcome::Settled { .. }) => "settled",
        Ok(TransitionOutcome::Closed(_)) => "closed",
        Ok(TransitionOutcome::Duplicate(_)) => "duplicate",
        Ok(TransitionOutcome::StillPending(_)) => "pending",
        Ok(TransitionOutcome::Stale(_)) => "stale",
        Ok(TransitionOutcome::Flagged { .. }) => "flagged",
        Err(SettlementError::SignatureVerificationFailed(_)) => "unauthorised",
        Err(SettlementError::UnknownIntent(_)) => "unknown-intent",
        Err(SettlementError::MalformedPayload(_)) => "malformed",
        Err(e) => panic!("Unexpected webhook error: {e}"),
    };
    assert_eq!(name, expected);
}

#[then(expr = "order {word} has status {word}")]
async fn check_intent_status(world: &mut WalletWorld, order_id: String, status: String) {
    let intent = world
        .system()
        .db
        .fetch_intent(&OrderId::from(order_id))
        .await
        .expect("Error fetching intent")
        .expect("Intent does not exist");
    assert_eq!(intent.status, status.parse::<IntentStatus>().expect("Not an intent status"));
}

#[then(expr = "order {word} is linked to a ledger entry")]
async fn check_intent_link(world: &mut WalletWorld, order_id: String) {
    let intent = world
        .system()
        .db
        .fetch_intent(&OrderId::from(order_id))
        .await
        .expect("Error fetching intent")
        .expect("Intent does not exist");
    assert!(intent.ledger_entry_id.is_some(), "Intent has no ledger entry");
}

#[then(expr = "there is {int} unresolved anomaly of kind {word}")]
async fn check_anomalies(world: &mut WalletWorld, count: usize, kind: String) {
    let kind = match kind.as_str() {
        "CONFLICTING_TERMINAL_STATE" => AnomalyKind::ConflictingTerminalState,
        "UNKNOWN_PROVIDER_STATUS" => AnomalyKind::UnknownProviderStatus,
        "AMOUNT_MISMATCH" => AnomalyKind::AmountMismatch,
        other => panic!("Unknown anomaly kind {other}"),
    };
    let anomalies = world.system().review.anomalies(true).await.expect("Error fetching anomalies");
    assert_eq!(anomalies.iter().filter(|a| a.kind == kind).count(), count);
}

#[then(expr = "there are {int} anomalies in total")]
async fn check_anomaly_total(world: &mut WalletWorld, count: usize) {
    let anomalies = world.system().review.anomalies(false).await.expect("Error fetching anomalies");
    assert_eq!(anomalies.len(), count, "Found anomalies: {anomalies:?}");
}

#[then(expr = "there are no anomalies")]
async fn check_no_anomalies(world: &mut WalletWorld) {
    let anomalies = world.system().review.anomalies(false).await.expect("Error fetching anomalies");
    assert!(anomalies.is_empty(), "Found anomalies: {anomalies:?}");
}

#[then(expr = "the status check reports {word}")]
async fn check_status_result(world: &mut WalletWorld, status: String) {
    let check = world.last_status.as_ref().expect("No status check was made").as_ref().expect("Status check failed");
    assert_eq!(check.status, status.parse::<IntentStatus>().expect("Not an intent status"));
}

#[then("the status check fails because the payment service is unavailable")]
async fn check_status_unavailable(world: &mut WalletWorld) {
    let result = world.last_status.as_ref().expect("No status check was made");
    assert!(matches!(result, Err(SettlementError::GatewayUnavailable(_))), "Unexpected result {result:?}");
}

#[then(expr = "the gateway was asked for {int} statuses")]
async fn check_status_calls(world: &mut WalletWorld, calls: usize) {
    assert_eq!(world.system().gateway.status_calls(), calls);
}

#[then(expr = "the sweep checked {int} intents and settled {int}")]
async fn check_sweep(world: &mut WalletWorld, checked: usize, settled: usize) {
    let summary = world.last_sweep.as_ref().expect("No sweep was run");
    assert_eq!(summary.checked, checked);
    assert_eq!(summary.settled, settled);
}

#[then(expr = "the audit log for user {int} has {int} records by admin {int}")]
async fn check_audit(world: &mut WalletWorld, user_id: i64, count: i64, admin_id: i64) {
    let query = AuditQuery::default().for_user(user_id).by_admin(admin_id);
    let page = world.system().review.audit_records(query).await.expect("Error fetching audit records");
    assert_eq!(page.total, count);
}

#[then("the status check reports nothing for an unknown order")]
async fn check_status_unknown(world: &mut WalletWorld) {
    let result = world.last_status.as_ref().expect("No status check was made");
    assert!(matches!(result, Err(SettlementError::UnknownIntent(_))), "Unexpected result {result:?}");
}
