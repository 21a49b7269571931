use chrono::NaiveDate;
use cucumber::given;
use wallet_payment_engine::{
    db_types::{NewPaymentIntent, OrderId, PaymentProvider, Rupiah},
    AdjustmentApi,
    AdminActor,
    PaymentIntentManagement,
};

use crate::cucumber::{wallet_world::WalletSystem, WalletWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut WalletWorld) {
    let system = WalletSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "user {int} has a balance of {int} IDR")]
async fn seed_balance(world: &mut WalletWorld, user_id: i64, amount: i64) {
    let admin = AdminActor::new(1, None);
    world
        .system()
        .adjustments
        .manual_top_up(&admin, user_id, Rupiah::from(amount), "Opening balance", None)
        .await
        .expect("Error seeding balance");
}

#[given(expr = "a pending top-up {word} of {int} IDR for user {int}")]
async fn pending_intent(world: &mut WalletWorld, order_id: String, amount: i64, user_id: i64) {
    let intent =
        NewPaymentIntent::new(OrderId::from(order_id), user_id, Rupiah::from(amount), PaymentProvider::Midtrans, "bca_va");
    world.system().db.insert_intent(intent).await.expect("Error inserting intent");
}

#[given(expr = "the gateway reports {word} for order {word}")]
async fn gateway_reports(world: &mut WalletWorld, status: String, order_id: String) {
    world.system().gateway.report(&order_id, &status);
}

#[given("the gateway is unavailable")]
async fn gateway_down(world: &mut WalletWorld) {
    world.system().gateway.set_unavailable(true);
}

#[given(expr = "the admin clock reads {word}")]
async fn admin_clock(world: &mut WalletWorld, date: String) {
    let now = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .expect("Not a valid date")
        .and_hms_opt(9, 30, 0)
        .expect("Not a valid time")
        .and_utc();
    let system = world.system_mut();
    system.adjustments = AdjustmentApi::new(system.db.clone(), Default::default()).with_clock(move || now);
}
