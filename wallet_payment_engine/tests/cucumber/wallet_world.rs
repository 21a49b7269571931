use cucumber::World;
use log::*;
use wallet_payment_engine::{
    db_types::{LedgerEntry, PaymentProvider},
    settlement_objects::{StatusCheck, SweepSummary, TransitionOutcome},
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    AdjustmentApi,
    AdjustmentError,
    LedgerApi,
    ReviewApi,
    SettlementApi,
    SettlementError,
    SqliteDatabase,
};

use crate::common::ScriptedGateway;

#[derive(Default, Debug, World)]
pub struct WalletWorld {
    pub system: Option<WalletSystem>,
    pub last_entry: Option<Result<LedgerEntry, AdjustmentError>>,
    pub last_webhook: Option<Result<TransitionOutcome, SettlementError>>,
    pub last_status: Option<Result<StatusCheck, SettlementError>>,
    pub last_sweep: Option<SweepSummary>,
}

#[derive(Debug)]
pub struct WalletSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: ScriptedGateway,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub adjustments: AdjustmentApi<SqliteDatabase>,
    pub settlement: SettlementApi<SqliteDatabase, ScriptedGateway>,
    pub review: ReviewApi<SqliteDatabase>,
}

impl WalletWorld {
    pub fn system(&self) -> &WalletSystem {
        self.system.as_ref().expect("Wallet system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut WalletSystem {
        self.system.as_mut().expect("Wallet system not initialised")
    }
}

impl WalletSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let gateway = ScriptedGateway::new(PaymentProvider::Midtrans);
        let producers = Default::default();
        let ledger = LedgerApi::new(db.clone(), Default::default());
        let adjustments = AdjustmentApi::new(db.clone(), Default::default());
        let settlement = SettlementApi::new(db.clone(), producers).with_gateway(gateway.clone());
        let review = ReviewApi::new(db.clone());
        Self { db_path: url, db, gateway, ledger, adjustments, settlement, review }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
