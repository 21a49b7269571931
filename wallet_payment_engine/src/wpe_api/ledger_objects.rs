use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Rupiah, Wallet};

/// What a user sees of their own wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    #[serde(rename = "balanceIDR")]
    pub balance_idr: Rupiah,
    #[serde(rename = "lastUpdatedAt")]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl WalletSummary {
    pub fn empty() -> Self {
        Self { balance_idr: Rupiah::from(0), last_updated_at: None }
    }
}

impl From<Wallet> for WalletSummary {
    fn from(wallet: Wallet) -> Self {
        Self { balance_idr: wallet.balance, last_updated_at: Some(wallet.updated_at) }
    }
}

/// The cached balance compared with the sum of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub user_id: i64,
    pub balance: Rupiah,
    pub ledger_sum: Rupiah,
    pub consistent: bool,
}

/// The admin view of a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOverview {
    pub wallet: Option<Wallet>,
    pub integrity: IntegrityReport,
}
