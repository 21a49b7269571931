use thiserror::Error;

use crate::{
    db_types::{AuditContext, EntryValidationError, LedgerEntry, LedgerQuery, NewLedgerEntry, Page, Rupiah, Wallet},
    helpers::{is_storage_contention, Retryable},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid ledger entry. {0}")]
    Validation(#[from] EntryValidationError),
    #[error(
        "Insufficient balance for user {user_id}. The balance is {balance} and {attempted} would leave {would_be}."
    )]
    InsufficientBalance { user_id: i64, balance: Rupiah, attempted: Rupiah, would_be: Rupiah },
    #[error("The wallet for user {0} was modified by a concurrent transaction")]
    VersionConflict(i64),
    #[error("The database is busy with a concurrent transaction")]
    StorageBusy,
    #[error("The ledger transaction could not be committed after {attempts} attempts. Please try again.")]
    TransactionConflict { attempts: u32 },
    #[error("Applying {amount} to the wallet for user {user_id} overflows the balance")]
    BalanceOverflow { user_id: i64, amount: Rupiah },
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if is_storage_contention(&e) {
            LedgerError::StorageBusy
        } else {
            LedgerError::DatabaseError(e.to_string())
        }
    }
}

impl Retryable for LedgerError {
    fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::VersionConflict(_) | LedgerError::StorageBusy)
    }

    fn exhausted(self, attempts: u32) -> Self {
        LedgerError::TransactionConflict { attempts }
    }
}

/// The `LedgerManagement` trait is the single path through which wallet balances change.
///
/// Every balance mutation is an append to the ledger. The backend applies the entry, the cached wallet balance and
/// the paired audit record in one atomic transaction, and guarantees that the balance never becomes negative.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    /// Appends `entry` to the user's ledger and updates the wallet balance accordingly.
    ///
    /// * The wallet is created with a zero balance if this is the user's first balance-affecting action.
    /// * If the entry would leave a negative balance, [`LedgerError::InsufficientBalance`] is returned and nothing is
    ///   written.
    /// * Concurrent writers to the same wallet are serialised with an optimistic version check. Losers are retried
    ///   with backoff; [`LedgerError::TransactionConflict`] is returned if the retries are exhausted.
    async fn apply_ledger_entry(&self, entry: NewLedgerEntry, audit: AuditContext) -> Result<LedgerEntry, LedgerError>;

    /// Fetches the wallet for the user. Wallets are never created by reads, so `None` means the user has never had a
    /// balance-affecting action.
    async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError>;

    /// Fetches a page of the user's ledger, newest first.
    async fn fetch_ledger_page(&self, user_id: i64, query: LedgerQuery) -> Result<Page<LedgerEntry>, LedgerError>;

    /// The signed sum of every ledger entry for the user.
    async fn ledger_sum(&self, user_id: i64) -> Result<Rupiah, LedgerError>;
}
