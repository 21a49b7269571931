use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Anomaly, IntentStatus, LedgerEntry, NewAnomaly, NewPaymentIntent, OrderId, PaymentIntent},
    helpers::{is_storage_contention, Retryable},
    traits::LedgerError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentIntentError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A payment intent for order {0} already exists")]
    DuplicateOrderId(OrderId),
    #[error("No payment intent exists for order {0}")]
    IntentNotFound(OrderId),
    #[error("{0} is not a status that an intent can be closed with")]
    InvalidClosingStatus(IntentStatus),
    #[error("Anomaly #{0} does not exist")]
    AnomalyNotFound(i64),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

impl From<sqlx::Error> for PaymentIntentError {
    fn from(e: sqlx::Error) -> Self {
        if is_storage_contention(&e) {
            PaymentIntentError::Ledger(LedgerError::StorageBusy)
        } else {
            PaymentIntentError::DatabaseError(e.to_string())
        }
    }
}

impl Retryable for PaymentIntentError {
    fn is_retryable(&self) -> bool {
        matches!(self, PaymentIntentError::Ledger(e) if e.is_retryable())
    }

    fn exhausted(self, attempts: u32) -> Self {
        match self {
            PaymentIntentError::Ledger(e) => PaymentIntentError::Ledger(e.exhausted(attempts)),
            other => other,
        }
    }
}

/// The outcome of trying to move an intent from `PENDING` to `SETTLEMENT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResult {
    /// This call won the transition and wrote the TOPUP entry.
    Settled { intent: PaymentIntent, entry: LedgerEntry },
    /// The intent had already left `PENDING`. Nothing was written.
    AlreadyTerminal(PaymentIntent),
}

/// The outcome of trying to move an intent from `PENDING` to `FAIL`, `CANCEL` or `EXPIRE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseResult {
    Closed(PaymentIntent),
    AlreadyTerminal(PaymentIntent),
}

/// The outcome of recording an anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalyRecord {
    /// A new anomaly row was written.
    Recorded(Anomaly),
    /// An unresolved anomaly for the same order, kind and reported status already exists. Nothing was written.
    AlreadyOpen(Anomaly),
}

impl AnomalyRecord {
    pub fn anomaly(&self) -> &Anomaly {
        match self {
            AnomalyRecord::Recorded(a) | AnomalyRecord::AlreadyOpen(a) => a,
        }
    }
}

/// Storage for payment intents and the anomalies raised while reconciling them.
///
/// Every status change is a guarded update that only matches `PENDING` rows, so two deliveries of the same
/// notification (a webhook and a status poll, say) can never both apply.
#[allow(async_fn_in_trait)]
pub trait PaymentIntentManagement {
    /// Stores a new intent in the `PENDING` state. Order ids are unique.
    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, PaymentIntentError>;

    async fn fetch_intent(&self, order_id: &OrderId) -> Result<Option<PaymentIntent>, PaymentIntentError>;

    /// Records the provider's identifier for the charge (transaction id, Tripay reference, ...).
    async fn attach_provider_reference(
        &self,
        order_id: &OrderId,
        reference: &str,
    ) -> Result<PaymentIntent, PaymentIntentError>;

    /// In one transaction, moves the intent to `SETTLEMENT`, writes the TOPUP ledger entry for the gross amount and
    /// links the entry to the intent. `source` names the caller in the audit record (e.g. `webhook:midtrans`).
    async fn settle_intent(&self, order_id: &OrderId, source: &str) -> Result<SettleResult, PaymentIntentError>;

    /// Moves the intent to one of the non-settling terminal states. No ledger entry is written.
    async fn close_intent(&self, order_id: &OrderId, status: IntentStatus) -> Result<CloseResult, PaymentIntentError>;

    /// Intents still `PENDING` that were created before `created_before`, oldest first.
    async fn fetch_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentIntent>, PaymentIntentError>;

    /// Records a finding. While an unresolved anomaly for the same order, kind and reported status exists, repeat
    /// reports return it as [`AnomalyRecord::AlreadyOpen`] instead of adding another row.
    async fn record_anomaly(&self, anomaly: NewAnomaly) -> Result<AnomalyRecord, PaymentIntentError>;

    /// Fetches anomalies, newest first.
    async fn fetch_anomalies(&self, unresolved_only: bool) -> Result<Vec<Anomaly>, PaymentIntentError>;

    /// Marks the anomaly as reviewed by `admin_id`. Resolving an already-resolved anomaly returns it unchanged.
    async fn resolve_anomaly(&self, id: i64, admin_id: i64) -> Result<Anomaly, PaymentIntentError>;
}
