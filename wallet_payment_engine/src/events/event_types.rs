use serde::{Deserialize, Serialize};

use crate::db_types::{Anomaly, LedgerEntry, PaymentIntent};

/// Emitted after a ledger entry has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntryCreatedEvent {
    pub entry: LedgerEntry,
    /// Set when the entry was written by a gateway settlement.
    pub intent: Option<PaymentIntent>,
}

impl LedgerEntryCreatedEvent {
    pub fn new(entry: LedgerEntry) -> Self {
        Self { entry, intent: None }
    }

    pub fn for_settlement(entry: LedgerEntry, intent: PaymentIntent) -> Self {
        Self { entry, intent: Some(intent) }
    }
}

/// Emitted after a provider notification was flagged for manual review instead of being applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyDetectedEvent {
    pub anomaly: Anomaly,
}

impl AnomalyDetectedEvent {
    pub fn new(anomaly: Anomaly) -> Self {
        Self { anomaly }
    }
}
