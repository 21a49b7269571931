use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Anomaly, IntentStatus, LedgerEntry, PaymentIntent},
    traits::ProviderChargeResult,
};

/// A freshly created gateway top-up and the details the customer needs to pay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpResult {
    pub intent: PaymentIntent,
    pub charge: ProviderChargeResult,
}

/// What happened when a provider status was applied to an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The intent moved to `SETTLEMENT` and the wallet was credited.
    Settled { intent: PaymentIntent, entry: LedgerEntry },
    /// The intent moved to `FAIL`, `CANCEL` or `EXPIRE`.
    Closed(PaymentIntent),
    /// The provider repeated the status the intent already has.
    Duplicate(PaymentIntent),
    /// The provider still reports the payment as pending.
    StillPending(PaymentIntent),
    /// A pending report arrived after the intent had already reached a terminal state.
    Stale(PaymentIntent),
    /// The report was recorded as an anomaly instead of being applied.
    Flagged { intent: PaymentIntent, anomaly: Anomaly },
}

impl TransitionOutcome {
    pub fn intent(&self) -> &PaymentIntent {
        match self {
            TransitionOutcome::Settled { intent, .. } => intent,
            TransitionOutcome::Closed(intent) => intent,
            TransitionOutcome::Duplicate(intent) => intent,
            TransitionOutcome::StillPending(intent) => intent,
            TransitionOutcome::Stale(intent) => intent,
            TransitionOutcome::Flagged { intent, .. } => intent,
        }
    }

    /// A short description for logs and webhook acknowledgements.
    pub fn describe(&self) -> String {
        let order_id = &self.intent().order_id;
        match self {
            TransitionOutcome::Settled { entry, .. } => {
                format!("Order {order_id} settled. Ledger entry #{} created", entry.id)
            },
            TransitionOutcome::Closed(intent) => format!("Order {order_id} closed as {}", intent.status),
            TransitionOutcome::Duplicate(intent) => {
                format!("Order {order_id} is already {}. Nothing to do", intent.status)
            },
            TransitionOutcome::StillPending(_) => format!("Order {order_id} is still pending"),
            TransitionOutcome::Stale(intent) => {
                format!("Ignored a pending report for order {order_id}, which is already {}", intent.status)
            },
            TransitionOutcome::Flagged { anomaly, .. } => {
                format!("Order {order_id} flagged for review ({}, anomaly #{})", anomaly.kind, anomaly.id)
            },
        }
    }
}

/// The answer to a "check my payment" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub status: IntentStatus,
    pub message: String,
}

impl StatusCheck {
    pub fn for_status(status: IntentStatus) -> Self {
        let message = match status {
            IntentStatus::Pending => "Payment is still being processed",
            IntentStatus::Settlement => "Payment received. Your wallet has been credited",
            IntentStatus::Fail => "Payment failed",
            IntentStatus::Cancel => "Payment was cancelled",
            IntentStatus::Expire => "Payment expired",
        };
        Self { status, message: message.to_string() }
    }
}

/// Tallies for one pass of the pending-intent sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub checked: usize,
    pub settled: usize,
    pub closed: usize,
    pub still_pending: usize,
    pub flagged: usize,
    pub errors: usize,
}

impl SweepSummary {
    pub fn record(&mut self, outcome: &TransitionOutcome) {
        self.checked += 1;
        match outcome {
            TransitionOutcome::Settled { .. } => self.settled += 1,
            TransitionOutcome::Closed(_) => self.closed += 1,
            TransitionOutcome::StillPending(_) => self.still_pending += 1,
            TransitionOutcome::Flagged { .. } => self.flagged += 1,
            TransitionOutcome::Duplicate(_) | TransitionOutcome::Stale(_) => {},
        }
    }

    pub fn record_error(&mut self) {
        self.checked += 1;
        self.errors += 1;
    }
}
