use thiserror::Error;

use crate::{
    db_types::{EntryValidationError, OrderId, PaymentProvider, Rupiah},
    helpers::ReferenceError,
    traits::{LedgerError, PaymentIntentError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjustmentError {
    #[error("A reason is required for every admin balance change")]
    MissingReason,
    #[error("Top-up amounts must be positive, but {0} was given")]
    NonPositiveAmount(Rupiah),
    #[error("Adjustment amounts cannot be zero")]
    ZeroAmount,
    #[error("{0}")]
    InvalidReference(#[from] ReferenceError),
    #[error("Insufficient balance for user {user_id}. The balance is {balance} and {attempted} would leave {would_be}.")]
    InsufficientBalance { user_id: i64, balance: Rupiah, attempted: Rupiah, would_be: Rupiah },
    #[error("{0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for AdjustmentError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance { user_id, balance, attempted, would_be } => {
                AdjustmentError::InsufficientBalance { user_id, balance, attempted, would_be }
            },
            e => AdjustmentError::Ledger(e),
        }
    }
}

impl From<EntryValidationError> for AdjustmentError {
    fn from(e: EntryValidationError) -> Self {
        AdjustmentError::Ledger(LedgerError::Validation(e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("No payment gateway is configured for {0}")]
    UnsupportedProvider(PaymentProvider),
    #[error("The {0} notification signature could not be verified")]
    SignatureVerificationFailed(PaymentProvider),
    #[error("Malformed notification payload. {0}")]
    MalformedPayload(String),
    #[error("No payment intent matches order {0}")]
    UnknownIntent(OrderId),
    #[error("Invalid top-up request. {0}")]
    InvalidRequest(String),
    #[error("Payment service unavailable, please try again. {0}")]
    GatewayUnavailable(String),
    #[error("{0}")]
    Intent(#[from] PaymentIntentError),
}

impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        SettlementError::Intent(PaymentIntentError::Ledger(e))
    }
}
