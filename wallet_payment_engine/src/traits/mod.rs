//! # Backend and gateway contracts
//!
//! This module defines the behaviour that storage backends and payment providers need to expose in order to be
//! driven by the wallet payment engine APIs.
//!
//! * [`LedgerManagement`] is the single path through which wallet balances change. It appends ledger entries, keeps
//!   the cached wallet balance in step and writes the paired audit record.
//! * [`PaymentIntentManagement`] stores payment intents, performs their guarded status transitions (including
//!   settlement, which credits the wallet in the same transaction) and keeps the anomaly log.
//! * [`AuditLog`] provides read access to the audit trail.
//! * [`PaymentGateway`] is the adapter interface over payment providers.
mod audit_log;
mod ledger_management;
mod payment_gateway;
mod payment_intent_management;

pub use audit_log::{AuditLog, AuditLogError};
pub use ledger_management::{LedgerError, LedgerManagement};
pub use payment_gateway::{
    ChargeRequest,
    CustomerDetails,
    GatewayError,
    MappedStatus,
    PaymentGateway,
    ProviderChargeResult,
    SettlementEvent,
};
pub use payment_intent_management::{
    AnomalyRecord,
    CloseResult,
    PaymentIntentError,
    PaymentIntentManagement,
    SettleResult,
};
