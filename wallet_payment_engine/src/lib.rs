//! Wallet Payment Engine
//!
//! The wallet payment engine keeps a prepaid Rupiah wallet per user and reconciles top-ups made through external
//! payment gateways. This library contains the core logic. It is provider-agnostic: concrete gateways live in the
//! `gateway_tools` crate and implement the [`PaymentGateway`] trait.
//!
//! The library is divided into three main sections:
//! 1. The backend contracts ([`traits`]) and the SQLite implementation ([`SqliteDatabase`]). You should never need to
//!    access the database directly. Instead, use the public API provided by the engine. The exception is the data
//!    types used in the database. These are defined in the [`db_types`] module and are public.
//! 2. The payment engine public API ([`LedgerApi`], [`AdjustmentApi`], [`SettlementApi`] and [`ReviewApi`]). Every
//!    wallet balance change goes through one of these and lands in the append-only ledger together with an audit
//!    record.
//! 3. Events ([`events`]). The engine publishes an event for every committed ledger entry and every anomaly it
//!    records, so that callers can hook in notifications or alerting.
pub mod db_types;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;
mod wpe_api;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    AuditLog,
    AuditLogError,
    GatewayError,
    LedgerError,
    LedgerManagement,
    PaymentGateway,
    PaymentIntentError,
    PaymentIntentManagement,
};
pub use wpe_api::{
    adjustment_api::{AdjustmentApi, AdminActor},
    errors::{AdjustmentError, SettlementError},
    ledger_api::{LedgerApi, CHECKOUT_SOURCE},
    ledger_objects,
    review_api::ReviewApi,
    settlement_api::SettlementApi,
    settlement_objects,
};
