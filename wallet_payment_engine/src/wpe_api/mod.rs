//! # Wallet payment engine public API
//!
//! The `wpe_api` module exposes the programmatic API for the wallet ledger and the gateway reconciliation flows.
//! The API is modular, so that clients can pick the functionality they need and back each piece with whatever
//! storage implements the required traits.
//!
//! * [`ledger_api`] reads wallets and ledger history, records purchase debits and refunds, and checks the balance
//!   invariant.
//! * [`adjustment_api`] performs audited admin top-ups and balance adjustments.
//! * [`settlement_api`] creates gateway top-ups and turns provider notifications (webhooks and status polls) into
//!   at most one ledger credit per payment intent.
//! * [`review_api`] exposes the audit trail and the anomaly log for admins.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the traits the API needs.
//!
//! ```rust,ignore
//! use wallet_payment_engine::{LedgerApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url("sqlite://data/wallet_store.db", 25).await?;
//! // SqliteDatabase implements LedgerManagement
//! let api = LedgerApi::new(db, EventProducers::default());
//! let summary = api.wallet_summary(42).await?;
//! ```
pub mod adjustment_api;
pub mod errors;
pub mod ledger_api;
pub mod ledger_objects;
pub mod review_api;
pub mod settlement_api;
pub mod settlement_objects;
