//! # Wallet payment server
//! This crate hosts the HTTP server for the wallet ledger and payment gateway reconciliation engine. It is
//! responsible for:
//! * Serving wallet balances and ledger history to authenticated users.
//! * Starting gateway top-ups and receiving the providers' payment callbacks.
//! * Debiting wallets for checkout orders.
//! * Admin balance adjustments, refunds and the audit and anomaly views.
//! * Periodically reconciling top-ups whose callbacks never arrived.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/{provider}`: Payment callbacks from Midtrans and Tripay.
//! * `/api/...`: Wallet, top-up, purchase and admin routes. These require the identity headers set by the
//!   authentication proxy.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
