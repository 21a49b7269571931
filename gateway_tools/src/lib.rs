//! Payment provider clients for the wallet payment engine.
//!
//! Each provider implements the engine's [`PaymentGateway`](wallet_payment_engine::PaymentGateway) trait.
//! [`AnyGateway`] wraps the concrete clients in one type so that a single `SettlementApi` can route intents to
//! whichever provider they were created with.
mod any_gateway;
mod config;
mod error;
mod http;
mod midtrans;
mod signatures;
mod tripay;

pub use any_gateway::{build_gateways, AnyGateway};
pub use config::{GatewayConfig, MidtransConfig, TripayConfig};
pub use error::GatewayInitError;
pub use midtrans::{MidtransGateway, MidtransNotification};
pub use tripay::{TripayCallback, TripayGateway};
