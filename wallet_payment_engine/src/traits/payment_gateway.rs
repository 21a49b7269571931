use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{IntentStatus, OrderId, PaymentProvider, Rupiah},
    helpers::Retryable,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("The payment provider is unavailable. {0}")]
    Unavailable(String),
    #[error("The request to the payment provider timed out")]
    Timeout,
    #[error("The payment provider rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment provider sent an invalid response. {0}")]
    InvalidResponse(String),
    #[error("Malformed notification payload. {0}")]
    MalformedPayload(String),
    #[error("Payment gateway configuration error. {0}")]
    Configuration(String),
}

impl Retryable for GatewayError {
    fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Unavailable(_) | GatewayError::Timeout => true,
            GatewayError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A provider status translated into the internal vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedStatus {
    Known(IntentStatus),
    /// A status outside the provider's mapping table, carrying the raw value.
    Unknown(String),
}

impl MappedStatus {
    /// Unknown statuses never move money, so they are treated as `PENDING`.
    pub fn effective(&self) -> IntentStatus {
        match self {
            MappedStatus::Known(s) => *s,
            MappedStatus::Unknown(_) => IntentStatus::Pending,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MappedStatus::Unknown(_))
    }
}

/// A provider's view of a payment, from a verified webhook or a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementEvent {
    pub provider: PaymentProvider,
    pub order_id: OrderId,
    pub raw_status: String,
    pub status: MappedStatus,
    /// The amount the provider says was paid, when it reports one.
    pub gross_amount: Option<Rupiah>,
    pub provider_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub amount: Rupiah,
    /// Provider-specific payment method code, e.g. `bca_va`, `gopay` or `QRIS`.
    pub method: String,
    pub customer: CustomerDetails,
}

/// What the customer needs in order to pay a newly created charge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderChargeResult {
    pub provider_reference: String,
    pub payment_url: Option<String>,
    /// Virtual account number, QR string or similar.
    pub pay_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A uniform interface over payment providers.
///
/// The webhook pipeline and the reconciliation service are written once against this trait. Signature checks and
/// status mapping are pure functions of the payload and the configured keys; only charge creation and status
/// queries talk to the network.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    fn provider(&self) -> PaymentProvider;

    /// The HTTP header that carries the callback signature, or `None` if the signature travels in the body.
    fn signature_header(&self) -> Option<&'static str>;

    /// Checks the callback signature against the raw payload. Must be called before anything is read from it.
    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool;

    /// Parses a verified callback payload.
    fn parse_webhook(&self, payload: &[u8]) -> Result<SettlementEvent, GatewayError>;

    /// Translates a raw provider status using the provider's fixed mapping table.
    fn map_provider_status(&self, raw: &str) -> MappedStatus;

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProviderChargeResult, GatewayError>;

    async fn get_status(
        &self,
        order_id: &OrderId,
        provider_reference: Option<&str>,
    ) -> Result<SettlementEvent, GatewayError>;
}
