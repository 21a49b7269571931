//! Tripay payment channel client.
//!
//! Callbacks are signed with the hex HMAC-SHA256 of the raw body under the merchant private key, sent in the
//! `X-Callback-Signature` header. Closed-payment transactions are created with the HMAC of
//! `merchant_code + merchant_ref + amount`.
use chrono::{DateTime, Utc};
use log::*;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wallet_payment_engine::{
    db_types::{IntentStatus, OrderId, PaymentProvider, Rupiah},
    traits::{ChargeRequest, GatewayError, MappedStatus, PaymentGateway, ProviderChargeResult, SettlementEvent},
};

use crate::{
    config::TripayConfig,
    error::GatewayInitError,
    http::RestClient,
    signatures::{hmac_sha256_hex, verify_hmac_sha256_hex},
    GatewayConfig,
};

pub const TRIPAY_SIGNATURE_HEADER: &str = "X-Callback-Signature";

/// The body of a Tripay payment callback, and the `data` of a transaction detail response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripayCallback {
    pub reference: String,
    pub merchant_ref: String,
    pub status: String,
    #[serde(default)]
    pub payment_method_code: Option<String>,
    #[serde(default)]
    pub total_amount: Option<i64>,
    #[serde(default)]
    pub fee_customer: Option<i64>,
    #[serde(default)]
    pub paid_at: Option<i64>,
}

impl TripayCallback {
    /// The amount the merchant asked for, without the fee the customer paid on top.
    pub fn merchant_amount(&self) -> Option<Rupiah> {
        self.total_amount.map(|total| Rupiah::from(total - self.fee_customer.unwrap_or(0)))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TripayResponse<T> {
    success: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct TransactionData {
    reference: String,
    #[serde(default)]
    checkout_url: Option<String>,
    #[serde(default)]
    pay_code: Option<String>,
    #[serde(default)]
    qr_string: Option<String>,
    #[serde(default)]
    expired_time: Option<i64>,
}

#[derive(Clone)]
pub struct TripayGateway {
    config: TripayConfig,
    client: RestClient,
}

impl std::fmt::Debug for TripayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TripayGateway ({}, {})", self.config.base_url, self.config.merchant_code)
    }
}

impl TripayGateway {
    pub fn new(config: TripayConfig, gateway_config: &GatewayConfig) -> Result<Self, GatewayInitError> {
        let client = RestClient::new(
            "tripay",
            &config.base_url,
            &format!("Bearer {}", config.api_key.reveal()),
            gateway_config.request_timeout,
            gateway_config.connect_timeout,
        )?;
        Ok(Self { config, client })
    }

    /// The callback signature for `payload`.
    pub fn sign_payload(&self, payload: &[u8]) -> Option<String> {
        hmac_sha256_hex(self.config.private_key.reveal().as_bytes(), payload)
    }

    fn transaction_signature(&self, merchant_ref: &str, amount: Rupiah) -> Result<String, GatewayError> {
        let message = format!("{}{merchant_ref}{}", self.config.merchant_code, amount.value());
        hmac_sha256_hex(self.config.private_key.reveal().as_bytes(), message.as_bytes())
            .ok_or_else(|| GatewayError::Configuration("The Tripay private key cannot be used for HMAC".to_string()))
    }

    fn to_event(&self, cb: TripayCallback) -> Result<SettlementEvent, GatewayError> {
        if cb.merchant_ref.trim().is_empty() {
            return Err(GatewayError::MalformedPayload("merchant_ref is missing".to_string()));
        }
        let status = self.map_provider_status(&cb.status);
        let gross_amount = cb.merchant_amount();
        Ok(SettlementEvent {
            provider: PaymentProvider::Tripay,
            order_id: OrderId::from(cb.merchant_ref),
            raw_status: cb.status,
            status,
            gross_amount,
            provider_reference: Some(cb.reference).filter(|r| !r.is_empty()),
        })
    }
}

fn unwrap_response<T>(response: TripayResponse<T>) -> Result<T, GatewayError> {
    if !response.success {
        return Err(GatewayError::Rejected { status: 400, message: response.message });
    }
    response.data.ok_or_else(|| GatewayError::InvalidResponse("The Tripay response has no data".to_string()))
}

impl PaymentGateway for TripayGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Tripay
    }

    fn signature_header(&self) -> Option<&'static str> {
        Some(TRIPAY_SIGNATURE_HEADER)
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        match signature {
            Some(sig) => verify_hmac_sha256_hex(self.config.private_key.reveal().as_bytes(), payload, sig),
            None => false,
        }
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<SettlementEvent, GatewayError> {
        let cb = serde_json::from_slice::<TripayCallback>(payload)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        self.to_event(cb)
    }

    fn map_provider_status(&self, raw: &str) -> MappedStatus {
        match raw {
            "PAID" => MappedStatus::Known(IntentStatus::Settlement),
            "UNPAID" => MappedStatus::Known(IntentStatus::Pending),
            "FAILED" => MappedStatus::Known(IntentStatus::Fail),
            "EXPIRED" => MappedStatus::Known(IntentStatus::Expire),
            "CANCELED" | "CANCELLED" => MappedStatus::Known(IntentStatus::Cancel),
            other => MappedStatus::Unknown(other.to_string()),
        }
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProviderChargeResult, GatewayError> {
        let merchant_ref = request.order_id.as_str();
        let body = json!({
            "method": request.method,
            "merchant_ref": merchant_ref,
            "amount": request.amount.value(),
            "customer_name": request.customer.name,
            "customer_email": request.customer.email,
            "customer_phone": request.customer.phone,
            "order_items": [{
                "name": "Wallet top-up",
                "price": request.amount.value(),
                "quantity": 1,
            }],
            "signature": self.transaction_signature(merchant_ref, request.amount)?,
        });
        debug!("🪝️ Creating Tripay transaction for {merchant_ref} ({})", request.method);
        let response: TripayResponse<TransactionData> =
            self.client.rest_query(Method::POST, "/transaction/create", &[], Some(&body)).await?;
        let data = unwrap_response(response)?;
        let expires_at = data.expired_time.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0));
        Ok(ProviderChargeResult {
            provider_reference: data.reference,
            payment_url: data.checkout_url,
            pay_code: data.pay_code.or(data.qr_string),
            expires_at,
        })
    }

    async fn get_status(
        &self,
        order_id: &OrderId,
        provider_reference: Option<&str>,
    ) -> Result<SettlementEvent, GatewayError> {
        let reference = provider_reference.ok_or_else(|| GatewayError::Rejected {
            status: 400,
            message: format!("Order {order_id} has no Tripay reference to look up"),
        })?;
        let response: TripayResponse<TripayCallback> = self
            .client
            .rest_query::<_, ()>(Method::GET, "/transaction/detail", &[("reference", reference)], None)
            .await?;
        let detail = unwrap_response(response)?;
        if detail.merchant_ref != order_id.as_str() {
            return Err(GatewayError::InvalidResponse(format!(
                "Tripay reference {reference} belongs to {}, not {order_id}",
                detail.merchant_ref
            )));
        }
        trace!("🔁️ Tripay reports {} for {order_id}", detail.status);
        self.to_event(detail)
    }
}
