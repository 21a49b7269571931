//! Midtrans Core API client.
//!
//! Notifications carry their signature in the body: `signature_key` is the hex SHA-512 of
//! `order_id + status_code + gross_amount + server_key`.
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use log::*;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wallet_payment_engine::{
    db_types::{IntentStatus, OrderId, PaymentProvider, Rupiah},
    traits::{ChargeRequest, GatewayError, MappedStatus, PaymentGateway, ProviderChargeResult, SettlementEvent},
};

use crate::{
    config::MidtransConfig,
    error::GatewayInitError,
    http::RestClient,
    signatures::{hex_digest_eq, sha512_hex},
    GatewayConfig,
};

/// Midtrans reports times in Western Indonesia Time.
const WIB_OFFSET_SECS: i32 = 7 * 3600;
const BANK_TRANSFER_METHODS: [&str; 4] = ["bca_va", "bni_va", "bri_va", "cimb_va"];

/// The fields of a Midtrans HTTP notification (and of a status response, which has the same shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MidtransNotification {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub gross_amount: String,
    #[serde(default)]
    pub signature_key: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct VaNumber {
    va_number: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Action {
    name: String,
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChargeResponse {
    status_code: String,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    va_numbers: Vec<VaNumber>,
    #[serde(default)]
    permata_va_number: Option<String>,
    #[serde(default)]
    qr_string: Option<String>,
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    expiry_time: Option<String>,
}

#[derive(Clone)]
pub struct MidtransGateway {
    config: MidtransConfig,
    client: RestClient,
}

impl std::fmt::Debug for MidtransGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MidtransGateway ({})", self.config.base_url)
    }
}

impl MidtransGateway {
    pub fn new(config: MidtransConfig, gateway_config: &GatewayConfig) -> Result<Self, GatewayInitError> {
        let credentials = base64::encode(format!("{}:", config.server_key.reveal()));
        let client = RestClient::new(
            "midtrans",
            &config.base_url,
            &format!("Basic {credentials}"),
            gateway_config.request_timeout,
            gateway_config.connect_timeout,
        )?;
        Ok(Self { config, client })
    }

    /// The signature Midtrans attaches to a notification with these fields.
    pub fn expected_signature(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        sha512_hex(&[order_id, status_code, gross_amount, self.config.server_key.reveal()])
    }

    /// `capture` is only a settlement once fraud screening has accepted it.
    pub fn map_with_fraud_status(&self, raw: &str, fraud_status: Option<&str>) -> MappedStatus {
        match (raw, fraud_status) {
            ("capture", None | Some("accept")) => MappedStatus::Known(IntentStatus::Settlement),
            ("capture", Some("challenge")) => MappedStatus::Known(IntentStatus::Pending),
            ("capture", Some(other)) => MappedStatus::Unknown(format!("capture/{other}")),
            (raw, _) => self.map_provider_status(raw),
        }
    }

    fn to_event(&self, n: MidtransNotification) -> Result<SettlementEvent, GatewayError> {
        if n.order_id.trim().is_empty() {
            return Err(GatewayError::MalformedPayload("order_id is missing".to_string()));
        }
        let gross_amount = if n.gross_amount.is_empty() {
            None
        } else {
            let amount = Rupiah::try_from(n.gross_amount.as_str())
                .map_err(|e| GatewayError::MalformedPayload(format!("gross_amount: {e}")))?;
            Some(amount)
        };
        let status = self.map_with_fraud_status(&n.transaction_status, n.fraud_status.as_deref());
        Ok(SettlementEvent {
            provider: PaymentProvider::Midtrans,
            order_id: OrderId::from(n.order_id),
            raw_status: n.transaction_status,
            status,
            gross_amount,
            provider_reference: n.transaction_id,
        })
    }

    fn charge_body(request: &ChargeRequest) -> Value {
        let method = request.method.to_ascii_lowercase();
        let mut body = json!({
            "transaction_details": {
                "order_id": request.order_id.as_str(),
                "gross_amount": request.amount.value(),
            },
            "customer_details": {
                "first_name": request.customer.name,
                "email": request.customer.email,
                "phone": request.customer.phone,
            },
        });
        if method == "permata_va" || BANK_TRANSFER_METHODS.contains(&method.as_str()) {
            body["payment_type"] = json!("bank_transfer");
            body["bank_transfer"] = json!({ "bank": method.trim_end_matches("_va") });
        } else {
            body["payment_type"] = json!(method);
        }
        body
    }
}

fn parse_expiry(expiry: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(expiry, "%Y-%m-%d %H:%M:%S").ok()?;
    let wib = FixedOffset::east_opt(WIB_OFFSET_SECS)?;
    wib.from_local_datetime(&naive).single().map(|t| t.with_timezone(&Utc))
}

fn body_status_code(code: &str) -> u16 {
    code.parse().unwrap_or(502)
}

impl PaymentGateway for MidtransGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Midtrans
    }

    fn signature_header(&self) -> Option<&'static str> {
        None
    }

    fn verify_webhook_signature(&self, payload: &[u8], _signature: Option<&str>) -> bool {
        let Ok(n) = serde_json::from_slice::<MidtransNotification>(payload) else {
            debug!("🪝️ Midtrans notification is not valid JSON. Cannot verify it");
            return false;
        };
        let Some(signature) = n.signature_key.as_deref() else {
            return false;
        };
        let expected = self.expected_signature(&n.order_id, &n.status_code, &n.gross_amount);
        hex_digest_eq(&expected, signature)
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<SettlementEvent, GatewayError> {
        let n = serde_json::from_slice::<MidtransNotification>(payload)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        self.to_event(n)
    }

    fn map_provider_status(&self, raw: &str) -> MappedStatus {
        match raw {
            "settlement" | "capture" => MappedStatus::Known(IntentStatus::Settlement),
            "pending" => MappedStatus::Known(IntentStatus::Pending),
            "deny" | "failure" => MappedStatus::Known(IntentStatus::Fail),
            "cancel" => MappedStatus::Known(IntentStatus::Cancel),
            "expire" => MappedStatus::Known(IntentStatus::Expire),
            other => MappedStatus::Unknown(other.to_string()),
        }
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProviderChargeResult, GatewayError> {
        let body = Self::charge_body(request);
        debug!("🪝️ Creating Midtrans charge for {} ({})", request.order_id, request.method);
        let response: ChargeResponse = self.client.rest_query(Method::POST, "/v2/charge", &[], Some(&body)).await?;
        if !response.status_code.starts_with('2') {
            return Err(GatewayError::Rejected {
                status: body_status_code(&response.status_code),
                message: response.status_message.unwrap_or_default(),
            });
        }
        let provider_reference = response
            .transaction_id
            .ok_or_else(|| GatewayError::InvalidResponse("The charge response has no transaction_id".to_string()))?;
        let pay_code = response
            .va_numbers
            .into_iter()
            .next()
            .map(|v| v.va_number)
            .or(response.permata_va_number)
            .or(response.qr_string);
        let payment_url = response
            .actions
            .iter()
            .find(|a| a.name == "deeplink-redirect" || a.name == "generate-qr-code")
            .map(|a| a.url.clone());
        let expires_at = response.expiry_time.as_deref().and_then(parse_expiry);
        Ok(ProviderChargeResult { provider_reference, payment_url, pay_code, expires_at })
    }

    async fn get_status(
        &self,
        order_id: &OrderId,
        _provider_reference: Option<&str>,
    ) -> Result<SettlementEvent, GatewayError> {
        let path = format!("/v2/{}/status", order_id.as_str());
        let n: MidtransNotification = self.client.rest_query::<_, ()>(Method::GET, &path, &[], None).await?;
        if !n.status_code.starts_with('2') {
            return Err(GatewayError::Rejected {
                status: body_status_code(&n.status_code),
                message: n.status_message.unwrap_or_default(),
            });
        }
        trace!("🔁️ Midtrans reports {} for {order_id}", n.transaction_status);
        self.to_event(n)
    }
}
