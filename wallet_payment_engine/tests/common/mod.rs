//! A scripted payment gateway for integration tests.
//!
//! Webhook payloads are JSON objects `{ "order_id", "status", "gross_amount" }` and are signed by sending the
//! gateway's secret as the signature. Status queries answer from a table that tests fill in.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde_json::json;
use wallet_payment_engine::{
    db_types::{IntentStatus, OrderId, PaymentProvider, Rupiah},
    traits::{ChargeRequest, GatewayError, MappedStatus, PaymentGateway, ProviderChargeResult, SettlementEvent},
};

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

#[derive(Debug, Clone, Default)]
pub struct GatewayScript {
    pub statuses: HashMap<OrderId, String>,
    pub unavailable: bool,
    pub status_calls: usize,
    pub charges: Vec<ChargeRequest>,
}

#[derive(Debug, Clone)]
pub struct ScriptedGateway {
    provider: PaymentProvider,
    script: Arc<Mutex<GatewayScript>>,
}

impl ScriptedGateway {
    pub fn new(provider: PaymentProvider) -> Self {
        Self { provider, script: Arc::new(Mutex::new(GatewayScript::default())) }
    }

    pub fn report(&self, order_id: &str, status: &str) {
        self.script.lock().unwrap().statuses.insert(OrderId::from(order_id), status.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.script.lock().unwrap().unavailable = unavailable;
    }

    pub fn status_calls(&self) -> usize {
        self.script.lock().unwrap().status_calls
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.script.lock().unwrap().charges.clone()
    }

    pub fn webhook_payload(order_id: &str, status: &str, gross_amount: i64) -> Vec<u8> {
        json!({ "order_id": order_id, "status": status, "gross_amount": gross_amount }).to_string().into_bytes()
    }

    fn event(&self, order_id: OrderId, raw: String, gross_amount: Option<Rupiah>) -> SettlementEvent {
        let status = self.map_provider_status(&raw);
        SettlementEvent { provider: self.provider, order_id, raw_status: raw, status, gross_amount, provider_reference: None }
    }
}

impl PaymentGateway for ScriptedGateway {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    fn signature_header(&self) -> Option<&'static str> {
        Some("X-Test-Signature")
    }

    fn verify_webhook_signature(&self, _payload: &[u8], signature: Option<&str>) -> bool {
        signature == Some(WEBHOOK_SECRET)
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<SettlementEvent, GatewayError> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let order_id = value["order_id"].as_str().ok_or_else(|| GatewayError::MalformedPayload("order_id".into()))?;
        let status = value["status"].as_str().ok_or_else(|| GatewayError::MalformedPayload("status".into()))?;
        let amount = value["gross_amount"].as_i64().map(Rupiah::from);
        Ok(self.event(OrderId::from(order_id), status.to_string(), amount))
    }

    fn map_provider_status(&self, raw: &str) -> MappedStatus {
        match raw {
            "settlement" => MappedStatus::Known(IntentStatus::Settlement),
            "pending" => MappedStatus::Known(IntentStatus::Pending),
            "failure" => MappedStatus::Known(IntentStatus::Fail),
            "cancel" => MappedStatus::Known(IntentStatus::Cancel),
            "expire" => MappedStatus::Known(IntentStatus::Expire),
            other => MappedStatus::Unknown(other.to_string()),
        }
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProviderChargeResult, GatewayError> {
        let mut script = self.script.lock().unwrap();
        if script.unavailable {
            return Err(GatewayError::Unavailable("connection refused".into()));
        }
        script.charges.push(request.clone());
        Ok(ProviderChargeResult {
            provider_reference: format!("T-{}", request.order_id),
            payment_url: Some(format!("https://pay.example.com/{}", request.order_id)),
            pay_code: None,
            expires_at: None,
        })
    }

    async fn get_status(
        &self,
        order_id: &OrderId,
        _provider_reference: Option<&str>,
    ) -> Result<SettlementEvent, GatewayError> {
        let raw = {
            let mut script = self.script.lock().unwrap();
            script.status_calls += 1;
            if script.unavailable {
                return Err(GatewayError::Timeout);
            }
            script.statuses.get(order_id).cloned().unwrap_or_else(|| "pending".to_string())
        };
        Ok(self.event(order_id.clone(), raw, None))
    }
}
