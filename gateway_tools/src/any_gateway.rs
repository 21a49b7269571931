use log::*;
use wallet_payment_engine::{
    db_types::{OrderId, PaymentProvider},
    traits::{ChargeRequest, GatewayError, MappedStatus, PaymentGateway, ProviderChargeResult, SettlementEvent},
};

use crate::{error::GatewayInitError, GatewayConfig, MidtransGateway, TripayGateway};

/// One of the supported provider clients.
#[derive(Debug, Clone)]
pub enum AnyGateway {
    Midtrans(MidtransGateway),
    Tripay(TripayGateway),
}

impl From<MidtransGateway> for AnyGateway {
    fn from(gw: MidtransGateway) -> Self {
        AnyGateway::Midtrans(gw)
    }
}

impl From<TripayGateway> for AnyGateway {
    fn from(gw: TripayGateway) -> Self {
        AnyGateway::Tripay(gw)
    }
}

/// Builds a client for every provider present in `config`.
pub fn build_gateways(config: &GatewayConfig) -> Result<Vec<AnyGateway>, GatewayInitError> {
    let mut gateways = Vec::with_capacity(2);
    if let Some(midtrans) = &config.midtrans {
        gateways.push(MidtransGateway::new(midtrans.clone(), config)?.into());
        info!("🪛️ Midtrans gateway configured at {}", midtrans.base_url);
    }
    if let Some(tripay) = &config.tripay {
        gateways.push(TripayGateway::new(tripay.clone(), config)?.into());
        info!("🪛️ Tripay gateway configured at {}", tripay.base_url);
    }
    if gateways.is_empty() {
        warn!("🪛️ No payment gateways are enabled. Gateway top-ups and webhooks will be refused");
    }
    Ok(gateways)
}

impl PaymentGateway for AnyGateway {
    fn provider(&self) -> PaymentProvider {
        match self {
            AnyGateway::Midtrans(gw) => gw.provider(),
            AnyGateway::Tripay(gw) => gw.provider(),
        }
    }

    fn signature_header(&self) -> Option<&'static str> {
        match self {
            AnyGateway::Midtrans(gw) => gw.signature_header(),
            AnyGateway::Tripay(gw) => gw.signature_header(),
        }
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        match self {
            AnyGateway::Midtrans(gw) => gw.verify_webhook_signature(payload, signature),
            AnyGateway::Tripay(gw) => gw.verify_webhook_signature(payload, signature),
        }
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<SettlementEvent, GatewayError> {
        match self {
            AnyGateway::Midtrans(gw) => gw.parse_webhook(payload),
            AnyGateway::Tripay(gw) => gw.parse_webhook(payload),
        }
    }

    fn map_provider_status(&self, raw: &str) -> MappedStatus {
        match self {
            AnyGateway::Midtrans(gw) => gw.map_provider_status(raw),
            AnyGateway::Tripay(gw) => gw.map_provider_status(raw),
        }
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProviderChargeResult, GatewayError> {
        match self {
            AnyGateway::Midtrans(gw) => gw.create_charge(request).await,
            AnyGateway::Tripay(gw) => gw.create_charge(request).await,
        }
    }

    async fn get_status(
        &self,
        order_id: &OrderId,
        provider_reference: Option<&str>,
    ) -> Result<SettlementEvent, GatewayError> {
        match self {
            AnyGateway::Midtrans(gw) => gw.get_status(order_id, provider_reference).await,
            AnyGateway::Tripay(gw) => gw.get_status(order_id, provider_reference).await,
        }
    }
}
