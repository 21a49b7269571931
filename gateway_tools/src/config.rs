use std::time::Duration;

use log::*;
use wpg_common::{
    helpers::{env_duration_secs, env_flag},
    Secret,
};

use crate::error::GatewayInitError;

const MIDTRANS_PRODUCTION_URL: &str = "https://api.midtrans.com";
const MIDTRANS_SANDBOX_URL: &str = "https://api.sandbox.midtrans.com";
const TRIPAY_SANDBOX_URL: &str = "https://tripay.co.id/api-sandbox";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct MidtransConfig {
    pub base_url: String,
    pub server_key: Secret<String>,
}

impl MidtransConfig {
    pub fn new<S: Into<String>>(base_url: S, server_key: S) -> Self {
        Self { base_url: base_url.into(), server_key: Secret::new(server_key.into()) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TripayConfig {
    pub base_url: String,
    pub merchant_code: String,
    pub api_key: Secret<String>,
    pub private_key: Secret<String>,
}

impl TripayConfig {
    pub fn new<S: Into<String>>(base_url: S, merchant_code: S, api_key: S, private_key: S) -> Self {
        Self {
            base_url: base_url.into(),
            merchant_code: merchant_code.into(),
            api_key: Secret::new(api_key.into()),
            private_key: Secret::new(private_key.into()),
        }
    }
}

/// Provider credentials and HTTP timeouts. A provider is only configured when it is enabled and its credentials are
/// present.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub midtrans: Option<MidtransConfig>,
    pub tripay: Option<TripayConfig>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            midtrans: None,
            tripay: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

fn env_secret(name: &'static str, provider: &'static str) -> Result<Secret<String>, GatewayInitError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(Secret::new(v.trim().to_string())),
        _ => Err(GatewayInitError::MissingCredential { provider, variable: name }),
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Result<Self, GatewayInitError> {
        let request_timeout = env_duration_secs("WPG_GATEWAY_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT);
        let connect_timeout = env_duration_secs("WPG_GATEWAY_CONNECT_TIMEOUT", DEFAULT_CONNECT_TIMEOUT);
        let midtrans = if env_flag("WPG_MIDTRANS_ENABLED", false) {
            let server_key = env_secret("WPG_MIDTRANS_SERVER_KEY", "midtrans")?;
            let base_url = std::env::var("WPG_MIDTRANS_BASE_URL").unwrap_or_else(|_| {
                warn!("🪛️ WPG_MIDTRANS_BASE_URL is not set. Using the sandbox at {MIDTRANS_SANDBOX_URL}");
                MIDTRANS_SANDBOX_URL.to_string()
            });
            if base_url == MIDTRANS_PRODUCTION_URL {
                info!("🪛️ Midtrans is configured for PRODUCTION");
            }
            Some(MidtransConfig { base_url, server_key })
        } else {
            info!("🪛️ Midtrans is disabled");
            None
        };
        let tripay = if env_flag("WPG_TRIPAY_ENABLED", false) {
            let api_key = env_secret("WPG_TRIPAY_API_KEY", "tripay")?;
            let private_key = env_secret("WPG_TRIPAY_PRIVATE_KEY", "tripay")?;
            let merchant_code = std::env::var("WPG_TRIPAY_MERCHANT_CODE")
                .map_err(|_| GatewayInitError::MissingCredential { provider: "tripay", variable: "WPG_TRIPAY_MERCHANT_CODE" })?;
            let base_url = std::env::var("WPG_TRIPAY_BASE_URL").unwrap_or_else(|_| {
                warn!("🪛️ WPG_TRIPAY_BASE_URL is not set. Using the sandbox at {TRIPAY_SANDBOX_URL}");
                TRIPAY_SANDBOX_URL.to_string()
            });
            Some(TripayConfig { base_url, merchant_code, api_key, private_key })
        } else {
            info!("🪛️ Tripay is disabled");
            None
        };
        Ok(Self { midtrans, tripay, request_timeout, connect_timeout })
    }
}
