use std::{env, time::Duration};

use gateway_tools::GatewayConfig;
use log::*;
use wallet_payment_engine::helpers::RetryPolicy;
use wpg_common::{
    helpers::{env_duration_secs, env_flag, env_parse},
    Secret,
};

const DEFAULT_WPG_HOST: &str = "127.0.0.1";
const DEFAULT_WPG_PORT: u16 = 8460;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_LEDGER_MAX_RETRIES: u32 = 5;
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_RECONCILE_MIN_AGE: Duration = Duration::from_secs(300);
const DEFAULT_RECONCILE_BATCH_SIZE: i64 = 50;
const DEFAULT_PROVIDER_SPACING_MS: u64 = 500;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// When set, every `/api` request must carry this value in `X-Auth-Proxy-Token`, proving that it passed through
    /// the authentication proxy.
    pub auth_proxy_token: Option<Secret<String>>,
    /// Attempts made for a ledger write that keeps losing races with concurrent writers.
    pub ledger_max_retries: u32,
    pub reconciliation: ReconciliationConfig,
    pub gateways: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WPG_HOST.to_string(),
            port: DEFAULT_WPG_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            use_x_forwarded_for: false,
            use_forwarded: false,
            auth_proxy_token: None,
            ledger_max_retries: DEFAULT_LEDGER_MAX_RETRIES,
            reconciliation: ReconciliationConfig::default(),
            gateways: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("WPG_HOST").ok().unwrap_or_else(|| DEFAULT_WPG_HOST.into());
        let port = env_parse("WPG_PORT", DEFAULT_WPG_PORT);
        let database_url = env::var("WPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ WPG_DATABASE_URL is not set. Please set it to the URL for the wallet database.");
            String::default()
        });
        let max_connections = env_parse("WPG_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let use_x_forwarded_for = env_flag("WPG_USE_X_FORWARDED_FOR", false);
        let use_forwarded = env_flag("WPG_USE_FORWARDED", false);
        let auth_proxy_token = env::var("WPG_AUTH_PROXY_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Secret::new(s.trim().to_string()));
        if auth_proxy_token.is_none() {
            warn!(
                "🪛️ WPG_AUTH_PROXY_TOKEN is not set. Identity headers will be trusted without proof that they came from \
                 the authentication proxy. Only run like this behind a proxy that strips them from client requests."
            );
        }
        let ledger_max_retries = env_parse("WPG_LEDGER_MAX_RETRIES", DEFAULT_LEDGER_MAX_RETRIES).max(1);
        let reconciliation = ReconciliationConfig::from_env_or_default();
        let gateways = GatewayConfig::from_env_or_default().unwrap_or_else(|e| {
            error!("🪛️ The payment gateways could not be configured. {e}. All gateways are disabled.");
            GatewayConfig::default()
        });
        Self {
            host,
            port,
            database_url,
            max_connections,
            use_x_forwarded_for,
            use_forwarded,
            auth_proxy_token,
            ledger_max_retries,
            reconciliation,
            gateways,
        }
    }

    pub fn options(&self) -> ServerOptions {
        ServerOptions { use_x_forwarded_for: self.use_x_forwarded_for, use_forwarded: self.use_forwarded }
    }

    /// The retry policy for ledger writes.
    pub fn ledger_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.ledger_max_retries)
    }
}

//-----------------------------------------------  Reconciliation  -----------------------------------------------------
#[derive(Clone, Debug)]
pub struct ReconciliationConfig {
    pub enabled: bool,
    /// Time between sweeps of stale pending intents.
    pub interval: Duration,
    /// Intents younger than this are left to their webhooks.
    pub min_age: Duration,
    pub batch_size: i64,
    /// Minimum gap between two status queries to the same provider.
    pub provider_spacing: Duration,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_RECONCILE_INTERVAL,
            min_age: DEFAULT_RECONCILE_MIN_AGE,
            batch_size: DEFAULT_RECONCILE_BATCH_SIZE,
            provider_spacing: Duration::from_millis(DEFAULT_PROVIDER_SPACING_MS),
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env_or_default() -> Self {
        let enabled = env_flag("WPG_RECONCILE_ENABLED", true);
        let interval = env_duration_secs("WPG_RECONCILE_INTERVAL", DEFAULT_RECONCILE_INTERVAL);
        let interval = if interval.is_zero() {
            warn!("🪛️ WPG_RECONCILE_INTERVAL cannot be zero. Using {} s.", DEFAULT_RECONCILE_INTERVAL.as_secs());
            DEFAULT_RECONCILE_INTERVAL
        } else {
            interval
        };
        let min_age = env_duration_secs("WPG_RECONCILE_MIN_AGE", DEFAULT_RECONCILE_MIN_AGE);
        let batch_size = env_parse("WPG_RECONCILE_BATCH_SIZE", DEFAULT_RECONCILE_BATCH_SIZE).max(1);
        let spacing_ms = env_parse("WPG_RECONCILE_PROVIDER_SPACING_MS", DEFAULT_PROVIDER_SPACING_MS);
        if !enabled {
            info!("🪛️ Pending intent reconciliation is disabled");
        }
        Self { enabled, interval, min_age, batch_size, provider_spacing: Duration::from_millis(spacing_ms) }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}
