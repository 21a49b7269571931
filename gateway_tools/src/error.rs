use thiserror::Error;
use wallet_payment_engine::GatewayError;

#[derive(Debug, Error)]
pub enum GatewayInitError {
    #[error("Could not initialize the {provider} client: {reason}")]
    Client { provider: &'static str, reason: String },
    #[error("{provider} is enabled but {variable} is not set")]
    MissingCredential { provider: &'static str, variable: &'static str },
}

/// Translates a transport failure into the engine's gateway error. The raw error is only ever logged.
pub(crate) fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_decode() {
        GatewayError::InvalidResponse(e.to_string())
    } else if e.is_connect() || e.is_request() {
        GatewayError::Unavailable(e.to_string())
    } else if let Some(status) = e.status() {
        GatewayError::Rejected { status: status.as_u16(), message: e.to_string() }
    } else {
        GatewayError::Unavailable(e.to_string())
    }
}
