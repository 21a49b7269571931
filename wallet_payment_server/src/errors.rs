use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use serde_json::json;
use thiserror::Error;
use wallet_payment_engine::{
    db_types::Rupiah,
    AdjustmentError,
    AuditLogError,
    LedgerError,
    PaymentIntentError,
    SettlementError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient balance. The balance is {balance} and {attempted} would leave {would_be}.")]
    InsufficientBalance { balance: Rupiah, attempted: Rupiah, would_be: Rupiah },
    #[error("The notification signature could not be verified")]
    InvalidSignature,
    #[error("{0} payments are not available")]
    UnsupportedProvider(String),
    #[error("Payment service unavailable, try again later")]
    ServiceUnavailable,
    #[error("The wallet is busy. Please try again.")]
    TransactionConflict,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedProvider(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingIdentity | AuthError::InvalidIdentity(_) => StatusCode::UNAUTHORIZED,
                AuthError::UntrustedProxy => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::TransactionConflict => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::InsufficientBalance { balance, attempted, would_be } => json!({
                "error": self.to_string(),
                "balance": balance,
                "attempted": attempted,
                "wouldBeBalance": would_be,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No authenticated user was supplied with the request.")]
    MissingIdentity,
    #[error("The identity headers are not valid. {0}")]
    InvalidIdentity(String),
    #[error("The request did not come through the authentication proxy.")]
    UntrustedProxy,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance { balance, attempted, would_be, .. } => {
                Self::InsufficientBalance { balance, attempted, would_be }
            },
            LedgerError::Validation(e) => Self::InvalidRequestBody(e.to_string()),
            LedgerError::TransactionConflict { .. } | LedgerError::VersionConflict(_) | LedgerError::StorageBusy => {
                Self::TransactionConflict
            },
            LedgerError::BalanceOverflow { .. } => Self::InvalidRequestBody(e.to_string()),
            LedgerError::DatabaseError(e) => {
                error!("💻️ Ledger database error. {e}");
                Self::BackendError(format!("Database error: {e}"))
            },
        }
    }
}

impl From<AdjustmentError> for ServerError {
    fn from(e: AdjustmentError) -> Self {
        match e {
            AdjustmentError::InsufficientBalance { balance, attempted, would_be, .. } => {
                Self::InsufficientBalance { balance, attempted, would_be }
            },
            AdjustmentError::Ledger(e) => e.into(),
            AdjustmentError::MissingReason |
            AdjustmentError::NonPositiveAmount(_) |
            AdjustmentError::ZeroAmount |
            AdjustmentError::InvalidReference(_) => Self::InvalidRequestBody(e.to_string()),
        }
    }
}

impl From<PaymentIntentError> for ServerError {
    fn from(e: PaymentIntentError) -> Self {
        match e {
            PaymentIntentError::Ledger(e) => e.into(),
            PaymentIntentError::IntentNotFound(order_id) => Self::NoRecordFound(format!("Order {order_id}")),
            PaymentIntentError::AnomalyNotFound(id) => Self::NoRecordFound(format!("Anomaly #{id}")),
            PaymentIntentError::InvalidClosingStatus(_) => Self::InvalidRequestBody(e.to_string()),
            PaymentIntentError::DuplicateOrderId(_) | PaymentIntentError::DatabaseError(_) => {
                error!("💻️ Payment intent storage error. {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::UnsupportedProvider(p) => Self::UnsupportedProvider(p.to_string()),
            SettlementError::SignatureVerificationFailed(_) => Self::InvalidSignature,
            SettlementError::MalformedPayload(msg) => Self::InvalidRequestBody(msg),
            SettlementError::InvalidRequest(msg) => Self::InvalidRequestBody(msg),
            SettlementError::UnknownIntent(order_id) => Self::NoRecordFound(format!("Order {order_id}")),
            SettlementError::GatewayUnavailable(_) => Self::ServiceUnavailable,
            SettlementError::Intent(e) => e.into(),
        }
    }
}

impl From<AuditLogError> for ServerError {
    fn from(e: AuditLogError) -> Self {
        Self::BackendError(e.to_string())
    }
}
