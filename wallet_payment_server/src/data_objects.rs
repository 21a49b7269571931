use std::fmt::Display;

use serde::{Deserialize, Serialize};
use wallet_payment_engine::{
    db_types::{AuditQuery, LedgerEntryKind, LedgerQuery, OrderId, PaymentProvider, Rupiah, DEFAULT_PAGE_SIZE},
    traits::CustomerDetails,
};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    pub amount: Rupiah,
    pub provider: PaymentProvider,
    pub method: String,
    #[serde(default)]
    pub customer: Option<CustomerDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDebitRequest {
    pub user_id: i64,
    pub amount: Rupiah,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTopUpRequest {
    pub amount: Rupiah,
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBalanceRequest {
    /// Signed: positive amounts credit the wallet, negative amounts deduct from it.
    pub amount: Rupiah,
    pub reason: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub amount: Rupiah,
    pub order_id: OrderId,
    pub reason: String,
}

/// Query string for ledger history, e.g. `?kind=TOPUP&search=ORD&page=2&perPage=20`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerParams {
    pub kind: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl TryFrom<LedgerParams> for LedgerQuery {
    type Error = ServerError;

    fn try_from(params: LedgerParams) -> Result<Self, Self::Error> {
        let kind = match params.kind.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(k) => Some(k.parse::<LedgerEntryKind>().map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?),
            None => None,
        };
        let query = LedgerQuery {
            kind,
            search: params.search,
            page: params.page.unwrap_or(1),
            per_page: params.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        };
        Ok(query.normalized())
    }
}

/// Query string for the audit log, e.g. `?userId=12&actorId=3&page=1&perPage=50`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditParams {
    pub user_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl From<AuditParams> for AuditQuery {
    fn from(params: AuditParams) -> Self {
        AuditQuery {
            target_user_id: params.user_id,
            admin_id: params.actor_id,
            ledger_entry_id: None,
            page: params.page.unwrap_or(1),
            per_page: params.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        }
        .normalized()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyParams {
    #[serde(default)]
    pub unresolved: Option<bool>,
}
