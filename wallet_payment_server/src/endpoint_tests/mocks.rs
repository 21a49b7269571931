use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use chrono::{DateTime, Utc};
use mockall::mock;
use wallet_payment_engine::{
    db_types::{
        Anomaly,
        AuditContext,
        AuditQuery,
        AuditRecord,
        IntentStatus,
        LedgerEntry,
        LedgerQuery,
        NewAnomaly,
        NewLedgerEntry,
        NewPaymentIntent,
        OrderId,
        Page,
        PaymentIntent,
        PaymentProvider,
        Rupiah,
        Wallet,
    },
    traits::{
        AnomalyRecord,
        AuditLog,
        AuditLogError,
        ChargeRequest,
        CloseResult,
        GatewayError,
        LedgerError,
        LedgerManagement,
        MappedStatus,
        PaymentGateway,
        PaymentIntentError,
        PaymentIntentManagement,
        ProviderChargeResult,
        SettleResult,
        SettlementEvent,
    },
};

mock! {
    pub LedgerManager {}
    impl LedgerManagement for LedgerManager {
        async fn apply_ledger_entry(&self, entry: NewLedgerEntry, audit: AuditContext) -> Result<LedgerEntry, LedgerError>;
        async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError>;
        async fn fetch_ledger_page(&self, user_id: i64, query: LedgerQuery) -> Result<Page<LedgerEntry>, LedgerError>;
        async fn ledger_sum(&self, user_id: i64) -> Result<Rupiah, LedgerError>;
    }
}

mock! {
    pub IntentManager {}
    impl PaymentIntentManagement for IntentManager {
        async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, PaymentIntentError>;
        async fn fetch_intent(&self, order_id: &OrderId) -> Result<Option<PaymentIntent>, PaymentIntentError>;
        async fn attach_provider_reference(&self, order_id: &OrderId, reference: &str) -> Result<PaymentIntent, PaymentIntentError>;
        async fn settle_intent(&self, order_id: &OrderId, source: &str) -> Result<SettleResult, PaymentIntentError>;
        async fn close_intent(&self, order_id: &OrderId, status: IntentStatus) -> Result<CloseResult, PaymentIntentError>;
        async fn fetch_stale_pending(&self, created_before: DateTime<Utc>, limit: i64) -> Result<Vec<PaymentIntent>, PaymentIntentError>;
        async fn record_anomaly(&self, anomaly: NewAnomaly) -> Result<AnomalyRecord, PaymentIntentError>;
        async fn fetch_anomalies(&self, unresolved_only: bool) -> Result<Vec<Anomaly>, PaymentIntentError>;
        async fn resolve_anomaly(&self, id: i64, admin_id: i64) -> Result<Anomaly, PaymentIntentError>;
    }
}

mock! {
    pub AuditTrail {}
    impl AuditLog for AuditTrail {
        async fn fetch_audit_records(&self, query: AuditQuery) -> Result<Page<AuditRecord>, AuditLogError>;
    }
}

/// A gateway that accepts one fixed signature and reports a canned event. Counts how often payloads were parsed and
/// keeps every charge request it was sent.
pub struct StubGateway {
    pub provider: PaymentProvider,
    pub accepted_signature: &'static str,
    pub report: Result<SettlementEvent, GatewayError>,
    pub charge: Result<ProviderChargeResult, GatewayError>,
    pub parsed: Arc<AtomicUsize>,
    pub charges: Arc<Mutex<Vec<ChargeRequest>>>,
}

impl StubGateway {
    pub fn new(provider: PaymentProvider, report: Result<SettlementEvent, GatewayError>) -> Self {
        Self {
            provider,
            accepted_signature: STUB_SIGNATURE,
            report,
            charge: Err(GatewayError::Unavailable("stub".to_string())),
            parsed: Arc::new(AtomicUsize::new(0)),
            charges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_charge(mut self, charge: Result<ProviderChargeResult, GatewayError>) -> Self {
        self.charge = charge;
        self
    }
}

pub const STUB_SIGNATURE_HEADER: &str = "X-Test-Signature";
pub const STUB_SIGNATURE: &str = "c0ffee";

impl PaymentGateway for StubGateway {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    fn signature_header(&self) -> Option<&'static str> {
        Some(STUB_SIGNATURE_HEADER)
    }

    fn verify_webhook_signature(&self, _payload: &[u8], signature: Option<&str>) -> bool {
        signature == Some(self.accepted_signature)
    }

    fn parse_webhook(&self, _payload: &[u8]) -> Result<SettlementEvent, GatewayError> {
        self.parsed.fetch_add(1, Ordering::SeqCst);
        self.report.clone()
    }

    fn map_provider_status(&self, raw: &str) -> MappedStatus {
        match raw {
            "settlement" => MappedStatus::Known(IntentStatus::Settlement),
            "pending" => MappedStatus::Known(IntentStatus::Pending),
            other => MappedStatus::Unknown(other.to_string()),
        }
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProviderChargeResult, GatewayError> {
        self.charges.lock().unwrap().push(request.clone());
        self.charge.clone()
    }

    async fn get_status(&self, _order_id: &OrderId, _reference: Option<&str>) -> Result<SettlementEvent, GatewayError> {
        self.report.clone()
    }
}
