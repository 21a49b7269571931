//! Data types shared by the engine APIs and the storage backends.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
use thiserror::Error;
pub use wpg_common::Rupiah;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The merchant-side identifier of a payment intent. This is the `order_id` the gateways echo back in callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------         Wallet        ---------------------------------------------------------
/// The cached balance for a user. `balance` always equals the sum of the user's ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: i64,
    pub balance: Rupiah,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    LedgerEntryKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LedgerEntryKind {
    /// Funds added by a settled gateway payment or an admin top-up. Always positive.
    Topup,
    /// A purchase paid from the wallet. Always negative.
    Debit,
    /// A manual admin correction. Either sign, never zero.
    Adjust,
    /// Funds returned for a purchase. Always positive.
    Refund,
}

impl Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntryKind::Topup => write!(f, "TOPUP"),
            LedgerEntryKind::Debit => write!(f, "DEBIT"),
            LedgerEntryKind::Adjust => write!(f, "ADJUST"),
            LedgerEntryKind::Refund => write!(f, "REFUND"),
        }
    }
}

impl FromStr for LedgerEntryKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TOPUP" => Ok(Self::Topup),
            "DEBIT" => Ok(Self::Debit),
            "ADJUST" => Ok(Self::Adjust),
            "REFUND" => Ok(Self::Refund),
            _ => Err(ConversionError(format!("{s} is not a ledger entry kind"))),
        }
    }
}

impl LedgerEntryKind {
    /// Checks the sign convention for this kind of entry.
    pub fn accepts(&self, amount: Rupiah) -> bool {
        match self {
            LedgerEntryKind::Topup | LedgerEntryKind::Refund => amount.is_positive(),
            LedgerEntryKind::Debit => amount.is_negative(),
            LedgerEntryKind::Adjust => !amount.is_zero(),
        }
    }
}

//--------------------------------------       Reference       ---------------------------------------------------------
/// What a ledger entry points back to.
///
/// Stored as a `(reference_type, reference_value)` column pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Reference {
    /// A payment intent or a purchase order.
    Order(OrderId),
    /// A provider-side payment identifier.
    Payment(String),
    /// An admin-issued reference, e.g. `ADD-20240501-K3J9QX`.
    Admin(String),
    Plain(String),
}

impl Reference {
    pub fn type_code(&self) -> &'static str {
        match self {
            Reference::Order(_) => "ORDER",
            Reference::Payment(_) => "PAYMENT",
            Reference::Admin(_) => "ADMIN",
            Reference::Plain(_) => "PLAIN",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Reference::Order(id) => id.as_str(),
            Reference::Payment(s) | Reference::Admin(s) | Reference::Plain(s) => s.as_str(),
        }
    }

    pub fn from_parts(type_code: &str, value: String) -> Result<Self, ConversionError> {
        match type_code {
            "ORDER" => Ok(Reference::Order(OrderId(value))),
            "PAYMENT" => Ok(Reference::Payment(value)),
            "ADMIN" => Ok(Reference::Admin(value)),
            "PLAIN" => Ok(Reference::Plain(value)),
            other => Err(ConversionError(format!("{other} is not a reference type"))),
        }
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Order(id) => write!(f, "order:{id}"),
            Reference::Payment(id) => write!(f, "payment:{id}"),
            Reference::Admin(note) => write!(f, "admin:{note}"),
            Reference::Plain(s) => write!(f, "{s}"),
        }
    }
}

//--------------------------------------      LedgerEntry      ---------------------------------------------------------
/// An immutable, balance-affecting record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub kind: LedgerEntryKind,
    pub amount: Rupiah,
    pub balance_after: Rupiah,
    pub reference: Reference,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for LedgerEntry {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let reference_type: String = row.try_get("reference_type")?;
        let reference_value: String = row.try_get("reference_value")?;
        let reference = Reference::from_parts(&reference_type, reference_value)
            .map_err(|e| sqlx::Error::ColumnDecode { index: "reference_type".into(), source: Box::new(e) })?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            kind: row.try_get("kind")?,
            amount: row.try_get("amount")?,
            balance_after: row.try_get("balance_after")?,
            reference,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

//--------------------------------------     NewLedgerEntry    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub user_id: i64,
    pub kind: LedgerEntryKind,
    /// Signed amount. See [`LedgerEntryKind`] for the sign convention.
    pub amount: Rupiah,
    pub reference: Reference,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryValidationError {
    #[error("Ledger entries cannot have a zero amount")]
    ZeroAmount,
    #[error("A {kind} entry cannot have an amount of {amount}")]
    SignMismatch { kind: LedgerEntryKind, amount: Rupiah },
    #[error("A description is required for every ledger entry")]
    MissingDescription,
    #[error("The reference value cannot be empty")]
    EmptyReference,
}

impl NewLedgerEntry {
    pub fn new<S: Into<String>>(
        user_id: i64,
        kind: LedgerEntryKind,
        amount: Rupiah,
        reference: Reference,
        description: S,
    ) -> Self {
        Self { user_id, kind, amount, reference, description: description.into() }
    }

    pub fn validate(&self) -> Result<(), EntryValidationError> {
        if self.amount.is_zero() {
            return Err(EntryValidationError::ZeroAmount);
        }
        if !self.kind.accepts(self.amount) {
            return Err(EntryValidationError::SignMismatch { kind: self.kind, amount: self.amount });
        }
        if self.description.trim().is_empty() {
            return Err(EntryValidationError::MissingDescription);
        }
        if self.reference.value().trim().is_empty() {
            return Err(EntryValidationError::EmptyReference);
        }
        Ok(())
    }
}

//--------------------------------------      LedgerQuery      ---------------------------------------------------------
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Pages past this are always empty for any realistic ledger. Clamping keeps the offset arithmetic in range.
pub const MAX_PAGE: i64 = 1_000_000;

/// Filter and pagination options for a user's ledger history. Pages are 1-based and newest entries come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerQuery {
    pub kind: Option<LedgerEntryKind>,
    /// Case-insensitive substring match against the description and the reference value.
    pub search: Option<String>,
    pub page: i64,
    pub per_page: i64,
}

impl Default for LedgerQuery {
    fn default() -> Self {
        Self { kind: None, search: None, page: 1, per_page: DEFAULT_PAGE_SIZE }
    }
}

impl LedgerQuery {
    pub fn with_kind(mut self, kind: LedgerEntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_search<S: Into<String>>(mut self, search: S) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_page(mut self, page: i64, per_page: i64) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    /// Clamps the page into `1..=MAX_PAGE` and the page size into `1..=MAX_PAGE_SIZE`.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.clamp(1, MAX_PAGE);
        self.per_page = self.per_page.clamp(1, MAX_PAGE_SIZE);
        self.search = self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).max(0).saturating_mul(self.per_page.max(0))
    }
}

/// One page of results, with the totals the caller needs to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, per_page: i64) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + per_page - 1) / per_page };
        Self { data, total, total_pages }
    }
}

//--------------------------------------     IntentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentStatus {
    Pending,
    Settlement,
    Fail,
    Cancel,
    Expire,
}

impl IntentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IntentStatus::Pending)
    }
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentStatus::Pending => write!(f, "PENDING"),
            IntentStatus::Settlement => write!(f, "SETTLEMENT"),
            IntentStatus::Fail => write!(f, "FAIL"),
            IntentStatus::Cancel => write!(f, "CANCEL"),
            IntentStatus::Expire => write!(f, "EXPIRE"),
        }
    }
}

impl FromStr for IntentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "SETTLEMENT" => Ok(Self::Settlement),
            "FAIL" => Ok(Self::Fail),
            "CANCEL" => Ok(Self::Cancel),
            "EXPIRE" => Ok(Self::Expire),
            _ => Err(ConversionError(format!("{s} is not a payment intent status"))),
        }
    }
}

//--------------------------------------    PaymentProvider    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    /// Bank transfer, e-wallet and card payments. Callbacks are signed with SHA-512 over the payload fields.
    Midtrans,
    /// Virtual account and QRIS payments. Callbacks are signed with HMAC-SHA256 over the raw body.
    Tripay,
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProvider::Midtrans => write!(f, "midtrans"),
            PaymentProvider::Tripay => write!(f, "tripay"),
        }
    }
}

impl FromStr for PaymentProvider {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "midtrans" => Ok(Self::Midtrans),
            "tripay" => Ok(Self::Tripay),
            _ => Err(ConversionError(format!("{s} is not a supported payment provider"))),
        }
    }
}

//--------------------------------------     PaymentIntent     ---------------------------------------------------------
/// A request to top up a wallet through a gateway. Transitions out of `PENDING` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub order_id: OrderId,
    pub user_id: i64,
    pub gross_amount: Rupiah,
    pub provider: PaymentProvider,
    pub provider_method: String,
    pub provider_reference: Option<String>,
    pub status: IntentStatus,
    /// The single TOPUP entry written when this intent settled.
    pub ledger_entry_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    pub order_id: OrderId,
    pub user_id: i64,
    pub gross_amount: Rupiah,
    pub provider: PaymentProvider,
    pub provider_method: String,
}

impl NewPaymentIntent {
    pub fn new<S: Into<String>>(
        order_id: OrderId,
        user_id: i64,
        gross_amount: Rupiah,
        provider: PaymentProvider,
        provider_method: S,
    ) -> Self {
        Self { order_id, user_id, gross_amount, provider, provider_method: provider_method.into() }
    }
}

//--------------------------------------         Actor         ---------------------------------------------------------
/// Who caused a balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Admin(i64),
    /// An automated path, named by its source, e.g. `webhook:midtrans` or `checkout`.
    System(String),
}

impl Actor {
    pub fn type_code(&self) -> &'static str {
        match self {
            Actor::Admin(_) => "ADMIN",
            Actor::System(_) => "SYSTEM",
        }
    }

    pub fn id_value(&self) -> String {
        match self {
            Actor::Admin(id) => id.to_string(),
            Actor::System(source) => source.clone(),
        }
    }

    pub fn from_parts(type_code: &str, value: String) -> Result<Self, ConversionError> {
        match type_code {
            "ADMIN" => value
                .parse::<i64>()
                .map(Actor::Admin)
                .map_err(|e| ConversionError(format!("Admin actor id {value} is not numeric. {e}"))),
            "SYSTEM" => Ok(Actor::System(value)),
            other => Err(ConversionError(format!("{other} is not an actor type"))),
        }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Admin(id) => write!(f, "admin #{id}"),
            Actor::System(source) => write!(f, "system ({source})"),
        }
    }
}

//--------------------------------------      AuditAction      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ManualTopUp,
    BalanceAdjustment,
    GatewaySettlement,
    PurchaseDebit,
    PurchaseRefund,
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::ManualTopUp => write!(f, "MANUAL_TOP_UP"),
            AuditAction::BalanceAdjustment => write!(f, "BALANCE_ADJUSTMENT"),
            AuditAction::GatewaySettlement => write!(f, "GATEWAY_SETTLEMENT"),
            AuditAction::PurchaseDebit => write!(f, "PURCHASE_DEBIT"),
            AuditAction::PurchaseRefund => write!(f, "PURCHASE_REFUND"),
        }
    }
}

//--------------------------------------      AuditContext     ---------------------------------------------------------
/// The audit details that accompany a ledger mutation. The storage layer writes the audit record in the same
/// transaction as the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    pub actor: Actor,
    pub action: AuditAction,
    pub ip_address: Option<String>,
}

impl AuditContext {
    pub fn admin(admin_id: i64, action: AuditAction, ip_address: Option<String>) -> Self {
        Self { actor: Actor::Admin(admin_id), action, ip_address }
    }

    pub fn system<S: Into<String>>(source: S, action: AuditAction) -> Self {
        Self { actor: Actor::System(source.into()), action, ip_address: None }
    }
}

//--------------------------------------      AuditRecord      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: i64,
    pub actor: Actor,
    pub action: AuditAction,
    pub target_user_id: i64,
    pub ledger_entry_id: i64,
    pub before_balance: Rupiah,
    pub after_balance: Rupiah,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for AuditRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let actor_type: String = row.try_get("actor_type")?;
        let actor_id: String = row.try_get("actor_id")?;
        let actor = Actor::from_parts(&actor_type, actor_id)
            .map_err(|e| sqlx::Error::ColumnDecode { index: "actor_type".into(), source: Box::new(e) })?;
        Ok(Self {
            id: row.try_get("id")?,
            actor,
            action: row.try_get("action")?,
            target_user_id: row.try_get("target_user_id")?,
            ledger_entry_id: row.try_get("ledger_entry_id")?,
            before_balance: row.try_get("before_balance")?,
            after_balance: row.try_get("after_balance")?,
            ip_address: row.try_get("ip_address")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Filters for the audit log. Pages are 1-based and the newest records come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub target_user_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub ledger_entry_id: Option<i64>,
    pub page: i64,
    pub per_page: i64,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self { target_user_id: None, admin_id: None, ledger_entry_id: None, page: 1, per_page: DEFAULT_PAGE_SIZE }
    }
}

impl AuditQuery {
    pub fn for_user(mut self, user_id: i64) -> Self {
        self.target_user_id = Some(user_id);
        self
    }

    pub fn by_admin(mut self, admin_id: i64) -> Self {
        self.admin_id = Some(admin_id);
        self
    }

    pub fn for_entry(mut self, ledger_entry_id: i64) -> Self {
        self.ledger_entry_id = Some(ledger_entry_id);
        self
    }

    pub fn normalized(mut self) -> Self {
        self.page = self.page.clamp(1, MAX_PAGE);
        self.per_page = self.per_page.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).max(0).saturating_mul(self.per_page.max(0))
    }
}

//--------------------------------------        Anomaly        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    /// The provider reported a terminal status that contradicts the stored terminal status.
    ConflictingTerminalState,
    /// The provider reported a status outside the mapping table.
    UnknownProviderStatus,
    /// The provider reported a settlement for a different amount than the intent.
    AmountMismatch,
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyKind::ConflictingTerminalState => write!(f, "CONFLICTING_TERMINAL_STATE"),
            AnomalyKind::UnknownProviderStatus => write!(f, "UNKNOWN_PROVIDER_STATUS"),
            AnomalyKind::AmountMismatch => write!(f, "AMOUNT_MISMATCH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSource {
    Webhook,
    StatusPoll,
}

impl Display for StatusSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusSource::Webhook => write!(f, "webhook"),
            StatusSource::StatusPoll => write!(f, "status-poll"),
        }
    }
}

/// A provider notification that was acknowledged but not applied, kept for manual review.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: i64,
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    pub kind: AnomalyKind,
    pub stored_status: IntentStatus,
    pub reported_status: String,
    pub detail: String,
    pub source: StatusSource,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnomaly {
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    pub kind: AnomalyKind,
    pub stored_status: IntentStatus,
    pub reported_status: String,
    pub detail: String,
    pub source: StatusSource,
}
