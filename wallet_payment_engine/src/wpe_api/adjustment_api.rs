use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{AuditAction, AuditContext, LedgerEntry, LedgerEntryKind, NewLedgerEntry, Reference, Rupiah},
    events::{EventProducers, LedgerEntryCreatedEvent},
    helpers::{generate_admin_reference, validate_manual_reference, AdminReferenceKind},
    traits::LedgerManagement,
    wpe_api::errors::AdjustmentError,
};

/// The admin performing a balance change, as recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminActor {
    pub admin_id: i64,
    pub ip_address: Option<String>,
}

impl AdminActor {
    pub fn new(admin_id: i64, ip_address: Option<String>) -> Self {
        Self { admin_id, ip_address }
    }
}

/// `AdjustmentApi` handles manual top-ups and signed balance adjustments made by admins.
///
/// Every call writes exactly one ledger entry and its audit record, or nothing at all.
pub struct AdjustmentApi<B> {
    db: B,
    producers: EventProducers,
    clock: Clock,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

impl<B> Debug for AdjustmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdjustmentApi")
    }
}

impl<B> AdjustmentApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, clock: Arc::new(Utc::now) }
    }

    /// Replaces the clock used to date generated references.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where F: Fn() -> DateTime<Utc> + Send + Sync + 'static {
        self.clock = Arc::new(clock);
        self
    }

    fn resolve_reference(&self, reference: Option<&str>, kind: AdminReferenceKind) -> Result<String, AdjustmentError> {
        match reference.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => Ok(validate_manual_reference(r)?),
            None => Ok(generate_admin_reference(kind, (self.clock)())),
        }
    }
}

fn require_reason(reason: &str) -> Result<&str, AdjustmentError> {
    let reason = reason.trim();
    if reason.is_empty() {
        Err(AdjustmentError::MissingReason)
    } else {
        Ok(reason)
    }
}

impl<B> AdjustmentApi<B>
where B: LedgerManagement
{
    /// Credits `amount` to the user's wallet as a TOPUP entry. Without a reference, one of the form
    /// `TOPUP-YYYYMMDD-XXXXXX` is generated.
    pub async fn manual_top_up(
        &self,
        admin: &AdminActor,
        user_id: i64,
        amount: Rupiah,
        description: &str,
        reference: Option<&str>,
    ) -> Result<LedgerEntry, AdjustmentError> {
        let description = require_reason(description)?;
        if !amount.is_positive() {
            return Err(AdjustmentError::NonPositiveAmount(amount));
        }
        let reference = self.resolve_reference(reference, AdminReferenceKind::TopUp)?;
        let entry = NewLedgerEntry::new(user_id, LedgerEntryKind::Topup, amount, Reference::Admin(reference), description);
        let ctx = AuditContext::admin(admin.admin_id, AuditAction::ManualTopUp, admin.ip_address.clone());
        let saved = self.db.apply_ledger_entry(entry, ctx).await?;
        info!(
            "🛡️ Admin #{} topped up {amount} for user {user_id} ({}). Balance is now {}",
            admin.admin_id, saved.reference, saved.balance_after
        );
        self.notify(&saved).await;
        Ok(saved)
    }

    /// Applies a signed ADJUST entry. Negative adjustments are checked against the current balance before anything
    /// is written; the ledger re-checks inside its transaction.
    pub async fn adjust_balance(
        &self,
        admin: &AdminActor,
        user_id: i64,
        amount: Rupiah,
        reason: &str,
        reference: Option<&str>,
    ) -> Result<LedgerEntry, AdjustmentError> {
        let reason = require_reason(reason)?;
        if amount.is_zero() {
            return Err(AdjustmentError::ZeroAmount);
        }
        let kind = if amount.is_negative() { AdminReferenceKind::Deduct } else { AdminReferenceKind::Add };
        let reference = self.resolve_reference(reference, kind)?;
        if amount.is_negative() {
            let balance = self.db.fetch_wallet(user_id).await?.map(|w| w.balance).unwrap_or_default();
            let would_be = balance + amount;
            if would_be.is_negative() {
                warn!("🛡️ Admin #{} tried to deduct {amount} from user {user_id}, who only has {balance}", admin.admin_id);
                return Err(AdjustmentError::InsufficientBalance { user_id, balance, attempted: amount, would_be });
            }
        }
        let entry = NewLedgerEntry::new(user_id, LedgerEntryKind::Adjust, amount, Reference::Admin(reference), reason);
        let ctx = AuditContext::admin(admin.admin_id, AuditAction::BalanceAdjustment, admin.ip_address.clone());
        let saved = self.db.apply_ledger_entry(entry, ctx).await?;
        info!(
            "🛡️ Admin #{} adjusted the balance of user {user_id} by {amount} ({}). Balance is now {}",
            admin.admin_id, saved.reference, saved.balance_after
        );
        self.notify(&saved).await;
        Ok(saved)
    }

    async fn notify(&self, entry: &LedgerEntry) {
        self.producers.publish_ledger_entry(LedgerEntryCreatedEvent::new(entry.clone())).await;
    }
}
