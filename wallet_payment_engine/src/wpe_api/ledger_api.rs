use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        AuditAction,
        AuditContext,
        LedgerEntry,
        LedgerEntryKind,
        LedgerQuery,
        NewLedgerEntry,
        OrderId,
        Page,
        Reference,
        Rupiah,
        Wallet,
    },
    events::{EventProducers, LedgerEntryCreatedEvent},
    traits::{LedgerError, LedgerManagement},
    wpe_api::ledger_objects::{IntegrityReport, WalletOverview, WalletSummary},
};

/// The audit source recorded for debits coming from the checkout module.
pub const CHECKOUT_SOURCE: &str = "checkout";

/// `LedgerApi` covers the wallet read views and the purchase debit and refund paths.
pub struct LedgerApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    /// The balance and last update time for the user. Users without a wallet get a zero balance; no wallet is
    /// created by this call.
    pub async fn wallet_summary(&self, user_id: i64) -> Result<WalletSummary, LedgerError> {
        let summary = self.db.fetch_wallet(user_id).await?.map(WalletSummary::from).unwrap_or_else(WalletSummary::empty);
        Ok(summary)
    }

    pub async fn wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError> {
        self.db.fetch_wallet(user_id).await
    }

    /// The wallet together with its integrity report, for the admin views.
    pub async fn wallet_overview(&self, user_id: i64) -> Result<WalletOverview, LedgerError> {
        let wallet = self.db.fetch_wallet(user_id).await?;
        let integrity = self.verify_integrity(user_id).await?;
        Ok(WalletOverview { wallet, integrity })
    }

    pub async fn ledger_page(&self, user_id: i64, query: LedgerQuery) -> Result<Page<LedgerEntry>, LedgerError> {
        self.db.fetch_ledger_page(user_id, query.normalized()).await
    }

    /// Debits `amount` from the user's wallet for a checkout order. `amount` is the positive price; the entry stores
    /// it negated. Every call writes a new entry: de-duplicating orders is the caller's job.
    pub async fn debit_for_purchase(
        &self,
        user_id: i64,
        amount: Rupiah,
        order_id: OrderId,
    ) -> Result<LedgerEntry, LedgerError> {
        trace!("💰️ Debiting {amount} from user {user_id} for order {order_id}");
        let entry = NewLedgerEntry::new(
            user_id,
            LedgerEntryKind::Debit,
            -amount,
            Reference::Order(order_id.clone()),
            format!("Purchase for order {order_id}"),
        );
        let ctx = AuditContext::system(CHECKOUT_SOURCE, AuditAction::PurchaseDebit);
        let saved = self.db.apply_ledger_entry(entry, ctx).await?;
        info!("💰️ User {user_id} paid {amount} for order {order_id}. Balance is now {}", saved.balance_after);
        self.notify(&saved).await;
        Ok(saved)
    }

    /// Credits a purchase back to the user's wallet as a REFUND entry, on behalf of an admin.
    pub async fn refund_purchase(
        &self,
        admin_id: i64,
        ip_address: Option<String>,
        user_id: i64,
        amount: Rupiah,
        order_id: OrderId,
        reason: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let entry = NewLedgerEntry::new(
            user_id,
            LedgerEntryKind::Refund,
            amount,
            Reference::Order(order_id.clone()),
            reason.trim(),
        );
        let ctx = AuditContext::admin(admin_id, AuditAction::PurchaseRefund, ip_address);
        let saved = self.db.apply_ledger_entry(entry, ctx).await?;
        info!("🛡️ Admin #{admin_id} refunded {amount} to user {user_id} for order {order_id}");
        self.notify(&saved).await;
        Ok(saved)
    }

    /// Compares the cached balance with the ledger sum. A user without a wallet is consistent if the ledger is
    /// empty too.
    pub async fn verify_integrity(&self, user_id: i64) -> Result<IntegrityReport, LedgerError> {
        let balance = self.db.fetch_wallet(user_id).await?.map(|w| w.balance).unwrap_or_default();
        let ledger_sum = self.db.ledger_sum(user_id).await?;
        let consistent = balance == ledger_sum;
        if !consistent {
            error!("💰️ Wallet for user {user_id} is inconsistent. Balance is {balance} but the ledger sums to {ledger_sum}");
        }
        Ok(IntegrityReport { user_id, balance, ledger_sum, consistent })
    }

    async fn notify(&self, entry: &LedgerEntry) {
        self.producers.publish_ledger_entry(LedgerEntryCreatedEvent::new(entry.clone())).await;
    }
}
