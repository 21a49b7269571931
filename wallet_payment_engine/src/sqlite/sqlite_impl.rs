//! `SqliteDatabase` is a concrete implementation of a wallet payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! Every balance-affecting call runs in its own transaction and is retried according to the configured
//! [`RetryPolicy`] when it loses a race with another writer.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{anomalies, audit, db_url, intents, ledger, new_pool, wallets};
use crate::{
    db_types::{
        Anomaly,
        AuditAction,
        AuditContext,
        AuditQuery,
        AuditRecord,
        IntentStatus,
        LedgerEntry,
        LedgerEntryKind,
        LedgerQuery,
        NewAnomaly,
        NewLedgerEntry,
        NewPaymentIntent,
        OrderId,
        Page,
        PaymentIntent,
        Reference,
        Rupiah,
        Wallet,
    },
    helpers::RetryPolicy,
    traits::{
        AnomalyRecord,
        AuditLog,
        AuditLogError,
        CloseResult,
        LedgerError,
        LedgerManagement,
        PaymentIntentError,
        PaymentIntentManagement,
        SettleResult,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool, retry: RetryPolicy::default() })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }

    async fn try_apply_entry(&self, entry: &NewLedgerEntry, ctx: &AuditContext) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let saved = ledger::apply_entry(entry, ctx, &mut tx).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn try_settle(&self, order_id: &OrderId, source: &str) -> Result<SettleResult, PaymentIntentError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let intent = match intents::transition_from_pending(order_id, IntentStatus::Settlement, now, &mut tx).await? {
            Some(intent) => intent,
            None => {
                let existing = terminal_intent(order_id, &mut tx).await?;
                trace!("🗃️ Intent [{order_id}] is already {}. Settlement skipped", existing.status);
                return Ok(SettleResult::AlreadyTerminal(existing));
            },
        };
        let entry = NewLedgerEntry::new(
            intent.user_id,
            LedgerEntryKind::Topup,
            intent.gross_amount,
            Reference::Order(intent.order_id.clone()),
            format!("Wallet top-up via {} ({})", intent.provider, intent.provider_method),
        );
        let ctx = AuditContext::system(source, AuditAction::GatewaySettlement);
        let entry = ledger::apply_entry(&entry, &ctx, &mut tx).await?;
        let intent = intents::link_ledger_entry(order_id, entry.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Intent [{order_id}] settled. Ledger entry #{} credited {}", entry.id, entry.amount);
        Ok(SettleResult::Settled { intent, entry })
    }

    async fn try_close(&self, order_id: &OrderId, status: IntentStatus) -> Result<CloseResult, PaymentIntentError> {
        let mut conn = self.pool.acquire().await?;
        match intents::transition_from_pending(order_id, status, Utc::now(), &mut conn).await? {
            Some(intent) => Ok(CloseResult::Closed(intent)),
            None => Ok(CloseResult::AlreadyTerminal(terminal_intent(order_id, &mut conn).await?)),
        }
    }

    async fn try_insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, PaymentIntentError> {
        let mut conn = self.pool.acquire().await?;
        intents::insert_intent(intent, &mut conn).await
    }

    async fn try_fetch_intent(&self, order_id: &OrderId) -> Result<Option<PaymentIntent>, PaymentIntentError> {
        let mut conn = self.pool.acquire().await?;
        read_intent(order_id, &mut conn).await
    }

    async fn try_attach_reference(
        &self,
        order_id: &OrderId,
        reference: &str,
    ) -> Result<PaymentIntent, PaymentIntentError> {
        let mut conn = self.pool.acquire().await?;
        match intents::attach_provider_reference(order_id, reference, &mut conn).await? {
            Some(intent) => Ok(intent),
            None => {
                let exists = intents::intent_exists(order_id, &mut conn).await?;
                confirm_missing(exists, &format!("payment intent {order_id}"))?;
                Err(PaymentIntentError::IntentNotFound(order_id.clone()))
            },
        }
    }

    async fn try_resolve_anomaly(&self, id: i64, admin_id: i64) -> Result<Anomaly, PaymentIntentError> {
        let mut conn = self.pool.acquire().await?;
        match anomalies::resolve_anomaly(id, admin_id, &mut conn).await? {
            Some(anomaly) => Ok(anomaly),
            None => {
                let exists = anomalies::anomaly_exists(id, &mut conn).await?;
                confirm_missing(exists, &format!("anomaly #{id}"))?;
                Err(PaymentIntentError::AnomalyNotFound(id))
            },
        }
    }

    async fn try_record_anomaly(&self, anomaly: &NewAnomaly) -> Result<AnomalyRecord, PaymentIntentError> {
        let mut tx = self.pool.begin().await?;
        let record = match anomalies::insert_anomaly(anomaly, &mut tx).await? {
            Some(saved) => AnomalyRecord::Recorded(saved),
            None => AnomalyRecord::AlreadyOpen(anomalies::fetch_open_anomaly(anomaly, &mut tx).await?),
        };
        tx.commit().await?;
        Ok(record)
    }

    async fn try_fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(wallet) = wallets::fetch_wallet(user_id, &mut conn).await? {
            return Ok(Some(wallet));
        }
        let exists = wallets::wallet_exists(user_id, &mut conn).await?;
        confirm_missing(exists, &format!("the wallet for user {user_id}"))?;
        Ok(None)
    }

    async fn try_fetch_ledger_page(
        &self,
        user_id: i64,
        query: &LedgerQuery,
    ) -> Result<Page<LedgerEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let page = ledger::fetch_ledger_page(user_id, query.clone(), &mut conn).await?;
        Ok(page)
    }

    async fn try_ledger_sum(&self, user_id: i64) -> Result<Rupiah, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let sum = ledger::ledger_sum(user_id, &mut conn).await?;
        Ok(sum)
    }
}

/// An empty `fetch_optional` is only a real miss if the row is not there. SQLite can cut a read short under write
/// load and the driver reports that as "no rows", so a row that turns up on a second look means the first read was
/// interrupted.
fn confirm_missing(exists: bool, what: &str) -> Result<(), LedgerError> {
    if exists {
        debug!("🗃️ The read of {what} came back empty but the row exists. Treating it as contention");
        Err(LedgerError::StorageBusy)
    } else {
        Ok(())
    }
}

async fn read_intent(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, PaymentIntentError> {
    if let Some(intent) = intents::fetch_intent(order_id, conn).await? {
        return Ok(Some(intent));
    }
    let exists = intents::intent_exists(order_id, conn).await?;
    confirm_missing(exists, &format!("payment intent {order_id}"))?;
    Ok(None)
}

/// Fetches the intent after a guarded transition matched nothing. The intent must exist and must have left `PENDING`;
/// a `PENDING` intent here means the update itself was cut short and has to be tried again.
async fn terminal_intent(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, PaymentIntentError> {
    let intent =
        read_intent(order_id, conn).await?.ok_or_else(|| PaymentIntentError::IntentNotFound(order_id.clone()))?;
    if intent.status.is_terminal() {
        Ok(intent)
    } else {
        debug!("🗃️ The transition of [{order_id}] matched nothing while it is still {}. Retrying", intent.status);
        Err(LedgerError::StorageBusy.into())
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn apply_ledger_entry(&self, entry: NewLedgerEntry, audit: AuditContext) -> Result<LedgerEntry, LedgerError> {
        entry.validate()?;
        let label = format!("ledger entry for user {}", entry.user_id);
        let saved = self.retry.run(&label, |_| self.try_apply_entry(&entry, &audit)).await?;
        debug!(
            "🗃️ {} of {} applied for user {} by {}. Balance is now {}",
            saved.kind, saved.amount, saved.user_id, audit.actor, saved.balance_after
        );
        Ok(saved)
    }

    async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, LedgerError> {
        let label = format!("wallet read for user {user_id}");
        self.retry.run(&label, |_| self.try_fetch_wallet(user_id)).await
    }

    async fn fetch_ledger_page(&self, user_id: i64, query: LedgerQuery) -> Result<Page<LedgerEntry>, LedgerError> {
        let label = format!("ledger page for user {user_id}");
        self.retry.run(&label, |_| self.try_fetch_ledger_page(user_id, &query)).await
    }

    async fn ledger_sum(&self, user_id: i64) -> Result<Rupiah, LedgerError> {
        let label = format!("ledger sum for user {user_id}");
        self.retry.run(&label, |_| self.try_ledger_sum(user_id)).await
    }
}

impl PaymentIntentManagement for SqliteDatabase {
    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, PaymentIntentError> {
        let label = format!("new intent {}", intent.order_id);
        self.retry.run(&label, |_| self.try_insert_intent(intent.clone())).await
    }

    async fn fetch_intent(&self, order_id: &OrderId) -> Result<Option<PaymentIntent>, PaymentIntentError> {
        let label = format!("lookup of {order_id}");
        self.retry.run(&label, |_| self.try_fetch_intent(order_id)).await
    }

    async fn attach_provider_reference(
        &self,
        order_id: &OrderId,
        reference: &str,
    ) -> Result<PaymentIntent, PaymentIntentError> {
        let label = format!("provider reference for {order_id}");
        self.retry.run(&label, |_| self.try_attach_reference(order_id, reference)).await
    }

    async fn settle_intent(&self, order_id: &OrderId, source: &str) -> Result<SettleResult, PaymentIntentError> {
        let label = format!("settlement of {order_id}");
        self.retry.run(&label, |_| self.try_settle(order_id, source)).await
    }

    async fn close_intent(&self, order_id: &OrderId, status: IntentStatus) -> Result<CloseResult, PaymentIntentError> {
        if matches!(status, IntentStatus::Pending | IntentStatus::Settlement) {
            return Err(PaymentIntentError::InvalidClosingStatus(status));
        }
        let label = format!("closing {order_id} as {status}");
        let result = self.retry.run(&label, |_| self.try_close(order_id, status)).await?;
        if let CloseResult::Closed(intent) = &result {
            debug!("🗃️ Intent [{order_id}] closed as {}", intent.status);
        }
        Ok(result)
    }

    async fn fetch_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentIntent>, PaymentIntentError> {
        let mut conn = self.pool.acquire().await?;
        let intents = intents::fetch_stale_pending(created_before, limit, &mut conn).await?;
        Ok(intents)
    }

    async fn record_anomaly(&self, anomaly: NewAnomaly) -> Result<AnomalyRecord, PaymentIntentError> {
        let label = format!("anomaly for {}", anomaly.order_id);
        self.retry.run(&label, |_| self.try_record_anomaly(&anomaly)).await
    }

    async fn fetch_anomalies(&self, unresolved_only: bool) -> Result<Vec<Anomaly>, PaymentIntentError> {
        let mut conn = self.pool.acquire().await?;
        let result = anomalies::fetch_anomalies(unresolved_only, &mut conn).await?;
        Ok(result)
    }

    async fn resolve_anomaly(&self, id: i64, admin_id: i64) -> Result<Anomaly, PaymentIntentError> {
        let label = format!("resolving anomaly #{id}");
        self.retry.run(&label, |_| self.try_resolve_anomaly(id, admin_id)).await
    }
}

impl AuditLog for SqliteDatabase {
    async fn fetch_audit_records(&self, query: AuditQuery) -> Result<Page<AuditRecord>, AuditLogError> {
        let mut conn = self.pool.acquire().await?;
        let page = audit::search_audit_records(query, &mut conn).await?;
        Ok(page)
    }
}
