use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{AuditContext, LedgerEntry, LedgerQuery, NewLedgerEntry, Page, Rupiah},
    sqlite::db::{audit, wallets},
    traits::LedgerError,
};

/// Applies a ledger entry using the given connection. This is not atomic on its own: call it inside a transaction
/// (passing `&mut *tx`) so that the entry, the wallet update and the audit record commit together.
///
/// 1. Reads the wallet, creating it if necessary.
/// 2. Computes the new balance and rejects the entry if it would be negative.
/// 3. Inserts the entry with its `balance_after`.
/// 4. Updates the wallet, guarded by the version read in step 1.
/// 5. Inserts the audit record.
pub async fn apply_entry(
    entry: &NewLedgerEntry,
    audit_ctx: &AuditContext,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, LedgerError> {
    entry.validate()?;
    let now = Utc::now();
    let user_id = entry.user_id;
    let wallet = wallets::fetch_or_create_wallet(user_id, now, conn).await?;
    let new_balance = wallet
        .balance
        .checked_add(entry.amount)
        .ok_or(LedgerError::BalanceOverflow { user_id, amount: entry.amount })?;
    if new_balance.is_negative() {
        debug!("💰️ Rejected {} of {} for user {user_id}. Balance is {}", entry.kind, entry.amount, wallet.balance);
        return Err(LedgerError::InsufficientBalance {
            user_id,
            balance: wallet.balance,
            attempted: entry.amount,
            would_be: new_balance,
        });
    }
    let saved = insert_entry(entry, new_balance, now, conn).await?;
    trace!("💰️ Ledger entry #{} inserted for user {user_id}", saved.id);
    wallets::update_balance(user_id, new_balance, wallet.version, now, conn)
        .await?
        .ok_or(LedgerError::VersionConflict(user_id))?;
    audit::insert_audit_record(audit_ctx, &saved, wallet.balance, now, conn).await?;
    Ok(saved)
}

async fn insert_entry(
    entry: &NewLedgerEntry,
    balance_after: Rupiah,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, sqlx::Error> {
    let saved = sqlx::query_as(
        r#"
            INSERT INTO ledger_entries (
                user_id,
                kind,
                amount,
                balance_after,
                reference_type,
                reference_value,
                description,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.kind)
    .bind(entry.amount)
    .bind(balance_after)
    .bind(entry.reference.type_code())
    .bind(entry.reference.value())
    .bind(entry.description.trim())
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(saved)
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, user_id: i64, query: &LedgerQuery) {
    builder.push(" WHERE user_id = ");
    builder.push_bind(user_id);
    if let Some(kind) = query.kind {
        builder.push(" AND kind = ");
        builder.push_bind(kind);
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{search}%");
        builder.push(" AND (description LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR reference_value LIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

/// Fetches one page of the user's ledger according to the `LedgerQuery`, newest entries first.
pub async fn fetch_ledger_page(
    user_id: i64,
    query: LedgerQuery,
    conn: &mut SqliteConnection,
) -> Result<Page<LedgerEntry>, sqlx::Error> {
    let query = query.normalized();
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM ledger_entries");
    push_filters(&mut count, user_id, &query);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM ledger_entries");
    push_filters(&mut builder, user_id, &query);
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(query.per_page);
    builder.push(" OFFSET ");
    builder.push_bind(query.offset());
    trace!("💰️ Executing query: {}", builder.sql());
    let entries = builder.build_query_as::<LedgerEntry>().fetch_all(conn).await?;
    let expected = (total - query.offset()).clamp(0, query.per_page);
    if entries.len() as i64 != expected {
        debug!("💰️ Ledger page for user {user_id} came back with {} of {expected} rows", entries.len());
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(Page::new(entries, total, query.per_page))
}

pub async fn ledger_sum(user_id: i64, conn: &mut SqliteConnection) -> Result<Rupiah, sqlx::Error> {
    let sum: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok(Rupiah::from(sum))
}
