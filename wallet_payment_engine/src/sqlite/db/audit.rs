use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{AuditContext, AuditQuery, AuditRecord, LedgerEntry, Page, Rupiah};

/// Writes the audit record for a ledger entry that was just inserted on the same connection.
pub async fn insert_audit_record(
    ctx: &AuditContext,
    entry: &LedgerEntry,
    before_balance: Rupiah,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<AuditRecord, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO audit_log (
                actor_type,
                actor_id,
                action,
                target_user_id,
                ledger_entry_id,
                before_balance,
                after_balance,
                ip_address,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(ctx.actor.type_code())
    .bind(ctx.actor.id_value())
    .bind(ctx.action)
    .bind(entry.user_id)
    .bind(entry.id)
    .bind(before_balance)
    .bind(entry.balance_after)
    .bind(ctx.ip_address.as_deref())
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(record)
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &AuditQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(user_id) = query.target_user_id {
        builder.push(" AND target_user_id = ");
        builder.push_bind(user_id);
    }
    if let Some(admin_id) = query.admin_id {
        builder.push(" AND actor_type = 'ADMIN' AND actor_id = ");
        builder.push_bind(admin_id.to_string());
    }
    if let Some(entry_id) = query.ledger_entry_id {
        builder.push(" AND ledger_entry_id = ");
        builder.push_bind(entry_id);
    }
}

/// Fetches audit records matching the `AuditQuery`, newest first.
pub async fn search_audit_records(
    query: AuditQuery,
    conn: &mut SqliteConnection,
) -> Result<Page<AuditRecord>, sqlx::Error> {
    let query = query.normalized();
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM audit_log");
    push_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM audit_log");
    push_filters(&mut builder, &query);
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(query.per_page);
    builder.push(" OFFSET ");
    builder.push_bind(query.offset());
    trace!("🗃️ Executing query: {}", builder.sql());
    let records = builder.build_query_as::<AuditRecord>().fetch_all(conn).await?;
    Ok(Page::new(records, total, query.per_page))
}
