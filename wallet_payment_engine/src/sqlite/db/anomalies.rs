use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{Anomaly, NewAnomaly};

/// Inserts the anomaly unless an unresolved one with the same order, kind and reported status exists. Returns `None`
/// in that case.
pub async fn insert_anomaly(anomaly: &NewAnomaly, conn: &mut SqliteConnection) -> Result<Option<Anomaly>, sqlx::Error> {
    let saved: Option<Anomaly> = sqlx::query_as(
        r#"
            INSERT INTO anomalies (
                order_id,
                provider,
                kind,
                stored_status,
                reported_status,
                detail,
                source,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(anomaly.order_id.as_str())
    .bind(anomaly.provider)
    .bind(anomaly.kind)
    .bind(anomaly.stored_status)
    .bind(anomaly.reported_status.as_str())
    .bind(anomaly.detail.as_str())
    .bind(anomaly.source)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?;
    if let Some(saved) = &saved {
        trace!("🗃️ Anomaly #{} recorded for order {}", saved.id, saved.order_id);
    }
    Ok(saved)
}

/// The unresolved anomaly matching the finding in `anomaly`.
pub async fn fetch_open_anomaly(anomaly: &NewAnomaly, conn: &mut SqliteConnection) -> Result<Anomaly, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM anomalies
            WHERE order_id = $1 AND kind = $2 AND reported_status = $3 AND resolved_at IS NULL
        "#,
    )
    .bind(anomaly.order_id.as_str())
    .bind(anomaly.kind)
    .bind(anomaly.reported_status.as_str())
    .fetch_one(conn)
    .await
}

pub async fn fetch_anomalies(unresolved_only: bool, conn: &mut SqliteConnection) -> Result<Vec<Anomaly>, sqlx::Error> {
    let sql = if unresolved_only {
        "SELECT * FROM anomalies WHERE resolved_at IS NULL ORDER BY id DESC"
    } else {
        "SELECT * FROM anomalies ORDER BY id DESC"
    };
    let anomalies = sqlx::query_as(sql).fetch_all(conn).await?;
    Ok(anomalies)
}

/// Stamps the resolution fields on an open anomaly. Already-resolved anomalies are left untouched.
pub async fn resolve_anomaly(
    id: i64,
    admin_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Anomaly>, sqlx::Error> {
    sqlx::query("UPDATE anomalies SET resolved_at = $1, resolved_by = $2 WHERE id = $3 AND resolved_at IS NULL")
        .bind(Utc::now())
        .bind(admin_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    let anomaly = sqlx::query_as("SELECT * FROM anomalies WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(anomaly)
}

pub async fn anomaly_exists(id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM anomalies WHERE id = $1").bind(id).fetch_one(conn).await?;
    Ok(count > 0)
}
