use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{IntentStatus, NewPaymentIntent, OrderId, PaymentIntent},
    traits::PaymentIntentError,
};

/// Inserts a new intent in the `PENDING` state. Fails with `DuplicateOrderId` if the order id is taken.
pub async fn insert_intent(
    intent: NewPaymentIntent,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, PaymentIntentError> {
    let now = Utc::now();
    let result = sqlx::query_as(
        r#"
            INSERT INTO payment_intents (
                order_id,
                user_id,
                gross_amount,
                provider,
                provider_method,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $6)
            RETURNING *;
        "#,
    )
    .bind(intent.order_id.as_str())
    .bind(intent.user_id)
    .bind(intent.gross_amount)
    .bind(intent.provider)
    .bind(intent.provider_method.as_str())
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(saved) => {
            debug!("📝️ Payment intent [{}] inserted for user {}", intent.order_id, intent.user_id);
            Ok(saved)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(PaymentIntentError::DuplicateOrderId(intent.order_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_intent(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<PaymentIntent>, sqlx::Error> {
    let intent = sqlx::query_as("SELECT * FROM payment_intents WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(intent)
}

/// `COUNT(*)` always yields a row, so unlike [`fetch_intent`] this can not mistake an interrupted read for a miss.
pub async fn intent_exists(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_intents WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

pub async fn attach_provider_reference(
    order_id: &OrderId,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, sqlx::Error> {
    let intent = sqlx::query_as(
        "UPDATE payment_intents SET provider_reference = $1, updated_at = $2 WHERE order_id = $3 RETURNING *",
    )
    .bind(reference)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(intent)
}

/// Moves a `PENDING` intent to `new_status`. Returns `None` if the intent does not exist or has already left
/// `PENDING`, in which case nothing was changed.
pub async fn transition_from_pending(
    order_id: &OrderId,
    new_status: IntentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, sqlx::Error> {
    let settled_at = (new_status == IntentStatus::Settlement).then_some(now);
    let intent = sqlx::query_as(
        r#"
            UPDATE payment_intents SET status = $1, updated_at = $2, settled_at = $3
            WHERE order_id = $4 AND status = 'PENDING'
            RETURNING *
        "#,
    )
    .bind(new_status)
    .bind(now)
    .bind(settled_at)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(intent)
}

pub async fn link_ledger_entry(
    order_id: &OrderId,
    ledger_entry_id: i64,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, sqlx::Error> {
    let intent = sqlx::query_as(
        "UPDATE payment_intents SET ledger_entry_id = $1 WHERE order_id = $2 AND ledger_entry_id IS NULL RETURNING *",
    )
    .bind(ledger_entry_id)
    .bind(order_id.as_str())
    .fetch_one(conn)
    .await?;
    Ok(intent)
}

/// `PENDING` intents created before `created_before`, oldest first.
pub async fn fetch_stale_pending(
    created_before: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, sqlx::Error> {
    let intents = sqlx::query_as(
        r#"
            SELECT * FROM payment_intents
            WHERE status = 'PENDING' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
        "#,
    )
    .bind(created_before)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(intents)
}
