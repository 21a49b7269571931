use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{Rupiah, Wallet};

pub async fn fetch_wallet(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, sqlx::Error> {
    let wallet =
        sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(wallet)
}

pub async fn wallet_exists(user_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM wallets WHERE user_id = $1").bind(user_id).fetch_one(conn).await?;
    Ok(count > 0)
}

/// Fetches the wallet for the user, creating an empty one if it does not exist yet.
pub async fn fetch_or_create_wallet(
    user_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, sqlx::Error> {
    let inserted = sqlx::query(
        r#"
            INSERT INTO wallets (user_id, balance, version, created_at, updated_at)
            VALUES ($1, 0, 0, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    if inserted.rows_affected() > 0 {
        trace!("💰️ Created wallet for user {user_id}");
    }
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1").bind(user_id).fetch_one(conn).await?;
    Ok(wallet)
}

/// Sets the balance and bumps the version, provided the wallet is still at `expected_version`.
///
/// Returns the updated wallet, or `None` if another transaction got there first.
pub async fn update_balance(
    user_id: i64,
    new_balance: Rupiah,
    expected_version: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, sqlx::Error> {
    let wallet = sqlx::query_as(
        r#"
            UPDATE wallets SET balance = $1, version = version + 1, updated_at = $2
            WHERE user_id = $3 AND version = $4
            RETURNING *
        "#,
    )
    .bind(new_balance)
    .bind(now)
    .bind(user_id)
    .bind(expected_version)
    .fetch_optional(conn)
    .await?;
    Ok(wallet)
}
