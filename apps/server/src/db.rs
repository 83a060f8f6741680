use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::auth;
use crate::models::ROLE_OWNER;

const MIGRATIONS: &[(&str, &str)] = &[("001_init", include_str!("../migrations/001_init.sql"))];

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // WAL keeps readers unblocked while a booking write holds the lock
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    for (name, sql) in MIGRATIONS {
        let applied: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?")
                .bind(name)
                .fetch_one(pool)
                .await?;
        if applied {
            continue;
        }
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(pool).await.ok();
            }
        }
        sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await?;
        tracing::info!("Applied migration: {}", name);
    }

    tracing::info!("Database migrations up to date");
    Ok(())
}

/// Ensure the owner account exists and carries the hash of the token
/// configured in the environment. Returns the owner's user id; online
/// bookings are attached to this account.
pub async fn seed_owner(pool: &SqlitePool, admin_token: &str) -> anyhow::Result<i64> {
    let token_hash = auth::hash_token(admin_token);

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE role = ? ORDER BY id LIMIT 1")
            .bind(ROLE_OWNER)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some(id) => {
            sqlx::query("UPDATE users SET token_hash = ?, is_active = 1 WHERE id = ?")
                .bind(&token_hash)
                .bind(id)
                .execute(pool)
                .await?;
            Ok(id)
        }
        None => {
            let result = sqlx::query(
                "INSERT INTO users (username, display_name, token_hash, role) VALUES (?, ?, ?, ?)",
            )
            .bind("owner")
            .bind("Owner")
            .bind(&token_hash)
            .bind(ROLE_OWNER)
            .execute(pool)
            .await?;
            tracing::info!("Seeded owner account");
            Ok(result.last_insert_rowid())
        }
    }
}

// ── Write transactions ──
// sqlx's pool transactions BEGIN deferred, which lets two bookings
// read the same free slot before either takes the write lock. Booking
// writes instead run on one connection under an explicit
// BEGIN IMMEDIATE, so the conflict re-check happens after the lock is
// held.

/// Acquire a connection and open an immediate write transaction on it.
/// The caller must finish with [`commit`] or [`rollback`] before the
/// connection drops back to the pool.
pub async fn begin_immediate(pool: &SqlitePool) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

pub async fn commit(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
        let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
        return Err(e);
    }
    Ok(())
}

pub async fn rollback(conn: &mut SqliteConnection) {
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        tracing::error!("rollback failed: {}", e);
    }
}
