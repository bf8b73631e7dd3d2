pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, TransactionBehavior};
use std::path::Path;

use crate::config::AdminConfig;
use crate::error::AppResult;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas that are per-connection must run on every pooled connection.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Runs `f` inside an immediate transaction. Returning an error from `f`
/// drops the transaction, which rolls every write back.
pub fn transaction<T>(
    pool: &DbPool,
    f: impl FnOnce(&Connection) -> AppResult<T>,
) -> AppResult<T> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Ensure the configured super-user association and its master account exist.
pub fn seed_admin(pool: &DbPool, admin: &AdminConfig, bcrypt_cost: u32) -> anyhow::Result<()> {
    use crate::db::models::AssociationInput;
    use crate::repo::{association_users, associations};

    let created = transaction(pool, |conn| {
        let existing: Option<crate::ids::ObjectId> = {
            use rusqlite::OptionalExtension;
            conn.query_row(
                "SELECT id FROM associations WHERE email = ?1 COLLATE NOCASE",
                params![admin.email],
                |row| row.get(0),
            )
            .optional()?
        };
        if existing.is_some() {
            return Ok(false);
        }

        let association = associations::create(
            conn,
            &AssociationInput {
                name: admin.name.clone(),
                email: admin.email.clone(),
                ..Default::default()
            },
        )?;
        association_users::create(conn, &association, &admin.password, true, None, bcrypt_cost)?;
        Ok(true)
    })?;

    if created {
        tracing::info!("Created admin association {}", admin.email);
    }
    Ok(())
}

/// Migrated pool on a throwaway file; keep the `TempDir` alive for the test.
#[cfg(test)]
pub(crate) fn test_pool() -> (DbPool, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let pool = create_pool(&tmp.path().join("test.db")).unwrap();
    run_migrations(&pool).unwrap();
    (pool, tmp)
}
