//! Versioned schema migrations for the resonance store.
//!
//! Migrations are a numbered list applied in order under
//! `PRAGMA user_version`. A store created before versioning existed reports
//! `user_version = 0` even though its tables are populated, so [`run_migrations`]
//! first *detects* the effective version by column presence (`hash` → v2,
//! `hash` + `meta` → v3) and only applies what is missing. A failed
//! migration aborts the open; the store is never used at a partial version.
//!
//! # Schema (v3)
//!
//! ```text
//! ┌───────────────┐      ┌───────────────┐      ┌───────────────┐
//! │    nodes      │      │    edges      │      │   nodes_fts   │
//! │               │      │               │      │   (FTS5)      │
//! │ id (PK)       │──┐   │ source ─┐     │      │ id UNINDEXED  │
//! │ type          │  └───│ target ─┴ PK  │      │ title         │
//! │ title         │      │ type   ─┘     │      │ content       │
//! │ content       │      └───────────────┘      │ meta          │
//! │ domain        │                             └───────────────┘
//! │ layer         │       synchronized by INSERT/UPDATE/DELETE
//! │ embedding BLOB│       triggers on nodes (porter tokenizer)
//! │ hash     (v2) │
//! │ meta     (v3) │
//! └───────────────┘
//! ```

use anyhow::{Context, Result};
use sqlx::SqlitePool;

/// Highest migration this build knows about.
pub const SCHEMA_VERSION: i64 = 3;

struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

/// v1 — base tables, edge indexes, FTS index over (title, content), and the
/// triggers that keep it in bijection with `nodes`.
const V1: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS nodes (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        title TEXT,
        content TEXT,
        domain TEXT NOT NULL,
        layer TEXT NOT NULL,
        embedding BLOB
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS edges (
        source TEXT NOT NULL,
        target TEXT NOT NULL,
        type TEXT NOT NULL,
        PRIMARY KEY (source, target, type)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target)",
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS nodes_fts USING fts5(
        id UNINDEXED,
        title,
        content,
        tokenize='porter'
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS nodes_fts_ai AFTER INSERT ON nodes BEGIN
        INSERT INTO nodes_fts(rowid, id, title, content)
        VALUES (new.rowid, new.id, new.title, new.content);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS nodes_fts_ad AFTER DELETE ON nodes BEGIN
        DELETE FROM nodes_fts WHERE rowid = old.rowid;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS nodes_fts_au AFTER UPDATE ON nodes BEGIN
        DELETE FROM nodes_fts WHERE rowid = old.rowid;
        INSERT INTO nodes_fts(rowid, id, title, content)
        VALUES (new.rowid, new.id, new.title, new.content);
    END
    "#,
];

/// v2 — content hash for idempotent re-ingest.
const V2: &[&str] = &["ALTER TABLE nodes ADD COLUMN hash TEXT"];

/// v3 — opaque meta bag, folded into the FTS index. The virtual table is
/// rebuilt because FTS5 columns cannot be altered in place.
const V3: &[&str] = &[
    "ALTER TABLE nodes ADD COLUMN meta TEXT NOT NULL DEFAULT '{}'",
    "DROP TRIGGER IF EXISTS nodes_fts_ai",
    "DROP TRIGGER IF EXISTS nodes_fts_ad",
    "DROP TRIGGER IF EXISTS nodes_fts_au",
    "DROP TABLE IF EXISTS nodes_fts",
    r#"
    CREATE VIRTUAL TABLE nodes_fts USING fts5(
        id UNINDEXED,
        title,
        content,
        meta,
        tokenize='porter'
    )
    "#,
    r#"
    CREATE TRIGGER nodes_fts_ai AFTER INSERT ON nodes BEGIN
        INSERT INTO nodes_fts(rowid, id, title, content, meta)
        VALUES (new.rowid, new.id, new.title, new.content, new.meta);
    END
    "#,
    r#"
    CREATE TRIGGER nodes_fts_ad AFTER DELETE ON nodes BEGIN
        DELETE FROM nodes_fts WHERE rowid = old.rowid;
    END
    "#,
    r#"
    CREATE TRIGGER nodes_fts_au AFTER UPDATE ON nodes BEGIN
        DELETE FROM nodes_fts WHERE rowid = old.rowid;
        INSERT INTO nodes_fts(rowid, id, title, content, meta)
        VALUES (new.rowid, new.id, new.title, new.content, new.meta);
    END
    "#,
    r#"
    INSERT INTO nodes_fts(rowid, id, title, content, meta)
    SELECT rowid, id, title, content, meta FROM nodes
    "#,
];

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        statements: V1,
    },
    Migration {
        version: 2,
        statements: V2,
    },
    Migration {
        version: 3,
        statements: V3,
    },
];

/// Apply missing migrations and return the resulting schema version.
pub async fn run_migrations(pool: &SqlitePool) -> Result<i64> {
    let mut current = detect_version(pool).await?;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }

        let mut tx = pool.begin().await?;
        for stmt in migration.statements {
            sqlx::query(stmt)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration v{} failed", migration.version))?;
        }
        sqlx::query(&format!("PRAGMA user_version = {}", migration.version))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        current = migration.version;
    }

    Ok(current)
}

/// Effective schema version: `user_version` when set, otherwise inferred
/// from column presence on pre-versioning stores.
async fn detect_version(pool: &SqlitePool) -> Result<i64> {
    let user_version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    if user_version > 0 {
        return Ok(user_version);
    }

    let nodes_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'nodes'",
    )
    .fetch_one(pool)
    .await?;
    if !nodes_exists {
        return Ok(0);
    }

    let has_meta: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM pragma_table_info('nodes') WHERE name = 'meta'")
            .fetch_one(pool)
            .await?;
    if has_meta {
        return Ok(3);
    }

    let has_hash: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM pragma_table_info('nodes') WHERE name = 'hash'")
            .fetch_one(pool)
            .await?;
    if has_hash {
        return Ok(2);
    }

    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn migrates_fresh_store_to_latest() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect(&dir.path().join("fresh.db")).await.unwrap();

        let version = run_migrations(&pool).await.unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let user_version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(user_version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn second_open_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.db");

        let pool = db::connect(&path).await.unwrap();
        run_migrations(&pool).await.unwrap();
        sqlx::query("INSERT INTO nodes (id, type, domain, layer) VALUES ('n1', 'note', 'experience', 'note')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let pool = db::connect(&path).await.unwrap();
        let version = run_migrations(&pool).await.unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn detects_legacy_v2_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");

        // A pre-versioning store: v2 columns present, user_version never set.
        let pool = db::connect(&path).await.unwrap();
        sqlx::query(
            r#"
            CREATE TABLE nodes (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                title TEXT,
                content TEXT,
                domain TEXT NOT NULL,
                layer TEXT NOT NULL,
                embedding BLOB,
                hash TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE edges (source TEXT NOT NULL, target TEXT NOT NULL, type TEXT NOT NULL, PRIMARY KEY (source, target, type))",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO nodes (id, type, domain, layer, hash) VALUES ('old', 'note', 'experience', 'note', 'abc')")
            .execute(&pool)
            .await
            .unwrap();

        let version = run_migrations(&pool).await.unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        // v3 added meta and rebuilt the FTS index over existing rows.
        let meta: String = sqlx::query_scalar("SELECT meta FROM nodes WHERE id = 'old'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(meta, "{}");

        let fts_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes_fts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fts_rows, 1);
    }
}
