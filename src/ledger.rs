//! The locus ledger: idempotent mapping from content hash to stable locus id.
//!
//! The ledger is an append-only `(canon_hash → locus_id)` table in a side
//! file next to the resonance store. A hash observed for the first time
//! mints a fresh UUIDv4; the same hash always returns the same id for the
//! lifetime of the store, which is what keeps locus ids stable across
//! re-runs of the boxer.

use anyhow::Result;
use md5::{Digest, Md5};
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

/// MD5-hex of the trimmed text. This is the canonical content address used
/// by both the ledger and ingest change detection.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct LocusLedger {
    pool: SqlitePool,
}

impl LocusLedger {
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = crate::db::connect(path).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS locus_map (
                canon_hash TEXT PRIMARY KEY,
                locus_id TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Return the locus id for `canon_hash`, minting one on first
    /// observation. Safe under unique-key races: `INSERT OR IGNORE` followed
    /// by a re-read returns whichever writer won.
    pub async fn get_or_mint(&self, canon_hash: &str) -> Result<String> {
        if let Some(id) = self.lookup(canon_hash).await? {
            return Ok(id);
        }

        let fresh = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT OR IGNORE INTO locus_map (canon_hash, locus_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(canon_hash)
        .bind(&fresh)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let winner = self
            .lookup(canon_hash)
            .await?
            .expect("locus_map row must exist after insert");
        Ok(winner)
    }

    async fn lookup(&self, canon_hash: &str) -> Result<Option<String>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT locus_id FROM locus_map WHERE canon_hash = ?")
                .bind(canon_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
