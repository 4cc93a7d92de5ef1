//! The resonance graph store.
//!
//! Wraps the SQLite pool with typed CRUD over nodes and edges, the FTS5
//! keyword query, brute-force vector similarity, and the aggregate counters
//! the validator consumes. All pipeline mutations are serialized through one
//! [`GraphStore`] handle; WAL covers concurrent readers.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use crate::db;
use crate::migrate;
use crate::models::{
    Edge, GraphDomain, GraphLayer, GraphStats, LexiconEntry, Node, NodeKind, SimilarHit, TextHit,
};
use crate::vectors;

pub struct GraphStore {
    pool: SqlitePool,
    path: std::path::PathBuf,
}

impl GraphStore {
    /// Open the store, applying any missing schema migrations. A migration
    /// failure is fatal: the store is not returned.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool)
            .await
            .with_context(|| format!("cannot open store at {}", path.display()))?;
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Upsert a node. The row keeps its rowid on conflict so the FTS
    /// triggers observe an UPDATE, preserving the index bijection.
    pub async fn insert_node(&self, node: &Node) -> Result<()> {
        let meta = serde_json::to_string(&node.meta)?;
        sqlx::query(
            r#"
            INSERT INTO nodes (id, type, title, content, domain, layer, embedding, hash, meta)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                type = excluded.type,
                title = excluded.title,
                content = excluded.content,
                domain = excluded.domain,
                layer = excluded.layer,
                embedding = excluded.embedding,
                hash = excluded.hash,
                meta = excluded.meta
            "#,
        )
        .bind(&node.id)
        .bind(node.kind.as_str())
        .bind(&node.title)
        .bind(&node.content)
        .bind(node.domain.as_str())
        .bind(node.layer.as_str())
        .bind(&node.embedding)
        .bind(&node.hash)
        .bind(meta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert an edge; `(source, target, type)` duplicates are ignored.
    /// Returns whether a row was actually added.
    pub async fn insert_edge(&self, edge: &Edge) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO edges (source, target, type) VALUES (?, ?, ?)",
        )
        .bind(&edge.source)
        .bind(&edge.target)
        .bind(&edge.kind)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let row = sqlx::query(
            "SELECT id, type, title, content, domain, layer, embedding, hash, meta FROM nodes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(node_from_row).transpose()
    }

    pub async fn get_node_hash(&self, id: &str) -> Result<Option<String>> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT hash FROM nodes WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash.flatten())
    }

    pub async fn get_nodes_by_type(&self, kind: NodeKind) -> Result<Vec<Node>> {
        let rows = sqlx::query(
            "SELECT id, type, title, content, domain, layer, embedding, hash, meta FROM nodes WHERE type = ? ORDER BY id",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(node_from_row).collect()
    }

    /// Reconstruct the lexicon from persisted concept nodes. Seeds the
    /// tokenizer on runs that skip Phase 1 (search, harvest).
    pub async fn get_lexicon(&self) -> Result<Vec<LexiconEntry>> {
        let nodes = self.get_nodes_by_type(NodeKind::Concept).await?;
        let entries = nodes
            .into_iter()
            .map(|node| {
                let aliases = node
                    .meta
                    .get("aliases")
                    .and_then(|v| v.as_array())
                    .map(|a| {
                        a.iter()
                            .filter_map(|s| s.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                let category = node
                    .meta
                    .get("category")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let kind = node
                    .meta
                    .get("kind")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                LexiconEntry {
                    id: node.id,
                    title: node.title,
                    aliases,
                    category,
                    kind,
                    definition: None,
                    tags: Vec::new(),
                }
            })
            .collect();
        Ok(entries)
    }

    /// BM25 keyword search over the FTS index.
    ///
    /// The query is bound verbatim; FTS5 syntax errors surface as `Err` and
    /// are handled by the hybrid engine's partial-failure policy.
    pub async fn search_text(&self, query: &str, limit: i64) -> Result<Vec<TextHit>> {
        let rows = sqlx::query(
            r#"
            SELECT n.id AS id, n.title AS title,
                   snippet(nodes_fts, 2, '>>>', '<<<', '…', 24) AS snippet,
                   rank AS bm25_rank
            FROM nodes_fts
            JOIN nodes n ON n.rowid = nodes_fts.rowid
            WHERE nodes_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TextHit {
                id: row.get("id"),
                title: row.get("title"),
                snippet: row.get("snippet"),
                bm25_rank: row.get("bm25_rank"),
            })
            .collect())
    }

    /// Brute-force dot-product scan over embedding BLOBs. The corpus is
    /// small; no ANN index is kept.
    pub async fn find_similar(
        &self,
        query: &[f32],
        limit: usize,
        domain: Option<&str>,
    ) -> Result<Vec<SimilarHit>> {
        let rows = match domain {
            Some(d) => {
                sqlx::query(
                    "SELECT id, title, content, embedding FROM nodes WHERE embedding IS NOT NULL AND domain = ?",
                )
                .bind(d)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, title, content, embedding FROM nodes WHERE embedding IS NOT NULL",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<SimilarHit> = rows
            .into_iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = vectors::decode(&blob);
                if stored.len() != query.len() {
                    return None;
                }
                Some(SimilarHit {
                    id: row.get("id"),
                    title: row.get("title"),
                    content: row.get("content"),
                    score: vectors::dot(query, &stored),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    pub async fn get_stats(&self) -> Result<GraphStats> {
        let nodes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&self.pool)
            .await?;
        let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM edges")
            .fetch_one(&self.pool)
            .await?;
        let vectors: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM nodes WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        let fts_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes_fts")
            .fetch_one(&self.pool)
            .await?;
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;

        Ok(GraphStats {
            nodes,
            edges,
            vectors,
            fts_rows,
            db_bytes: page_count * page_size,
        })
    }

    /// Truncate the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Incident-edge count of a node (in + out).
    pub async fn degree(&self, id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM edges WHERE source = ? OR target = ?")
                .bind(id)
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Whether `a` and `b` have at least one common neighbor.
    pub async fn shares_neighbor(&self, a: &str, b: &str) -> Result<bool> {
        let shared: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM
                    (SELECT target AS n FROM edges WHERE source = ?1
                     UNION SELECT source AS n FROM edges WHERE target = ?1) na
                JOIN
                    (SELECT target AS n FROM edges WHERE source = ?2
                     UNION SELECT source AS n FROM edges WHERE target = ?2) nb
                ON na.n = nb.n
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;
        Ok(shared)
    }

    /// Embedded nodes with zero incident edges, excluding structural kinds.
    /// These are the candidates for semantic orphan rescue.
    pub async fn orphan_nodes(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let rows = sqlx::query(
            r#"
            SELECT id, embedding FROM nodes
            WHERE embedding IS NOT NULL
              AND type NOT IN ('root', 'domain')
              AND id NOT IN (SELECT source FROM edges)
              AND id NOT IN (SELECT target FROM edges)
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("id"), row.get("embedding")))
            .collect())
    }

    /// Edges whose source or target does not resolve to a node.
    pub async fn orphan_edge_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM edges e
            WHERE e.source NOT IN (SELECT id FROM nodes)
               OR e.target NOT IN (SELECT id FROM nodes)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Ids appearing more than once. The primary key makes this structurally
    /// impossible; the validator checks it anyway as a corruption canary.
    pub async fn duplicate_id_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (SELECT id FROM nodes GROUP BY id HAVING COUNT(*) > 1)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// All edges incident on a node, outgoing first.
    pub async fn get_edges_of(&self, id: &str) -> Result<Vec<Edge>> {
        let rows = sqlx::query(
            r#"
            SELECT source, target, type FROM edges WHERE source = ?1
            UNION ALL
            SELECT source, target, type FROM edges WHERE target = ?1 AND source != ?1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Edge {
                source: row.get("source"),
                target: row.get("target"),
                kind: row.get("type"),
            })
            .collect())
    }

    /// Count of nodes in a domain; used by the validator's coverage check.
    pub async fn domain_node_count(&self, domain: GraphDomain) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes WHERE domain = ?")
            .bind(domain.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub fn db_path(&self) -> &Path {
        &self.path
    }
}

fn node_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Node> {
    let kind_str: String = row.get("type");
    let kind = NodeKind::from_str(&kind_str).map_err(anyhow::Error::msg)?;
    let domain_str: String = row.get("domain");
    let domain = GraphDomain::from_str(&domain_str).map_err(anyhow::Error::msg)?;
    let layer_str: String = row.get("layer");
    let layer = GraphLayer::from_str(&layer_str).map_err(anyhow::Error::msg)?;
    let meta_str: Option<String> = row.try_get("meta").ok();
    let meta = meta_str
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_else(|| serde_json::json!({}));

    Ok(Node {
        id: row.get("id"),
        kind,
        title: row.get("title"),
        content: row.get("content"),
        domain,
        layer,
        embedding: row.get("embedding"),
        hash: row.get("hash"),
        meta,
    })
}
