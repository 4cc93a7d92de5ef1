//! Chronological chain over debriefs.
//!
//! Collects every `debrief` node, derives a date from `meta.date` or a
//! `YYYY-MM-DD` prefix of the source filename, drops undated nodes, sorts
//! newest-first and links each adjacent pair `newer --SUCCEEDS--> older`.
//! Timeline edges bypass the Louvain gate: a long chain through a busy
//! period is intentional structure, not hub pollution.

use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Edge, Node, NodeKind};
use crate::store::GraphStore;

fn date_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").unwrap())
}

/// Link debriefs into a descending chronological chain. Returns the number
/// of `SUCCEEDS` edges added.
pub async fn weave_timeline(store: &GraphStore) -> Result<usize> {
    let debriefs = store.get_nodes_by_type(NodeKind::Debrief).await?;

    let mut dated: Vec<(NaiveDate, String)> = debriefs
        .iter()
        .filter_map(|node| derive_date(node).map(|d| (d, node.id.clone())))
        .collect();

    // Newest first; id tiebreak keeps same-day ordering deterministic.
    dated.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut added = 0;
    for pair in dated.windows(2) {
        let (newer, older) = (&pair[0].1, &pair[1].1);
        if store
            .insert_edge(&Edge::new(newer.clone(), older.clone(), "SUCCEEDS"))
            .await?
        {
            added += 1;
        }
    }
    Ok(added)
}

/// `meta.date`, else a `YYYY-MM-DD` prefix of the source filename.
fn derive_date(node: &Node) -> Option<NaiveDate> {
    if let Some(date) = node.meta.get("date").and_then(|v| v.as_str()) {
        if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            return Some(parsed);
        }
    }

    let source = node.meta.get("source").and_then(|v| v.as_str())?;
    let filename = std::path::Path::new(source).file_name()?.to_str()?;
    let prefix = date_prefix_re().captures(filename)?;
    NaiveDate::parse_from_str(&prefix[1], "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GraphDomain, GraphLayer};

    fn debrief(id: &str, meta: serde_json::Value) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Debrief,
            title: None,
            content: Some(format!("debrief {}", id)),
            domain: GraphDomain::Experience,
            layer: GraphLayer::Note,
            embedding: None,
            hash: None,
            meta,
        }
    }

    #[tokio::test]
    async fn chains_debriefs_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("tl.db")).await.unwrap();

        store
            .insert_node(&debrief("mon", serde_json::json!({"date": "2024-03-04"})))
            .await
            .unwrap();
        store
            .insert_node(&debrief("wed", serde_json::json!({"date": "2024-03-06"})))
            .await
            .unwrap();
        store
            .insert_node(&debrief(
                "tue",
                serde_json::json!({"source": "/notes/2024-03-05-standup.md"}),
            ))
            .await
            .unwrap();
        // Undated: excluded from the chain.
        store
            .insert_node(&debrief("undated", serde_json::json!({"source": "/notes/misc.md"})))
            .await
            .unwrap();

        let added = weave_timeline(&store).await.unwrap();
        assert_eq!(added, 2);

        let wed_edges = store.get_edges_of("wed").await.unwrap();
        assert!(wed_edges
            .iter()
            .any(|e| e.source == "wed" && e.target == "tue" && e.kind == "SUCCEEDS"));
        let tue_edges = store.get_edges_of("tue").await.unwrap();
        assert!(tue_edges
            .iter()
            .any(|e| e.source == "tue" && e.target == "mon" && e.kind == "SUCCEEDS"));
        assert!(store.get_edges_of("undated").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rerun_adds_no_new_edges() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("tl2.db")).await.unwrap();
        store
            .insert_node(&debrief("a", serde_json::json!({"date": "2024-01-01"})))
            .await
            .unwrap();
        store
            .insert_node(&debrief("b", serde_json::json!({"date": "2024-01-02"})))
            .await
            .unwrap();

        assert_eq!(weave_timeline(&store).await.unwrap(), 1);
        assert_eq!(weave_timeline(&store).await.unwrap(), 0);
    }
}
