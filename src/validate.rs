//! Post-ingestion verification.
//!
//! A [`Baseline`] is captured before ingestion and compared against the end
//! state: node delta against expectations, vector coverage, orphan edges,
//! duplicate ids. Validation failure never aborts the ingestion that
//! produced it — the caller decides what the report is worth via the exit
//! code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ValidationConfig;
use crate::models::{GraphDomain, GraphStats};
use crate::store::GraphStore;

/// Store counters frozen at the start of a validation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Baseline {
    pub nodes: i64,
    pub edges: i64,
    pub vectors: i64,
    pub ts: i64,
}

pub async fn capture_baseline(store: &GraphStore) -> Result<Baseline> {
    let stats = store.get_stats().await?;
    Ok(Baseline {
        nodes: stats.nodes,
        edges: stats.edges,
        vectors: stats.vectors,
        ts: chrono::Utc::now().timestamp(),
    })
}

#[derive(Debug)]
pub struct ValidationReport {
    pub passed: bool,
    pub baseline: Baseline,
    pub results: GraphStats,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: String,
}

/// Compare the store's end state against `baseline` and the configured
/// expectations.
pub async fn validate(
    store: &GraphStore,
    baseline: Baseline,
    config: &ValidationConfig,
) -> Result<ValidationReport> {
    let results = store.get_stats().await?;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let delta_nodes = results.nodes - baseline.nodes;
    if delta_nodes < config.min_nodes_added {
        errors.push(format!(
            "expected at least {} new nodes, got {}",
            config.min_nodes_added, delta_nodes
        ));
    }

    match config.required_vector_coverage.as_str() {
        "all" => {
            if results.vectors != results.nodes {
                errors.push(format!(
                    "vector coverage 'all' violated: {} vectors for {} nodes",
                    results.vectors, results.nodes
                ));
            }
        }
        "experience" => {
            let experience_nodes = store.domain_node_count(GraphDomain::Experience).await?;
            if results.vectors < experience_nodes {
                warnings.push(format!(
                    "{} of {} experience nodes lack vectors",
                    experience_nodes - results.vectors,
                    experience_nodes
                ));
            }
        }
        _ => {}
    }

    let orphan_edges = store.orphan_edge_count().await?;
    if orphan_edges > 0 {
        errors.push(format!(
            "{} edges reference nodes that do not exist",
            orphan_edges
        ));
    }

    let duplicates = store.duplicate_id_count().await?;
    if duplicates > 0 {
        errors.push(format!("{} duplicate node ids", duplicates));
    }

    let passed = errors.is_empty();
    let summary = format!(
        "{} nodes (+{}), {} edges (+{}), {} vectors (+{}), {} errors, {} warnings",
        results.nodes,
        delta_nodes,
        results.edges,
        results.edges - baseline.edges,
        results.vectors,
        results.vectors - baseline.vectors,
        errors.len(),
        warnings.len()
    );

    Ok(ValidationReport {
        passed,
        baseline,
        results,
        errors,
        warnings,
        summary,
    })
}

/// Load a named stats baseline written by an earlier run.
pub fn load_stats_baseline(path: &Path) -> Result<GraphStats> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read baseline file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| "cannot parse baseline file")
}

/// Per-metric tolerance comparison against a named baseline. Variance is
/// `|delta| / expected`; a metric violates when variance exceeds the
/// tolerance (an expected zero with a nonzero actual always violates).
pub fn compare_to_baseline(
    actual: &GraphStats,
    expected: &GraphStats,
    tolerance: f64,
) -> Vec<String> {
    let metrics = [
        ("nodes", actual.nodes, expected.nodes),
        ("edges", actual.edges, expected.edges),
        ("vectors", actual.vectors, expected.vectors),
    ];

    let mut violations = Vec::new();
    for (name, got, want) in metrics {
        let delta = (got - want).abs() as f64;
        let variance = if want == 0 {
            if got == 0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            delta / want as f64
        };
        if variance > tolerance {
            violations.push(format!(
                "{}: expected {} ± {:.0}%, got {} (variance {:.1}%)",
                name,
                want,
                tolerance * 100.0,
                got,
                variance * 100.0
            ));
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, GraphLayer, Node, NodeKind};

    fn note(id: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Note,
            title: None,
            content: Some(format!("content {}", id)),
            domain: GraphDomain::Experience,
            layer: GraphLayer::Note,
            embedding: Some(crate::vectors::encode(&[1.0, 0.0])),
            hash: None,
            meta: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn passing_run_produces_clean_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("v.db")).await.unwrap();
        let baseline = capture_baseline(&store).await.unwrap();

        store.insert_node(&note("a")).await.unwrap();
        store.insert_node(&note("b")).await.unwrap();
        store.insert_edge(&Edge::new("a", "b", "CITES")).await.unwrap();

        let config = ValidationConfig {
            min_nodes_added: 2,
            ..Default::default()
        };
        let report = validate(&store, baseline, &config).await.unwrap();
        assert!(report.passed, "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn orphan_edges_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("v2.db")).await.unwrap();
        let baseline = capture_baseline(&store).await.unwrap();

        store.insert_node(&note("a")).await.unwrap();
        store
            .insert_edge(&Edge::new("a", "never-created", "CITES"))
            .await
            .unwrap();

        let report = validate(&store, baseline, &ValidationConfig::default())
            .await
            .unwrap();
        assert!(!report.passed);
        assert!(report.errors[0].contains("do not exist"));
    }

    #[tokio::test]
    async fn missing_experience_vectors_warn_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("v3.db")).await.unwrap();
        let baseline = capture_baseline(&store).await.unwrap();

        let mut bare = note("bare");
        bare.embedding = None;
        store.insert_node(&bare).await.unwrap();

        let report = validate(&store, baseline, &ValidationConfig::default())
            .await
            .unwrap();
        assert!(report.passed);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn tolerance_comparison_flags_out_of_band_metrics() {
        let expected = GraphStats {
            nodes: 100,
            edges: 50,
            vectors: 100,
            fts_rows: 100,
            db_bytes: 0,
        };
        let actual = GraphStats {
            nodes: 105, // within 10%
            edges: 70,  // 40% off
            vectors: 100,
            fts_rows: 100,
            db_bytes: 0,
        };

        let violations = compare_to_baseline(&actual, &expected, 0.1);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("edges:"));
    }
}
