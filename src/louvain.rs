//! Local-modularity edge admission control.
//!
//! Suppresses edges that would degrade community structure by attaching
//! arbitrary nodes to hubs. An edge is rejected only when the target is a
//! super-node (incident degree above the threshold) *and* source and target
//! share no neighbor; everything else is admitted. Timeline edges bypass
//! the gate: chronological chains are intentional hub structure.

use anyhow::Result;

use crate::store::GraphStore;

/// Outcome of a gate check. Rejections carry a structured reason for the
/// ingest log; they are informational, not errors.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl GateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn reject(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

pub struct LouvainGate {
    threshold: i64,
}

impl LouvainGate {
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }

    /// Admit or reject `source → target`.
    pub async fn check(
        &self,
        store: &GraphStore,
        source: &str,
        target: &str,
    ) -> Result<GateDecision> {
        let degree = store.degree(target).await?;
        if degree <= self.threshold {
            return Ok(GateDecision::allow());
        }

        if store.shares_neighbor(source, target).await? {
            return Ok(GateDecision::allow());
        }

        Ok(GateDecision::reject(format!(
            "'{}' is a super-node ({} incident edges > {}) with no neighbor shared with '{}'",
            target, degree, self.threshold, source
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Edge;

    async fn store_with_hub(hub_degree: usize) -> (tempfile::TempDir, GraphStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("gate.db")).await.unwrap();
        for i in 0..hub_degree {
            store
                .insert_edge(&Edge::new(format!("spoke-{}", i), "hub", "MENTIONS"))
                .await
                .unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn target_under_threshold_is_always_allowed() {
        let (_dir, store) = store_with_hub(50).await;
        let gate = LouvainGate::new(50);

        let decision = gate.check(&store, "newcomer", "hub").await.unwrap();
        assert!(decision.allowed);
        assert!(decision.reason.is_none());
    }

    #[tokio::test]
    async fn super_node_without_shared_neighbor_is_rejected() {
        let (_dir, store) = store_with_hub(60).await;
        let gate = LouvainGate::new(50);

        let decision = gate.check(&store, "stranger", "hub").await.unwrap();
        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("super-node"));
        assert!(reason.contains("hub"));
    }

    #[tokio::test]
    async fn super_node_with_shared_neighbor_is_allowed() {
        let (_dir, store) = store_with_hub(60).await;
        // "insider" already cites one of the hub's spokes.
        store
            .insert_edge(&Edge::new("insider", "spoke-0", "CITES"))
            .await
            .unwrap();

        let gate = LouvainGate::new(50);
        let decision = gate.check(&store, "insider", "hub").await.unwrap();
        assert!(decision.allowed);
    }
}
