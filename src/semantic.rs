//! Semantic orphan rescue.
//!
//! Runs after the timeline pass so fresh `SUCCEEDS` edges count toward
//! connectedness. Every embedded node with zero incident edges (structural
//! kinds excluded) searches the experience domain for its nearest neighbors;
//! a sufficiently similar best match earns a single `RELATED_TO` edge,
//! subject to the Louvain gate.

use anyhow::Result;

use crate::louvain::LouvainGate;
use crate::models::Edge;
use crate::store::GraphStore;
use crate::vectors;

const RESCUE_CANDIDATES: usize = 3;

/// Returns `(edges_added, gate_rejections)`.
pub async fn rescue_orphans(
    store: &GraphStore,
    gate: &LouvainGate,
    threshold: f32,
) -> Result<(usize, Vec<String>)> {
    let orphans = store.orphan_nodes().await?;

    let mut added = 0;
    let mut rejections = Vec::new();

    for (id, blob) in orphans {
        let query = vectors::decode(&blob);
        let hits = store
            .find_similar(&query, RESCUE_CANDIDATES, Some("experience"))
            .await?;

        let best = hits
            .into_iter()
            .find(|hit| hit.id != id && hit.score > threshold);

        let Some(best) = best else { continue };

        let decision = gate.check(store, &id, &best.id).await?;
        if decision.allowed {
            if store
                .insert_edge(&Edge::new(id, best.id, "RELATED_TO"))
                .await?
            {
                added += 1;
            }
        } else if let Some(reason) = decision.reason {
            rejections.push(reason);
        }
    }

    Ok((added, rejections))
}
