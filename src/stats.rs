//! Store statistics overview.
//!
//! A quick summary of what the graph holds: node, edge, and vector counts,
//! FTS coverage, and on-disk size. Used by `polyvis stats` to confirm that
//! ingestion and weaving behaved as expected.

use anyhow::Result;

use crate::config::Config;
use crate::models::NodeKind;
use crate::store::GraphStore;

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = GraphStore::open(&config.paths.database.resonance).await?;
    let stats = store.get_stats().await?;

    println!("polyvis — resonance store");
    println!("=========================");
    println!();
    println!("  Database:  {}", config.paths.database.resonance.display());
    println!("  Size:      {}", format_bytes(stats.db_bytes as u64));
    println!();
    println!("  Nodes:     {}", stats.nodes);
    println!("  Edges:     {}", stats.edges);
    println!(
        "  Vectors:   {} / {} ({}%)",
        stats.vectors,
        stats.nodes,
        if stats.nodes > 0 {
            (stats.vectors * 100) / stats.nodes
        } else {
            0
        }
    );
    println!("  FTS rows:  {}", stats.fts_rows);

    // Per-kind breakdown.
    let kinds = [
        NodeKind::Concept,
        NodeKind::Directive,
        NodeKind::Playbook,
        NodeKind::Debrief,
        NodeKind::Note,
        NodeKind::Document,
        NodeKind::Section,
    ];
    let mut rows = Vec::new();
    for kind in kinds {
        let count = store.get_nodes_by_type(kind).await?.len();
        if count > 0 {
            rows.push((kind, count));
        }
    }
    if !rows.is_empty() {
        println!();
        println!("  By type:");
        for (kind, count) in rows {
            println!("    {:<12} {:>6}", kind.as_str(), count);
        }
    }

    println!();
    store.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
