//! Node retrieval by id.
//!
//! Prints a node's metadata, content, and incident edges. This is the CLI
//! twin of the MCP `read_node_content` / `explore_links` tool surface.

use anyhow::Result;

use crate::config::Config;
use crate::store::GraphStore;

pub async fn run_get(config: &Config, id: &str) -> Result<i32> {
    let store = GraphStore::open(&config.paths.database.resonance).await?;

    let Some(node) = store.get_node(id).await? else {
        println!("❌ no node with id '{}'", id);
        store.close().await;
        return Ok(1);
    };

    println!("id:      {}", node.id);
    println!("type:    {}", node.kind);
    println!("domain:  {}/{}", node.domain.as_str(), node.layer.as_str());
    if let Some(title) = &node.title {
        println!("title:   {}", title);
    }
    if let Some(hash) = &node.hash {
        println!("hash:    {}", hash);
    }
    println!(
        "vector:  {}",
        match &node.embedding {
            Some(blob) => format!("{} dims", blob.len() / 4),
            None => "none".to_string(),
        }
    );
    if let Some(obj) = node.meta.as_object() {
        if !obj.is_empty() {
            println!("meta:    {}", serde_json::to_string(&node.meta)?);
        }
    }

    let edges = store.get_edges_of(id).await?;
    if !edges.is_empty() {
        println!();
        println!("edges ({}):", edges.len());
        for edge in &edges {
            if edge.source == id {
                println!("  --{}--> {}", edge.kind, edge.target);
            } else {
                println!("  <--{}-- {}", edge.kind, edge.source);
            }
        }
    }

    if let Some(content) = &node.content {
        println!();
        println!("{}", content);
    }

    store.close().await;
    Ok(0)
}
