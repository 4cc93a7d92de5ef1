//! Hybrid retrieval: vector and keyword candidates merged with score fusion.
//!
//! The vector path contributes hits at their raw dot-product score, tagged
//! `vector`. The keyword path (BM25 over the FTS index) merges into the
//! candidate map: a hit already present gains the hybrid boost and is
//! re-tagged `hybrid`; a fresh hit enters at the keyword base score. Either
//! subsystem failing is recorded as a structured error without aborting the
//! call — the response is only flagged as an error when both paths came up
//! empty and at least one of them failed.

use anyhow::Result;
use std::collections::HashMap;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::models::{SearchHit, SearchSource};
use crate::store::GraphStore;
use crate::vectors;

const PREVIEW_CHARS: usize = 200;

/// Outcome of one hybrid query.
#[derive(Debug)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub errors: Vec<String>,
    pub is_error: bool,
}

pub async fn hybrid_search(
    store: &GraphStore,
    embedder: &Embedder,
    retrieval: &RetrievalConfig,
    query: &str,
    limit: i64,
) -> Result<SearchResponse> {
    let mut candidates: HashMap<String, SearchHit> = HashMap::new();
    let mut errors: Vec<String> = Vec::new();

    // Vector path.
    if embedder.is_enabled() {
        match embedder.embed(query).await {
            Ok(raw) => {
                let unit = vectors::decode(&vectors::encode(&raw));
                match store.find_similar(&unit, limit as usize, None).await {
                    Ok(hits) => {
                        for hit in hits {
                            candidates.insert(
                                hit.id.clone(),
                                SearchHit {
                                    id: hit.id,
                                    score: hit.score as f64,
                                    source: SearchSource::Vector,
                                    preview: preview(hit.content.as_deref().unwrap_or("")),
                                },
                            );
                        }
                    }
                    Err(e) => errors.push(format!("vector search failed: {}", e)),
                }
            }
            Err(e) => errors.push(format!("query embedding failed: {}", e)),
        }
    }

    // Keyword path, merged over the vector candidates.
    match store.search_text(query, limit).await {
        Ok(hits) => {
            for hit in hits {
                match candidates.get_mut(&hit.id) {
                    Some(existing) => {
                        existing.score += retrieval.hybrid_boost;
                        existing.source = SearchSource::Hybrid;
                    }
                    None => {
                        candidates.insert(
                            hit.id.clone(),
                            SearchHit {
                                id: hit.id,
                                score: retrieval.keyword_base,
                                source: SearchSource::Keyword,
                                preview: preview(&hit.snippet),
                            },
                        );
                    }
                }
            }
        }
        Err(e) => errors.push(format!("keyword search failed: {}", e)),
    }

    let mut hits: Vec<SearchHit> = candidates.into_values().collect();
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    hits.truncate(limit as usize);

    let is_error = hits.is_empty() && !errors.is_empty();
    Ok(SearchResponse {
        hits,
        errors,
        is_error,
    })
}

/// The `search` CLI command: run a hybrid query and print ranked hits.
pub async fn run_search(
    config: &crate::config::Config,
    query: &str,
    limit: Option<i64>,
) -> Result<i32> {
    let store = GraphStore::open(&config.paths.database.resonance).await?;
    let embedder = Embedder::create(&config.embedding).await;
    let limit = limit.unwrap_or(config.retrieval.final_limit);

    let response = hybrid_search(&store, &embedder, &config.retrieval, query, limit).await?;

    for error in &response.errors {
        println!("⚠️  {}", error);
    }

    if response.hits.is_empty() {
        println!("No results.");
        store.close().await;
        return Ok(if response.is_error { 1 } else { 0 });
    }

    for (i, hit) in response.hits.iter().enumerate() {
        let source = match hit.source {
            SearchSource::Vector => "vector",
            SearchSource::Keyword => "keyword",
            SearchSource::Hybrid => "hybrid",
        };
        println!("{}. [{:.3}] ({}) {}", i + 1, hit.score, source, hit.id);
        if !hit.preview.is_empty() {
            println!("    {}", hit.preview.replace('\n', " "));
        }
    }

    store.close().await;
    Ok(0)
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::embedding::hash_embed;
    use crate::models::{GraphDomain, GraphLayer, Node, NodeKind};

    fn node(id: &str, content: &str, embedding: Option<Vec<u8>>) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Note,
            title: Some(id.to_string()),
            content: Some(content.to_string()),
            domain: GraphDomain::Experience,
            layer: GraphLayer::Note,
            embedding,
            hash: None,
            meta: serde_json::json!({}),
        }
    }

    async fn fixture() -> (tempfile::TempDir, GraphStore, Embedder) {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("search.db")).await.unwrap();
        let embedder = Embedder::create(&EmbeddingConfig {
            provider: "local".to_string(),
            dims: 64,
            ..Default::default()
        })
        .await;
        (dir, store, embedder)
    }

    #[tokio::test]
    async fn fuses_vector_and_keyword_paths() {
        let (_dir, store, embedder) = fixture().await;
        let retrieval = RetrievalConfig::default();

        // A: keyword-only (no embedding). B: semantic twin of the query.
        store
            .insert_node(&node("a", "the quick brown fox jumps", None))
            .await
            .unwrap();
        store
            .insert_node(&node(
                "b",
                "unrelated wording here",
                Some(vectors::encode(&hash_embed("fox", 64))),
            ))
            .await
            .unwrap();

        let response = hybrid_search(&store, &embedder, &retrieval, "fox", 10)
            .await
            .unwrap();
        assert!(!response.is_error);

        let a = response.hits.iter().find(|h| h.id == "a").unwrap();
        let b = response.hits.iter().find(|h| h.id == "b").unwrap();
        assert_eq!(a.source, SearchSource::Keyword);
        assert!((a.score - retrieval.keyword_base).abs() < 1e-9);
        assert_eq!(b.source, SearchSource::Vector);
        assert!(b.score > 0.99, "identical embedding should score ~1.0");
    }

    #[tokio::test]
    async fn keyword_confirmation_boosts_to_hybrid() {
        let (_dir, store, embedder) = fixture().await;
        let retrieval = RetrievalConfig::default();

        store
            .insert_node(&node(
                "both",
                "a note about the fox",
                Some(vectors::encode(&hash_embed("fox", 64))),
            ))
            .await
            .unwrap();

        let response = hybrid_search(&store, &embedder, &retrieval, "fox", 10)
            .await
            .unwrap();
        let hit = response.hits.iter().find(|h| h.id == "both").unwrap();
        assert_eq!(hit.source, SearchSource::Hybrid);
        assert!(hit.score > 1.0 + retrieval.hybrid_boost - 0.01);
    }

    #[tokio::test]
    async fn malformed_fts_query_is_partial_failure() {
        let (_dir, store, embedder) = fixture().await;
        let retrieval = RetrievalConfig::default();

        store
            .insert_node(&node(
                "only",
                "plain content",
                Some(vectors::encode(&hash_embed("plain content", 64))),
            ))
            .await
            .unwrap();

        // Unbalanced quote is an FTS5 syntax error; the vector path still runs.
        let response = hybrid_search(&store, &embedder, &retrieval, "\"broken", 10)
            .await
            .unwrap();
        assert!(!response.errors.is_empty());
        assert!(!response.is_error, "vector path produced results");
    }

    #[tokio::test]
    async fn empty_results_with_error_flags_response() {
        let (_dir, store, _embedder) = fixture().await;
        let retrieval = RetrievalConfig::default();

        let disabled = Embedder::create(&EmbeddingConfig {
            provider: "disabled".to_string(),
            ..Default::default()
        })
        .await;

        let response = hybrid_search(&store, &disabled, &retrieval, "\"broken", 10)
            .await
            .unwrap();
        assert!(response.hits.is_empty());
        assert!(response.is_error);
    }
}
