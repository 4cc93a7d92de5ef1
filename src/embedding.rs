//! Embedding provider abstraction.
//!
//! The pipeline treats text → vector as an opaque contract: a fixed number
//! of dimensions, re-normalized through the FAFCAS codec on storage either
//! way. Three providers exist:
//!
//! - **`remote`** — a loopback HTTP daemon (`GET /health`, `POST /embed`).
//!   The health probe runs once at construction with a 200 ms budget; a
//!   dead daemon silently downgrades to the local provider, and a per-call
//!   failure falls back to the local model for that call.
//! - **`local`** — a deterministic in-process feature-hash model. Not a
//!   semantic model, but stable across runs and offline, which is what the
//!   pipeline and its tests need from a fallback.
//! - **`disabled`** — every call errors; boxes are stored without vectors
//!   and remain reachable through the keyword path.

use anyhow::{bail, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Budget for the daemon liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_millis(200);
/// Budget for a single embed call against the daemon.
const EMBED_TIMEOUT: Duration = Duration::from_secs(10);

enum Backend {
    Remote {
        client: reqwest::Client,
        base_url: String,
    },
    Local,
    Disabled,
}

pub struct Embedder {
    backend: Backend,
    dims: usize,
}

impl Embedder {
    /// Build the embedder for `config`, probing the daemon when the
    /// provider is `remote`.
    pub async fn create(config: &EmbeddingConfig) -> Self {
        let backend = match config.provider.as_str() {
            "remote" => match probe_daemon(&config.base_url).await {
                Ok(client) => Backend::Remote {
                    client,
                    base_url: config.base_url.clone(),
                },
                Err(_) => Backend::Local,
            },
            "local" => Backend::Local,
            _ => Backend::Disabled,
        };

        Self {
            backend,
            dims: config.dims,
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, Backend::Disabled)
    }

    pub fn name(&self) -> &'static str {
        match self.backend {
            Backend::Remote { .. } => "remote",
            Backend::Local => "local",
            Backend::Disabled => "disabled",
        }
    }

    /// Embed one text. The result is not guaranteed unit-norm; callers
    /// store it through the FAFCAS codec.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match &self.backend {
            Backend::Disabled => bail!("embedding provider is disabled"),
            Backend::Local => Ok(hash_embed(text, self.dims)),
            Backend::Remote { client, base_url } => {
                match embed_remote(client, base_url, text).await {
                    Ok(vector) if vector.len() == self.dims => Ok(vector),
                    // Wrong shape or daemon hiccup: fall back for this call.
                    _ => Ok(hash_embed(text, self.dims)),
                }
            }
        }
    }
}

async fn probe_daemon(base_url: &str) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(EMBED_TIMEOUT)
        .build()?;

    let response = client
        .get(format!("{}/health", base_url))
        .timeout(PROBE_TIMEOUT)
        .send()
        .await?;
    if !response.status().is_success() {
        bail!("daemon health probe returned {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    if body.get("status").and_then(|s| s.as_str()) != Some("ok") {
        bail!("daemon health probe returned unexpected body");
    }

    Ok(client)
}

async fn embed_remote(
    client: &reqwest::Client,
    base_url: &str,
    text: &str,
) -> Result<Vec<f32>> {
    let response = client
        .post(format!("{}/embed", base_url))
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await?;

    if !response.status().is_success() {
        bail!("daemon embed returned {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    let vector = body
        .get("vector")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("daemon response missing vector"))?;

    Ok(vector
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Deterministic feature-hash embedding: each lowercased whitespace token
/// hashes to a signed bucket. `DefaultHasher::new()` is keyed with
/// constants, so the mapping is stable across processes and runs.
pub fn hash_embed(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    if dims == 0 {
        return vector;
    }

    for token in text.split_whitespace() {
        let token = token.to_lowercase();
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % dims as u64) as usize;
        let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}
