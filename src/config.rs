use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root of `polyvis.settings.json`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub boxing: BoxingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub weaving: WeavingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    pub database: DatabaseConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// The resonance graph store. The locus ledger lives in a side file
    /// derived from this path (`<resonance>.ledger`).
    pub resonance: PathBuf,
    #[serde(default)]
    pub ledger: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    pub persona: PersonaSources,
    #[serde(default)]
    pub experience: Vec<ExperienceSource>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersonaSources {
    /// Lexicon artifact: JSON array of concept entries.
    pub lexicon: PathBuf,
    /// Enriched directive catalog (core directive array).
    pub cda: PathBuf,
}

/// One experience source directory. `kind` becomes the node kind for files
/// that don't declare their own `type:` frontmatter.
#[derive(Debug, Deserialize, Clone)]
pub struct ExperienceSource {
    pub path: PathBuf,
    #[serde(default = "default_source_kind")]
    pub kind: String,
}

fn default_source_kind() -> String {
    "note".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BoxingConfig {
    /// Whitespace-token budget per bento box.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for BoxingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    400
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `remote` (loopback daemon with local fallback), `local`, or `disabled`.
    #[serde(default = "default_embed_provider")]
    pub provider: String,
    /// Daemon base URL for the `remote` provider.
    #[serde(default = "default_embed_url", rename = "baseUrl")]
    pub base_url: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Minimum content length (bytes) below which a box is not embedded.
    #[serde(default = "default_min_embed_len")]
    pub min_content_len: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embed_provider(),
            base_url: default_embed_url(),
            dims: default_dims(),
            min_content_len: default_min_embed_len(),
        }
    }
}

fn default_embed_provider() -> String {
    "remote".to_string()
}
fn default_embed_url() -> String {
    "http://127.0.0.1:8632".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_min_embed_len() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeavingConfig {
    /// Incident-edge count above which a target counts as a super-node.
    #[serde(default = "default_louvain_threshold")]
    pub louvain_threshold: i64,
    /// Minimum similarity for orphan rescue.
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,
    /// Emit `EXEMPLIFIES` for legacy `tag-<slug>` stubs.
    #[serde(default = "default_true")]
    pub legacy_exemplifies: bool,
}

impl Default for WeavingConfig {
    fn default() -> Self {
        Self {
            louvain_threshold: default_louvain_threshold(),
            semantic_threshold: default_semantic_threshold(),
            legacy_exemplifies: true,
        }
    }
}

fn default_louvain_threshold() -> i64 {
    50
}
fn default_semantic_threshold() -> f32 {
    0.85
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Score bonus when a vector hit is confirmed by the keyword path.
    #[serde(default = "default_hybrid_boost")]
    pub hybrid_boost: f64,
    /// Base score for keyword-only hits.
    #[serde(default = "default_keyword_base")]
    pub keyword_base: f64,
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_boost: default_hybrid_boost(),
            keyword_base: default_keyword_base(),
            final_limit: default_final_limit(),
        }
    }
}

fn default_hybrid_boost() -> f64 {
    0.2
}
fn default_keyword_base() -> f64 {
    0.5
}
fn default_final_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationConfig {
    #[serde(default)]
    pub min_nodes_added: i64,
    /// `all`, `experience`, or `none`.
    #[serde(default = "default_coverage")]
    pub required_vector_coverage: String,
    /// Optional named baseline file for tolerance comparison.
    #[serde(default)]
    pub baseline: Option<PathBuf>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_nodes_added: 0,
            required_vector_coverage: default_coverage(),
            baseline: None,
            tolerance: default_tolerance(),
        }
    }
}

fn default_coverage() -> String {
    "experience".to_string()
}
fn default_tolerance() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub active_provider: Option<String>,
    #[serde(default)]
    pub providers: std::collections::HashMap<String, LlmProvider>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmProvider {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    pub model: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
}

impl Config {
    /// Path of the locus ledger database (side file next to the store
    /// unless overridden).
    pub fn ledger_path(&self) -> PathBuf {
        match &self.paths.database.ledger {
            Some(p) => p.clone(),
            None => {
                let mut os = self.paths.database.resonance.as_os_str().to_os_string();
                os.push(".ledger");
                PathBuf::from(os)
            }
        }
    }

    /// The active LLM provider, if one is configured.
    pub fn active_llm(&self) -> Option<&LlmProvider> {
        let name = self.llm.active_provider.as_deref()?;
        self.llm.providers.get(name)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

    let config: Config =
        serde_json::from_str(&content).with_context(|| "Failed to parse settings file")?;

    if config.boxing.max_tokens == 0 {
        anyhow::bail!("boxing.max_tokens must be > 0");
    }

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }

    if config.weaving.louvain_threshold < 1 {
        anyhow::bail!("weaving.louvain_threshold must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "remote" | "local" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be remote, local, or disabled.",
            other
        ),
    }

    if config.embedding.provider != "disabled" && config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.validation.required_vector_coverage.as_str() {
        "all" | "experience" | "none" => {}
        other => anyhow::bail!(
            "Unknown vector coverage requirement: '{}'. Must be all, experience, or none.",
            other
        ),
    }

    Ok(config)
}
