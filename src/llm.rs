//! Auto-tagging oracle.
//!
//! A thin client over an OpenAI-compatible chat endpoint, used only by
//! `box --tag` to propose relationship tags per box. The oracle is fallible
//! by contract: any failure — missing provider, network error, non-JSON
//! reply — yields an empty tag set and never blocks the pipeline.

use serde_json::json;
use std::time::Duration;

use crate::config::{Config, LlmProvider};

const LLM_TIMEOUT: Duration = Duration::from_secs(60);

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    /// Build a client for the active provider, if one is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        let provider: &LlmProvider = config.active_llm()?;
        let client = reqwest::Client::builder()
            .timeout(LLM_TIMEOUT)
            .build()
            .ok()?;
        Some(Self {
            client,
            base_url: provider.base_url.clone(),
            model: provider.model.clone(),
            api_key: provider.api_key.clone(),
        })
    }

    /// Propose `(relation, target)` tags for one box. `section` carries the
    /// heading label when the box is a section rather than an atomic block.
    pub async fn auto_tag(
        &self,
        content: &str,
        section: Option<&str>,
        known_terms: &[String],
    ) -> Vec<(String, String)> {
        match self.request_tags(content, section, known_terms).await {
            Ok(tags) => tags,
            Err(_) => Vec::new(),
        }
    }

    async fn request_tags(
        &self,
        content: &str,
        section: Option<&str>,
        known_terms: &[String],
    ) -> anyhow::Result<Vec<(String, String)>> {
        let context = match section {
            Some(label) => format!("This box is the section \"{}\".", label),
            None => "This box is a single atomic block.".to_string(),
        };

        let prompt = format!(
            "{}\nKnown lexicon terms: {}\n\n\
             Reply with a JSON array of objects {{\"relation\": UPPERCASE_RELATION, \
             \"target\": lexicon-term-id}} describing explicit relationships in the text. \
             Reply with [] when none apply. Text:\n\n{}",
            context,
            known_terms.join(", "),
            content
        );

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": 0.0,
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: serde_json::Value = response.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no completion content"))?;

        Ok(parse_tag_array(content))
    }
}

/// Parse the oracle's reply, tolerating surrounding prose and code fences.
fn parse_tag_array(reply: &str) -> Vec<(String, String)> {
    let start = match reply.find('[') {
        Some(i) => i,
        None => return Vec::new(),
    };
    let end = match reply.rfind(']') {
        Some(i) if i >= start => i + 1,
        _ => return Vec::new(),
    };

    let parsed: serde_json::Value = match serde_json::from_str(&reply[start..end]) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    parsed
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let relation = item.get("relation")?.as_str()?.trim();
                    let target = item.get("target")?.as_str()?.trim();
                    if relation.is_empty() || target.is_empty() {
                        return None;
                    }
                    Some((relation.to_uppercase(), target.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}
