//! Embedding daemon lifecycle: `daemon start|stop|status`.
//!
//! `start` serves in the foreground; `status` probes `/health`; `stop`
//! posts `/shutdown`. Both control calls use short timeouts so a dead
//! daemon answers quickly.

use anyhow::Result;
use std::time::Duration;

use crate::config::Config;
use crate::server;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn start(config: &Config) -> Result<i32> {
    server::run_server(config).await?;
    Ok(0)
}

pub async fn status(config: &Config) -> Result<i32> {
    let client = reqwest::Client::builder()
        .timeout(CONTROL_TIMEOUT)
        .build()?;
    let url = format!("{}/health", config.embedding.base_url.trim_end_matches('/'));

    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => {
            println!("✅ daemon running at {}", config.embedding.base_url);
            Ok(0)
        }
        Ok(response) => {
            println!("❌ daemon unhealthy: {}", response.status());
            Ok(1)
        }
        Err(_) => {
            println!("❌ daemon not running at {}", config.embedding.base_url);
            Ok(1)
        }
    }
}

pub async fn stop(config: &Config) -> Result<i32> {
    let client = reqwest::Client::builder()
        .timeout(CONTROL_TIMEOUT)
        .build()?;
    let url = format!(
        "{}/shutdown",
        config.embedding.base_url.trim_end_matches('/')
    );

    match client.post(&url).send().await {
        Ok(response) if response.status().is_success() => {
            println!("✅ daemon stopping");
            Ok(0)
        }
        Ok(response) => {
            println!("❌ daemon refused shutdown: {}", response.status());
            Ok(1)
        }
        Err(_) => {
            println!("⚠️  daemon not running");
            Ok(0)
        }
    }
}
