//! Oracle implementations for Cartloop.
//!
//! Every provider implements `cartloop_core::Provider`. The agent only ever
//! sees the trait object returned by [`build_from_config`].

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;

use cartloop_config::AppConfig;
use cartloop_core::Provider;
use cartloop_core::error::ProviderError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the configured oracle.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is available.
/// Local endpoints (`localhost`, `127.0.0.1`) are allowed without a key.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = config.provider.base_url.trim();
    let api_key = config.api_key.clone().unwrap_or_default();

    if api_key.is_empty() && !is_local(base_url) {
        return Err(ProviderError::NotConfigured(
            "no API key set (config api_key, CARTLOOP_API_KEY or OPENAI_API_KEY)".into(),
        ));
    }

    let provider = OpenAiCompatProvider::new(
        provider_name(base_url),
        base_url,
        api_key,
        Duration::from_secs(config.provider.request_timeout_secs),
    )?
    .with_max_retries(config.provider.max_retries);

    info!(
        provider = provider.name(),
        base_url,
        max_retries = config.provider.max_retries,
        "Oracle provider ready"
    );
    Ok(Arc::new(provider))
}

fn is_local(base_url: &str) -> bool {
    base_url.contains("localhost") || base_url.contains("127.0.0.1")
}

/// A short display name derived from the endpoint host.
fn provider_name(base_url: &str) -> &'static str {
    if base_url.contains("openai.com") {
        "openai"
    } else if base_url.contains("openrouter.ai") {
        "openrouter"
    } else if base_url.contains(":11434") {
        "ollama"
    } else {
        "openai-compatible"
    }
}
