//! Text-generation provider implementations for Wegweiser.
//!
//! One implementation covers the field: most hosted models expose an
//! OpenAI-compatible `/chat/completions` endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;
use wegweiser_config::AppConfig;
use wegweiser_core::Provider;

/// Build the configured provider. Returns `None` when no API key is set —
/// callers decide whether that is fatal (interactive chat) or deferred
/// (doctor command).
pub fn build_from_config(config: &AppConfig) -> Option<Arc<dyn Provider>> {
    let api_key = config.openai_api_key.as_deref()?;
    Some(Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.api_base,
        api_key,
    )))
}
