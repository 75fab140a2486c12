use std::sync::Arc;

use paperchat_common::{Error, Result};
use paperchat_config::{AppConfig, ProviderConfig};
use paperchat_db::ChatStore;
use paperchat_rag::{
    AnswerEngine, DocumentIndexer, EmbeddingProvider, GeminiEmbeddingProvider, GeminiProvider,
    LlmProvider, OpenAiEmbeddingProvider, OpenAiProvider,
};
use tracing::info;

/// Resolve an API key: config file value first, then the environment.
fn resolve_api_key(config_key: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Some(key.to_string());
    }

    std::env::var(env_var).ok()
}

fn require_api_key(config: &ProviderConfig, env_var: &str) -> Result<String> {
    resolve_api_key(config.api_key.as_deref(), env_var).ok_or_else(|| {
        Error::Config(format!(
            "no API key for {} provider (set api_key in config or {env_var} env var)",
            config.provider
        ))
    })
}

/// Build the configured chat-completion provider.
pub fn build_llm_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "gemini" => {
            let key = require_api_key(config, "GOOGLE_API_KEY")?;
            info!("configured gemini chat provider");
            Ok(Arc::new(GeminiProvider::new(
                key,
                config.model.clone(),
                config.base_url.clone(),
            )))
        }
        "openai" => {
            let key = require_api_key(config, "OPENAI_API_KEY")?;
            info!("configured openai chat provider");
            Ok(Arc::new(OpenAiProvider::new(
                key,
                config.model.clone(),
                config.base_url.clone(),
            )))
        }
        other => Err(Error::Config(format!("unknown LLM provider type: {other}"))),
    }
}

/// Build the configured embedding provider.
pub fn build_embedding_provider(config: &ProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "gemini" => {
            let key = require_api_key(config, "GOOGLE_API_KEY")?;
            info!("configured gemini embedding provider");
            Ok(Arc::new(GeminiEmbeddingProvider::new(
                key,
                config.model.clone(),
                config.base_url.clone(),
            )))
        }
        "openai" => {
            let key = require_api_key(config, "OPENAI_API_KEY")?;
            info!("configured openai embedding provider");
            Ok(Arc::new(OpenAiEmbeddingProvider::new(
                key,
                config.model.clone(),
                config.base_url.clone(),
            )))
        }
        other => Err(Error::Config(format!(
            "unknown embedding provider type: {other}"
        ))),
    }
}

/// Assemble the full application state from config: uploads dir, chat store,
/// indexer, and answering engine.
pub fn build_state(config: AppConfig) -> Result<crate::state::AppState> {
    if !config.uploads_dir.exists() {
        std::fs::create_dir_all(&config.uploads_dir)?;
        info!("created uploads dir at {}", config.uploads_dir.display());
    }

    let store = ChatStore::open(&config.db_path)?;

    let embeddings = build_embedding_provider(&config.embeddings)?;
    let llm = build_llm_provider(&config.llm)?;

    let indexer = DocumentIndexer::new(Arc::clone(&embeddings));
    let engine = AnswerEngine::new(llm, embeddings);

    Ok(crate::state::AppState::new(config, store, indexer, engine))
}

#[cfg(test)]
mod tests {
    use super::{build_embedding_provider, build_llm_provider};
    use paperchat_config::ProviderConfig;

    fn provider_config(provider: &str, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            provider: provider.to_string(),
            model: None,
            api_key: api_key.map(|s| s.to_string()),
            base_url: None,
        }
    }

    #[test]
    fn unknown_provider_type_is_a_config_error() {
        let result = build_llm_provider(&provider_config("mystery", Some("key")));
        assert!(result.is_err());

        let result = build_embedding_provider(&provider_config("mystery", Some("key")));
        assert!(result.is_err());
    }

    #[test]
    fn config_api_key_builds_provider() {
        let provider = build_llm_provider(&provider_config("gemini", Some("key")))
            .expect("provider should build");
        assert_eq!(provider.provider_id(), "gemini");

        let provider = build_embedding_provider(&provider_config("openai", Some("key")))
            .expect("provider should build");
        assert_eq!(provider.provider_id(), "openai");
    }
}
