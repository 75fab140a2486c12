use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Hosted chat-completion provider.
    #[serde(default = "default_llm")]
    pub llm: ProviderConfig,

    /// Hosted embedding provider.
    #[serde(default = "default_embeddings")]
    pub embeddings: ProviderConfig,

    /// Directory where uploaded documents are saved.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// SQLite file holding conversations and messages.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            llm: default_llm(),
            embeddings: default_embeddings(),
            uploads_dir: default_uploads_dir(),
            db_path: default_db_path(),
            log_level: Some("info".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Settings for one hosted capability (chat completion or embeddings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "gemini" or "openai".
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_llm() -> ProviderConfig {
    ProviderConfig {
        provider: "gemini".to_string(),
        model: None,
        api_key: None,
        base_url: None,
    }
}

fn default_embeddings() -> ProviderConfig {
    ProviderConfig {
        provider: "gemini".to_string(),
        model: None,
        api_key: None,
        base_url: None,
    }
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("chat_history.db")
}
