use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no credentials configured")]
    PoolExhausted,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
