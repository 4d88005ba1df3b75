//! Engine configuration loaded from `tagmill.toml`.
//!
//! Missing fields fall back to defaults. The `TAGMILL_API_KEY` environment
//! variable, when set, is prepended to the credential list so a single-key
//! setup needs no config file at all.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::pool::{CredentialSpec, ModelProfile, RateClass, SelectionMode};
use crate::scheduler::ScheduleSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Provider API keys, rotated least-recently-used.
    #[serde(default)]
    pub credentials: Vec<CredentialSpec>,

    /// Worker concurrency per batch window.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Base delay in seconds between batch windows.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Lift the credential-count worker coupling (paid accounts).
    #[serde(default)]
    pub unrestricted: bool,

    /// Pin a single model; auto-rotation through the roster when unset.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_models")]
    pub models: Vec<ModelProfile>,

    /// Models eligible for the escalation attempt.
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,

    /// Keyword count requested from the provider per file.
    #[serde(default = "default_max_keywords")]
    pub max_keywords: u32,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

// Default worker concurrency: 4.
fn default_concurrency() -> usize {
    4
}

// Default inter-batch delay: 10 seconds.
fn default_base_delay_secs() -> u64 {
    10
}

fn default_models() -> Vec<ModelProfile> {
    vec![
        ModelProfile {
            id: "vista-pro".to_string(),
            thinking: true,
            rate_class: RateClass::Strict,
        },
        ModelProfile {
            id: "vista-flash".to_string(),
            thinking: false,
            rate_class: RateClass::Standard,
        },
        ModelProfile {
            id: "vista-lite".to_string(),
            thinking: false,
            rate_class: RateClass::Relaxed,
        },
    ]
}

fn default_fallback_models() -> Vec<String> {
    vec!["vista-flash".to_string(), "vista-lite".to_string()]
}

// Default keyword count: 49, the stock-platform maximum minus one slot.
fn default_max_keywords() -> u32 {
    49
}

fn default_api_base() -> String {
    crate::provider::client::API_URL.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            credentials: Vec::new(),
            concurrency: default_concurrency(),
            base_delay_secs: default_base_delay_secs(),
            unrestricted: false,
            model: None,
            models: default_models(),
            fallback_models: default_fallback_models(),
            max_keywords: default_max_keywords(),
            api_base: default_api_base(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `tagmill.toml` in the current directory.
    /// Uses defaults if the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Path::new("tagmill.toml");
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<EngineConfig>(&contents)?
        } else {
            Self::default()
        };

        // Environment variable takes precedence over the config file.
        if let Ok(key) = std::env::var("TAGMILL_API_KEY")
            && !key.is_empty()
        {
            config.credentials.insert(0, CredentialSpec { key, paid: false });
        }

        Ok(config)
    }

    pub fn selection_mode(&self) -> SelectionMode {
        match &self.model {
            Some(id) => SelectionMode::Fixed(id.clone()),
            None => SelectionMode::AutoRotate,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    /// Unrestricted either explicitly or because any key is paid.
    pub fn unrestricted_mode(&self) -> bool {
        self.unrestricted || self.credentials.iter().any(|c| c.paid)
    }

    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            concurrency: self.concurrency,
            base_delay: self.base_delay(),
            unrestricted: self.unrestricted_mode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = EngineConfig::default();
        assert!(config.credentials.is_empty());
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.base_delay_secs, 10);
        assert!(!config.unrestricted);
        assert!(config.model.is_none());
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.fallback_models, vec!["vista-flash", "vista-lite"]);
        assert_eq!(config.max_keywords, 49);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            concurrency = 12
            model = "vista-flash"

            [[credentials]]
            key = "sk-test-123"

            [[credentials]]
            key = "sk-test-456"
            paid = true
        "#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.concurrency, 12);
        assert_eq!(config.credentials.len(), 2);
        assert!(!config.credentials[0].paid);
        assert!(config.credentials[1].paid);
        assert_eq!(config.base_delay_secs, 10);
        assert_eq!(config.selection_mode(), SelectionMode::Fixed("vista-flash".into()));
    }

    #[test]
    fn no_model_means_auto_rotation() {
        let config = EngineConfig::default();
        assert_eq!(config.selection_mode(), SelectionMode::AutoRotate);
    }

    #[test]
    fn paid_credential_implies_unrestricted() {
        let mut config = EngineConfig::default();
        config.credentials.push(CredentialSpec {
            key: "sk-paid".into(),
            paid: true,
        });
        assert!(config.unrestricted_mode());

        let settings = config.schedule_settings();
        assert!(settings.unrestricted);
        assert_eq!(settings.base_delay, Duration::from_secs(10));
    }

    #[test]
    fn custom_model_roster_roundtrips() {
        let toml_str = r#"
            fallback_models = ["vista-mini"]

            [[models]]
            id = "vista-ultra"
            thinking = true
            rate_class = "strict"

            [[models]]
            id = "vista-mini"
        "#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.models.len(), 2);
        assert!(config.models[0].thinking);
        assert_eq!(config.models[0].rate_class, RateClass::Strict);
        assert_eq!(config.models[1].rate_class, RateClass::Standard);
        assert_eq!(config.fallback_models, vec!["vista-mini"]);
    }
}
