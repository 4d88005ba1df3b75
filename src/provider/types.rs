use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::job::FileCategory;

/// Everything the client needs for one inference call. Built by the
/// invoker from the job and the acquired (credential, model) lease.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub model: String,
    pub path: PathBuf,
    pub category: FileCategory,
    pub max_keywords: u32,
    /// Ask the model to run its reasoning phase, when it supports one.
    pub thinking: bool,
}

/// Descriptive metadata produced by the provider for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Provider-suggested stock category, when it emits one.
    #[serde(default)]
    pub category: Option<String>,
}

impl MetadataPayload {
    /// A payload with neither title nor keywords carries nothing worth
    /// embedding; the invoker treats it as malformed.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.keywords.is_empty()
    }
}
