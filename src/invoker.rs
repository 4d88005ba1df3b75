use serde::Serialize;

use crate::job::{FailureClass, Job};
use crate::pool::{CredentialLease, CredentialSpec};
use crate::provider::{InferenceProvider, InferenceRequest, MetadataPayload, ProviderError};

/// Classified result of exactly one inference attempt.
///
/// This is the boundary between provider-specific failure reporting and
/// the provider-agnostic retry policy: everything past this enum treats
/// the provider as opaque.
#[derive(Debug)]
pub enum Outcome {
    Success(MetadataPayload),
    RateLimited,
    TransientServer(String),
    MalformedResponse(String),
    FatalClient(String),
    FileOperation(String),
}

impl Outcome {
    /// Which retry budget a failed attempt draws from. `None` for success
    /// and for fatal failures, which never consume budget.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Outcome::Success(_) | Outcome::FatalClient(_) => None,
            Outcome::FileOperation(_) => Some(FailureClass::FileOperation),
            _ => Some(FailureClass::Inference),
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Outcome::Success(_) => "success".into(),
            Outcome::RateLimited => "rate limited".into(),
            Outcome::TransientServer(msg) => format!("server error: {msg}"),
            Outcome::MalformedResponse(msg) => format!("malformed response: {msg}"),
            Outcome::FatalClient(msg) => format!("rejected: {msg}"),
            Outcome::FileOperation(msg) => format!("file operation failed: {msg}"),
        }
    }
}

/// Drives exactly one inference call per [`attempt`](Invoker::attempt) and
/// classifies the result. Performs no retrying and mutates no shared state.
pub struct Invoker<P> {
    provider: P,
    max_keywords: u32,
}

impl<P: InferenceProvider> Invoker<P> {
    pub fn new(provider: P, max_keywords: u32) -> Self {
        Self {
            provider,
            max_keywords,
        }
    }

    pub async fn attempt(&self, job: &Job, lease: &CredentialLease) -> Outcome {
        let model = lease.model();
        let request = InferenceRequest {
            model: model.id.clone(),
            path: job.path.clone(),
            category: job.category,
            max_keywords: self.max_keywords,
            thinking: model.thinking,
        };
        match self.provider.send(lease.key(), &request).await {
            Ok(payload) if payload.is_empty() => {
                Outcome::MalformedResponse("payload carries no title or keywords".into())
            }
            Ok(payload) => Outcome::Success(payload),
            Err(err) => classify(err),
        }
    }
}

/// Fold a provider error into the outcome taxonomy. The only place where
/// provider status codes are interpreted.
fn classify(err: ProviderError) -> Outcome {
    match err {
        ProviderError::RateLimited { .. } => Outcome::RateLimited,
        ProviderError::Api { status, message } if (500..=599).contains(&status) => {
            Outcome::TransientServer(format!("status {status}: {message}"))
        }
        ProviderError::Api { status, message } => {
            Outcome::FatalClient(format!("status {status}: {message}"))
        }
        ProviderError::Malformed(msg) => Outcome::MalformedResponse(msg),
        ProviderError::Network(err) => Outcome::TransientServer(err.to_string()),
        ProviderError::File(err) => Outcome::FileOperation(err.to_string()),
    }
}

/// Health of one configured credential as reported by a probe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialHealth {
    Usable,
    RateLimited,
    Invalid,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialReport {
    /// Last characters of the key, for display without leaking it.
    pub key_tail: String,
    pub health: CredentialHealth,
    pub detail: Option<String>,
}

fn key_tail(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(5)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

/// Probe every configured credential once and report which are usable.
/// Rate-limited keys are valid, just momentarily out of quota.
pub async fn check_credentials<P: InferenceProvider>(
    provider: &P,
    credentials: &[CredentialSpec],
) -> Vec<CredentialReport> {
    let mut reports = Vec::with_capacity(credentials.len());
    for spec in credentials {
        let report = match provider.probe(&spec.key).await {
            Ok(()) => CredentialReport {
                key_tail: key_tail(&spec.key),
                health: CredentialHealth::Usable,
                detail: None,
            },
            Err(ProviderError::RateLimited { .. }) => CredentialReport {
                key_tail: key_tail(&spec.key),
                health: CredentialHealth::RateLimited,
                detail: None,
            },
            Err(err) => CredentialReport {
                key_tail: key_tail(&spec.key),
                health: CredentialHealth::Invalid,
                detail: Some(err.to_string()),
            },
        };
        reports.push(report);
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FileCategory;
    use crate::pool::{ModelProfile, RateClass, SelectionMode, SelectorPool};
    use std::path::PathBuf;

    /// Scripted provider: returns the same result for every call.
    struct ScriptedProvider {
        script: Script,
    }

    enum Script {
        Ok(MetadataPayload),
        RateLimited,
        Status(u16),
        Malformed,
        FileError,
    }

    impl InferenceProvider for ScriptedProvider {
        async fn send(
            &self,
            _credential: &str,
            _request: &InferenceRequest,
        ) -> Result<MetadataPayload, ProviderError> {
            match &self.script {
                Script::Ok(payload) => Ok(payload.clone()),
                Script::RateLimited => Err(ProviderError::RateLimited { retry_after_ms: 1000 }),
                Script::Status(code) => Err(ProviderError::Api {
                    status: *code,
                    message: "scripted".into(),
                }),
                Script::Malformed => Err(ProviderError::Malformed("bad json".into())),
                Script::FileError => Err(ProviderError::File(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "missing",
                ))),
            }
        }

        async fn probe(&self, _credential: &str) -> Result<(), ProviderError> {
            match &self.script {
                Script::Ok(_) => Ok(()),
                Script::RateLimited => Err(ProviderError::RateLimited { retry_after_ms: 500 }),
                _ => Err(ProviderError::Api {
                    status: 401,
                    message: "invalid key".into(),
                }),
            }
        }
    }

    fn payload() -> MetadataPayload {
        MetadataPayload {
            title: "A title".into(),
            description: "A description".into(),
            keywords: vec!["one".into()],
            category: None,
        }
    }

    fn test_pool() -> SelectorPool {
        SelectorPool::new(
            vec![CredentialSpec {
                key: "k1".into(),
                paid: false,
            }],
            vec![
                ModelProfile {
                    id: "vista-pro".into(),
                    thinking: false,
                    rate_class: RateClass::Standard,
                },
                ModelProfile {
                    id: "vista-flash".into(),
                    thinking: false,
                    rate_class: RateClass::Relaxed,
                },
            ],
            vec!["vista-flash".into()],
            SelectionMode::AutoRotate,
        )
        .unwrap()
    }

    fn test_job() -> Job {
        Job::new(PathBuf::from("shots/a.jpg"), FileCategory::Image)
    }

    async fn outcome_for(script: Script) -> Outcome {
        let invoker = Invoker::new(ScriptedProvider { script }, 49);
        let pool = test_pool();
        let lease = pool.acquire().unwrap();
        invoker.attempt(&test_job(), &lease).await
    }

    #[tokio::test]
    async fn success_passes_payload_through() {
        let outcome = outcome_for(Script::Ok(payload())).await;
        match outcome {
            Outcome::Success(p) => assert_eq!(p.title, "A title"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_payload_is_malformed() {
        let empty = MetadataPayload {
            title: "".into(),
            description: "".into(),
            keywords: vec![],
            category: None,
        };
        let outcome = outcome_for(Script::Ok(empty)).await;
        assert!(matches!(outcome, Outcome::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn http_429_is_rate_limited() {
        let outcome = outcome_for(Script::RateLimited).await;
        assert!(matches!(outcome, Outcome::RateLimited));
        assert_eq!(outcome.failure_class(), Some(FailureClass::Inference));
    }

    #[tokio::test]
    async fn http_5xx_is_transient() {
        let outcome = outcome_for(Script::Status(503)).await;
        assert!(matches!(outcome, Outcome::TransientServer(_)));
        assert_eq!(outcome.failure_class(), Some(FailureClass::Inference));
    }

    #[tokio::test]
    async fn http_4xx_is_fatal_and_consumes_no_budget() {
        let outcome = outcome_for(Script::Status(415)).await;
        assert!(matches!(outcome, Outcome::FatalClient(_)));
        assert_eq!(outcome.failure_class(), None);
    }

    #[tokio::test]
    async fn io_failure_is_file_operation_class() {
        let outcome = outcome_for(Script::FileError).await;
        assert!(matches!(outcome, Outcome::FileOperation(_)));
        assert_eq!(outcome.failure_class(), Some(FailureClass::FileOperation));
    }

    #[tokio::test]
    async fn check_credentials_reports_per_key_health() {
        let provider = ScriptedProvider {
            script: Script::RateLimited,
        };
        let creds = vec![
            CredentialSpec {
                key: "sk-alpha-12345".into(),
                paid: false,
            },
            CredentialSpec {
                key: "sk-beta-67890".into(),
                paid: true,
            },
        ];
        let reports = check_credentials(&provider, &creds).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].key_tail, "...12345");
        assert_eq!(reports[0].health, CredentialHealth::RateLimited);
    }

    #[test]
    fn key_tail_handles_short_keys() {
        assert_eq!(key_tail("abc"), "...abc");
        assert_eq!(key_tail("sk-verylongkey"), "...ngkey");
    }
}
