use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Relative rate-limit tier of a model, as published by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateClass {
    Strict,
    #[default]
    Standard,
    Relaxed,
}

/// Static capability profile of a selectable inference model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub id: String,
    /// Whether the model runs an internal reasoning phase before answering.
    #[serde(default)]
    pub thinking: bool,
    #[serde(default)]
    pub rate_class: RateClass,
}

/// One provider API key as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSpec {
    pub key: String,
    /// Paid keys are not subject to the credential-count worker coupling.
    #[serde(default)]
    pub paid: bool,
}

/// How the pool picks a model for each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// Always hand out the named model.
    Fixed(String),
    /// Rotate through the roster, least recently used first.
    AutoRotate,
}

struct CredentialSlot {
    key: String,
    last_used: u64,
    in_flight: u32,
}

struct ModelSlot {
    profile: ModelProfile,
    last_used: u64,
}

struct PoolState {
    credentials: Vec<CredentialSlot>,
    models: Vec<ModelSlot>,
    fallbacks: Vec<String>,
    mode: SelectionMode,
    /// Logical clock for last-used stamps. Monotonic, ties impossible;
    /// selection ties (never-used slots) break by pool order.
    clock: u64,
}

/// Credential pool and model roster behind a single atomic acquire.
///
/// Selection and the last-used stamp update happen inside one critical
/// section, so two concurrent callers never receive the same
/// least-recently-used pair while an alternative exists. The lock is never
/// held across a network call.
#[derive(Clone)]
pub struct SelectorPool {
    inner: Arc<Mutex<PoolState>>,
}

/// A (credential, model) pair handed to exactly one in-flight attempt.
/// Dropping the lease returns the credential to the idle set.
pub struct CredentialLease {
    pool: SelectorPool,
    credential_index: usize,
    key: String,
    model: ModelProfile,
}

impl CredentialLease {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn model(&self) -> &ModelProfile {
        &self.model
    }
}

impl Drop for CredentialLease {
    fn drop(&mut self) {
        self.pool.release(self.credential_index);
    }
}

impl SelectorPool {
    pub fn new(
        credentials: Vec<CredentialSpec>,
        models: Vec<ModelProfile>,
        fallbacks: Vec<String>,
        mode: SelectionMode,
    ) -> Result<Self, EngineError> {
        if models.is_empty() {
            return Err(EngineError::Config("model roster is empty".into()));
        }
        for id in &fallbacks {
            if !models.iter().any(|m| &m.id == id) {
                return Err(EngineError::Config(format!(
                    "fallback model '{id}' is not in the roster"
                )));
            }
        }
        if let SelectionMode::Fixed(id) = &mode {
            if !models.iter().any(|m| &m.id == id) {
                return Err(EngineError::Config(format!(
                    "fixed model '{id}' is not in the roster"
                )));
            }
            if !fallbacks.iter().any(|f| f != id) {
                return Err(EngineError::Config(format!(
                    "no fallback model distinct from '{id}' is configured"
                )));
            }
        } else if fallbacks.is_empty() {
            return Err(EngineError::Config(
                "no fallback models configured".into(),
            ));
        }

        let state = PoolState {
            credentials: credentials
                .into_iter()
                .map(|c| CredentialSlot {
                    key: c.key,
                    last_used: 0,
                    in_flight: 0,
                })
                .collect(),
            models: models
                .into_iter()
                .map(|profile| ModelSlot {
                    profile,
                    last_used: 0,
                })
                .collect(),
            fallbacks,
            mode,
            clock: 0,
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(state)),
        })
    }

    pub fn credential_count(&self) -> usize {
        self.lock().credentials.len()
    }

    /// Acquire a (credential, model) pair for one attempt.
    ///
    /// Credentials: least-recently-used among those not in flight; if every
    /// credential is in flight, least-recently-used overall (blocking here
    /// would deadlock runs with more workers than keys). Model choice
    /// follows the configured [`SelectionMode`]. Both stamps are updated
    /// before the lease is returned.
    pub fn acquire(&self) -> Result<CredentialLease, EngineError> {
        let mut state = self.lock();
        let credential_index = Self::select_credential(&mut state)?;
        let model_id = match &state.mode {
            SelectionMode::Fixed(id) => id.clone(),
            SelectionMode::AutoRotate => Self::least_recent_model(&state.models),
        };
        let model = Self::stamp_model(&mut state, &model_id);
        Ok(self.lease(&mut state, credential_index, model))
    }

    /// Acquire a pair for the single escalation attempt: least-recently-used
    /// model from the fallback roster, excluding the model that just failed.
    /// Returns `Ok(None)` when every fallback is excluded.
    pub fn acquire_fallback(
        &self,
        exclude: &str,
    ) -> Result<Option<CredentialLease>, EngineError> {
        let mut state = self.lock();
        let pick = state
            .models
            .iter()
            .filter(|m| state.fallbacks.contains(&m.profile.id) && m.profile.id != exclude)
            .min_by_key(|m| m.last_used)
            .map(|m| m.profile.id.clone());
        let Some(id) = pick else {
            return Ok(None);
        };
        let credential_index = Self::select_credential(&mut state)?;
        let model = Self::stamp_model(&mut state, &id);
        Ok(Some(self.lease(&mut state, credential_index, model)))
    }

    fn lease(
        &self,
        state: &mut PoolState,
        credential_index: usize,
        model: ModelProfile,
    ) -> CredentialLease {
        let key = state.credentials[credential_index].key.clone();
        CredentialLease {
            pool: self.clone(),
            credential_index,
            key,
            model,
        }
    }

    fn select_credential(state: &mut PoolState) -> Result<usize, EngineError> {
        if state.credentials.is_empty() {
            return Err(EngineError::PoolExhausted);
        }
        let idle = state
            .credentials
            .iter()
            .enumerate()
            .filter(|(_, c)| c.in_flight == 0)
            .min_by_key(|(i, c)| (c.last_used, *i))
            .map(|(i, _)| i);
        let index = idle.unwrap_or_else(|| {
            state
                .credentials
                .iter()
                .enumerate()
                .min_by_key(|(i, c)| (c.last_used, *i))
                .map(|(i, _)| i)
                .unwrap_or(0)
        });
        state.clock += 1;
        let slot = &mut state.credentials[index];
        slot.last_used = state.clock;
        slot.in_flight += 1;
        Ok(index)
    }

    fn least_recent_model(models: &[ModelSlot]) -> String {
        models
            .iter()
            .min_by_key(|m| m.last_used)
            .map(|m| m.profile.id.clone())
            .unwrap_or_default()
    }

    fn stamp_model(state: &mut PoolState, id: &str) -> ModelProfile {
        state.clock += 1;
        let clock = state.clock;
        let slot = state
            .models
            .iter_mut()
            .find(|m| m.profile.id == id)
            .expect("model id validated at construction");
        slot.last_used = clock;
        slot.profile.clone()
    }

    fn release(&self, credential_index: usize) {
        let mut state = self.lock();
        if let Some(slot) = state.credentials.get_mut(credential_index) {
            slot.in_flight = slot.in_flight.saturating_sub(1);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        // Poisoning only occurs if a holder panicked inside the short
        // critical section; the state is still coherent for selection.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}
