use std::sync::Arc;

use crate::cancel::CancellationGate;
use crate::invoker::{Invoker, Outcome};
use crate::job::{FailureClass, Job};
use crate::pool::SelectorPool;
use crate::provider::{InferenceProvider, MetadataPayload};

/// Attempt ceiling for provider-side failures within one scheduling pass.
pub const INFERENCE_ATTEMPT_CEILING: u32 = 5;

/// Attempt ceiling for file/environment failures within one scheduling pass.
pub const FILE_OP_ATTEMPT_CEILING: u32 = 3;

/// Per-class retry ceilings. The same ceilings bound how many passes a job
/// may be deferred to before it is finalized as terminal.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub inference_ceiling: u32,
    pub file_op_ceiling: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            inference_ceiling: INFERENCE_ATTEMPT_CEILING,
            file_op_ceiling: FILE_OP_ATTEMPT_CEILING,
        }
    }
}

impl RetryPolicy {
    pub fn ceiling(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::Inference => self.inference_ceiling,
            FailureClass::FileOperation => self.file_op_ceiling,
        }
    }
}

/// Terminal verdict for one job within one scheduling pass.
#[derive(Debug)]
pub enum Verdict {
    Succeeded(MetadataPayload),
    /// Budget for this pass is spent, but the job may join a later pass.
    Retryable { reason: String },
    Terminal { reason: String },
    /// The cancellation gate tripped before the job reached a terminal
    /// state; no further attempts were made.
    Interrupted,
}

/// Wraps the invoker with bounded, class-specific retries and the single
/// fallback-model escalation.
pub struct RetryController<P> {
    pool: SelectorPool,
    invoker: Invoker<P>,
    policy: RetryPolicy,
    gate: Arc<CancellationGate>,
}

impl<P: InferenceProvider> RetryController<P> {
    pub fn new(
        pool: SelectorPool,
        invoker: Invoker<P>,
        policy: RetryPolicy,
        gate: Arc<CancellationGate>,
    ) -> Self {
        Self {
            pool,
            invoker,
            policy,
            gate,
        }
    }

    /// Drive one job to a terminal verdict for this pass.
    ///
    /// Every retry acquires a fresh (credential, model) pair; the lease is
    /// released as soon as the attempt returns, so the pool rotates under
    /// concurrency. Fatal outcomes bypass the budget entirely.
    pub async fn run(&self, job: &mut Job) -> Verdict {
        job.mark_in_flight();

        let mut last_model: Option<String> = None;
        let mut last_class = FailureClass::Inference;
        let mut last_reason = String::new();

        loop {
            if self.gate.is_tripped() {
                return Verdict::Interrupted;
            }
            let lease = match self.pool.acquire() {
                Ok(lease) => lease,
                Err(err) => {
                    let reason = err.to_string();
                    job.mark_terminal(reason.clone());
                    return Verdict::Terminal { reason };
                }
            };
            let outcome = self.invoker.attempt(job, &lease).await;
            last_model = Some(lease.model().id.clone());
            drop(lease);

            match outcome {
                Outcome::Success(payload) => {
                    job.mark_succeeded();
                    return Verdict::Succeeded(payload);
                }
                Outcome::FatalClient(msg) => {
                    job.mark_terminal(msg.clone());
                    return Verdict::Terminal { reason: msg };
                }
                other => {
                    let class = match &other {
                        Outcome::FileOperation(_) => FailureClass::FileOperation,
                        _ => FailureClass::Inference,
                    };
                    last_class = class;
                    last_reason = other.reason();
                    job.record_attempt(class, last_reason.clone());
                    if job.attempts(class) >= self.policy.ceiling(class) {
                        break;
                    }
                }
            }
        }

        // Primary budget spent. Inference failures get exactly one
        // escalation attempt on a fallback model, excluding the one that
        // just failed.
        if last_class == FailureClass::Inference && !job.escalation_used {
            job.escalation_used = true;
            if self.gate.is_tripped() {
                return Verdict::Interrupted;
            }
            if let Some(exclude) = last_model.as_deref() {
                if let Ok(Some(lease)) = self.pool.acquire_fallback(exclude) {
                    let outcome = self.invoker.attempt(job, &lease).await;
                    drop(lease);
                    match outcome {
                        Outcome::Success(payload) => {
                            job.mark_succeeded();
                            return Verdict::Succeeded(payload);
                        }
                        Outcome::FatalClient(msg) => {
                            job.mark_terminal(msg.clone());
                            return Verdict::Terminal { reason: msg };
                        }
                        other => {
                            last_reason = other.reason();
                        }
                    }
                }
            }
        }

        // Defer to a later full pass while the class still has pass budget.
        if job.pass_failures(last_class) < self.policy.ceiling(last_class) {
            job.mark_retryable(last_class, last_reason.clone());
            Verdict::Retryable {
                reason: last_reason,
            }
        } else {
            job.mark_terminal(last_reason.clone());
            Verdict::Terminal {
                reason: last_reason,
            }
        }
    }
}
