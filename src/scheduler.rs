use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::cancel::CancellationGate;
use crate::cooldown;
use crate::error::EngineError;
use crate::job::{Job, JobStatus};
use crate::pool::SelectorPool;
use crate::progress::ProgressSink;
use crate::provider::InferenceProvider;
use crate::retry::{RetryController, Verdict};

/// Absolute ceiling on worker concurrency, regardless of configuration.
pub const MAX_WORKERS: usize = 100;

/// Outcome counts for one closed batch window. Jobs still in flight at the
/// window boundary are not counted.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    pub window_index: usize,
    pub successes: usize,
    /// Jobs that settled failing in this window, deferrals included.
    pub failures: usize,
    /// Of `failures`, how many were deferred to a later pass.
    pub deferred: usize,
}

impl WindowSummary {
    pub fn failure_ratio(&self) -> f64 {
        let settled = self.successes + self.failures;
        if settled == 0 {
            0.0
        } else {
            self.failures as f64 / settled as f64
        }
    }
}

/// Terminal record for one job, for reporting and export.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub path: PathBuf,
    pub status: JobStatus,
    pub reason: Option<String>,
}

impl JobRecord {
    fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            path: job.path.clone(),
            status: job.status,
            reason: job.last_failure.clone(),
        }
    }
}

/// Aggregate result of a full scheduling run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs never driven to a terminal state because the run was cancelled.
    pub stopped: usize,
    pub passes: u32,
    pub windows: usize,
    pub records: Vec<JobRecord>,
}

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub concurrency: usize,
    pub base_delay: Duration,
    /// Paid mode: worker count is no longer coupled to credential count.
    pub unrestricted: bool,
}

/// Worker count actually used: the configured concurrency, coupled to the
/// credential count unless unrestricted, and never above [`MAX_WORKERS`].
pub fn effective_concurrency(
    requested: usize,
    credential_count: usize,
    unrestricted: bool,
) -> usize {
    let cap = if unrestricted {
        MAX_WORKERS
    } else {
        MAX_WORKERS.min(credential_count.max(1))
    };
    requested.clamp(1, cap)
}

/// How a job left its window.
enum Disposition {
    Succeeded,
    Terminal,
    Deferred,
    /// Pulled by a worker but abandoned when the gate tripped.
    Interrupted,
    /// Never pulled before the gate tripped.
    NotStarted,
}

/// Partitions jobs into bounded-concurrency windows, drives workers to
/// terminal outcomes, paces between windows, and re-queues deferred jobs
/// for further full passes until the set is drained or stops progressing.
pub struct BatchScheduler<P> {
    controller: Arc<RetryController<P>>,
    pool: SelectorPool,
    gate: Arc<CancellationGate>,
    sink: Arc<dyn ProgressSink>,
    settings: ScheduleSettings,
}

impl<P: InferenceProvider + 'static> BatchScheduler<P> {
    pub fn new(
        controller: RetryController<P>,
        pool: SelectorPool,
        gate: Arc<CancellationGate>,
        sink: Arc<dyn ProgressSink>,
        settings: ScheduleSettings,
    ) -> Self {
        Self {
            controller: Arc::new(controller),
            pool,
            gate,
            sink,
            settings,
        }
    }

    /// Run every job to a terminal outcome.
    ///
    /// On a completed (non-cancelled) run, each input job ends either
    /// Succeeded or FailedTerminal: deferred jobs are re-queued for further
    /// passes, and once a pass settles nothing, the remainder is finalized
    /// as terminal rather than looped forever.
    pub async fn run(&self, jobs: Vec<Job>) -> Result<RunSummary, EngineError> {
        if self.pool.credential_count() == 0 {
            return Err(EngineError::PoolExhausted);
        }
        let workers = effective_concurrency(
            self.settings.concurrency,
            self.pool.credential_count(),
            self.settings.unrestricted,
        );

        let total = jobs.len();
        let mut pending = jobs;
        let mut records: Vec<JobRecord> = Vec::with_capacity(total);
        let mut passes = 0u32;
        let mut windows = 0usize;
        let mut stopped = 0usize;

        loop {
            passes += 1;
            let mut deferred: Vec<Job> = Vec::new();
            let mut pass_settled_any = false;

            while !pending.is_empty() && !self.gate.is_tripped() {
                let take = pending.len().min(workers);
                let window: Vec<Job> = pending.drain(..take).collect();
                let window_index = windows;
                windows += 1;

                let (summary, outcomes) =
                    self.run_window(window_index, window, workers).await;

                for (job, disposition) in outcomes {
                    match disposition {
                        Disposition::Succeeded | Disposition::Terminal => {
                            pass_settled_any = true;
                            records.push(JobRecord::from_job(&job));
                        }
                        Disposition::Deferred => deferred.push(job),
                        Disposition::Interrupted | Disposition::NotStarted => stopped += 1,
                    }
                }
                self.sink.window_closed(&summary);

                // Pace before the next window of this pass; the sleep races
                // the cancellation gate.
                if !pending.is_empty() && !self.gate.is_tripped() {
                    let delay = cooldown::next_delay(&summary, self.settings.base_delay);
                    if !delay.is_zero() {
                        self.sink.cooldown_applied(delay);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = self.gate.cancelled() => {}
                        }
                    }
                }
            }

            if self.gate.is_tripped() {
                stopped += pending.len() + deferred.len();
                break;
            }
            if deferred.is_empty() {
                break;
            }
            if !pass_settled_any {
                // Systematically failing set: nothing settled this pass, so
                // another pass cannot help. Finalize instead of looping.
                for mut job in deferred {
                    let cause = job
                        .last_failure
                        .clone()
                        .unwrap_or_else(|| "retries exhausted".into());
                    let reason = format!("no forward progress: {cause}");
                    job.mark_terminal(reason.clone());
                    self.sink.job_failed(&job, &reason);
                    records.push(JobRecord::from_job(&job));
                }
                break;
            }

            pending = deferred
                .into_iter()
                .map(|mut job| {
                    job.prepare_next_pass();
                    job
                })
                .collect();
        }

        let succeeded = records
            .iter()
            .filter(|r| r.status == JobStatus::Succeeded)
            .count();
        let failed = records
            .iter()
            .filter(|r| r.status == JobStatus::FailedTerminal)
            .count();

        Ok(RunSummary {
            total,
            succeeded,
            failed,
            stopped,
            passes,
            windows,
            records,
        })
    }

    /// Drive one window: spawn up to `workers` tasks, each pulling jobs off
    /// the shared window queue until it drains or the gate trips.
    async fn run_window(
        &self,
        window_index: usize,
        window: Vec<Job>,
        workers: usize,
    ) -> (WindowSummary, Vec<(Job, Disposition)>) {
        let worker_count = workers.min(window.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(window)));

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let controller = Arc::clone(&self.controller);
            let gate = Arc::clone(&self.gate);
            let sink = Arc::clone(&self.sink);
            handles.push(tokio::spawn(async move {
                let mut settled: Vec<(Job, Disposition)> = Vec::new();
                loop {
                    if gate.is_tripped() {
                        break;
                    }
                    let next = queue.lock().await.pop_front();
                    let Some(mut job) = next else { break };

                    sink.job_started(&job);
                    let verdict = controller.run(&mut job).await;
                    let disposition = match verdict {
                        Verdict::Succeeded(payload) => {
                            sink.job_succeeded(&job, &payload);
                            Disposition::Succeeded
                        }
                        Verdict::Terminal { reason } => {
                            sink.job_failed(&job, &reason);
                            Disposition::Terminal
                        }
                        Verdict::Retryable { .. } => Disposition::Deferred,
                        Verdict::Interrupted => Disposition::Interrupted,
                    };
                    settled.push((job, disposition));
                }
                settled
            }));
        }

        let mut outcomes: Vec<(Job, Disposition)> = Vec::new();
        for handle in handles {
            if let Ok(worker_outcomes) = handle.await {
                outcomes.extend(worker_outcomes);
            }
        }
        // Jobs still queued when the gate tripped were never started.
        {
            let mut leftover = queue.lock().await;
            while let Some(job) = leftover.pop_front() {
                outcomes.push((job, Disposition::NotStarted));
            }
        }

        let successes = outcomes
            .iter()
            .filter(|(_, d)| matches!(d, Disposition::Succeeded))
            .count();
        let deferred = outcomes
            .iter()
            .filter(|(_, d)| matches!(d, Disposition::Deferred))
            .count();
        let terminal = outcomes
            .iter()
            .filter(|(_, d)| matches!(d, Disposition::Terminal))
            .count();

        let summary = WindowSummary {
            window_index,
            successes,
            failures: terminal + deferred,
            deferred,
        };
        (summary, outcomes)
    }
}
