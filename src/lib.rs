//! tagmill — adaptive concurrent batch engine for AI media-metadata
//! enrichment.
//!
//! The engine takes a discovered list of media files, drives a bounded pool
//! of concurrent workers against a quota-constrained inference provider,
//! rotates credentials and models least-recently-used to spread load,
//! classifies and retries failures per class, and paces batches from the
//! previous window's failure ratio. File discovery, configuration, and
//! progress display are collaborators wired in by the binary.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod invoker;
pub mod job;
pub mod pool;
pub mod progress;
pub mod provider;
pub mod retry;
pub mod scheduler;

pub use cancel::CancellationGate;
pub use config::EngineConfig;
pub use error::EngineError;
pub use invoker::{Invoker, Outcome};
pub use job::{FailureClass, FileCategory, Job, JobStatus};
pub use pool::{CredentialLease, CredentialSpec, ModelProfile, SelectionMode, SelectorPool};
pub use progress::{ConsoleProgress, ProgressSink, SilentProgress};
pub use provider::{InferenceProvider, MetadataPayload, ProviderClient};
pub use retry::{RetryController, RetryPolicy, Verdict};
pub use scheduler::{BatchScheduler, RunSummary, ScheduleSettings, WindowSummary};
