use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broad media category of an input file. Decides which preprocessing the
/// surrounding application ran and is forwarded verbatim to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileCategory {
    Image,
    Vector,
    Video,
}

impl FileCategory {
    /// Map a file extension to its category. Returns `None` for anything
    /// the pipeline does not handle.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" => Some(FileCategory::Image),
            "eps" | "ai" | "svg" => Some(FileCategory::Vector),
            "mp4" | "mov" | "avi" | "mkv" | "webm" => Some(FileCategory::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Vector => "vector",
            FileCategory::Video => "video",
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Distinguishes inference-side failures from file/environment failures.
/// The two classes carry different retry ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    /// Provider-side failure (rate limit, server error, bad response).
    Inference,
    /// Local failure while preparing the attempt (file unreadable, etc.).
    FileOperation,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::Inference => write!(f, "inference"),
            FailureClass::FileOperation => write!(f, "file operation"),
        }
    }
}

/// Tracks the lifecycle status of a job.
///
/// Transitions are monotonic: Pending → InFlight → {Succeeded,
/// FailedRetryable, FailedTerminal}. A FailedRetryable job may re-enter
/// Pending for a later scheduling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InFlight,
    Succeeded,
    FailedRetryable,
    FailedTerminal,
}

/// One file's unit of work: inference to terminal outcome, with retry
/// bookkeeping. Mutated only by the worker currently holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub path: PathBuf,
    pub category: FileCategory,
    pub status: JobStatus,
    /// Attempts consumed in the current scheduling pass, per failure class.
    pub inference_attempts: u32,
    pub file_op_attempts: u32,
    /// Passes that ended with this job still failing, per failure class.
    pub inference_pass_failures: u32,
    pub file_op_pass_failures: u32,
    /// Whether the fallback-model escalation ran in the current pass.
    pub escalation_used: bool,
    pub last_failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(path: PathBuf, category: FileCategory) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            path,
            category,
            status: JobStatus::Pending,
            inference_attempts: 0,
            file_op_attempts: 0,
            inference_pass_failures: 0,
            file_op_pass_failures: 0,
            escalation_used: false,
            last_failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn attempts(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::Inference => self.inference_attempts,
            FailureClass::FileOperation => self.file_op_attempts,
        }
    }

    pub fn record_attempt(&mut self, class: FailureClass, reason: String) {
        match class {
            FailureClass::Inference => self.inference_attempts += 1,
            FailureClass::FileOperation => self.file_op_attempts += 1,
        }
        self.last_failure = Some(reason);
        self.updated_at = Utc::now();
    }

    pub fn pass_failures(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::Inference => self.inference_pass_failures,
            FailureClass::FileOperation => self.file_op_pass_failures,
        }
    }

    pub fn mark_in_flight(&mut self) {
        self.status = JobStatus::InFlight;
        self.updated_at = Utc::now();
    }

    pub fn mark_succeeded(&mut self) {
        self.status = JobStatus::Succeeded;
        self.last_failure = None;
        self.updated_at = Utc::now();
    }

    /// End the current pass still failing, but eligible for a later pass.
    pub fn mark_retryable(&mut self, class: FailureClass, reason: String) {
        match class {
            FailureClass::Inference => self.inference_pass_failures += 1,
            FailureClass::FileOperation => self.file_op_pass_failures += 1,
        }
        self.status = JobStatus::FailedRetryable;
        self.last_failure = Some(reason);
        self.updated_at = Utc::now();
    }

    pub fn mark_terminal(&mut self, reason: String) {
        self.status = JobStatus::FailedTerminal;
        self.last_failure = Some(reason);
        self.updated_at = Utc::now();
    }

    /// Reset per-pass counters before re-queueing for the next full pass.
    /// Pass-failure counters survive; they gate future deferrals.
    pub fn prepare_next_pass(&mut self) {
        self.status = JobStatus::Pending;
        self.inference_attempts = 0;
        self.file_op_attempts = 0;
        self.escalation_used = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_creation_defaults() {
        let job = Job::new(PathBuf::from("shots/a.jpg"), FileCategory::Image);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.inference_attempts, 0);
        assert_eq!(job.inference_pass_failures, 0);
        assert!(!job.escalation_used);
        assert!(job.last_failure.is_none());
    }

    #[test]
    fn category_from_extension() {
        assert_eq!(
            FileCategory::from_path(Path::new("x/photo.JPG")),
            Some(FileCategory::Image)
        );
        assert_eq!(
            FileCategory::from_path(Path::new("art.svg")),
            Some(FileCategory::Vector)
        );
        assert_eq!(
            FileCategory::from_path(Path::new("clip.mkv")),
            Some(FileCategory::Video)
        );
        assert_eq!(FileCategory::from_path(Path::new("notes.txt")), None);
        assert_eq!(FileCategory::from_path(Path::new("noext")), None);
    }

    #[test]
    fn attempts_tracked_per_class() {
        let mut job = Job::new(PathBuf::from("a.png"), FileCategory::Image);
        job.record_attempt(FailureClass::Inference, "rate limited".into());
        job.record_attempt(FailureClass::Inference, "rate limited".into());
        job.record_attempt(FailureClass::FileOperation, "unreadable".into());

        assert_eq!(job.attempts(FailureClass::Inference), 2);
        assert_eq!(job.attempts(FailureClass::FileOperation), 1);
        assert_eq!(job.last_failure.as_deref(), Some("unreadable"));
    }

    #[test]
    fn next_pass_resets_attempts_but_keeps_pass_failures() {
        let mut job = Job::new(PathBuf::from("a.png"), FileCategory::Image);
        job.mark_in_flight();
        job.record_attempt(FailureClass::Inference, "server error".into());
        job.escalation_used = true;
        job.mark_retryable(FailureClass::Inference, "server error".into());
        assert_eq!(job.status, JobStatus::FailedRetryable);
        assert_eq!(job.pass_failures(FailureClass::Inference), 1);

        job.prepare_next_pass();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts(FailureClass::Inference), 0);
        assert!(!job.escalation_used);
        assert_eq!(job.pass_failures(FailureClass::Inference), 1);
    }

    #[test]
    fn job_serialization_roundtrip() {
        let job = Job::new(PathBuf::from("vectors/logo.eps"), FileCategory::Vector);
        let json = serde_json::to_string(&job).unwrap();
        let parsed: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, job.id);
        assert_eq!(parsed.category, FileCategory::Vector);
        assert_eq!(parsed.status, JobStatus::Pending);
    }
}
