//! Terminal progress reporting — spinner and colored per-job lines.
//!
//! The engine only ever talks to the [`ProgressSink`] trait; the console
//! implementation here is what the CLI wires in. Tests use collecting or
//! silent sinks instead.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::job::Job;
use crate::provider::MetadataPayload;
use crate::scheduler::{RunSummary, WindowSummary};

/// Stream of lifecycle events emitted by the batch scheduler.
///
/// Terminal job outcomes are reported exactly once; a deferred job only
/// shows up in its window's summary until it finally succeeds or fails.
pub trait ProgressSink: Send + Sync {
    fn job_started(&self, job: &Job);
    fn job_succeeded(&self, job: &Job, payload: &MetadataPayload);
    fn job_failed(&self, job: &Job, reason: &str);
    fn window_closed(&self, summary: &WindowSummary);
    fn cooldown_applied(&self, delay: Duration);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn job_started(&self, _job: &Job) {}
    fn job_succeeded(&self, _job: &Job, _payload: &MetadataPayload) {}
    fn job_failed(&self, _job: &Job, _reason: &str) {}
    fn window_closed(&self, _summary: &WindowSummary) {}
    fn cooldown_applied(&self, _delay: Duration) {}
}

/// Live progress in the terminal: spinner plus one line per terminal
/// outcome, colored by result.
pub struct ConsoleProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    magenta: Style,
}

impl ConsoleProgress {
    pub fn start(total_jobs: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("Processing {total_jobs} files..."));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            magenta: Style::new().magenta(),
        }
    }

    /// Stop the spinner and print the run summary block.
    pub fn finish(&self, summary: &RunSummary) {
        self.pb.finish_and_clear();
        println!();
        println!("─── Summary ───");
        println!("Total files: {}", summary.total);
        println!("  {} {}", self.green.apply_to("✓"), summary.succeeded);
        println!("  {} {}", self.red.apply_to("✗"), summary.failed);
        if summary.stopped > 0 {
            println!("  {} {} (stopped)", self.yellow.apply_to("⊘"), summary.stopped);
        }
        println!(
            "Windows: {}, passes: {}",
            summary.windows, summary.passes
        );
    }
}

impl ProgressSink for ConsoleProgress {
    fn job_started(&self, job: &Job) {
        self.pb.set_message(job.file_name());
    }

    fn job_succeeded(&self, job: &Job, payload: &MetadataPayload) {
        self.pb.println(format!(
            "  {} {} — {}",
            self.green.apply_to("✓"),
            job.file_name(),
            payload.title
        ));
    }

    fn job_failed(&self, job: &Job, reason: &str) {
        self.pb.println(format!(
            "  {} {} ({reason})",
            self.red.apply_to("✗"),
            job.file_name()
        ));
    }

    fn window_closed(&self, summary: &WindowSummary) {
        self.pb.println(format!(
            "  {} window {}: {} ok, {} failed, {} deferred",
            self.yellow.apply_to("▸"),
            summary.window_index + 1,
            summary.successes,
            summary.failures - summary.deferred,
            summary.deferred
        ));
    }

    fn cooldown_applied(&self, delay: Duration) {
        self.pb.println(format!(
            "  {} cool-down {}s before next batch...",
            self.magenta.apply_to("…"),
            delay.as_secs()
        ));
    }
}
