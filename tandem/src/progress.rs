//! Reindex task tracker: polls the engine's task endpoint until the task
//! completes, reporting throughput and two ETA estimates.

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::client::{ClusterManager, TaskRecord};
use crate::error::Result;

/// How often the engine is asked for task status.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How many samples the recent-window estimate looks back over. At the
/// default poll interval this is two minutes of history.
pub const SAMPLE_WINDOW: usize = 12;

/// One status observation: time since the tracker started, documents
/// processed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub elapsed: Duration,
    pub progress: u64,
}

/// ETA assuming throughput stays at the whole-run average.
///
/// `None` until any progress is observed; a fresh task has no rate to
/// extrapolate from.
pub fn eta_since_start(elapsed: Duration, progress: u64, remaining: u64) -> Option<Duration> {
    if progress == 0 {
        return None;
    }
    Some(elapsed.mul_f64(remaining as f64 / progress as f64))
}

/// ETA from the sample window only, reacting to recent throughput
/// changes. A stalled window (no progress between the oldest and newest
/// sample) yields `None` rather than dividing by zero.
pub fn eta_recent(samples: &VecDeque<Sample>, remaining: u64) -> Option<Duration> {
    let (first, last) = (samples.front()?, samples.back()?);
    let delta_progress = last.progress.checked_sub(first.progress)?;
    if delta_progress == 0 {
        return None;
    }
    let delta_elapsed = last.elapsed.checked_sub(first.elapsed)?;
    Some(delta_elapsed.mul_f64(remaining as f64 / delta_progress as f64))
}

fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => format!("{:.0}s", eta.as_secs_f64()),
        None => "unknown".to_string(),
    }
}

/// Blocks until a long-running engine task finishes.
pub struct TaskTracker<'a> {
    manager: &'a ClusterManager,
    task_id: String,
    interval: Duration,
    samples: VecDeque<Sample>,
}

impl<'a> TaskTracker<'a> {
    pub fn new(manager: &'a ClusterManager, task_id: impl Into<String>) -> Self {
        Self {
            manager,
            task_id: task_id.into(),
            interval: POLL_INTERVAL,
            samples: VecDeque::with_capacity(SAMPLE_WINDOW),
        }
    }

    /// Shorten the poll interval (tests; small indices).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll until the task reports completion, drawing a progress bar and
    /// logging both ETA estimates each round.
    ///
    /// `TaskMissing` and `Task` errors are fatal and propagate
    /// immediately; there is no retry for an id the engine no longer
    /// knows about or a response it cannot explain.
    pub fn wait(mut self) -> Result<TaskRecord> {
        let start = Instant::now();
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
        );
        loop {
            let record = self.manager.get_task(&self.task_id)?;
            let progress = record.status.progress();
            let remaining = record.status.remaining();
            self.push_sample(Sample {
                elapsed: start.elapsed(),
                progress,
            });
            bar.set_length(record.status.total);
            bar.set_position(progress);
            if record.completed {
                bar.finish_with_message(format!(
                    "done in {:.1}s",
                    start.elapsed().as_secs_f64()
                ));
                return Ok(record);
            }
            let overall = eta_since_start(start.elapsed(), progress, remaining);
            let recent = eta_recent(&self.samples, remaining);
            bar.set_message(format!("ETA: {}", format_eta(recent)));
            info!(
                task_id = %self.task_id,
                progress,
                remaining,
                eta_overall = %format_eta(overall),
                eta_recent = %format_eta(recent),
                "task progress"
            );
            thread::sleep(self.interval);
        }
    }

    fn push_sample(&mut self, sample: Sample) {
        if self.samples.len() == SAMPLE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }
}
