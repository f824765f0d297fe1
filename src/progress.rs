//! Per-item progress reporting for backfill, cleanup, and extract.
//!
//! Progress is emitted on **stderr** so stdout stays reserved for the run
//! summary. Human output is one line per item; JSON output is one object
//! per line for scripts.

use std::io::Write;

/// Which orchestrator emitted an event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Job {
    Backfill,
    Cleanup,
    Extract,
}

impl Job {
    pub fn as_str(&self) -> &'static str {
        match self {
            Job::Backfill => "backfill",
            Job::Cleanup => "cleanup",
            Job::Extract => "extract",
        }
    }
}

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// A phase started; `total` items are queued.
    Phase { job: Job, name: String, total: u64 },
    /// An entity was created (`kind` is `account`, `invoice`, or `attachment`).
    Created { job: Job, kind: &'static str, label: String },
    /// An entity was deleted.
    Deleted { job: Job, kind: &'static str, label: String },
    /// A vendor row was extracted.
    Extracted { job: Job, label: String, n: u64, total: u64 },
    /// An item was skipped without error.
    Skipped { job: Job, label: String, reason: String },
    /// An item failed and the run continued.
    Failed { job: Job, label: String, error: String },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: `backfill  + account  Apex Logistics`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Phase { job, name, total } => {
                format!("{}  {}  ({} items)\n", job.as_str(), name, format_number(*total))
            }
            ProgressEvent::Created { job, kind, label } => {
                format!("{}  + {}  {}\n", job.as_str(), kind, label)
            }
            ProgressEvent::Deleted { job, kind, label } => {
                format!("{}  - {}  {}\n", job.as_str(), kind, label)
            }
            ProgressEvent::Extracted {
                job,
                label,
                n,
                total,
            } => format!(
                "{}  {} / {}  {}\n",
                job.as_str(),
                format_number(*n),
                format_number(*total),
                label
            ),
            ProgressEvent::Skipped { job, label, reason } => {
                format!("{}  skip  {}  ({})\n", job.as_str(), label, reason)
            }
            ProgressEvent::Failed { job, label, error } => {
                format!("{}  FAILED  {}  {}\n", job.as_str(), label, error)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Phase { job, name, total } => serde_json::json!({
                "event": "phase", "job": job.as_str(), "phase": name, "total": total
            }),
            ProgressEvent::Created { job, kind, label } => serde_json::json!({
                "event": "created", "job": job.as_str(), "kind": kind, "label": label
            }),
            ProgressEvent::Deleted { job, kind, label } => serde_json::json!({
                "event": "deleted", "job": job.as_str(), "kind": kind, "label": label
            }),
            ProgressEvent::Extracted {
                job,
                label,
                n,
                total,
            } => serde_json::json!({
                "event": "extracted", "job": job.as_str(), "label": label, "n": n, "total": total
            }),
            ProgressEvent::Skipped { job, label, reason } => serde_json::json!({
                "event": "skipped", "job": job.as_str(), "label": label, "reason": reason
            }),
            ProgressEvent::Failed { job, label, error } => serde_json::json!({
                "event": "failed", "job": job.as_str(), "label": label, "error": error
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
