//! Model pull progress reporting.
//!
//! `feed articles load` pulls the LLM through Ollama before touching
//! Weaviate. The pull streams discrete status events, some carrying a
//! completed/total byte pair. Progress is emitted on **stderr** so stdout
//! stays parseable for scripts.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single progress event for a model pull.
#[derive(Clone, Debug, PartialEq)]
pub enum PullProgressEvent {
    /// Status-only line (e.g. "pulling manifest", "verifying sha256 digest").
    Status { status: String },
    /// Layer download progress.
    Transfer {
        status: String,
        completed: u64,
        total: u64,
    },
    /// The model is present locally (pulled now or already there).
    Done { model: String },
}

/// Reports pull progress. Implementations write to stderr (human or JSON).
pub trait PullProgressReporter: Send + Sync {
    fn report(&self, event: &PullProgressEvent);
}

/// Human-friendly progress: transfer lines overwrite each other in place,
/// status lines get their own line.
#[derive(Default)]
pub struct StderrProgress {
    mid_line: AtomicBool,
}

impl PullProgressReporter for StderrProgress {
    fn report(&self, event: &PullProgressEvent) {
        let was_mid_line = self.mid_line.load(Ordering::Relaxed);
        let line = match event {
            PullProgressEvent::Status { status } => {
                self.mid_line.store(false, Ordering::Relaxed);
                let prefix = if was_mid_line { "\n" } else { "" };
                format!("{}status: {}\n", prefix, status)
            }
            PullProgressEvent::Transfer {
                status,
                completed,
                total,
            } => {
                self.mid_line.store(true, Ordering::Relaxed);
                format!("\r{}", format_transfer(status, *completed, *total))
            }
            PullProgressEvent::Done { model } => {
                self.mid_line.store(false, Ordering::Relaxed);
                let prefix = if was_mid_line { "\n" } else { "" };
                format!("{}model {} ready\n", prefix, model)
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl PullProgressReporter for JsonProgress {
    fn report(&self, event: &PullProgressEvent) {
        let obj = match event {
            PullProgressEvent::Status { status } => serde_json::json!({
                "event": "pull",
                "status": status
            }),
            PullProgressEvent::Transfer {
                status,
                completed,
                total,
            } => serde_json::json!({
                "event": "pull",
                "status": status,
                "completed": completed,
                "total": total
            }),
            PullProgressEvent::Done { model } => serde_json::json!({
                "event": "done",
                "model": model
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl PullProgressReporter for NoProgress {
    fn report(&self, _event: &PullProgressEvent) {}
}

fn format_transfer(status: &str, completed: u64, total: u64) -> String {
    format!(
        "status: {} -> {:.2}% ({} / {})",
        status,
        percent(completed, total),
        format_number(completed),
        format_number(total)
    )
}

fn percent(completed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

fn format_number(n: u64) -> String {
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

    pub fn reporter(&self) -> Box<dyn PullProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress::default()),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
