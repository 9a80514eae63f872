use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::sync::RunSummary;

/// Events emitted while a year is being synchronized
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The year contents page is being fetched
    ListingYear { url: String },

    /// A day directory fell outside the requested range (debug level)
    DaySkipped { day: String },

    /// A day listing was fetched and parsed
    DayListed { day: String, entries: usize },

    /// A day listing could not be fetched or parsed; the day is recorded
    /// and the run moves on
    DayFailed { day: String, error: String },

    /// One listing row was seen, before deduplication (debug level)
    EntrySeen {
        name: String,
        last_modified: String,
        size_bytes: u64,
    },

    /// A transfer is starting
    FetchStarting {
        name: String,
        url: String,
        /// true when an out-of-date local copy was removed first
        update: bool,
    },

    /// A transfer finished and passed the size check
    FetchCompleted {
        path: PathBuf,
        bytes: u64,
        update: bool,
    },

    /// A transfer failed after its bounded retry
    FetchFailed { path: PathBuf, error: String },

    /// An entry could not be classified; nothing was fetched
    DecisionError { path: PathBuf, reason: String },

    /// All retained day directories have been processed
    YearCompleted { year: i32 },
}

/// Trait for reporting sync events.
///
/// There is no global logger; the orchestrator receives one of these and
/// every event goes through it. Implementations render to the terminal,
/// append to the run log, or ignore everything.
pub trait Reporter: Send + Sync {
    fn report(&self, event: SyncEvent);
}

/// A shared reference to a reporter
pub type SharedReporter = Arc<dyn Reporter>;

/// A no-op reporter that silently ignores all events.
/// Useful for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _event: SyncEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedReporter {
        Arc::new(Self)
    }
}

/// Fans one event stream out to several reporters
pub struct TeeReporter(Vec<SharedReporter>);

impl TeeReporter {
    pub fn shared(reporters: Vec<SharedReporter>) -> SharedReporter {
        Arc::new(Self(reporters))
    }
}

impl Reporter for TeeReporter {
    fn report(&self, event: SyncEvent) {
        for reporter in &self.0 {
            reporter.report(event.clone());
        }
    }
}

/// Appends info-level events and the final summary block to the
/// persistent run log.
///
/// The log is opened in append mode once per run and never truncated:
/// each invocation adds its own block after the history of earlier runs.
/// Debug-level events (skipped days, raw listing rows) stay out of the
/// file, matching the terminal/file split of the original update log.
pub struct FileLogReporter {
    file: Mutex<std::fs::File>,
}

impl FileLogReporter {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn line(&self, message: &str) {
        if let Ok(mut file) = self.file.lock() {
            // A failed log write must not fail the run.
            let _ = writeln!(file, "{}", message);
        }
    }

    /// Append the end-of-run summary block: every updated, new and errored
    /// file by path, plus a provenance line with the run date and the
    /// invoking user.
    pub fn write_summary(&self, summary: &RunSummary, year: i32) {
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        self.line(&format!(
            "Updated on {} by {}",
            Utc::now().format("%Y-%m-%d"),
            user
        ));
        self.line("==========================================");
        self.line(&format!("Summary for year {year}"));
        self.line("==========================================");
        self.line("These files were updated: ");
        for path in &summary.updated {
            self.line(&path.display().to_string());
        }
        self.line("==========================================");
        self.line("These are new files: ");
        for path in &summary.new {
            self.line(&path.display().to_string());
        }
        self.line("==========================================");
        self.line("These files had problems: ");
        for path in &summary.error {
            self.line(&path.display().to_string());
        }
        self.line("");
        self.line("");
    }
}

impl Reporter for FileLogReporter {
    fn report(&self, event: SyncEvent) {
        let stamp = Utc::now().format("%H:%M:%S");
        match event {
            SyncEvent::ListingYear { url } => self.line(&format!("{stamp} | listing {url}")),
            SyncEvent::DayListed { day, entries } => {
                self.line(&format!("{stamp} | day {day}: {entries} entries"));
            }
            SyncEvent::DayFailed { day, error } => {
                self.line(&format!("{stamp} | day {day} failed: {error}"));
            }
            SyncEvent::FetchCompleted {
                path,
                bytes,
                update,
            } => {
                let verb = if update { "updated" } else { "downloaded" };
                self.line(&format!("{stamp} | {verb} {} ({bytes} bytes)", path.display()));
            }
            SyncEvent::FetchFailed { path, error } => {
                self.line(&format!("{stamp} | failed {}: {error}", path.display()));
            }
            SyncEvent::DecisionError { path, reason } => {
                self.line(&format!("{stamp} | cannot classify {}: {reason}", path.display()));
            }
            SyncEvent::YearCompleted { year } => {
                self.line(&format!("{stamp} | Download for year {year} is complete"));
            }
            // debug level, terminal only
            SyncEvent::DaySkipped { .. }
            | SyncEvent::EntrySeen { .. }
            | SyncEvent::FetchStarting { .. } => {}
        }
    }
}
