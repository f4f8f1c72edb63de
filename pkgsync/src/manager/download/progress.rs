//! Progress reporting for package installs.
//!
//! The install worker is the only writer of progress state. It owns a
//! [`ProgressTracker`], which keeps the per-file and batch byte counters,
//! publishes them into shared [`ProgressCounters`] (atomics, readable from
//! any thread) and emits immutable [`ProgressEvent`]s through an optional
//! callback.
//!
//! ```text
//! install worker                         other threads
//! ──────────────                         ─────────────
//! ProgressTracker ──store──► ProgressCounters ──snapshot()──► UI poll
//!        │
//!        └──callback(&ProgressEvent)──► UI / logging
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Callback receiving progress events.
///
/// Invoked on the install worker thread; keep it cheap.
pub type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Point-in-time view of transfer progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes written for the current file's current attempt.
    pub file_written: u64,
    /// Expected size of the current file (0 = unknown).
    pub file_expected: u64,
    /// Bytes written across the batch, minus rolled back attempts.
    pub total_written: u64,
    /// Expected bytes across the batch.
    pub total_expected: u64,
    /// Files transferred so far.
    pub files_completed: usize,
}

impl ProgressSnapshot {
    /// Per-file percentage, clamped to 100.
    pub fn file_percent(&self) -> u8 {
        percent(self.file_written, self.file_expected)
    }

    /// Batch percentage, clamped to 100.
    pub fn total_percent(&self) -> u8 {
        percent(self.total_written, self.total_expected)
    }
}

/// Events emitted during an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A package install began.
    PackageStarted { name: String, version: u32 },
    /// Obsolete content of the previous version was removed.
    CleanupFinished {
        package: String,
        files_removed: usize,
        folders_removed: usize,
        failures: usize,
    },
    /// A file transfer began.
    FileStarted { path: PathBuf, expected: u64 },
    /// A percentage changed.
    Progress(ProgressSnapshot),
    /// A transfer attempt failed and its bytes were rolled back.
    AttemptFailed {
        path: PathBuf,
        attempt: u32,
        reason: String,
    },
    /// A file transfer finished.
    FileCompleted { path: PathBuf, bytes: u64 },
    /// A package install finished and was recorded.
    PackageCompleted { name: String, version: u32 },
}

/// Shared, atomically readable progress counters.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    file_written: AtomicU64,
    file_expected: AtomicU64,
    total_written: AtomicU64,
    total_expected: AtomicU64,
    files_completed: AtomicUsize,
}

impl ProgressCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a consistent-enough snapshot of all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            file_written: self.file_written.load(Ordering::SeqCst),
            file_expected: self.file_expected.load(Ordering::SeqCst),
            total_written: self.total_written.load(Ordering::SeqCst),
            total_expected: self.total_expected.load(Ordering::SeqCst),
            files_completed: self.files_completed.load(Ordering::SeqCst),
        }
    }

    fn publish(&self, snapshot: &ProgressSnapshot) {
        self.file_written
            .store(snapshot.file_written, Ordering::SeqCst);
        self.file_expected
            .store(snapshot.file_expected, Ordering::SeqCst);
        self.total_written
            .store(snapshot.total_written, Ordering::SeqCst);
        self.total_expected
            .store(snapshot.total_expected, Ordering::SeqCst);
        self.files_completed
            .store(snapshot.files_completed, Ordering::SeqCst);
    }
}

/// Single-writer owner of the progress counters for one install batch.
pub struct ProgressTracker<'a> {
    counters: &'a ProgressCounters,
    callback: Option<&'a ProgressCallback>,
    state: ProgressSnapshot,
    last_file_percent: Option<u8>,
    last_total_percent: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    /// Create a tracker for a batch expected to transfer `total_expected` bytes.
    pub fn new(
        counters: &'a ProgressCounters,
        callback: Option<&'a ProgressCallback>,
        total_expected: u64,
    ) -> Self {
        let tracker = Self {
            counters,
            callback,
            state: ProgressSnapshot {
                total_expected,
                ..Default::default()
            },
            last_file_percent: None,
            last_total_percent: None,
        };
        counters.publish(&tracker.state);
        tracker
    }

    /// Forward an event to the callback, if any.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = self.callback {
            callback(&event);
        }
    }

    /// Current counter values.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state
    }

    /// Reset the per-file counters for a new transfer attempt.
    pub fn begin_file(&mut self, expected: u64) {
        self.state.file_written = 0;
        self.state.file_expected = expected;
        self.last_file_percent = None;
        self.counters.publish(&self.state);
    }

    /// Replace an unknown expected size with the stream's declared length.
    pub fn adopt_file_size(&mut self, expected: u64) {
        self.state.file_expected = expected;
        self.counters.publish(&self.state);
    }

    /// Count a written chunk. Emits a snapshot only when a percentage moved.
    pub fn add_chunk(&mut self, bytes: u64) {
        self.state.file_written += bytes;
        self.state.total_written += bytes;
        self.counters.publish(&self.state);
        self.report_if_changed();
    }

    /// Subtract the current attempt's bytes from the batch total.
    ///
    /// Returns the number of bytes rolled back.
    pub fn rollback_attempt(&mut self) -> u64 {
        let partial = self.state.file_written;
        self.state.total_written = self.state.total_written.saturating_sub(partial);
        self.state.file_written = 0;
        self.counters.publish(&self.state);
        self.report_if_changed();
        partial
    }

    /// Mark the current file as transferred.
    pub fn complete_file(&mut self) {
        self.state.files_completed += 1;
        self.counters.publish(&self.state);
    }

    fn report_if_changed(&mut self) {
        let file_percent = self.state.file_percent();
        let total_percent = self.state.total_percent();
        if self.last_file_percent == Some(file_percent)
            && self.last_total_percent == Some(total_percent)
        {
            return;
        }
        self.last_file_percent = Some(file_percent);
        self.last_total_percent = Some(total_percent);
        self.emit(ProgressEvent::Progress(self.state));
    }
}

fn percent(written: u64, expected: u64) -> u8 {
    if expected == 0 {
        return 0;
    }
    let value = (written as u128 * 100) / expected as u128;
    value.min(100) as u8
}
