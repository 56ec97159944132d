//! Sample history persistence.
//!
//! Every ingested sample is appended to a JSON-lines log on disk and to a
//! bounded in-memory window. The window feeds the cadence estimator through
//! [`HistoryStore::snapshot`], which hands out a consistent copy — the
//! estimator never observes a partially-written record. On startup the log
//! is replayed so cadence reports survive restarts.
//!
//! Write failures are logged and swallowed: persistence must never stall the
//! live stream.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use stride_core::{SampleRecord, StoredSample};
use tracing::{debug, info, warn};

/// Append-only sample log with a bounded in-memory window.
pub struct HistoryStore {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    window: RwLock<VecDeque<StoredSample>>,
    max_window: usize,
}

impl HistoryStore {
    /// Open the sample log at `path`, replaying existing rows into the
    /// in-memory window (keeping the most recent `max_window`).
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be opened for appending.
    pub fn open(path: impl AsRef<Path>, max_window: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut window = VecDeque::new();

        if path.exists() {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open history log: {}", path.display()))?;
            for line in BufReader::new(file).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Stopping history replay on unreadable line");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<StoredSample>(&line) {
                    Ok(row) => {
                        if window.len() == max_window {
                            window.pop_front();
                        }
                        window.push_back(row);
                    }
                    Err(e) => warn!(error = %e, "Skipping malformed history row"),
                }
            }
            info!(rows = window.len(), path = %path.display(), "Replayed sample history");
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open history log for append: {}", path.display()))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            window: RwLock::new(window),
            max_window,
        })
    }

    /// Append a normalized sample to the log and the in-memory window.
    ///
    /// Disk failures are logged, never propagated.
    pub fn append(&self, record: &SampleRecord) {
        let row = StoredSample::from_record(record);

        if let Err(e) = self.write_row(&row) {
            warn!(error = %e, path = %self.path.display(), "Failed to persist sample");
        }

        let mut window = self.window.write().unwrap_or_else(|e| e.into_inner());
        if window.len() == self.max_window {
            window.pop_front();
        }
        window.push_back(row);
    }

    fn write_row(&self, row: &StoredSample) -> Result<()> {
        let line = serde_json::to_string(row)?;
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// A consistent copy of the in-memory window, in arrival order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StoredSample> {
        let window = self.window.read().unwrap_or_else(|e| e.into_inner());
        debug!(rows = window.len(), "History snapshot");
        window.iter().cloned().collect()
    }

    /// Number of rows currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
