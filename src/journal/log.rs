//! Persistent counters of analysis runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters for the current session, optionally backed by a JSON file.
#[derive(Debug)]
pub struct RunJournal {
    /// Batches segmented successfully
    batches_analyzed: AtomicU64,
    /// Batches rejected by the segmentation engine
    batches_failed: AtomicU64,
    /// Samples fed through the engine
    samples_processed: AtomicU64,
    /// Phase ends that came from fixed windows
    fallback_boundaries: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl RunJournal {
    pub fn new() -> Self {
        Self {
            batches_analyzed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            samples_processed: AtomicU64::new(0),
            fallback_boundaries: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Open a journal that loads from and saves to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut journal = Self::new();
        journal.persist_path = Some(path);

        if let Err(e) = journal.load() {
            warn!("could not load previous run journal: {e}");
        }

        journal
    }

    /// Record a successfully segmented batch.
    pub fn record_batch(&self, samples: usize, fallbacks: usize) {
        self.batches_analyzed.fetch_add(1, Ordering::Relaxed);
        self.samples_processed
            .fetch_add(samples as u64, Ordering::Relaxed);
        self.fallback_boundaries
            .fetch_add(fallbacks as u64, Ordering::Relaxed);
    }

    /// Record a batch the engine rejected.
    pub fn record_failure(&self, samples: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.samples_processed
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn stats(&self) -> JournalStats {
        JournalStats {
            batches_analyzed: self.batches_analyzed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            samples_processed: self.samples_processed.load(Ordering::Relaxed),
            fallback_boundaries: self.fallback_boundaries.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for the `status` command.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Journal:\n\
             - Batches analyzed: {}\n\
             - Batches failed: {}\n\
             - Samples processed: {}\n\
             - Fallback boundaries: {} ({:.1}% of phase ends)",
            stats.batches_analyzed,
            stats.batches_failed,
            stats.samples_processed,
            stats.fallback_boundaries,
            stats.fallback_share() * 100.0
        )
    }

    /// Save counters to disk. A journal without a path is a no-op.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                batches_analyzed: stats.batches_analyzed,
                batches_failed: stats.batches_failed,
                samples_processed: stats.samples_processed,
                fallback_boundaries: stats.fallback_boundaries,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.batches_analyzed
                    .store(persisted.batches_analyzed, Ordering::Relaxed);
                self.batches_failed
                    .store(persisted.batches_failed, Ordering::Relaxed);
                self.samples_processed
                    .store(persisted.samples_processed, Ordering::Relaxed);
                self.fallback_boundaries
                    .store(persisted.fallback_boundaries, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.batches_analyzed.store(0, Ordering::Relaxed);
        self.batches_failed.store(0, Ordering::Relaxed);
        self.samples_processed.store(0, Ordering::Relaxed);
        self.fallback_boundaries.store(0, Ordering::Relaxed);
    }
}

impl Default for RunJournal {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the journal counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalStats {
    pub batches_analyzed: u64,
    pub batches_failed: u64,
    pub samples_processed: u64,
    pub fallback_boundaries: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl JournalStats {
    /// Fraction of phase ends (7 per analyzed batch) that fell back to fixed windows.
    pub fn fallback_share(&self) -> f64 {
        let boundaries = self.batches_analyzed * crate::core::phase::PHASE_COUNT as u64;
        if boundaries == 0 {
            0.0
        } else {
            self.fallback_boundaries as f64 / boundaries as f64
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    batches_analyzed: u64,
    batches_failed: u64,
    samples_processed: u64,
    fallback_boundaries: u64,
    last_updated: DateTime<Utc>,
}

/// Journal shared between rayon workers.
pub type SharedRunJournal = Arc<RunJournal>;

pub fn create_shared_journal() -> SharedRunJournal {
    Arc::new(RunJournal::new())
}

pub fn create_shared_journal_with_persistence(path: PathBuf) -> SharedRunJournal {
    Arc::new(RunJournal::with_persistence(path))
}
