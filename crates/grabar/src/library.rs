//! Locator library and maintenance service.
//!
//! The library is the one process-wide shared resource of the pipeline: a
//! keyed store of vetted locator definitions plus health status, persisted as
//! JSON lines (one record per line, append/patch semantics, last-writer-wins
//! on load). Entries are addressed only by `locator_key`; every mutation is
//! an atomic read-modify-write under one lock. Entries are never deleted
//! automatically; a broken locator is marked `Failing` and kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::locator::{LocatorDefinition, LocatorMetadata, Strategy};
use crate::result::{GrabarError, GrabarResult};
use crate::step::RecordedStep;

/// Per-locator health indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Verified recently
    Healthy,
    /// Low-confidence strategy; kept under observation
    Warning,
    /// Last execution could not resolve this locator
    Failing,
}

/// One persisted library record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorLibraryEntry {
    /// Stable key (unique within the store)
    pub locator_key: String,
    /// Canonical strategy
    pub strategy: Strategy,
    /// Canonical strategy value
    pub value: String,
    /// Extraction metadata for the canonical definition
    pub metadata: LocatorMetadata,
    /// Health status
    pub status: HealthStatus,
    /// Last successful verification
    pub last_verified_at: DateTime<Utc>,
}

impl LocatorLibraryEntry {
    /// Build an entry from a freshly recorded locator. Low-confidence
    /// locators (tier 5 and below) enter as `Warning`, everything else as
    /// `Healthy`.
    #[must_use]
    pub fn from_locator(locator: &LocatorDefinition) -> Self {
        let status = if locator.is_low_confidence() {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };
        Self {
            locator_key: locator.locator_key.clone(),
            strategy: locator.strategy,
            value: locator.value.clone(),
            metadata: locator.metadata.clone(),
            status,
            last_verified_at: Utc::now(),
        }
    }

    /// Canonical locator definition stored in this entry
    #[must_use]
    pub fn definition(&self) -> LocatorDefinition {
        LocatorDefinition::from_parts(
            self.strategy,
            self.value.clone(),
            self.metadata.clone(),
            self.locator_key.clone(),
        )
    }

    /// Whether this entry holds a low-confidence strategy
    #[must_use]
    pub fn is_low_confidence(&self) -> bool {
        self.metadata.confidence <= 0.4
    }
}

/// Keyed on-disk locator store
#[derive(Debug)]
pub struct LocatorLibrary {
    path: PathBuf,
    inner: Mutex<HashMap<String, LocatorLibraryEntry>>,
}

impl LocatorLibrary {
    /// Open (or create) a library at the given path
    pub fn open(path: impl Into<PathBuf>) -> GrabarResult<Self> {
        let path = path.into();
        let mut entries = HashMap::new();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            for (number, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: LocatorLibraryEntry =
                    serde_json::from_str(line).map_err(|e| GrabarError::LibraryError {
                        message: format!("corrupt record at line {}: {e}", number + 1),
                    })?;
                // Patch semantics: a later line for the same key wins.
                entries.insert(entry.locator_key.clone(), entry);
            }
        } else if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            inner: Mutex::new(entries),
        })
    }

    /// Look up an entry by key
    #[must_use]
    pub fn lookup(&self, locator_key: &str) -> Option<LocatorLibraryEntry> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(locator_key)
            .cloned()
    }

    /// Insert or replace an entry (atomic read-modify-write)
    pub fn upsert(&self, entry: LocatorLibraryEntry) -> GrabarResult<()> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.append_record(&entry)?;
        guard.insert(entry.locator_key.clone(), entry);
        Ok(())
    }

    /// Update the status of an existing entry. Returns `false` when the key
    /// is unknown.
    pub fn mark_status(&self, locator_key: &str, status: HealthStatus) -> GrabarResult<bool> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(entry) = guard.get_mut(locator_key) else {
            return Ok(false);
        };
        entry.status = status;
        if status == HealthStatus::Healthy {
            entry.last_verified_at = Utc::now();
        }
        let snapshot = entry.clone();
        self.append_record(&snapshot)?;
        Ok(true)
    }

    /// Rewrite the store with exactly one line per key, sorted for diffable
    /// output
    pub fn compact(&self) -> GrabarResult<()> {
        let guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut keys: Vec<&String> = guard.keys().collect();
        keys.sort();
        let mut content = String::new();
        for key in keys {
            content.push_str(&serde_json::to_string(&guard[key])?);
            content.push('\n');
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Number of distinct keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, sorted by key
    #[must_use]
    pub fn entries(&self) -> Vec<LocatorLibraryEntry> {
        let guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut entries: Vec<LocatorLibraryEntry> = guard.values().cloned().collect();
        entries.sort_by(|a, b| a.locator_key.cmp(&b.locator_key));
        entries
    }

    /// Store path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_record(&self, entry: &LocatorLibraryEntry) -> GrabarResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Result of one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Steps whose locator was replaced by the library canonical definition
    pub replaced: usize,
    /// Freshly recorded locators inserted into the library
    pub inserted: usize,
}

impl CleanupReport {
    /// Whether the pass changed anything
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.replaced == 0 && self.inserted == 0
    }
}

/// Owner of all library status transitions.
///
/// The recording engine never mutates health state directly; cleanup and the
/// post-execution feedback loop both go through this service.
#[derive(Debug)]
pub struct MaintenanceService<'a> {
    library: &'a LocatorLibrary,
}

impl<'a> MaintenanceService<'a> {
    /// Create a service over the shared library
    #[must_use]
    pub const fn new(library: &'a LocatorLibrary) -> Self {
        Self { library }
    }

    /// Cleanup pass over a frozen step sequence. The library wins over the
    /// freshly recorded locator; the step's action is never touched. Running
    /// the pass twice on the same sequence is a no-op the second time.
    pub fn clean(&self, steps: &mut [RecordedStep]) -> GrabarResult<CleanupReport> {
        let mut report = CleanupReport::default();
        for step in steps.iter_mut() {
            match self.library.lookup(&step.locator.locator_key) {
                Some(entry) => {
                    let canonical = entry.definition();
                    if canonical != step.locator {
                        tracing::debug!(
                            key = %step.locator.locator_key,
                            from = %step.locator.strategy,
                            to = %canonical.strategy,
                            "cleanup replaced recorded locator with library canonical"
                        );
                        step.locator = canonical;
                        report.replaced += 1;
                    }
                }
                None => {
                    self.library
                        .upsert(LocatorLibraryEntry::from_locator(&step.locator))?;
                    report.inserted += 1;
                }
            }
        }
        Ok(report)
    }

    /// Post-execution feedback: the locator could not be resolved
    pub fn report_failure(&self, locator_key: &str) -> GrabarResult<bool> {
        tracing::warn!(key = locator_key, "marking locator failing");
        self.library.mark_status(locator_key, HealthStatus::Failing)
    }

    /// Post-execution feedback: the locator resolved successfully. Returns to
    /// `Healthy`, except low-confidence entries which stay `Warning`
    /// regardless of execution outcome.
    pub fn report_verified(&self, locator_key: &str) -> GrabarResult<bool> {
        let Some(entry) = self.library.lookup(locator_key) else {
            return Ok(false);
        };
        let status = if entry.is_low_confidence() {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };
        self.library.mark_status(locator_key, status)
    }
}
