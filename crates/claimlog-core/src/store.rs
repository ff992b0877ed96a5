use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::entry::LogEntry;
use crate::seed::bundled_seed;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Log store IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize log entries: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Storage port for the log collection. Every mutation rewrites the whole
/// collection; there is no locking and the last writer wins.
pub trait LogStore {
    /// Stored entries, or `None` when nothing has ever been persisted.
    fn read_entries(&self) -> Result<Option<Vec<LogEntry>>, StoreError>;

    fn save_all(&self, entries: &[LogEntry]) -> Result<(), StoreError>;

    /// Dataset returned (and persisted) on first load.
    fn seed_entries(&self) -> Vec<LogEntry> {
        bundled_seed()
    }

    /// Load the collection. When nothing was ever stored the seed is returned
    /// and persisted; only that write can fail. Unreadable data also falls back
    /// to the seed, but nothing is written over it.
    fn load(&self) -> Result<Vec<LogEntry>, StoreError> {
        match self.read_entries() {
            Ok(Some(entries)) => {
                debug!(count = entries.len(), "loaded log entries");
                Ok(entries)
            }
            Ok(None) => {
                debug!("no stored log entries, seeding");
                let seed = self.seed_entries();
                self.save_all(&seed)?;
                Ok(seed)
            }
            Err(err) => {
                warn!("stored log entries unreadable, showing sample data: {err}");
                Ok(self.seed_entries())
            }
        }
    }
}

/// In-process store, used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<Option<Vec<LogEntry>>>,
    seed: Option<Vec<LogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts empty instead of seeding.
    pub fn without_seed() -> Self {
        Self {
            entries: RefCell::new(None),
            seed: Some(Vec::new()),
        }
    }

    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: RefCell::new(Some(entries)),
            seed: None,
        }
    }

    pub fn snapshot(&self) -> Option<Vec<LogEntry>> {
        self.entries.borrow().clone()
    }
}

impl LogStore for MemoryStore {
    fn read_entries(&self) -> Result<Option<Vec<LogEntry>>, StoreError> {
        Ok(self.entries.borrow().clone())
    }

    fn save_all(&self, entries: &[LogEntry]) -> Result<(), StoreError> {
        *self.entries.borrow_mut() = Some(entries.to_vec());
        Ok(())
    }

    fn seed_entries(&self) -> Vec<LogEntry> {
        self.seed.clone().unwrap_or_else(bundled_seed)
    }
}

/// JSON file holding the full collection.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    seed: bool,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed: true,
        }
    }

    pub fn without_seed(mut self) -> Self {
        self.seed = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable log file is moved before it would be overwritten.
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }
}

impl LogStore for FileStore {
    fn read_entries(&self) -> Result<Option<Vec<LogEntry>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let entries: Vec<LogEntry> = serde_json::from_str(&raw)?;
        Ok(Some(entries))
    }

    fn save_all(&self, entries: &[LogEntry]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if self.path.is_file() && self.read_entries().is_err() {
            let backup = self.corrupt_path();
            fs::rename(&self.path, &backup)?;
            warn!(backup = %backup.display(), "kept unreadable log file aside");
        }
        let raw = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, raw)?;
        fs::rename(&temp_path, &self.path)?;
        debug!(count = entries.len(), path = %self.path.display(), "saved log entries");
        Ok(())
    }

    fn seed_entries(&self) -> Vec<LogEntry> {
        if self.seed {
            bundled_seed()
        } else {
            Vec::new()
        }
    }
}
