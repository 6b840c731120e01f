//! Persistence port for the element collection
//!
//! The store never talks to a file or database directly. It is handed a
//! [`StorageSlot`]: one named location that holds the serialized
//! `ElementsData` and can be read and overwritten as a whole.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::db::SqliteSlot;

/// Default slot name, shared by every backend
pub const DEFAULT_SLOT: &str = "elementsData";

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A single named key-value slot holding the serialized collection
pub trait StorageSlot {
    /// Read the slot. `Ok(None)` means nothing has been saved yet.
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Overwrite the slot with `payload`
    fn store(&self, payload: &str) -> Result<(), StorageError>;

    /// Copy `payload` somewhere next to the slot without touching the slot
    /// itself. Returns where the copy went.
    fn backup(&self, payload: &str) -> Result<String, StorageError>;

    /// Human-readable location, for logs and status lines
    fn describe(&self) -> String;
}

// =============================================================================
// In-memory slot
// =============================================================================

/// Slot kept in memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    payload: Rc<RefCell<Option<String>>>,
    fail_writes: Rc<Cell<bool>>,
    writes: Rc<Cell<usize>>,
    backups: Rc<RefCell<Vec<String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: impl Into<String>) -> Self {
        let slot = Self::default();
        *slot.payload.borrow_mut() = Some(payload.into());
        slot
    }

    /// Current contents of the slot
    pub fn contents(&self) -> Option<String> {
        self.payload.borrow().clone()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Payloads handed to `backup`, oldest first
    pub fn backups(&self) -> Vec<String> {
        self.backups.borrow().clone()
    }

    /// Make subsequent writes fail, simulating a full or read-only storage
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl StorageSlot for MemorySlot {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.payload.borrow().clone())
    }

    fn store(&self, payload: &str) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Unavailable("memory slot is read-only".to_string()));
        }
        *self.payload.borrow_mut() = Some(payload.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn backup(&self, payload: &str) -> Result<String, StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Unavailable("memory slot is read-only".to_string()));
        }
        self.backups.borrow_mut().push(payload.to_string());
        Ok("memory backup".to_string())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// =============================================================================
// JSON file slot
// =============================================================================

/// Slot backed by a JSON file on disk. The slot name is implied by the path.
#[derive(Debug, Clone)]
pub struct JsonFileSlot {
    path: PathBuf,
}

impl JsonFileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<file>.bak` beside the slot file
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }
}

impl StorageSlot for JsonFileSlot {
    fn load(&self) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|e| StorageError::io(&self.path, e))
    }

    fn store(&self, payload: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }

        // Write-then-rename so a crash never leaves a half-written slot
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::io(&self.path, e))
    }

    fn backup(&self, payload: &str) -> Result<String, StorageError> {
        let target = self.backup_path();
        fs::write(&target, payload).map_err(|e| StorageError::io(&target, e))?;
        Ok(target.display().to_string())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// =============================================================================
// Backend selection
// =============================================================================

/// Whether `path` names a SQLite database rather than a JSON file
pub fn is_sqlite_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("db") | Some("sqlite") | Some("sqlite3")
    )
}

/// Open the slot for `path`, picking the backend from the file extension
pub fn open_slot(path: &Path, slot: &str) -> Result<Box<dyn StorageSlot>, StorageError> {
    if is_sqlite_path(path) {
        log::debug!("opening sqlite slot '{}' at {}", slot, path.display());
        Ok(Box::new(SqliteSlot::open_at(path, slot)?))
    } else {
        log::debug!("opening json slot at {}", path.display());
        Ok(Box::new(JsonFileSlot::new(path)))
    }
}
