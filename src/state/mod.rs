//! Durable key/record documents.
//!
//! Every piece of engine state (pending changes, season progress, suppression
//! marks, the notified ledger) lives in its own named JSON document. The
//! [`StateStore`] only knows how to read and atomically replace whole documents;
//! it holds no locks. Mutual exclusion belongs to [`Document`], which owns the
//! in-memory copy behind a mutex and writes through on every mutation while that
//! mutex is still held.

use parking_lot::Mutex;
use reelwatch_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads and writes named documents under one directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    /// `None` keeps everything in memory (tests, dry runs).
    dir: Option<PathBuf>,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self { dir: None }
    }

    pub fn path_for(&self, doc_name: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{doc_name}.json")))
    }

    /// Load a document, falling back to the default when the file is missing
    /// or unreadable. Corruption is logged, never fatal.
    pub fn load<T>(&self, doc_name: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let Some(path) = self.path_for(doc_name) else {
            return T::default();
        };

        match read_document(&path) {
            Ok(Some(doc)) => doc,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(
                    document = doc_name,
                    path = %path.display(),
                    error = %e,
                    "State document unreadable; starting fresh"
                );
                T::default()
            }
        }
    }

    /// Replace a document on disk. Failures are logged and swallowed so a full
    /// disk never takes the notification pipeline down.
    pub fn store<T>(&self, doc_name: &str, doc: &T)
    where
        T: Serialize,
    {
        let Some(path) = self.path_for(doc_name) else {
            return;
        };

        if let Err(e) = write_document(&path, doc) {
            tracing::warn!(
                document = doc_name,
                path = %path.display(),
                error = %e,
                "Failed to persist state document"
            );
        }
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&content)?))
}

/// Write to a temp file in the target directory, then rename over the target.
/// A crash mid-write leaves the previous document intact.
fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::invalid_input(format!("no parent directory: {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(doc)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// One named document, its lock, and the store it persists to.
///
/// The lock is held for the full read-modify-write span of [`update`](Self::update),
/// including the disk write. Callers must not call back into another document
/// from inside the closure.
pub struct Document<T> {
    name: String,
    store: Arc<StateStore>,
    data: Mutex<T>,
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn open(store: Arc<StateStore>, name: impl Into<String>) -> Self {
        let name = name.into();
        let data = store.load(&name);
        Self {
            name,
            store,
            data: Mutex::new(data),
        }
    }

    /// Read under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.data.lock();
        f(&guard)
    }

    /// Mutate under the lock and persist before releasing it.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.data.lock();
        let result = f(&mut guard);
        self.store.store(&self.name, &*guard);
        result
    }

    /// Like [`update`](Self::update), but only persists when the closure
    /// reports that it changed something.
    pub fn update_if_changed<R>(&self, f: impl FnOnce(&mut T) -> (R, bool)) -> R {
        let mut guard = self.data.lock();
        let (result, changed) = f(&mut guard);
        if changed {
            self.store.store(&self.name, &*guard);
        }
        result
    }
}
