//! Named JSON blobs ("settings", "chat_history", "learner_state").
//!
//! A missing blob is `Ok(None)`; callers treat that as "use defaults".

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub trait BlobStore: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<String>>;
    fn save(&self, name: &str, contents: &str) -> Result<()>;
    fn remove(&self, name: &str) -> Result<()>;
}

/// One `<name>.json` file per blob inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl BlobStore for FileStore {
    fn load(&self, name: &str) -> Result<Option<String>> {
        let path = self.path_for(name);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    /// Writes a temp file in the same directory and renames it over the target.
    fn save(&self, name: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory {:?}", self.dir))?;

        let path = self.path_for(name);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {:?}", self.dir))?;
        tmp.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write {:?}", path))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to flush {:?}", path))?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to replace {:?}", path))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }
}

/// In-process store, used by tests and when no data directory is available.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs.lock().contains_key(name)
    }
}

impl BlobStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<String>> {
        Ok(self.blobs.lock().get(name).cloned())
    }

    fn save(&self, name: &str, contents: &str) -> Result<()> {
        self.blobs.lock().insert(name.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.blobs.lock().remove(name);
        Ok(())
    }
}
