//! Flat virtual filesystem for notebook documents and UI assets.
//!
//! Storage is a single namespace of plain file names; there are no
//! directories. [`DirFs`] maps it onto one host directory, [`MemFs`] keeps
//! everything in memory.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A flat store of named files.
pub trait Vfs: Send + Sync {
    /// Names of all files, in no particular order.
    fn list(&self) -> io::Result<Vec<String>>;

    /// Size of `name` in bytes.
    fn size(&self, name: &str) -> io::Result<u64>;

    /// Whole contents of `name`.
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Replace the contents of `name`, creating it if needed.
    fn write(&self, name: &str, data: &[u8]) -> io::Result<()>;

    /// Delete `name`.
    fn remove(&self, name: &str) -> io::Result<()>;

    fn exists(&self, name: &str) -> bool;
}

/// Files stored directly inside one host directory.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    /// Store files directly under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a flat file name: {:?}", name),
            ));
        }
        Ok(self.root.join(name))
    }
}

impl Vfs for DirFs {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.path(name)?)?.len())
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path(name)?)
    }

    fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        fs::write(self.path(name)?, data)
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.path(name)?)
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok_and(|path| path.is_file())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemFs {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemFs {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.lock().insert(name.into(), data.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn missing(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such file: {}", name))
}

impl Vfs for MemFs {
    fn list(&self) -> io::Result<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        self.lock()
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| missing(name))
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.lock().get(name).cloned().ok_or_else(|| missing(name))
    }

    fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        self.lock().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        self.lock().remove(name).map(|_| ()).ok_or_else(|| missing(name))
    }

    fn exists(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }
}
