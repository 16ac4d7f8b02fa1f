//! Output locations for trace files

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

/// Named-blob storage for trace files
pub trait Source: Send {
    /// Human readable location (logging)
    fn location(&self) -> String;

    /// Write (or replace) one named file
    fn write_file(&mut self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Files under a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Open `root`, creating it if needed
    ///
    /// With `recreate`, any existing directory is removed first so the trace
    /// starts from an empty location.
    pub fn new(root: impl Into<PathBuf>, recreate: bool) -> io::Result<Self> {
        let root = root.into();
        if recreate && root.exists() {
            info!(path = %root.display(), "Removing previous output directory");
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        debug!(path = %root.display(), "Output directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Source for DirectorySource {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn write_file(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.root.join(name), bytes)
    }
}

/// In-memory files, shared between clones
///
/// Keep a clone to inspect what a writer produced.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().get(name).cloned()
    }

    /// File names in lexical order
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Source for MemorySource {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn write_file(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn directory_source_recreates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("trace");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("stale.json"), b"{}").unwrap();

        let mut source = DirectorySource::new(&root, true).unwrap();
        assert!(!root.join("stale.json").exists());

        source.write_file("1-frame.json", b"{}").unwrap();
        assert_eq!(fs::read(root.join("1-frame.json")).unwrap(), b"{}");
    }

    #[test]
    fn directory_source_keeps_files_without_recreate() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), b"x").unwrap();

        let source = DirectorySource::new(dir.path(), false).unwrap();
        assert!(source.root().join("keep.txt").exists());
    }

    #[test]
    fn memory_source_is_shared_between_clones() {
        let source = MemorySource::new();
        let mut writer_side = source.clone();
        writer_side.write_file("2-frame.json", b"a").unwrap();
        writer_side.write_file("10-frame.json", b"b").unwrap();

        assert_eq!(source.len(), 2);
        assert_eq!(source.get("2-frame.json"), Some(b"a".to_vec()));
        assert_eq!(source.names(), vec!["10-frame.json", "2-frame.json"]);
    }
}
