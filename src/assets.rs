//! Resolving font and shader paths to byte streams.
//!
//! Canvases never touch the filesystem directly; every path goes through an
//! [`AssetLoader`] so hosts can serve assets from disk, an archive or memory.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{CanvasError, Result};

pub trait AssetLoader {
    /// Open `path` for reading, or fail with `CanvasError::MissingResource`.
    fn open(&self, path: &str) -> Result<Box<dyn Read>>;

    fn read_all(&self, path: &str) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.open(path)?
            .read_to_end(&mut bytes)
            .map_err(|e| CanvasError::MissingResource(format!("{path}: {e}")))?;
        Ok(bytes)
    }

    fn read_to_string(&self, path: &str) -> Result<String> {
        String::from_utf8(self.read_all(path)?)
            .map_err(|e| CanvasError::MissingResource(format!("{path}: {e}")))
    }
}

/// Loads assets relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for FsLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl AssetLoader for FsLoader {
    fn open(&self, path: &str) -> Result<Box<dyn Read>> {
        let full = self.root.join(path);
        let file = File::open(&full)
            .map_err(|e| CanvasError::MissingResource(format!("{}: {e}", full.display())))?;
        Ok(Box::new(file))
    }
}

/// In-memory asset table, used by tests and embedded hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }
}

impl AssetLoader for MemoryLoader {
    fn open(&self, path: &str) -> Result<Box<dyn Read>> {
        let bytes = self
            .files
            .get(path)
            .ok_or_else(|| CanvasError::MissingResource(path.to_string()))?;
        Ok(Box::new(Cursor::new(bytes.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader_roundtrip() {
        let loader = MemoryLoader::new().with_file("shaders/solid.wgsl", "fn main() {}");
        assert_eq!(
            loader.read_to_string("shaders/solid.wgsl").unwrap(),
            "fn main() {}"
        );
    }

    #[test]
    fn test_missing_paths() {
        let loader = MemoryLoader::new();
        assert!(matches!(
            loader.read_all("fonts/none.ttf"),
            Err(CanvasError::MissingResource(_))
        ));

        let fs = FsLoader::new("/nonexistent-asset-root");
        assert!(matches!(
            fs.open("font.ttf"),
            Err(CanvasError::MissingResource(_))
        ));
    }
}
