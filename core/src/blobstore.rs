//! The file-transport capability: store/retrieve/move a blob at a path.
//!
//! Production transports (S3, SFTP) are collaborators implementing this
//! trait; the filesystem store below backs local runs and tests.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EtlResult;

pub trait BlobStore {
    /// Recursively list files under a prefix. Paths use '/' separators.
    fn list(&self, prefix: &str) -> EtlResult<Vec<String>>;

    fn copy(&self, from: &str, to: &str) -> EtlResult<()>;

    /// Move a blob. Parent "directories" are created as needed.
    fn rename(&self, from: &str, to: &str) -> EtlResult<()>;

    fn download(&self, path: &str) -> EtlResult<Vec<u8>>;

    fn upload(&self, path: &str, bytes: &[u8]) -> EtlResult<()>;

    fn exists(&self, path: &str) -> EtlResult<bool>;
}

// ── Filesystem implementation ────────────────────────────────────────────────

pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }

    fn ensure_parent(path: &Path) -> EtlResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn walk(dir: &Path, out: &mut Vec<String>) -> EtlResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::walk(&path, out)?;
            } else {
                out.push(path.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

impl Default for FsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for FsStore {
    fn list(&self, prefix: &str) -> EtlResult<Vec<String>> {
        let root = PathBuf::from(prefix);
        let mut out = Vec::new();
        if root.is_dir() {
            Self::walk(&root, &mut out)?;
        }
        out.sort();
        Ok(out)
    }

    fn copy(&self, from: &str, to: &str) -> EtlResult<()> {
        let to_path = PathBuf::from(to);
        Self::ensure_parent(&to_path)?;
        fs::copy(from, to_path)?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> EtlResult<()> {
        let to_path = PathBuf::from(to);
        Self::ensure_parent(&to_path)?;
        fs::rename(from, to_path)?;
        Ok(())
    }

    fn download(&self, path: &str) -> EtlResult<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn upload(&self, path: &str, bytes: &[u8]) -> EtlResult<()> {
        let path = PathBuf::from(path);
        Self::ensure_parent(&path)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> EtlResult<bool> {
        Ok(Path::new(path).exists())
    }
}
