//! Per-invocation temporary files that delete themselves on drop

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;

/// A uniquely named path under a scratch directory
///
/// The file need not exist yet (an external process may create it). Whatever
/// is at the path when the guard drops is removed, on success and error
/// paths alike.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve `<dir>/<prefix>-<unix millis>-<uuid>.<extension>`
    pub fn allocate(dir: &Path, prefix: &str, extension: &str) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let name = format!("{}-{}-{}.{}", prefix, millis, Uuid::new_v4().simple(), extension);
        Self {
            path: dir.join(name),
        }
    }

    /// Reserve a path and write `contents` to it
    pub fn create(dir: &Path, prefix: &str, extension: &str, contents: &[u8]) -> Result<Self> {
        let scratch = Self::allocate(dir, prefix, extension);
        fs::write(&scratch.path, contents)?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed scratch file {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::warn!(
                "Failed to remove scratch file {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = ScratchFile::allocate(dir.path(), "input", "json");
        let b = ScratchFile::allocate(dir.path(), "input", "json");
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(dir.path()));
        assert_eq!(a.path().extension().unwrap(), "json");
    }

    #[test]
    fn test_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchFile::create(dir.path(), "input", "json", b"{}").unwrap();
            assert_eq!(scratch.read().unwrap(), b"{}");
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_without_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFile::allocate(dir.path(), "witness", "wtns");
        assert!(!scratch.path().exists());
        drop(scratch);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
