//! File-based locking to prevent concurrent execution.
//!
//! Uses flock-style advisory locking so only one instance writes to a given
//! output directory at a time.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// A guard holding an exclusive lock for one output directory.
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Lock `output_dir`, failing if another instance holds it.
    ///
    /// The lock file sits next to the directory, not inside it, so the
    /// directory itself can be a fresh Git clone target.
    pub fn acquire(output_dir: &Path) -> Result<Self> {
        let lock_path = lock_path_for(output_dir);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // Open without truncating to avoid a race between create and lock
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        fs::set_permissions(&lock_path, fs::Permissions::from_mode(0o600))
            .context("Failed to set lock file permissions")?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another instance of updated is already writing to {}.\n\
                 If you believe this is an error, remove the lock file: {}",
                output_dir.display(),
                lock_path.display()
            )
        })?;

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<output_dir>.lock`, trailing separators ignored
fn lock_path_for(output_dir: &Path) -> PathBuf {
    let dir: PathBuf = output_dir.components().collect();
    let mut name = OsString::from(dir.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_for() {
        assert_eq!(lock_path_for(Path::new("/srv/files")), PathBuf::from("/srv/files.lock"));
        assert_eq!(lock_path_for(Path::new("/srv/files/")), PathBuf::from("/srv/files.lock"));
        assert_eq!(lock_path_for(Path::new("./files")), PathBuf::from("./files.lock"));
    }

    #[test]
    fn test_lock_acquire_release() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("files");

        let guard = LockGuard::acquire(&output_dir).unwrap();
        assert!(guard.path().exists());
        assert!(!output_dir.exists());

        // Second holder is refused while the first is alive
        assert!(LockGuard::acquire(&output_dir).is_err());

        drop(guard);
        assert!(LockGuard::acquire(&output_dir).is_ok());
    }
}
