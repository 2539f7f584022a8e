//! Output files.
//!
//! Files are replaced whole, never appended to. A task that fails before
//! writing leaves the previous cycle's file untouched.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fs_abstraction::FileSystem;

pub const NAMED_ROOT_FILENAME: &str = "named.root.updated";
pub const ROOT_ANCHORS_FILENAME: &str = "root-anchors.xml.updated";
pub const ROOT_KEY_FILENAME: &str = "root.key.updated";

/// Mode of block list files
pub const LIST_MODE: u32 = 0o600;
/// Mode of trust anchor files
pub const ANCHOR_MODE: u32 = 0o644;

/// Writes files into the output directory.
#[derive(Clone)]
pub struct OutputWriter {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(fs: Arc<dyn FileSystem>, dir: &Path) -> Self {
        Self {
            fs,
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the output directory if missing
    pub fn ensure_dir(&self) -> Result<()> {
        self.fs
            .create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory {}", self.dir.display()))
    }

    /// Write `lines` joined by `\n`, without a trailing newline.
    pub fn write_lines(&self, filename: &str, lines: &[String], mode: u32) -> Result<()> {
        self.write_bytes(filename, lines.join("\n").as_bytes(), mode)
    }

    pub fn write_bytes(&self, filename: &str, contents: &[u8], mode: u32) -> Result<()> {
        let path = self.dir.join(filename);
        self.fs
            .write_atomic(&path, contents, mode)
            .with_context(|| format!("writing {}", path.display()))
    }
}
