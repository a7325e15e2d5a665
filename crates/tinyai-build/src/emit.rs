//! Atomic artifact emission
//!
//! A target writes into a staging directory inside its output root and
//! only moves files into place once its whole pipeline has succeeded.

use crate::error::{BuildError, BuildResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A file moved into place by [`Staging::commit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub size: usize,
    pub sha256: String,
    /// Modules linked into the file
    pub module_count: usize,
}

/// Hex SHA-256 digest of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Staged output of one target
#[derive(Debug)]
pub struct Staging {
    out_dir: PathBuf,
    dir: TempDir,
    files: Vec<(PathBuf, EmittedFile)>,
}

impl Staging {
    /// Create a staging directory inside `out_dir`, creating `out_dir` first
    pub fn new(out_dir: &Path) -> BuildResult<Self> {
        fs::create_dir_all(out_dir).map_err(|e| BuildError::io(out_dir, e))?;
        let dir = tempfile::Builder::new()
            .prefix(".tinyai-staging-")
            .tempdir_in(out_dir)
            .map_err(|e| BuildError::io(out_dir, e))?;
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            dir,
            files: Vec::new(),
        })
    }

    /// Stage `contents` for `relative` (a path under the output root)
    pub fn write(
        &mut self,
        relative: &Path,
        contents: &str,
        module_count: usize,
    ) -> BuildResult<()> {
        let staged = self.dir.path().join(relative);
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::write(&staged, contents).map_err(|e| BuildError::io(&staged, e))?;

        self.files.push((
            relative.to_path_buf(),
            EmittedFile {
                path: self.out_dir.join(relative),
                size: contents.len(),
                sha256: sha256_hex(contents.as_bytes()),
                module_count,
            },
        ));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Move every staged file into place. The staging directory is removed
    /// afterwards, whether or not the moves succeed.
    pub fn commit(self) -> BuildResult<Vec<EmittedFile>> {
        let mut emitted = Vec::with_capacity(self.files.len());
        for (relative, file) in self.files {
            let staged = self.dir.path().join(&relative);
            if let Some(parent) = file.path.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
            fs::rename(&staged, &file.path).map_err(|e| BuildError::io(&file.path, e))?;
            emitted.push(file);
        }
        debug!(out_dir = %self.out_dir.display(), files = emitted.len(), "committed staged output");
        Ok(emitted)
    }
}

/// Remove files a failed target would have written so stale output from an
/// earlier run cannot pass for this one
pub fn invalidate(paths: &[PathBuf]) -> BuildResult<usize> {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::io(path, e)),
        }
    }
    Ok(removed)
}
