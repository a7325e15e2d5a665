//! Source discovery
//!
//! Walks the source root depth-first and collects every file whose name ends
//! with the run's extension. Entries are visited in the order the filesystem
//! returns them; nothing is sorted and nothing is cached between runs.

use crate::error::{BuildError, BuildResult};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// The single source extension processed in one run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SourceDialect {
    /// `.mjs` modules (default)
    #[default]
    Mjs,
    /// `.js` files
    Js,
    /// Any other dotted suffix, e.g. `.jsx`
    Custom(String),
}

impl SourceDialect {
    /// Parse a dialect name: `mjs`, `js`, or a `.suffix`
    pub fn parse(s: &str) -> BuildResult<Self> {
        match s {
            "mjs" | ".mjs" => Ok(Self::Mjs),
            "js" | ".js" => Ok(Self::Js),
            other if other.len() > 1 && other.starts_with('.') => {
                Ok(Self::Custom(other.to_string()))
            }
            other => Err(BuildError::InvalidTarget(format!(
                "unknown source dialect '{}'",
                other
            ))),
        }
    }

    /// File name suffix, including the leading dot
    pub fn extension(&self) -> &str {
        match self {
            Self::Mjs => ".mjs",
            Self::Js => ".js",
            Self::Custom(ext) => ext,
        }
    }
}

impl fmt::Display for SourceDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Files discovered for one build run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileSet {
    root: PathBuf,
    extension: String,
    /// Paths relative to `root`, in discovery order
    files: Vec<PathBuf>,
}

impl SourceFileSet {
    /// Scan root the paths are relative to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extension the set was filtered by
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Relative paths in discovery order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }

    /// Whether a root-relative path belongs to the set
    pub fn contains(&self, relative: &Path) -> bool {
        self.files.iter().any(|f| f == relative)
    }

    /// Join a relative path onto the scan root
    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Absolute paths in discovery order
    pub fn absolute_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| self.root.join(f)).collect()
    }
}

impl<'a> IntoIterator for &'a SourceFileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Recursively collect files under `root_dir` whose names end with `extension`.
///
/// The suffix match is exact and case-sensitive. Symlinks are not followed.
/// Any filesystem error, including a missing root, aborts discovery.
pub fn discover_sources(root_dir: impl AsRef<Path>, extension: &str) -> BuildResult<SourceFileSet> {
    let root = root_dir.as_ref().to_path_buf();
    let mut files = Vec::new();

    // walkdir yields a file root as a single entry
    if root.is_file() {
        return Err(BuildError::Discovery {
            path: root,
            error: io::Error::new(io::ErrorKind::InvalidInput, "source root is not a directory"),
        });
    }

    for entry in WalkDir::new(&root).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|error| BuildError::Discovery {
            path: error
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.clone()),
            error: error.into(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        if entry.file_name().to_string_lossy().ends_with(extension) {
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf());
            files.push(relative);
        }
    }

    debug!(root = %root.display(), extension, count = files.len(), "discovered sources");

    Ok(SourceFileSet {
        root,
        extension: extension.to_string(),
        files,
    })
}
