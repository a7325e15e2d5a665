//! npm package metadata (package.json)
//!
//! Only the fields the packaging pipeline reads are modeled; everything else
//! in the file is ignored.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Library name used when package metadata does not provide one
pub const DEFAULT_LIBRARY_NAME: &str = "TinyAiApi";

/// Subset of package.json
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    /// CommonJS entry point
    #[serde(default)]
    pub main: Option<String>,

    /// ES module entry point
    #[serde(default)]
    pub module: Option<String>,

    /// Runtime dependencies; kept external by module-preserving targets
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    /// Load package.json from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content).map_err(|e| ConfigError::JsonParseError {
            file: path.to_path_buf(),
            error: e,
        })
    }

    /// Parse package.json content
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Names of runtime dependencies, in sorted order
    pub fn runtime_dependencies(&self) -> Vec<String> {
        self.dependencies
            .keys()
            .chain(self.peer_dependencies.keys())
            .cloned()
            .collect()
    }

    /// Entry file preferred by bundlers: `module`, then `main`
    pub fn bundler_entry(&self) -> Option<&str> {
        self.module.as_deref().or(self.main.as_deref())
    }

    /// Global library name derived from the package name.
    ///
    /// `tiny-ai-api` and `@scope/tiny-ai-api` both become `TinyAiApi`.
    pub fn library_name(&self) -> String {
        self.name
            .as_deref()
            .map(pascal_case)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_LIBRARY_NAME.to_string())
    }
}

/// Convert a package name to PascalCase, dropping any npm scope
fn pascal_case(name: &str) -> String {
    let bare = name.rsplit('/').next().unwrap_or(name);
    bare.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_json() {
        let json = r#"{
            "name": "tiny-ai-api",
            "version": "1.2.0",
            "main": "dist/index.cjs",
            "module": "src/index.mjs",
            "dependencies": { "lodash": "^4.17.21", "axios": "^1.0.0" },
            "devDependencies": { "rollup": "^4.0.0" },
            "scripts": { "build": "rollup -c" }
        }"#;

        let pkg = PackageJson::parse(json).unwrap();
        assert_eq!(pkg.name.as_deref(), Some("tiny-ai-api"));
        assert_eq!(pkg.runtime_dependencies(), vec!["axios", "lodash"]);
        assert_eq!(pkg.bundler_entry(), Some("src/index.mjs"));
        assert!(pkg.dev_dependencies.contains_key("rollup"));
    }

    #[test]
    fn test_library_name() {
        let pkg = PackageJson {
            name: Some("tiny-ai-api".to_string()),
            ..Default::default()
        };
        assert_eq!(pkg.library_name(), "TinyAiApi");

        let scoped = PackageJson {
            name: Some("@tinyai/google_client".to_string()),
            ..Default::default()
        };
        assert_eq!(scoped.library_name(), "GoogleClient");

        assert_eq!(PackageJson::default().library_name(), DEFAULT_LIBRARY_NAME);
    }

    #[test]
    fn test_bundler_entry_falls_back_to_main() {
        let pkg = PackageJson {
            main: Some("index.js".to_string()),
            ..Default::default()
        };
        assert_eq!(pkg.bundler_entry(), Some("index.js"));
    }
}
