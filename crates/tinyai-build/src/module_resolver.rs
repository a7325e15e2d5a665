//! Module specifier discovery and resolution
//!
//! Finds every module specifier in a source file (static imports and
//! re-exports, dynamic `import()`, `require()`) and resolves it to a file
//! inside the project, an external package, a mapped global, or a Node
//! builtin.

use crate::scan::{is_ident_byte, Scanned, SegmentKind};
use crate::targets::{BuildTarget, TargetKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tinyai_config::PackageJson;

/// Node builtin modules; bundles replace them with empty shims
pub const NODE_BUILTINS: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "crypto",
    "events",
    "fs",
    "http",
    "https",
    "net",
    "os",
    "path",
    "querystring",
    "stream",
    "string_decoder",
    "timers",
    "tty",
    "url",
    "util",
    "zlib",
];

/// Syntactic position a specifier was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `import … from "x"` / `export … from "x"`
    Static,
    /// `import "x"`
    SideEffect,
    /// `import("x")`
    Dynamic,
    /// `require("x")`
    Require,
}

/// A specifier string literal in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierRef {
    pub kind: SpecifierKind,
    pub value: String,
    /// Byte range of the literal's contents, quotes excluded
    pub start: usize,
    pub end: usize,
}

/// Where a specifier points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Resolution {
    /// A file on disk (absolute, normalized)
    Module(PathBuf),
    /// Left to the consuming environment
    External(String),
    /// Read from a pre-existing global of this name
    Global(String),
    /// Node builtin
    Builtin(String),
}

fn ends_with_word(text: &str, word: &str) -> bool {
    text.strip_suffix(word).is_some_and(|rest| {
        rest.as_bytes()
            .last()
            .map_or(true, |&b| !is_ident_byte(b) && b != b'.')
    })
}

/// Find every module specifier outside strings and comments
pub fn find_specifiers(scanned: &Scanned<'_>) -> Vec<SpecifierRef> {
    let masked = scanned.masked();
    let source = scanned.source();
    let mut found = Vec::new();

    for seg in scanned.of_kind(SegmentKind::String) {
        let (start, end) = seg.inner_range();
        if end <= start || source.as_bytes()[seg.end - 1] != source.as_bytes()[seg.start] {
            continue;
        }
        let before = masked[..seg.start].trim_end();

        let kind = if ends_with_word(before, "from") {
            SpecifierKind::Static
        } else if ends_with_word(before, "import") {
            SpecifierKind::SideEffect
        } else if let Some(callee) = before.strip_suffix('(') {
            let callee = callee.trim_end();
            if !masked[seg.end..].trim_start().starts_with(')') {
                continue;
            }
            if ends_with_word(callee, "require") {
                SpecifierKind::Require
            } else if ends_with_word(callee, "import") {
                SpecifierKind::Dynamic
            } else {
                continue;
            }
        } else {
            continue;
        };

        found.push(SpecifierRef {
            kind,
            value: source[start..end].to_string(),
            start,
            end,
        });
    }

    found
}

/// Whether a specifier is a path rather than a package name
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
        || specifier == "." || specifier == ".."
}

/// Split a bare specifier into package name and optional subpath
pub fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let mut parts = specifier.splitn(3, '/');
    let first = parts.next().unwrap_or(specifier);
    if first.starts_with('@') {
        match (parts.next(), parts.next()) {
            (Some(name), rest) => (&specifier[..first.len() + 1 + name.len()], rest),
            (None, _) => (specifier, None),
        }
    } else {
        (first, specifier[first.len()..].strip_prefix('/'))
    }
}

/// Lexically normalize `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Forward-slash key of `path` relative to `root`
pub fn module_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative specifier from the file at `from` to the file at `to`
pub fn relative_specifier(from: &Path, to: &Path) -> String {
    let base = from.parent().unwrap_or_else(|| Path::new(""));
    let diff = pathdiff::diff_paths(to, base).unwrap_or_else(|| to.to_path_buf());
    let joined = diff
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if joined.starts_with("../") {
        joined
    } else {
        format!("./{}", joined)
    }
}

/// Resolves specifiers for one target
#[derive(Debug, Clone)]
pub struct ModuleResolver<'a> {
    /// Directory whose `node_modules` ends the package search
    project_root: &'a Path,
    /// Suffixes tried after the exact path
    extensions: Vec<&'a str>,
    kind: TargetKind,
    externals: &'a [String],
    globals: &'a BTreeMap<String, String>,
}

impl<'a> ModuleResolver<'a> {
    /// Resolver for `target`, trying the source dialect's extension first
    pub fn for_target(target: &'a BuildTarget, extension: &'a str, project_root: &'a Path) -> Self {
        let mut extensions = vec![extension];
        if target.kind == TargetKind::Bundle {
            for fallback in [".js", ".json"] {
                if !extensions.contains(&fallback) {
                    extensions.push(fallback);
                }
            }
        }
        Self {
            project_root,
            extensions,
            kind: target.kind,
            externals: &target.externals,
            globals: &target.globals,
        }
    }

    /// Whether a bare specifier is declared external for this target
    pub fn is_declared_external(&self, specifier: &str) -> bool {
        let (package, _) = split_package(specifier);
        self.externals.iter().any(|e| e == specifier || e == package)
    }

    /// Resolve `specifier` imported from the file at `importer`.
    ///
    /// Returns None when nothing matches.
    pub fn resolve(&self, importer: &Path, specifier: &str) -> Option<Resolution> {
        if is_relative(specifier) {
            let base = importer.parent().unwrap_or_else(|| Path::new("")).join(specifier);
            return self.resolve_file(&normalize(&base)).map(Resolution::Module);
        }

        if let Some(alias) = self.globals.get(specifier) {
            return Some(Resolution::Global(alias.clone()));
        }

        let builtin = specifier.strip_prefix("node:").unwrap_or(specifier);
        if specifier.starts_with("node:") || NODE_BUILTINS.contains(&split_package(builtin).0) {
            return Some(match self.kind {
                TargetKind::Modules => Resolution::External(specifier.to_string()),
                TargetKind::Bundle => Resolution::Builtin(builtin.to_string()),
            });
        }

        match self.kind {
            TargetKind::Modules => Some(Resolution::External(specifier.to_string())),
            TargetKind::Bundle => self.resolve_package(importer, specifier).map(Resolution::Module),
        }
    }

    fn resolve_file(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        for ext in &self.extensions {
            let mut candidate = base.as_os_str().to_os_string();
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        self.extensions
            .iter()
            .map(|ext| base.join(format!("index{}", ext)))
            .find(|candidate| candidate.is_file())
    }

    /// Look the package up in `node_modules`, nearest directory first
    fn resolve_package(&self, importer: &Path, specifier: &str) -> Option<PathBuf> {
        let (package, subpath) = split_package(specifier);
        for dir in importer.ancestors().skip(1) {
            let package_dir = dir.join("node_modules").join(package);
            if package_dir.is_dir() {
                return match subpath {
                    Some(sub) => self.resolve_file(&normalize(&package_dir.join(sub))),
                    None => self.package_entry(&package_dir),
                };
            }
            if dir == self.project_root {
                break;
            }
        }
        None
    }

    fn package_entry(&self, package_dir: &Path) -> Option<PathBuf> {
        let manifest = package_dir.join("package.json");
        if let Ok(package) = PackageJson::load_from_file(&manifest) {
            if let Some(entry) = package.bundler_entry() {
                if let Some(path) = self.resolve_file(&normalize(&package_dir.join(entry))) {
                    return Some(path);
                }
            }
        }
        let index = package_dir.join("index.js");
        index.is_file().then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::OutputFormat;
    use std::fs;
    use tempfile::TempDir;

    fn specifiers(src: &str) -> Vec<(SpecifierKind, String)> {
        find_specifiers(&Scanned::new(src))
            .into_iter()
            .map(|s| (s.kind, s.value))
            .collect()
    }

    #[test]
    fn test_find_static_and_dynamic_specifiers() {
        let src = r#"
import a from './a.mjs';
import { b } from "./b";
import './side.mjs';
export * from './c.mjs';
const d = require('lodash');
const e = await import('./e.mjs');
const s = "from './not-an-import'";
// import x from './commented'
"#;
        assert_eq!(
            specifiers(src),
            vec![
                (SpecifierKind::Static, "./a.mjs".to_string()),
                (SpecifierKind::Static, "./b".to_string()),
                (SpecifierKind::SideEffect, "./side.mjs".to_string()),
                (SpecifierKind::Static, "./c.mjs".to_string()),
                (SpecifierKind::Require, "lodash".to_string()),
                (SpecifierKind::Dynamic, "./e.mjs".to_string()),
            ]
        );
    }

    #[test]
    fn test_member_require_is_ignored() {
        assert!(specifiers("obj.require('x'); foo('y'); require('a' + b)").is_empty());
    }

    #[test]
    fn test_split_package() {
        assert_eq!(split_package("lodash"), ("lodash", None));
        assert_eq!(split_package("lodash/fp"), ("lodash", Some("fp")));
        assert_eq!(split_package("@scope/pkg"), ("@scope/pkg", None));
        assert_eq!(split_package("@scope/pkg/a/b"), ("@scope/pkg", Some("a/b")));
    }

    #[test]
    fn test_relative_specifier() {
        assert_eq!(
            relative_specifier(Path::new("a.cjs"), Path::new("sub/b.cjs")),
            "./sub/b.cjs"
        );
        assert_eq!(
            relative_specifier(Path::new("sub/b.cjs"), Path::new("a.cjs")),
            "../a.cjs"
        );
        assert_eq!(
            relative_specifier(Path::new("sub/b.cjs"), Path::new("sub/c.cjs")),
            "./c.cjs"
        );
    }

    #[test]
    fn test_normalize_and_key() {
        assert_eq!(normalize(Path::new("/p/src/./a/../b.mjs")), PathBuf::from("/p/src/b.mjs"));
        assert_eq!(module_key(Path::new("/p"), Path::new("/p/src/b.mjs")), "src/b.mjs");
    }

    #[test]
    fn test_resolve_relative_with_extension_and_index() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("util")).unwrap();
        fs::write(src.join("a.mjs"), "").unwrap();
        fs::write(src.join("b.mjs"), "").unwrap();
        fs::write(src.join("util/index.mjs"), "").unwrap();

        let target = BuildTarget::modules("cjs", OutputFormat::CommonJs, temp.path().join("dist"));
        let resolver = ModuleResolver::for_target(&target, ".mjs", temp.path());
        let importer = src.join("a.mjs");

        assert_eq!(
            resolver.resolve(&importer, "./b"),
            Some(Resolution::Module(src.join("b.mjs")))
        );
        assert_eq!(
            resolver.resolve(&importer, "./util"),
            Some(Resolution::Module(src.join("util/index.mjs")))
        );
        assert_eq!(resolver.resolve(&importer, "./missing"), None);
        assert_eq!(
            resolver.resolve(&importer, "lodash"),
            Some(Resolution::External("lodash".to_string()))
        );
    }

    #[test]
    fn test_bundle_resolves_node_modules_globals_and_builtins() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let pkg = temp.path().join("node_modules/tiny-fetch");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(pkg.join("lib")).unwrap();
        fs::write(src.join("index.mjs"), "").unwrap();
        fs::write(pkg.join("package.json"), r#"{ "main": "lib/main.js" }"#).unwrap();
        fs::write(pkg.join("lib/main.js"), "").unwrap();

        let mut globals = BTreeMap::new();
        globals.insert("lodash".to_string(), "_".to_string());
        let dist = temp.path().join("dist");
        let target = BuildTarget::bundle("browser", src.join("index.mjs"), "Api", dist)
            .with_globals(globals);
        let resolver = ModuleResolver::for_target(&target, ".mjs", temp.path());
        let importer = src.join("index.mjs");

        assert_eq!(
            resolver.resolve(&importer, "tiny-fetch"),
            Some(Resolution::Module(pkg.join("lib/main.js")))
        );
        assert_eq!(
            resolver.resolve(&importer, "lodash"),
            Some(Resolution::Global("_".to_string()))
        );
        assert_eq!(
            resolver.resolve(&importer, "node:fs"),
            Some(Resolution::Builtin("fs".to_string()))
        );
        assert_eq!(resolver.resolve(&importer, "left-pad"), None);
    }
}
