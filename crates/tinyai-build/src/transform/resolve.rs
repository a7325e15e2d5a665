use super::{apply_edits, Dependency, ModuleUnit, Transform, TransformContext, TransformError};
use crate::module_resolver::{
    find_specifiers, module_key, relative_specifier, ModuleResolver, Resolution, NODE_BUILTINS,
};
use crate::scan::Scanned;
use crate::targets::TargetKind;
use std::path::Path;
use tracing::{debug, warn};

/// Resolves and rewrites module specifiers.
///
/// Module targets get relative specifiers pointing at emitted files;
/// bundles get linker keys (`src/a.mjs`, `global:_`, `builtin:fs`).
pub struct Resolve;

impl Transform for Resolve {
    fn name(&self) -> &str {
        "resolve"
    }

    fn apply(
        &self,
        unit: &mut ModuleUnit,
        ctx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let resolver =
            ModuleResolver::for_target(ctx.target, ctx.sources.extension(), ctx.project_root);
        let scanned = Scanned::new(&unit.code);
        let mut edits = Vec::new();
        let mut dependencies = Vec::new();

        for spec in find_specifiers(&scanned) {
            let resolution = resolver
                .resolve(&unit.path, &spec.value)
                .ok_or_else(|| TransformError::Unresolved(spec.value.clone()))?;

            let rewritten = match (&resolution, ctx.target.kind) {
                (Resolution::Module(path), TargetKind::Modules) => {
                    emitted_specifier(ctx, &unit.path, path).unwrap_or_else(|| {
                        debug!(
                            specifier = %spec.value,
                            "import outside the source set left as written"
                        );
                        spec.value.clone()
                    })
                }
                (Resolution::Module(path), TargetKind::Bundle) => {
                    module_key(ctx.project_root, path)
                }
                (Resolution::External(name), _) => {
                    let builtin =
                        name.starts_with("node:") || NODE_BUILTINS.contains(&name.as_str());
                    if !builtin && !resolver.is_declared_external(name) {
                        warn!(
                            target = %ctx.target.name,
                            specifier = %name,
                            "bare import is not a declared dependency; leaving it external"
                        );
                    }
                    name.clone()
                }
                (Resolution::Global(alias), _) => format!("global:{}", alias),
                (Resolution::Builtin(name), _) => {
                    warn!(
                        target = %ctx.target.name,
                        module = %name,
                        file = %unit.path.display(),
                        "node builtin replaced with an empty shim"
                    );
                    format!("builtin:{}", name)
                }
            };

            if rewritten != spec.value {
                edits.push((spec.start, spec.end, rewritten));
            }
            dependencies.push(Dependency {
                specifier: spec.value,
                resolution,
            });
        }

        unit.code = apply_edits(&unit.code, edits);
        unit.dependencies = dependencies;
        Ok(())
    }
}

/// Specifier from the emitted importer to the emitted dependency, when the
/// dependency is itself one of the sources being emitted
fn emitted_specifier(
    ctx: &TransformContext<'_>,
    importer: &Path,
    dependency: &Path,
) -> Option<String> {
    let root = ctx.sources.root();
    let importer_rel = importer.strip_prefix(root).ok()?;
    let dependency_rel = dependency.strip_prefix(root).ok()?;
    if !ctx.sources.contains(dependency_rel) {
        return None;
    }
    Some(relative_specifier(
        &ctx.target.module_output(importer_rel),
        &ctx.target.module_output(dependency_rel),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover_sources;
    use crate::targets::{BuildTarget, OutputFormat};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_module_target_rewrites_to_output_extension() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.mjs"), "").unwrap();
        fs::write(src.join("sub/b.mjs"), "").unwrap();

        let sources = discover_sources(&src, ".mjs").unwrap();
        let target = BuildTarget::modules("cjs", OutputFormat::CommonJs, temp.path().join("dist"))
            .with_externals(vec!["lodash".to_string()]);
        let ctx = TransformContext {
            target: &target,
            sources: &sources,
            project_root: temp.path(),
        };

        let mut unit = ModuleUnit::new(
            src.join("a.mjs"),
            "a.mjs",
            "import b from './sub/b.mjs';\nimport _ from 'lodash';\n",
        );
        Resolve.apply(&mut unit, &ctx).unwrap();

        assert_eq!(unit.code, "import b from './sub/b.cjs';\nimport _ from 'lodash';\n");
        assert_eq!(unit.dependencies.len(), 2);
    }

    #[test]
    fn test_unresolved_relative_import_fails() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.mjs"), "").unwrap();

        let sources = discover_sources(&src, ".mjs").unwrap();
        let target = BuildTarget::modules("cjs", OutputFormat::CommonJs, temp.path().join("dist"));
        let ctx = TransformContext {
            target: &target,
            sources: &sources,
            project_root: temp.path(),
        };

        let mut unit = ModuleUnit::new(src.join("a.mjs"), "a.mjs", "import x from './nope.mjs';");
        assert_eq!(
            Resolve.apply(&mut unit, &ctx),
            Err(TransformError::Unresolved("./nope.mjs".to_string()))
        );
    }
}
