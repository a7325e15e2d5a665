//! Single-file bundle linking
//!
//! Wraps every module in a factory keyed by its project-relative path and
//! emits a small `require` runtime inside an IIFE that assigns the entry's
//! exports to a global.

use crate::module_resolver::Resolution;
use crate::targets::BuildTarget;
use crate::transform::ModuleUnit;
use std::collections::BTreeMap;

/// Comment the linker leaves where chunk-level prelude code belongs
pub const PRELUDE_MARKER: &str = "/* @tinyai-prelude */";

const RUNTIME: &str = r#"var __cache = {};
function __require(id) {
  if (Object.prototype.hasOwnProperty.call(__cache, id)) return __cache[id].exports;
  if (Object.prototype.hasOwnProperty.call(__globals, id)) return root[__globals[id]];
  if (id.indexOf("builtin:") === 0) return {};
  var factory = __modules[id];
  if (!factory) throw new Error("Cannot find module '" + id + "'");
  var module = __cache[id] = { exports: {} };
  factory.call(module.exports, module, module.exports, __require);
  return module.exports;
}"#;

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Link resolved modules into one script
pub fn link(target: &BuildTarget, modules: &[ModuleUnit], entry_key: &str) -> String {
    let mut globals = BTreeMap::new();
    for module in modules {
        for dep in &module.dependencies {
            if let Resolution::Global(alias) = &dep.resolution {
                globals.insert(format!("global:{}", alias), alias.clone());
            }
        }
    }

    let mut out = String::new();
    out.push_str("(function (root) {\n");
    out.push_str(PRELUDE_MARKER);
    out.push('\n');

    out.push_str("var __modules = {\n");
    for module in modules {
        out.push_str(&format!(
            "{}: function (module, exports, require) {{\n",
            quote(&module.key)
        ));
        out.push_str(&module.code);
        if !module.code.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("},\n");
    }
    out.push_str("};\n");

    out.push_str("var __globals = {");
    let entries: Vec<String> = globals
        .iter()
        .map(|(key, alias)| format!(" {}: {}", quote(key), quote(alias)))
        .collect();
    out.push_str(&entries.join(","));
    out.push_str(" };\n");

    out.push_str(RUNTIME);
    out.push('\n');

    out.push_str(&format!("var __entry = __require({});\n", quote(entry_key)));
    let exposed = match &target.library_export {
        Some(export) => format!("__entry[{}]", quote(export)),
        None => "__entry".to_string(),
    };
    out.push_str(&format!(
        "root[{}] = {};\n",
        quote(target.library_name()),
        exposed
    ));
    out.push_str(concat!(
        "})(typeof globalThis !== \"undefined\" ? globalThis : ",
        "typeof self !== \"undefined\" ? self : this);\n",
    ));
    out
}
