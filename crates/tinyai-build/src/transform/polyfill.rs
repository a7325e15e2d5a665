use super::{ModuleUnit, Transform, TransformContext, TransformError};
use crate::bundle::PRELUDE_MARKER;
use crate::scan::{Scanned, SegmentKind};
use once_cell::sync::Lazy;
use regex::Regex;

static ENV_GLOBALS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?P<name>process|global|setImmediate)\b").unwrap());

/// Shims for Node globals that browsers lack
pub struct Polyfill;

impl Transform for Polyfill {
    fn name(&self) -> &str {
        "polyfill"
    }

    fn apply(
        &self,
        unit: &mut ModuleUnit,
        _ctx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let needed = referenced_globals(&unit.code);
        if needed.is_empty() {
            return Ok(());
        }

        match unit.code.find(PRELUDE_MARKER) {
            Some(pos) => {
                let at = pos + PRELUDE_MARKER.len();
                unit.code.insert_str(at, &format!("\n{}", shims(&needed, "root")));
            }
            None => {
                let root = "(typeof globalThis !== \"undefined\" ? globalThis : self)";
                unit.code.insert_str(0, &format!("{}\n", shims(&needed, root)));
            }
        }
        Ok(())
    }
}

/// Which shimmable globals the code uses, in shim order
fn referenced_globals(code: &str) -> Vec<&'static str> {
    let scanned = Scanned::new(code);
    let mut found = Vec::new();
    for seg in scanned.of_kind(SegmentKind::Code) {
        let text = seg.text(code);
        for caps in ENV_GLOBALS.captures_iter(text) {
            let Some(name) = caps.name("name") else { continue };
            if text[..name.start()].trim_end().ends_with('.') {
                continue;
            }
            let name = match name.as_str() {
                "process" => "process",
                "global" => "global",
                _ => "setImmediate",
            };
            if !found.contains(&name) {
                found.push(name);
            }
        }
    }
    found.sort_by_key(|name| ["process", "global", "setImmediate"].iter().position(|n| n == name));
    found
}

fn shims(needed: &[&str], root: &str) -> String {
    needed
        .iter()
        .map(|name| match *name {
            "process" => format!(
                "var process = {root}.process || {{ env: {{ NODE_ENV: \"production\" }}, \
                 argv: [], version: \"\", versions: {{}}, platform: \"browser\", browser: true, \
                 cwd: function () {{ return \"/\"; }}, \
                 nextTick: function (fn) {{ var args = Array.prototype.slice.call(arguments, 1); \
                 Promise.resolve().then(function () {{ fn.apply(null, args); }}); }} }};"
            ),
            "global" => format!("var global = {root};"),
            _ => format!(
                "var setImmediate = {root}.setImmediate || function (fn) {{ \
                 var args = Array.prototype.slice.call(arguments, 1); \
                 return setTimeout(function () {{ fn.apply(null, args); }}, 0); }};"
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
