//! ES module to CommonJS interop
//!
//! Exports become getters on `exports`, defined before any dependency is
//! required, and imported names are read through the required module
//! object at each use. Importers therefore see later writes to an exported
//! binding, and modules that import each other can call each other's
//! functions.

use super::{apply_edits, ModuleUnit, Transform, TransformContext, TransformError};
use crate::scan::{is_ident_byte, Scanned, Segment, SegmentKind, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use tracing::debug;

static EXPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"\bexport\s*(?:\*\s*as\s+(?P<ns>[\w$]+)|(?P<star>\*)|\{(?P<names>[^}]*)\})"#,
        r#"\s*from\s*["']"#,
    ))
    .unwrap()
});
static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s*(?P<clause>[\w$*{}\s,]+?)\s*\bfrom\s*["']"#).unwrap()
});
static IMPORT_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bimport\s*["']"#).unwrap());
static EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s*\{(?P<names>[^}]*)\}[ \t]*;?").unwrap());
static EXPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s+default\b\s*").unwrap());
static NAMED_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:(?:async\s+)?function\b\s*\*?\s*(?P<fname>[\w$]+)",
        r"|class\s+(?P<cname>[\w$]+))",
    ))
    .unwrap()
});
static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\bexport\s+(?P<decl>(?:async\s+)?function\b\s*\*?\s*(?P<fname>[\w$]+)",
        r"|class\s+(?P<cname>[\w$]+)",
        r"|(?:const|let|var)\s+(?P<vname>[\w$]+|\{[^}]*\}|\[[^\]]*\]))",
    ))
    .unwrap()
});
static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bimport\s*\(").unwrap());

const ES_MODULE_FLAG: &str = "Object.defineProperty(exports, \"__esModule\", { value: true });";
const HELPER_DEFAULT: &str =
    "function __importDefault(mod) { return mod && mod.__esModule ? mod : { default: mod }; }";
const HELPER_EXPORT: &str = concat!(
    "function __export(target, all) { for (var name in all) ",
    "Object.defineProperty(target, name, { enumerable: true, get: all[name] }); }",
);
const HELPER_STAR: &str = concat!(
    "function __exportStar(mod, target) { Object.keys(mod).forEach(function (key) { ",
    "if (key !== \"default\" && !Object.prototype.hasOwnProperty.call(target, key)) ",
    "Object.defineProperty(target, key, ",
    "{ enumerable: true, get: function () { return mod[key]; } }); }); }",
);
const HELPER_IMPORT: &str = concat!(
    "function __import(id) { return Promise.resolve().then(function () { ",
    "var mod = require(id); ",
    "return mod && mod.__esModule ? mod : Object.assign({ default: mod }, mod); }); }",
);

/// Rewrites ES module syntax into CommonJS
pub struct Interop;

impl Transform for Interop {
    fn name(&self) -> &str {
        "interop"
    }

    fn apply(
        &self,
        unit: &mut ModuleUnit,
        _ctx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        if let Some(code) = to_commonjs(&unit.code) {
            unit.code = code;
        }
        Ok(())
    }
}

/// A `require` moved to the top of the module
#[derive(Debug)]
struct Load {
    pos: usize,
    code: String,
    /// Variable the load assigns, if any
    temp: Option<String>,
}

/// What an export getter returns
#[derive(Debug)]
enum Exported {
    /// A binding of this module, possibly an imported one
    Local(String),
    Expr(String),
}

/// An imported name and where it is read from
#[derive(Debug)]
struct Binding {
    local: String,
    /// Expression for the module object
    module: String,
    member: String,
    /// Temp of the load that must run before the binding is read
    after: String,
}

impl Binding {
    fn read(&self) -> String {
        format!("{}.{}", self.module, self.member)
    }

    fn snapshot(&self) -> String {
        if self.local == self.member {
            format!("const {{ {} }} = {};", self.local, self.module)
        } else {
            format!("const {{ {}: {} }} = {};", self.member, self.local, self.module)
        }
    }
}

#[derive(Debug, Default)]
struct Rewrite {
    edits: Vec<(usize, usize, String)>,
    /// Statements deleted whole
    removed: Vec<(usize, usize)>,
    loads: Vec<Load>,
    exports: Vec<(usize, String, Exported)>,
    bindings: Vec<Binding>,
    needs_default: bool,
    needs_star: bool,
    needs_import: bool,
    temps: usize,
}

impl Rewrite {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.edits.iter().any(|(s, e, _)| start < *e && *s < end)
    }

    fn push(&mut self, start: usize, end: usize, replacement: String) {
        self.edits.push((start, end, replacement));
    }

    /// Delete a statement, along with its line break when it fills the line
    fn remove(&mut self, source: &str, start: usize, end: usize) {
        let line_start = source[..start].ends_with('\n') || start == 0;
        let end = if line_start && source[end..].starts_with('\n') {
            end + 1
        } else {
            end
        };
        self.removed.push((start, end));
        self.push(start, end, String::new());
    }

    fn is_removed(&self, pos: usize) -> bool {
        self.removed.iter().any(|(s, e)| *s <= pos && pos < *e)
    }

    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("__tinyai_m{}", self.temps)
    }

    fn load(&mut self, pos: usize, code: String, temp: Option<&str>) {
        self.loads.push(Load {
            pos,
            code,
            temp: temp.map(str::to_string),
        });
    }

    fn bind(&mut self, local: &str, module: &str, member: &str, after: &str) {
        self.bindings.push(Binding {
            local: local.to_string(),
            module: module.to_string(),
            member: member.to_string(),
            after: after.to_string(),
        });
    }

    fn export(&mut self, pos: usize, name: &str, value: Exported) {
        self.exports.push((pos, name.to_string(), value));
    }
}

/// CommonJS rendition of `source`, or None when it has no module syntax
pub(crate) fn to_commonjs(source: &str) -> Option<String> {
    let scanned = Scanned::new(source);
    let masked = scanned.masked();
    let mut rw = Rewrite::default();

    for caps in IMPORT_FROM.captures_iter(&masked) {
        let keyword_end = caps.get(0).map_or(0, |m| m.start()) + "import".len();
        if masked.as_bytes().get(keyword_end).is_some_and(|&b| is_ident_byte(b)) {
            continue;
        }
        let Some((start, literal, end)) = statement(&scanned, &masked, &caps) else {
            continue;
        };
        let clause = caps.name("clause").map_or("", |m| m.as_str());
        bind_import(&mut rw, start, clause, &literal);
        rw.remove(source, start, end);
    }

    for caps in IMPORT_BARE.captures_iter(&masked) {
        let Some((start, literal, end)) = statement(&scanned, &masked, &caps) else {
            continue;
        };
        if !rw.overlaps(start, end) {
            rw.load(start, format!("require({});", literal), None);
            rw.remove(source, start, end);
        }
    }

    for caps in EXPORT_FROM.captures_iter(&masked) {
        let Some((start, literal, end)) = statement(&scanned, &masked, &caps) else {
            continue;
        };
        let require = format!("require({})", literal);
        if caps.name("star").is_some() {
            rw.needs_star = true;
            rw.load(start, format!("__exportStar({}, exports);", require), None);
        } else {
            let tmp = rw.temp();
            rw.load(start, format!("const {} = {};", tmp, require), Some(tmp.as_str()));
            if let Some(ns) = caps.name("ns") {
                rw.export(start, ns.as_str(), Exported::Expr(tmp.clone()));
            }
            let names = caps.name("names").map_or("", |m| m.as_str());
            for (name, alias) in parse_names(names) {
                let read = if name == "default" {
                    rw.needs_default = true;
                    format!("__importDefault({}).default", tmp)
                } else {
                    format!("{}.{}", tmp, name)
                };
                rw.export(start, &alias, Exported::Expr(read));
            }
        }
        rw.remove(source, start, end);
    }

    for caps in EXPORT_LIST.captures_iter(&masked) {
        let Some(m) = caps.get(0) else { continue };
        if !at_statement_start(&masked, m.start()) || rw.overlaps(m.start(), m.end()) {
            continue;
        }
        let names = caps.name("names").map_or("", |m| m.as_str());
        for (name, alias) in parse_names(names) {
            rw.export(m.start(), &alias, Exported::Local(name));
        }
        rw.remove(source, m.start(), m.end());
    }

    for m in EXPORT_DEFAULT.find_iter(&masked) {
        if !at_statement_start(&masked, m.start()) || rw.overlaps(m.start(), m.end()) {
            continue;
        }
        let named = NAMED_DEFAULT
            .captures(&masked[m.end()..])
            .and_then(|c| c.name("fname").or_else(|| c.name("cname")))
            .map(|n| n.as_str().to_string());
        match named {
            Some(name) => {
                rw.export(m.start(), "default", Exported::Local(name));
                rw.push(m.start(), m.end(), String::new());
            }
            None => rw.push(m.start(), m.end(), "exports.default = ".to_string()),
        }
    }

    for caps in EXPORT_DECL.captures_iter(&masked) {
        let (Some(m), Some(decl)) = (caps.get(0), caps.name("decl")) else {
            continue;
        };
        if !at_statement_start(&masked, m.start()) || rw.overlaps(m.start(), decl.start()) {
            continue;
        }
        let names = if let Some(n) = caps.name("fname").or_else(|| caps.name("cname")) {
            vec![n.as_str().to_string()]
        } else {
            caps.name("vname").map_or_else(Vec::new, |n| binding_names(n.as_str()))
        };
        for name in names {
            rw.export(m.start(), &name, Exported::Local(name.clone()));
        }
        rw.push(m.start(), decl.start(), String::new());
    }

    for m in DYNAMIC_IMPORT.find_iter(&masked) {
        let preceded_by_dot = masked[..m.start()].trim_end().ends_with('.');
        if preceded_by_dot || rw.overlaps(m.start(), m.end()) {
            continue;
        }
        rw.needs_import = true;
        rw.push(m.start(), m.start() + "import".len(), "__import".to_string());
    }

    if rw.edits.is_empty() && rw.loads.is_empty() && rw.exports.is_empty() {
        return None;
    }

    let shadowed = rewrite_references(&scanned, &mut rw);

    let (prologue_end, strict) = directive_prologue(&scanned);
    let mut header: Vec<String> = Vec::new();
    if !strict {
        header.push("'use strict';".to_string());
    }
    header.push(ES_MODULE_FLAG.to_string());
    if rw.needs_default {
        header.push(HELPER_DEFAULT.to_string());
    }
    if !rw.exports.is_empty() {
        header.push(HELPER_EXPORT.to_string());
    }
    if rw.needs_star {
        header.push(HELPER_STAR.to_string());
    }
    if rw.needs_import {
        header.push(HELPER_IMPORT.to_string());
    }
    if !rw.exports.is_empty() {
        header.push(export_getters(&mut rw, &shadowed));
    }
    rw.loads.sort_by_key(|load| load.pos);
    for load in &rw.loads {
        header.push(load.code.clone());
        let Some(temp) = &load.temp else { continue };
        for binding in &rw.bindings {
            if &binding.after == temp && shadowed.contains(&binding.local) {
                header.push(binding.snapshot());
            }
        }
    }
    let header = header.join("\n");

    let mut out = apply_edits(source, std::mem::take(&mut rw.edits));
    if prologue_end == 0 {
        out.insert_str(0, &format!("{}\n", header));
    } else {
        out.insert_str(prologue_end, &format!("\n{}", header));
    }
    Some(out)
}

/// `__export(exports, { name: getter, ... });`, in source order
fn export_getters(rw: &mut Rewrite, shadowed: &HashSet<String>) -> String {
    rw.exports.sort_by_key(|(pos, _, _)| *pos);
    let getters: Vec<String> = rw
        .exports
        .iter()
        .map(|(_, name, value)| {
            let read = match value {
                Exported::Expr(expr) => expr.clone(),
                Exported::Local(local) => rw
                    .bindings
                    .iter()
                    .find(|b| &b.local == local && !shadowed.contains(local))
                    .map_or_else(|| local.clone(), Binding::read),
            };
            format!("{}: function () {{ return {}; }}", name, read)
        })
        .collect();
    format!("__export(exports, {{ {} }});", getters.join(", "))
}

/// Point uses of imported names at their module objects.
///
/// Returns the imported names the module declares again somewhere; those
/// are read once from a snapshot instead.
fn rewrite_references(scanned: &Scanned<'_>, rw: &mut Rewrite) -> HashSet<String> {
    let source = scanned.source();
    let tokens = scanned.tokens();
    let usage = Usage::new(source, &tokens);
    let mut shadowed = HashSet::new();
    let mut edits = Vec::new();

    for binding in &rw.bindings {
        let uses: Vec<usize> = (0..tokens.len())
            .filter(|&k| tokens[k].is_word(source, &binding.local))
            .filter(|&k| !usage.is_member(k) && !rw.is_removed(tokens[k].start))
            .collect();
        if uses.iter().any(|&k| usage.is_declaration(k)) {
            debug!(name = %binding.local, "imported name is redeclared, reading a snapshot");
            shadowed.insert(binding.local.clone());
            continue;
        }
        for k in uses {
            if let Some(text) = usage.replacement(k, &binding.read()) {
                edits.push((tokens[k].start, tokens[k].end, text));
            }
        }
    }

    for (start, end, text) in edits {
        if !rw.overlaps(start, end) {
            rw.push(start, end, text);
        }
    }
    shadowed
}

/// Bracket structure of a token stream
struct Usage<'a> {
    source: &'a str,
    tokens: &'a [Token],
    /// Innermost open bracket around each token
    enclosing: Vec<Option<usize>>,
    partner: HashMap<usize, usize>,
}

impl<'a> Usage<'a> {
    fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        let mut stack: Vec<usize> = Vec::new();
        let mut enclosing = Vec::with_capacity(tokens.len());
        let mut partner = HashMap::new();
        for (k, t) in tokens.iter().enumerate() {
            match t.kind {
                TokenKind::Punct(b')' | b']' | b'}') => {
                    if let Some(open) = stack.pop() {
                        partner.insert(open, k);
                        partner.insert(k, open);
                    }
                    enclosing.push(stack.last().copied());
                }
                TokenKind::Punct(b'(' | b'[' | b'{') => {
                    enclosing.push(stack.last().copied());
                    stack.push(k);
                }
                _ => enclosing.push(stack.last().copied()),
            }
        }
        Self {
            source,
            tokens,
            enclosing,
            partner,
        }
    }

    fn prev(&self, k: usize) -> Option<&Token> {
        k.checked_sub(1).map(|p| &self.tokens[p])
    }

    fn next(&self, k: usize) -> Option<&Token> {
        self.tokens.get(k + 1)
    }

    fn prev_word(&self, k: usize, words: &[&str]) -> bool {
        self.prev(k)
            .is_some_and(|t| t.kind == TokenKind::Ident && words.contains(&t.text(self.source)))
    }

    fn next_punct(&self, k: usize, c: u8) -> bool {
        self.next(k).is_some_and(|t| t.is_punct(c))
    }

    fn is_member(&self, k: usize) -> bool {
        self.prev(k).is_some_and(|t| t.is_punct(b'.'))
    }

    /// Whether the identifier at `k` introduces a binding
    fn is_declaration(&self, k: usize) -> bool {
        if self.prev_word(k, &["var", "let", "const", "function", "class"]) {
            return true;
        }
        if self.next(k).is_some_and(|t| t.kind == TokenKind::Arrow) {
            return true;
        }
        let mut open = self.enclosing[k];
        while let Some(b) = open {
            if self.tokens[b].is_punct(b'(') {
                return self.is_parameter_list(b);
            }
            if self.prev_word(b, &["var", "let", "const"]) {
                return true;
            }
            let in_pattern = self.prev(b).is_some_and(|t| {
                matches!(t.kind, TokenKind::Punct(b',' | b'(' | b'[' | b':'))
                    || (t.kind == TokenKind::Op && t.text(self.source) == "...")
            });
            if !in_pattern {
                return false;
            }
            open = self.enclosing[b];
        }
        false
    }

    fn is_parameter_list(&self, open: usize) -> bool {
        if self.prev_word(open, &["if", "while", "for", "switch", "with"]) {
            return false;
        }
        let Some(&close) = self.partner.get(&open) else {
            return false;
        };
        self.next(close)
            .is_some_and(|t| t.is_punct(b'{') || t.kind == TokenKind::Arrow)
    }

    /// Text replacing the use of an imported name at `k`, if it is a read
    fn replacement(&self, k: usize, read: &str) -> Option<String> {
        if self.next_punct(k, b'=') {
            return None;
        }
        let in_braces = self.enclosing[k].is_some_and(|b| self.tokens[b].is_punct(b'{'));
        let listed = in_braces
            && self
                .prev(k)
                .is_some_and(|t| t.is_punct(b'{') || t.is_punct(b','));
        if listed && self.next_punct(k, b':') {
            return None;
        }
        if self.next_punct(k, b'(') {
            let method = self
                .partner
                .get(&(k + 1))
                .is_some_and(|&close| self.next_punct(close, b'{'));
            if method {
                return None;
            }
        }
        if listed && (self.next_punct(k, b'}') || self.next_punct(k, b',')) {
            let name = self.tokens[k].text(self.source);
            return Some(format!("{}: {}", name, read));
        }

        let tagged = self.next(k).is_some_and(|t| {
            t.kind == TokenKind::Literal && t.text(self.source).starts_with('`')
        });
        let called = self.next_punct(k, b'(') || tagged;
        if called && !self.prev_word(k, &["new"]) && self.may_open_paren(k) {
            // Call without the module object as `this`
            return Some(format!("(0, {})", read));
        }
        Some(read.to_string())
    }

    /// A `(` at `k` cannot attach to the previous line as a call
    fn may_open_paren(&self, k: usize) -> bool {
        let Some(prev) = self.prev(k) else {
            return true;
        };
        if !self.source[prev.end..self.tokens[k].start].contains('\n') {
            return true;
        }
        match prev.kind {
            TokenKind::Punct(c) => !matches!(c, b')' | b']' | b'}'),
            TokenKind::Op | TokenKind::Arrow => true,
            TokenKind::Ident | TokenKind::Literal => false,
        }
    }
}

/// Statement range and quoted specifier for a match ending at an opening quote
fn statement(
    scanned: &Scanned<'_>,
    masked: &str,
    caps: &Captures<'_>,
) -> Option<(usize, String, usize)> {
    let m = caps.get(0)?;
    if !at_statement_start(masked, m.start()) {
        return None;
    }
    let literal = literal_at(scanned, m.end() - 1)?;
    let end = statement_end(scanned.source(), literal.end);
    Some((m.start(), literal.text(scanned.source()).to_string(), end))
}

fn literal_at(scanned: &Scanned<'_>, pos: usize) -> Option<Segment> {
    let segments = scanned.segments();
    let idx = segments.partition_point(|s| s.start < pos);
    segments
        .get(idx)
        .filter(|s| s.start == pos && s.kind == SegmentKind::String)
        .copied()
}

fn statement_end(source: &str, after: usize) -> usize {
    let rest = &source.as_bytes()[after..];
    let spaces = rest.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    if rest.get(spaces) == Some(&b';') {
        after + spaces + 1
    } else {
        after
    }
}

fn at_statement_start(masked: &str, pos: usize) -> bool {
    let before = masked[..pos].trim_end_matches(|c: char| c == ' ' || c == '\t');
    match before.chars().last() {
        None => true,
        Some(c) => matches!(c, '\n' | '\r' | ';' | '}'),
    }
}

/// `a, b as c` into `(name, alias)` pairs
fn parse_names(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let words: Vec<&str> = part.split_whitespace().collect();
            match words.as_slice() {
                [name, "as", alias] => (name.to_string(), alias.to_string()),
                _ => (part.to_string(), part.to_string()),
            }
        })
        .collect()
}

/// Local names bound by a declaration target (identifier or flat pattern)
fn binding_names(target: &str) -> Vec<String> {
    let inner = target
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .or_else(|| target.strip_prefix('[').and_then(|t| t.strip_suffix(']')));
    let Some(inner) = inner else {
        return vec![target.to_string()];
    };
    inner
        .split(',')
        .filter_map(|part| {
            let part = part.trim().trim_start_matches("...");
            let local = part.rsplit(':').next().unwrap_or(part);
            let local = local.split('=').next().unwrap_or(local).trim();
            let valid = !local.is_empty() && local.bytes().all(is_ident_byte);
            valid.then(|| local.to_string())
        })
        .collect()
}

/// Record the loads and bindings of one `import ... from` clause
fn bind_import(rw: &mut Rewrite, pos: usize, clause: &str, literal: &str) {
    let clause = clause.trim();
    let (default, rest) = if clause.starts_with('{') || clause.starts_with('*') {
        (None, clause)
    } else {
        match clause.split_once(',') {
            Some((head, tail)) => (Some(head.trim()), tail.trim()),
            None => (Some(clause), ""),
        }
    };
    let namespace = rest
        .strip_prefix('*')
        .and_then(|r| r.trim_start().strip_prefix("as"))
        .map(str::trim);
    let named = rest
        .strip_prefix('{')
        .and_then(|r| r.trim_end().strip_suffix('}'))
        .map(parse_names);

    let require = format!("require({})", literal);
    match (default, namespace, named) {
        (None, Some(ns), None) => {
            rw.load(pos, format!("const {} = {};", ns, require), None);
        }
        (Some(d), None, None) => {
            rw.needs_default = true;
            let tmp = rw.temp();
            let code = format!("const {} = __importDefault({});", tmp, require);
            rw.load(pos, code, Some(tmp.as_str()));
            rw.bind(d, &tmp, "default", &tmp);
        }
        (default, namespace, named) => {
            let tmp = rw.temp();
            rw.load(pos, format!("const {} = {};", tmp, require), Some(tmp.as_str()));
            if let Some(ns) = namespace {
                rw.load(pos, format!("const {} = {};", ns, tmp), None);
            }
            for (name, alias) in named.unwrap_or_default() {
                if name == "default" {
                    rw.needs_default = true;
                    let module = format!("__importDefault({})", tmp);
                    rw.bind(&alias, &module, "default", &tmp);
                } else {
                    rw.bind(&alias, &tmp, &name, &tmp);
                }
            }
            if let Some(d) = default {
                rw.needs_default = true;
                let wrapped = rw.temp();
                let code = format!("const {} = __importDefault({});", wrapped, tmp);
                rw.load(pos, code, Some(wrapped.as_str()));
                rw.bind(d, &wrapped, "default", &wrapped);
            }
        }
    }
}

/// End offset of the leading directive prologue and whether it says "use strict"
fn directive_prologue(scanned: &Scanned<'_>) -> (usize, bool) {
    let source = scanned.source();
    let segments = scanned.segments();
    let mut end = 0;
    let mut strict = false;
    let mut i = 0;

    while let Some(seg) = segments.get(i) {
        match seg.kind {
            SegmentKind::Comment => i += 1,
            SegmentKind::Code if seg.text(source).trim().is_empty() => i += 1,
            SegmentKind::String => {
                let following = segments.get(i + 1);
                let rest = following.map_or("", |s| s.text(source));
                if following.is_some_and(|s| s.kind != SegmentKind::Code) {
                    break;
                }
                let trimmed = rest.trim_start_matches(|c: char| c == ' ' || c == '\t');
                let (inner_start, inner_end) = seg.inner_range();
                let directive = &source[inner_start..inner_end];
                if let Some(after) = trimmed.strip_prefix(';') {
                    strict |= directive == "use strict";
                    end = seg.end + (rest.len() - trimmed.len()) + 1;
                    if !after.trim().is_empty() {
                        break;
                    }
                    i += 2;
                } else if trimmed.is_empty()
                    || trimmed.starts_with('\n')
                    || trimmed.starts_with('\r')
                {
                    strict |= directive == "use strict";
                    end = seg.end;
                    if !trimmed.trim().is_empty() {
                        break;
                    }
                    i += 2;
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    (end, strict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cjs(src: &str) -> String {
        to_commonjs(src).unwrap()
    }

    fn lines(lines: &[&str]) -> String {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    #[test]
    fn test_plain_commonjs_untouched() {
        assert_eq!(to_commonjs("const x = require('x');\nmodule.exports = x;\n"), None);
    }

    #[test]
    fn test_imports_read_through_module_object() {
        assert_eq!(
            cjs("import api, { get as fetchGet } from './api.cjs';\nfetchGet(api.base);\n"),
            lines(&[
                "'use strict';",
                ES_MODULE_FLAG,
                HELPER_DEFAULT,
                "const __tinyai_m1 = require('./api.cjs');",
                "const __tinyai_m2 = __importDefault(__tinyai_m1);",
                "(0, __tinyai_m1.get)(__tinyai_m2.default.base);",
            ])
        );
    }

    #[test]
    fn test_exports_are_live_getters_defined_first() {
        assert_eq!(
            cjs("import { log } from './log.cjs';\nexport let count = 0;\n\
                 export function inc() {\n  count++;\n  log(count);\n}\n"),
            lines(&[
                "'use strict';",
                ES_MODULE_FLAG,
                HELPER_EXPORT,
                "__export(exports, { count: function () { return count; }, \
                 inc: function () { return inc; } });",
                "const __tinyai_m1 = require('./log.cjs');",
                "let count = 0;",
                "function inc() {",
                "  count++;",
                "  (0, __tinyai_m1.log)(count);",
                "}",
            ])
        );
    }

    #[test]
    fn test_property_positions_of_imported_names() {
        assert_eq!(
            cjs("import { get } from './http.cjs';\n\
                 const api = { get, via: get, get() { return api.get; } };\n\
                 get('/x');\nget`/y`;\n"),
            lines(&[
                "'use strict';",
                ES_MODULE_FLAG,
                "const __tinyai_m1 = require('./http.cjs');",
                "const api = { get: __tinyai_m1.get, via: __tinyai_m1.get, \
                 get() { return api.get; } };",
                "(0, __tinyai_m1.get)('/x');",
                "(0, __tinyai_m1.get)`/y`;",
            ])
        );
    }

    #[test]
    fn test_call_on_continuation_line_is_not_parenthesized() {
        let out = cjs("import { wrap } from './w.cjs';\nconst y = a\nwrap();\n");
        assert!(out.contains("const y = a\n__tinyai_m1.wrap();"));
    }

    #[test]
    fn test_redeclared_import_reads_snapshot() {
        assert_eq!(
            cjs("import { greet } from './a.cjs';\nfunction wrap(greet) {\n  return greet;\n}\n\
                 export const hi = greet();\n"),
            lines(&[
                "'use strict';",
                ES_MODULE_FLAG,
                HELPER_EXPORT,
                "__export(exports, { hi: function () { return hi; } });",
                "const __tinyai_m1 = require('./a.cjs');",
                "const { greet } = __tinyai_m1;",
                "function wrap(greet) {",
                "  return greet;",
                "}",
                "const hi = greet();",
            ])
        );
    }

    #[test]
    fn test_namespace_and_side_effect_imports() {
        assert_eq!(
            cjs("import * as util from \"./util.cjs\";\nimport './setup.cjs';\n"),
            lines(&[
                "'use strict';",
                ES_MODULE_FLAG,
                "const util = require(\"./util.cjs\");",
                "require('./setup.cjs');",
            ])
        );
    }

    #[test]
    fn test_export_default_forms() {
        let named = cjs("export default function objType(v) { return v; }\n");
        assert!(named.contains("__export(exports, { default: function () { return objType; } });"));
        assert!(named.ends_with("\nfunction objType(v) { return v; }\n"));

        let expr = cjs("export default { a: 1 };\n");
        assert!(expr.ends_with("\nexports.default = { a: 1 };\n"));
    }

    #[test]
    fn test_export_lists_and_reexports() {
        assert_eq!(
            cjs("import { a } from './a.cjs';\nconst b = 2;\nexport { a, b as beta };\n\
                 export * from './all.cjs';\nexport { x as y, default as z } from './m.cjs';\n"),
            lines(&[
                "'use strict';",
                ES_MODULE_FLAG,
                HELPER_DEFAULT,
                HELPER_EXPORT,
                HELPER_STAR,
                "__export(exports, { a: function () { return __tinyai_m1.a; }, \
                 beta: function () { return b; }, \
                 y: function () { return __tinyai_m2.x; }, \
                 z: function () { return __importDefault(__tinyai_m2).default; } });",
                "const __tinyai_m1 = require('./a.cjs');",
                "__exportStar(require('./all.cjs'), exports);",
                "const __tinyai_m2 = require('./m.cjs');",
                "const b = 2;",
            ])
        );
    }

    #[test]
    fn test_destructured_export() {
        let out = cjs("export const { a, b: renamed, ...rest } = source;\n");
        assert!(out.contains(
            "__export(exports, { a: function () { return a; }, \
             renamed: function () { return renamed; }, rest: function () { return rest; } });"
        ));
        assert!(out.ends_with("\nconst { a, b: renamed, ...rest } = source;\n"));
    }

    #[test]
    fn test_directive_prologue_kept_first() {
        let out = cjs("\"use client\";\n'use strict';\nimport x from './x.cjs';\nx();\n");
        assert!(out.starts_with("\"use client\";\n'use strict';\nObject.defineProperty(exports"));
        assert_eq!(out.matches("use strict").count(), 1);
        assert!(out.ends_with("\n(0, __tinyai_m1.default)();\n"));
    }

    #[test]
    fn test_dynamic_import() {
        let out = cjs("const load = () => import('./lazy.cjs');\n");
        assert!(out.contains("__import('./lazy.cjs')"));
        assert!(out.contains(HELPER_IMPORT));
    }

    #[test]
    fn test_module_syntax_in_strings_ignored() {
        let src = "const doc = \"import x from 'y'\";\n// export default 1\n";
        assert_eq!(to_commonjs(src), None);
    }
}
