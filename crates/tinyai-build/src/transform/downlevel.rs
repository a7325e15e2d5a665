//! Legacy-syntax downleveling
//!
//! A small pass: block-scoped declarations become `var` where that cannot
//! change what the program does, and untagged template literals become
//! string concatenation. Arrows, classes and destructuring are left for the
//! browsers that already support them.
//!
//! A `let`/`const` is rewritten only when
//!
//! * every use of its names inside the enclosing function lies inside the
//!   declaring block, so hoisting to function scope cannot collide with
//!   another binding, and
//! * when a loop sits between the block and the function, each declarator
//!   is initialized and the loop creates no closures, so one shared `var`
//!   behaves like the per-iteration binding.
//!
//! Everything else keeps its keyword.

use super::{apply_edits, ModuleUnit, Transform, TransformContext, TransformError};
use crate::scan::{is_ident_byte, skip_braced, Scanned, Segment, SegmentKind, Token, TokenKind};
use std::collections::HashMap;
use tracing::trace;

pub struct Downlevel;

impl Transform for Downlevel {
    fn name(&self) -> &str {
        "downlevel"
    }

    fn apply(
        &self,
        unit: &mut ModuleUnit,
        _ctx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        unit.code = downlevel(&unit.code);
        Ok(())
    }
}

pub(crate) fn downlevel(source: &str) -> String {
    let scanned = Scanned::new(source);
    let mut edits = Vec::new();

    for seg in scanned.of_kind(SegmentKind::Template) {
        if let Some(concat) = template_to_concat(source, seg) {
            edits.push((seg.start, seg.end, concat));
        }
    }

    let tokens = scanned.tokens();
    match Program::analyze(source, &tokens) {
        Some(program) => {
            for decl in program.declarations() {
                if program.can_hoist(&decl) {
                    edits.push((decl.keyword.start, decl.keyword.end, "var".to_string()));
                } else {
                    trace!(names = ?decl.names, "keeping block-scoped declaration");
                }
            }
        }
        None => trace!("unbalanced brackets, block-scoped declarations kept"),
    }

    apply_edits(source, edits)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Block,
    Loop,
}

/// Byte range a binding can live in
#[derive(Debug, Clone, Copy)]
struct Scope {
    kind: ScopeKind,
    start: usize,
    end: usize,
    /// Extent not known exactly; declarations scoped here are never hoisted
    opaque: bool,
}

impl Scope {
    fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    fn within(&self, outer: &Scope) -> bool {
        outer.start <= self.start && self.end <= outer.end
    }

    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// One `let`/`const` statement
#[derive(Debug)]
struct Declaration {
    keyword: Token,
    names: Vec<String>,
    initialized: bool,
}

struct Program<'a> {
    source: &'a str,
    /// Every token, template expressions included
    all: &'a [Token],
    /// Tokens outside template expressions
    top: Vec<Token>,
    /// Index in `top` of the partner of each bracket
    partner: HashMap<usize, usize>,
    scopes: Vec<Scope>,
}

impl<'a> Program<'a> {
    fn analyze(source: &'a str, all: &'a [Token]) -> Option<Self> {
        let top: Vec<Token> = all.iter().filter(|t| !t.nested).copied().collect();
        let partner = match_brackets(&top)?;
        let mut program = Self {
            source,
            all,
            top,
            partner,
            scopes: vec![Scope {
                kind: ScopeKind::Function,
                start: 0,
                end: source.len(),
                opaque: false,
            }],
        };
        program.collect_scopes();
        Some(program)
    }

    fn word(&self, i: usize, word: &str) -> bool {
        self.top.get(i).is_some_and(|t| t.is_word(self.source, word))
    }

    fn punct(&self, i: usize, c: u8) -> bool {
        self.top.get(i).is_some_and(|t| t.is_punct(c))
    }

    /// Loop keyword owning the `(` at index `open`
    fn loop_head(&self, open: usize) -> Option<&'static str> {
        let before = open.checked_sub(1)?;
        if self.word(before, "for") {
            Some("for")
        } else if self.word(before, "while") {
            Some("while")
        } else if self.word(before, "await") && before > 0 && self.word(before - 1, "for") {
            Some("for")
        } else {
            None
        }
    }

    fn collect_scopes(&mut self) {
        for i in 0..self.top.len() {
            if self.punct(i, b'{') {
                let scope = self.brace_scope(i);
                self.scopes.push(scope);
            } else if self.punct(i, b'(') {
                if let Some(scope) = self.loop_head_scope(i) {
                    self.scopes.push(scope);
                }
            }
        }
    }

    fn brace_scope(&self, i: usize) -> Scope {
        let end = self.top[self.partner[&i]].end;
        let block = |kind| Scope {
            kind,
            start: self.top[i].start,
            end,
            opaque: false,
        };
        if i == 0 {
            return block(ScopeKind::Block);
        }
        let prev = self.top[i - 1];
        if prev.kind == TokenKind::Arrow {
            let params = match i.checked_sub(2) {
                Some(p) if self.punct(p, b')') => self.top[self.partner[&p]].start,
                Some(p) => self.top[p].start,
                None => prev.start,
            };
            return Scope {
                kind: ScopeKind::Function,
                start: params,
                end,
                opaque: false,
            };
        }
        if self.word(i - 1, "do") {
            return block(ScopeKind::Loop);
        }
        if !prev.is_punct(b')') {
            return block(ScopeKind::Block);
        }

        let open = self.partner[&(i - 1)];
        if self.loop_head(open).is_some() {
            return block(ScopeKind::Loop);
        }
        let keyword = open.checked_sub(1).map(|k| self.top[k].text(self.source));
        if matches!(keyword, Some("if" | "switch" | "catch" | "with")) {
            return block(ScopeKind::Block);
        }
        if self.source[prev.end..self.top[i].start].contains('\n') {
            return block(ScopeKind::Block);
        }
        Scope {
            kind: ScopeKind::Function,
            start: self.top[open].start,
            end,
            opaque: false,
        }
    }

    fn loop_head_scope(&self, open: usize) -> Option<Scope> {
        let keyword = self.loop_head(open)?;
        let close = self.partner[&open];
        let start = self.top[open].start;
        match self.top.get(close + 1) {
            Some(body) if body.is_punct(b'{') => Some(Scope {
                kind: ScopeKind::Loop,
                start,
                end: self.top[self.partner[&(close + 1)]].end,
                opaque: false,
            }),
            // Tail of a do-while
            Some(body) if keyword == "while" && body.is_punct(b';') => None,
            _ => Some(Scope {
                kind: ScopeKind::Loop,
                start,
                end: self.statement_end(close + 1),
                opaque: true,
            }),
        }
    }

    /// End of the braceless statement starting at token `i`
    fn statement_end(&self, mut i: usize) -> usize {
        while i < self.top.len() {
            let t = self.top[i];
            match t.kind {
                TokenKind::Punct(b';') => return t.end,
                TokenKind::Punct(b')' | b']' | b'}') => return t.start,
                TokenKind::Punct(b'(' | b'[' | b'{') => i = self.partner[&i] + 1,
                _ => i += 1,
            }
        }
        self.source.len()
    }

    fn declarations(&self) -> Vec<Declaration> {
        let mut decls = Vec::new();
        for i in 0..self.top.len() {
            if !(self.word(i, "let") || self.word(i, "const")) {
                continue;
            }
            if i > 0 && self.punct(i - 1, b'.') {
                continue;
            }
            let Some(next) = self.top.get(i + 1) else {
                continue;
            };
            if next.kind == TokenKind::Ident || next.is_punct(b'[') || next.is_punct(b'{') {
                if let Some(decl) = self.declarators(i) {
                    decls.push(decl);
                }
            }
        }
        decls
    }

    fn declarators(&self, keyword: usize) -> Option<Declaration> {
        let mut decl = Declaration {
            keyword: self.top[keyword],
            names: Vec::new(),
            initialized: true,
        };
        let mut i = keyword + 1;
        loop {
            let pattern = *self.top.get(i)?;
            let after = match pattern.kind {
                TokenKind::Ident => {
                    decl.names.push(pattern.text(self.source).to_string());
                    i + 1
                }
                TokenKind::Punct(b'[' | b'{') => {
                    let close = self.partner[&i];
                    decl.names.extend(
                        self.top[i + 1..close]
                            .iter()
                            .filter(|t| t.kind == TokenKind::Ident)
                            .map(|t| t.text(self.source).to_string()),
                    );
                    close + 1
                }
                _ => return None,
            };
            i = if self.punct(after, b'=') {
                self.expression_end(after + 1)
            } else if self.word(after, "of") || self.word(after, "in") {
                return Some(decl);
            } else {
                decl.initialized = false;
                after
            };
            if self.punct(i, b',') {
                i += 1;
            } else {
                return Some(decl);
            }
        }
    }

    /// Index of the token ending the expression starting at `i`
    fn expression_end(&self, mut i: usize) -> usize {
        while i < self.top.len() {
            let t = self.top[i];
            match t.kind {
                TokenKind::Punct(b',' | b';' | b')' | b']' | b'}') => return i,
                TokenKind::Punct(b'(' | b'[' | b'{') => {
                    i = self.partner[&i] + 1;
                    continue;
                }
                _ => {}
            }
            if i > 0 && self.asi_break(i) {
                return i;
            }
            i += 1;
        }
        i
    }

    /// Whether a newline before token `i` ends the statement
    fn asi_break(&self, i: usize) -> bool {
        let prev = self.top[i - 1];
        let t = self.top[i];
        if !self.source[prev.end..t.start].contains('\n') {
            return false;
        }
        let prev_ends_value = matches!(
            prev.kind,
            TokenKind::Ident | TokenKind::Literal | TokenKind::Punct(b')' | b']' | b'}')
        );
        let starts_statement = matches!(t.kind, TokenKind::Ident | TokenKind::Literal)
            && !matches!(t.text(self.source), "in" | "of" | "instanceof");
        prev_ends_value && starts_statement
    }

    /// Scopes containing `pos`, innermost first
    fn enclosing(&self, pos: usize) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self
            .scopes
            .iter()
            .filter(|s| s.contains(pos))
            .copied()
            .collect();
        scopes.sort_by_key(Scope::len);
        scopes
    }

    fn can_hoist(&self, decl: &Declaration) -> bool {
        let chain = self.enclosing(decl.keyword.start);
        let Some(block) = chain.first().copied() else {
            return false;
        };
        let Some(function) = chain.iter().find(|s| s.kind == ScopeKind::Function).copied() else {
            return false;
        };
        if block.opaque {
            return false;
        }

        let confined = decl.names.iter().all(|name| {
            self.references(name)
                .filter(|t| function.contains(t.start))
                .all(|t| block.contains(t.start))
        });
        if !confined {
            return false;
        }

        let outer_loop = chain
            .iter()
            .take_while(|s| s.kind != ScopeKind::Function)
            .filter(|s| s.kind == ScopeKind::Loop)
            .last();
        match outer_loop {
            None => true,
            Some(lp) => decl.initialized && !self.has_closure(lp),
        }
    }

    /// Identifier tokens spelling `name` that are not property names
    fn references<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s Token> + 's {
        self.all.iter().enumerate().filter_map(move |(k, t)| {
            let member = k > 0 && self.all[k - 1].is_punct(b'.');
            (t.is_word(self.source, name) && !member).then_some(t)
        })
    }

    fn has_closure(&self, scope: &Scope) -> bool {
        let token_closure = self.all.iter().any(|t| {
            scope.contains(t.start)
                && (t.kind == TokenKind::Arrow
                    || t.is_word(self.source, "function")
                    || t.is_word(self.source, "class"))
        });
        token_closure
            || self
                .scopes
                .iter()
                .any(|s| s.kind == ScopeKind::Function && s.within(scope))
    }
}

/// Pairs of matching brackets, or None when they do not balance
fn match_brackets(tokens: &[Token]) -> Option<HashMap<usize, usize>> {
    let mut partner = HashMap::new();
    let mut stack: Vec<(usize, u8)> = Vec::new();
    for (i, t) in tokens.iter().enumerate() {
        let TokenKind::Punct(c) = t.kind else {
            continue;
        };
        match c {
            b'(' | b'[' | b'{' => stack.push((i, c)),
            b')' | b']' | b'}' => {
                let (open, kind) = stack.pop()?;
                let expected = match c {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                if kind != expected {
                    return None;
                }
                partner.insert(open, i);
                partner.insert(i, open);
            }
            _ => {}
        }
    }
    stack.is_empty().then_some(partner)
}

/// String concatenation equivalent of an untagged template literal
fn template_to_concat(source: &str, seg: &Segment) -> Option<String> {
    let b = source.as_bytes();
    if seg.end - seg.start < 2 || b[seg.end - 1] != b'`' {
        return None;
    }
    let tagged = source[..seg.start]
        .trim_end()
        .bytes()
        .last()
        .is_some_and(|c| is_ident_byte(c) || c == b')' || c == b']');
    if tagged {
        return None;
    }

    let mut parts = Vec::new();
    let mut quasi = String::new();
    let mut j = seg.start + 1;
    let end = seg.end - 1;
    while j < end {
        match b[j] {
            b'\\' => {
                let next = source[j + 1..].chars().next()?;
                match next {
                    '`' | '$' => quasi.push(next),
                    _ => {
                        quasi.push('\\');
                        quasi.push(next);
                    }
                }
                j += 1 + next.len_utf8();
            }
            b'$' if b.get(j + 1) == Some(&b'{') => {
                let close = skip_braced(b, j + 2);
                let expr = &source[j + 2..close - 1];
                if expr.contains('`') {
                    return None;
                }
                parts.push(string_literal(&std::mem::take(&mut quasi)));
                parts.push(format!("({})", expr.trim()));
                j = close;
            }
            _ => {
                let c = source[j..].chars().next()?;
                match c {
                    '"' => quasi.push_str("\\\""),
                    '\n' => quasi.push_str("\\n"),
                    '\r' => quasi.push_str("\\r"),
                    other => quasi.push(other),
                }
                j += c.len_utf8();
            }
        }
    }

    if parts.is_empty() {
        return Some(string_literal(&quasi));
    }
    if !quasi.is_empty() {
        parts.push(string_literal(&quasi));
    }
    // The first part is always a string, so `+` concatenates
    let mut out = parts.remove(0);
    for part in parts.into_iter().filter(|p| p != "\"\"") {
        out.push_str(" + ");
        out.push_str(&part);
    }
    Some(out)
}

fn string_literal(escaped: &str) -> String {
    format!("\"{}\"", escaped)
}
