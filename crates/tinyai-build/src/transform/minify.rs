use super::{ModuleUnit, Transform, TransformContext, TransformError};
use crate::scan::{Scanned, SegmentKind};

/// Whitespace and comment stripping.
///
/// Strings, templates and regex literals pass through untouched; `/*!`
/// banners are kept. Newlines survive where automatic semicolon insertion
/// could depend on them.
pub struct Minify;

impl Transform for Minify {
    fn name(&self) -> &str {
        "minify"
    }

    fn apply(
        &self,
        unit: &mut ModuleUnit,
        _ctx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        unit.code = minify(&unit.code);
        Ok(())
    }
}

enum Piece<'a> {
    Code(String),
    Verbatim(&'a str),
}

pub(crate) fn minify(source: &str) -> String {
    let scanned = Scanned::new(source);
    let mut pieces: Vec<Piece<'_>> = Vec::new();

    for seg in scanned.segments() {
        let text = seg.text(source);
        let code = match seg.kind {
            SegmentKind::Code => text,
            SegmentKind::Comment if text.starts_with("/*!") => {
                pieces.push(Piece::Verbatim(text));
                continue;
            }
            SegmentKind::Comment if text.contains('\n') => "\n",
            SegmentKind::Comment => " ",
            _ => {
                pieces.push(Piece::Verbatim(text));
                continue;
            }
        };
        match pieces.last_mut() {
            Some(Piece::Code(buf)) => buf.push_str(code),
            _ => pieces.push(Piece::Code(code.to_string())),
        }
    }

    let mut out = String::with_capacity(source.len());
    for i in 0..pieces.len() {
        match &pieces[i] {
            Piece::Verbatim(text) => out.push_str(text),
            Piece::Code(code) => {
                let next = match pieces.get(i + 1) {
                    Some(Piece::Verbatim(text)) => text.chars().next(),
                    _ => None,
                };
                compress(code, next, &mut out);
            }
        }
    }

    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || !c.is_ascii()
}

fn needs_space(prev: char, next: char) -> bool {
    (is_word(prev) && is_word(next))
        || (prev == '+' && next == '+')
        || (prev == '-' && next == '-')
        || (prev == '/' && next == '/')
        || (prev.is_ascii_digit() && next == '.')
}

/// Newlines after these never matter for semicolon insertion
fn joins_next_line(prev: char, next: char) -> bool {
    matches!(prev, ';' | '{' | ',') || next == '}'
}

fn compress(code: &str, next_piece: Option<char>, out: &mut String) {
    let mut chars = code.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }
        let mut newline = c == '\n';
        while let Some(&ws) = chars.peek() {
            if !ws.is_whitespace() {
                break;
            }
            newline |= ws == '\n';
            chars.next();
        }
        let next = chars.peek().copied().or(next_piece);
        let (Some(prev), Some(next)) = (out.chars().next_back(), next) else {
            continue;
        };
        if prev == '\n' {
            continue;
        }
        if newline && !joins_next_line(prev, next) {
            out.push('\n');
        } else if needs_space(prev, next) {
            out.push(' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strips_comments_and_indentation() {
        let src = "/*! tinyai v1 */\n// helper\nfunction add(a, b) {\n    /* sum */\n    \
                   return a + b;\n}\n\n\nvar x = add(1, 2)\n";
        assert_eq!(
            minify(src),
            "/*! tinyai v1 */\nfunction add(a,b){return a+b;}\nvar x=add(1,2)\n"
        );
    }

    #[test]
    fn test_literals_untouched() {
        let src = "var s = 'a   b';\nvar t = `x\n  y`;\nvar r = /a  b/g;";
        assert_eq!(minify(src), "var s='a   b';var t=`x\n  y`;var r=/a  b/g;\n");
    }

    #[test]
    fn test_keeps_significant_spaces() {
        assert_eq!(minify("return typeof x;"), "return typeof x;\n");
        assert_eq!(minify("a + +b; c - -d;"), "a+ +b;c- -d;\n");
        assert_eq!(minify("1 .toString()"), "1 .toString()\n");
    }

    #[test]
    fn test_line_comment_between_tokens() {
        assert_eq!(minify("a // note\nb"), "a\nb\n");
    }
}
