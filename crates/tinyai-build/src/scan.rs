//! Lexical scanning of JavaScript source
//!
//! Splits source text into code, string, template, comment and regex
//! segments so transforms only ever rewrite real code. Offsets are byte
//! offsets; every delimiter the scanner looks at is ASCII, so segment
//! boundaries always fall on char boundaries.

/// Kind of a scanned segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Code,
    /// Single- or double-quoted string, quotes included
    String,
    /// Template literal, backticks included
    Template,
    /// Line or block comment
    Comment,
    /// Regular expression literal, slashes and flags included
    Regex,
}

/// Byte range of one segment; `end` is exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: usize,
    pub end: usize,
}

impl Segment {
    /// Text of the segment within `source`
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Range between the delimiters of a string or template segment
    pub fn inner_range(&self) -> (usize, usize) {
        if self.end - self.start >= 2 {
            (self.start + 1, self.end - 1)
        } else {
            (self.end, self.end)
        }
    }
}

/// Source text with its segments
#[derive(Debug, Clone)]
pub struct Scanned<'a> {
    source: &'a str,
    segments: Vec<Segment>,
}

impl<'a> Scanned<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            segments: scan(source.as_bytes()),
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments of one kind
    pub fn of_kind(&self, kind: SegmentKind) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.kind == kind)
    }

    /// Tokens of the code, including the code inside template `${}`
    /// expressions.
    ///
    /// Template expression tokens are flagged `nested` and follow the
    /// template's own literal token. Comments produce no tokens.
    pub fn tokens(&self) -> Vec<Token> {
        let mut out = Vec::new();
        self.collect_tokens(0, false, &mut out);
        out
    }

    fn collect_tokens(&self, offset: usize, nested: bool, out: &mut Vec<Token>) {
        let b = self.source.as_bytes();
        for seg in &self.segments {
            match seg.kind {
                SegmentKind::Code => lex_code(b, seg.start, seg.end, offset, nested, out),
                SegmentKind::Comment => {}
                SegmentKind::String | SegmentKind::Regex => out.push(Token {
                    kind: TokenKind::Literal,
                    start: offset + seg.start,
                    end: offset + seg.end,
                    nested,
                }),
                SegmentKind::Template => {
                    out.push(Token {
                        kind: TokenKind::Literal,
                        start: offset + seg.start,
                        end: offset + seg.end,
                        nested,
                    });
                    for (start, end) in template_expressions(b, seg) {
                        Scanned::new(&self.source[start..end]).collect_tokens(
                            offset + start,
                            true,
                            out,
                        );
                    }
                }
            }
        }
    }

    /// Copy of the source with every non-code byte blanked.
    ///
    /// Strings and templates keep their delimiters, newlines survive, and
    /// the result has exactly the byte length of the source, so offsets
    /// found in the mask apply to the original text.
    pub fn masked(&self) -> String {
        let mut bytes = self.source.as_bytes().to_vec();
        for seg in &self.segments {
            let (from, to) = match seg.kind {
                SegmentKind::Code => continue,
                SegmentKind::String | SegmentKind::Template => seg.inner_range(),
                SegmentKind::Comment | SegmentKind::Regex => (seg.start, seg.end),
            };
            for b in &mut bytes[from..to] {
                if *b != b'\n' {
                    *b = b' ';
                }
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Kind of a code token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword
    Ident,
    /// Single ASCII punctuator; `?.` is reported as `.`
    Punct(u8),
    /// `=>`
    Arrow,
    /// Any other operator: comparisons, compound assignment, spread
    Op,
    /// Number, string, template or regex literal
    Literal,
}

/// One token; `start..end` is a byte range of the scanned source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Inside a template `${}` expression
    pub nested: bool,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_punct(&self, c: u8) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    /// Identifier token spelling `word`
    pub fn is_word(&self, source: &str, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(source) == word
    }
}

fn lex_code(
    b: &[u8],
    from: usize,
    to: usize,
    offset: usize,
    nested: bool,
    out: &mut Vec<Token>,
) {
    let mut i = from;
    while i < to {
        let c = b[i];
        let next = if i + 1 < to { Some(b[i + 1]) } else { None };
        let start = i;
        let kind = match c {
            _ if c.is_ascii_whitespace() => {
                i += 1;
                continue;
            }
            b'0'..=b'9' => {
                while i < to && (is_ident_byte(b[i]) || b[i] == b'.') {
                    i += 1;
                }
                TokenKind::Literal
            }
            b'.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                i += 1;
                while i < to && (is_ident_byte(b[i]) || b[i] == b'.') {
                    i += 1;
                }
                TokenKind::Literal
            }
            _ if is_ident_byte(c) => {
                while i < to && is_ident_byte(b[i]) {
                    i += 1;
                }
                TokenKind::Ident
            }
            b'.' if next == Some(b'.') => {
                i += 3.min(to - i);
                TokenKind::Op
            }
            b'?' if next == Some(b'.') && !(i + 2 < to && b[i + 2].is_ascii_digit()) => {
                i += 2;
                TokenKind::Punct(b'.')
            }
            b'=' if next == Some(b'>') => {
                i += 2;
                TokenKind::Arrow
            }
            b'=' | b'!' if next == Some(b'=') => {
                i += 2;
                while i < to && b[i] == b'=' {
                    i += 1;
                }
                TokenKind::Op
            }
            b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^' | b'<' | b'>'
                if next == Some(b'=') =>
            {
                i += 2;
                TokenKind::Op
            }
            _ => {
                i += 1;
                TokenKind::Punct(c)
            }
        };
        out.push(Token {
            kind,
            start: offset + start,
            end: offset + i,
            nested,
        });
    }
}

/// Byte ranges of the `${}` expressions of a template segment
fn template_expressions(b: &[u8], seg: &Segment) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut j = seg.start + 1;
    while j < seg.end {
        match b[j] {
            b'\\' => j += 2,
            b'$' if b.get(j + 1) == Some(&b'{') => {
                let close = skip_braced(b, j + 2).min(seg.end);
                if close > j + 2 {
                    ranges.push((j + 2, close - 1));
                }
                j = close;
            }
            _ => j += 1,
        }
    }
    ranges
}

/// Previous significant token, for regex-vs-division decisions
#[derive(Debug, Clone, PartialEq)]
enum Prev {
    None,
    Punct(u8),
    Word(String),
    Value,
}

const REGEX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "case",
    "do",
    "else",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "instanceof",
    "yield",
    "await",
];

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn regex_allowed(prev: &Prev) -> bool {
    match prev {
        Prev::None => true,
        Prev::Punct(c) => !matches!(c, b')' | b']'),
        Prev::Word(w) => REGEX_KEYWORDS.contains(&w.as_str()),
        Prev::Value => false,
    }
}

fn scan(b: &[u8]) -> Vec<Segment> {
    let len = b.len();
    let mut segments = Vec::new();
    let mut code_start = 0;
    let mut prev = Prev::None;
    let mut i = 0;

    let push = |segments: &mut Vec<Segment>, code_start: usize, kind, start, end| {
        if code_start < start {
            segments.push(Segment {
                kind: SegmentKind::Code,
                start: code_start,
                end: start,
            });
        }
        segments.push(Segment { kind, start, end });
    };

    while i < len {
        let c = b[i];
        let next = b.get(i + 1).copied();
        match c {
            b'"' | b'\'' => {
                let end = skip_string(b, i, c);
                push(&mut segments, code_start, SegmentKind::String, i, end);
                prev = Prev::Value;
                code_start = end;
                i = end;
            }
            b'`' => {
                let end = skip_template(b, i);
                push(&mut segments, code_start, SegmentKind::Template, i, end);
                prev = Prev::Value;
                code_start = end;
                i = end;
            }
            b'/' if next == Some(b'/') => {
                let end = b[i..]
                    .iter()
                    .position(|&x| x == b'\n')
                    .map_or(len, |p| i + p);
                push(&mut segments, code_start, SegmentKind::Comment, i, end);
                code_start = end;
                i = end;
            }
            b'/' if next == Some(b'*') => {
                let end = find(b, i + 2, b"*/").map_or(len, |p| p + 2);
                push(&mut segments, code_start, SegmentKind::Comment, i, end);
                code_start = end;
                i = end;
            }
            b'/' if regex_allowed(&prev) => match skip_regex(b, i) {
                Some(end) => {
                    push(&mut segments, code_start, SegmentKind::Regex, i, end);
                    prev = Prev::Value;
                    code_start = end;
                    i = end;
                }
                None => {
                    prev = Prev::Punct(c);
                    i += 1;
                }
            },
            _ if is_ident_byte(c) => {
                let start = i;
                while i < len && is_ident_byte(b[i]) {
                    i += 1;
                }
                prev = Prev::Word(String::from_utf8_lossy(&b[start..i]).into_owned());
            }
            _ if c.is_ascii_whitespace() => i += 1,
            _ => {
                prev = Prev::Punct(c);
                i += 1;
            }
        }
    }

    if code_start < len {
        segments.push(Segment {
            kind: SegmentKind::Code,
            start: code_start,
            end: len,
        });
    }
    segments
}

fn find(b: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= b.len() {
        return None;
    }
    b[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

/// End of a quoted string starting at `i`; stops at an unescaped newline
fn skip_string(b: &[u8], i: usize, quote: u8) -> usize {
    let mut j = i + 1;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            b'\n' => return j,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    b.len()
}

/// End of a template literal starting at `i`, including `${}` expressions
pub(crate) fn skip_template(b: &[u8], i: usize) -> usize {
    let mut j = i + 1;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            b'`' => return j + 1,
            b'$' if b.get(j + 1) == Some(&b'{') => j = skip_braced(b, j + 2),
            _ => j += 1,
        }
    }
    b.len()
}

/// Skip code up to and including the `}` closing an already-open brace
pub(crate) fn skip_braced(b: &[u8], mut j: usize) -> usize {
    let mut depth = 1usize;
    while j < b.len() {
        match b[j] {
            b'"' | b'\'' => j = skip_string(b, j, b[j]),
            b'`' => j = skip_template(b, j),
            b'/' if b.get(j + 1) == Some(&b'/') => {
                j = b[j..].iter().position(|&x| x == b'\n').map_or(b.len(), |p| j + p);
            }
            b'/' if b.get(j + 1) == Some(&b'*') => {
                j = find(b, j + 2, b"*/").map_or(b.len(), |p| p + 2);
            }
            b'{' => {
                depth += 1;
                j += 1;
            }
            b'}' => {
                depth -= 1;
                j += 1;
                if depth == 0 {
                    return j;
                }
            }
            _ => j += 1,
        }
    }
    b.len()
}

/// End of a regex literal starting at `i`, or None if this is not one
fn skip_regex(b: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    let mut in_class = false;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            b'\n' => return None,
            b'[' => {
                in_class = true;
                j += 1;
            }
            b']' => {
                in_class = false;
                j += 1;
            }
            b'/' if !in_class => {
                j += 1;
                while j < b.len() && is_ident_byte(b[j]) {
                    j += 1;
                }
                return Some(j);
            }
            _ => j += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(SegmentKind, &str)> {
        let scanned = Scanned::new(src);
        scanned
            .segments()
            .iter()
            .map(|s| (s.kind, s.text(src)))
            .collect()
    }

    #[test]
    fn test_strings_and_comments() {
        let src = "const a = 'x'; // note\nconst b = \"y\";";
        assert_eq!(
            kinds(src),
            vec![
                (SegmentKind::Code, "const a = "),
                (SegmentKind::String, "'x'"),
                (SegmentKind::Code, "; "),
                (SegmentKind::Comment, "// note"),
                (SegmentKind::Code, "\nconst b = "),
                (SegmentKind::String, "\"y\""),
                (SegmentKind::Code, ";"),
            ]
        );
    }

    #[test]
    fn test_escaped_quote_stays_in_string() {
        let src = r#"x = "a \" b"; y"#;
        let strings: Vec<_> = Scanned::new(src)
            .of_kind(SegmentKind::String)
            .map(|s| s.text(src).to_string())
            .collect();
        assert_eq!(strings, vec![r#""a \" b""#]);
    }

    #[test]
    fn test_template_with_nested_braces() {
        let src = "t = `a ${ {k: '}'}.k } b`; z";
        let scanned = Scanned::new(src);
        let template: Vec<_> = scanned.of_kind(SegmentKind::Template).collect();
        assert_eq!(template.len(), 1);
        assert_eq!(template[0].text(src), "`a ${ {k: '}'}.k } b`");
    }

    #[test]
    fn test_regex_vs_division() {
        let src = "a = b / c; r = /x\\/y[/]/g.test(s);";
        let regexes: Vec<_> = Scanned::new(src)
            .of_kind(SegmentKind::Regex)
            .map(|s| s.text(src).to_string())
            .collect();
        assert_eq!(regexes, vec!["/x\\/y[/]/g"]);
    }

    #[test]
    fn test_regex_after_return() {
        let src = "function f() { return /ab+c/i; }";
        assert_eq!(Scanned::new(src).of_kind(SegmentKind::Regex).count(), 1);
    }

    #[test]
    fn test_block_comment() {
        let src = "a /* b\n c */ d";
        let comments: Vec<_> = Scanned::new(src)
            .of_kind(SegmentKind::Comment)
            .map(|s| s.text(src).to_string())
            .collect();
        assert_eq!(comments, vec!["/* b\n c */"]);
    }

    #[test]
    fn test_masked_preserves_length_and_delimiters() {
        let src = "import x from './x.mjs'; // import y from 'y'\n`é${1}`";
        let scanned = Scanned::new(src);
        let masked = scanned.masked();
        assert_eq!(masked.len(), src.len());
        assert!(masked.starts_with("import x from '"));
        assert!(!masked.contains("x.mjs"));
        assert!(!masked.contains("import y"));
        assert!(masked.contains('\n'));
    }

    fn token_texts(src: &str) -> Vec<(TokenKind, &str, bool)> {
        Scanned::new(src)
            .tokens()
            .iter()
            .map(|t| (t.kind, t.text(src), t.nested))
            .collect()
    }

    #[test]
    fn test_tokens_skip_comments_and_merge_operators() {
        assert_eq!(
            token_texts("a?.b === 1 // c\n=> x += 2.5"),
            vec![
                (TokenKind::Ident, "a", false),
                (TokenKind::Punct(b'.'), "?.", false),
                (TokenKind::Ident, "b", false),
                (TokenKind::Op, "===", false),
                (TokenKind::Literal, "1", false),
                (TokenKind::Arrow, "=>", false),
                (TokenKind::Ident, "x", false),
                (TokenKind::Op, "+=", false),
                (TokenKind::Literal, "2.5", false),
            ]
        );
    }

    #[test]
    fn test_template_expression_tokens_are_nested() {
        assert_eq!(
            token_texts("f(`a${ b.c }`)"),
            vec![
                (TokenKind::Ident, "f", false),
                (TokenKind::Punct(b'('), "(", false),
                (TokenKind::Literal, "`a${ b.c }`", false),
                (TokenKind::Ident, "b", true),
                (TokenKind::Punct(b'.'), ".", true),
                (TokenKind::Ident, "c", true),
                (TokenKind::Punct(b')'), ")", false),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let src = "a = 'oops\nb = 1;";
        let scanned = Scanned::new(src);
        let strings: Vec<_> = scanned.of_kind(SegmentKind::String).collect();
        assert_eq!(strings[0].text(src), "'oops");
        let last = scanned.segments().last().unwrap();
        assert_eq!((last.kind, last.text(src)), (SegmentKind::Code, "\nb = 1;"));
    }
}
