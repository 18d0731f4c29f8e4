/// Rule tokenizer: splits a rule string into plain text, tags, and actions.
///
/// Syntax:
/// - `#symbol.mod#` → `Tag`
/// - `[target:rule]` → `Action` (brackets nest; only the outermost pair counts)
/// - `\X` → `X` is never a delimiter; the backslash stays in the raw text
///   until the root of an expansion resolves it
/// - Everything else → `PlainText`
use super::error::ExpansionError;

/// What a segment of a rule is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    PlainText,
    Tag,
    Action,
}

/// One piece of a tokenized rule. `raw` excludes the delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub raw: String,
}

impl Segment {
    pub fn new(kind: SegmentKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    /// The segment as it appeared in the rule, delimiters included.
    pub fn source(&self) -> String {
        match self.kind {
            SegmentKind::PlainText => self.raw.clone(),
            SegmentKind::Tag => format!("#{}#", self.raw),
            SegmentKind::Action => format!("[{}]", self.raw),
        }
    }
}

/// Tokenizer output: segments in source order plus any parse errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub segments: Vec<Segment>,
    pub errors: Vec<ExpansionError>,
}

impl Tokenized {
    fn push(&mut self, rule: &str, start: usize, end: usize, kind: SegmentKind) {
        if end <= start {
            match kind {
                // Empty plain text carries nothing, drop it.
                SegmentKind::PlainText => return,
                SegmentKind::Tag => self.errors.push(ExpansionError::EmptyTag { position: start }),
                SegmentKind::Action => self
                    .errors
                    .push(ExpansionError::EmptyAction { position: start }),
            }
        }
        let raw = if end > start { &rule[start..end] } else { "" };
        self.segments.push(Segment::new(kind, raw));
    }
}

/// Tokenize a rule. `None` yields no segments and no errors.
///
/// Never fails: malformed input produces whatever segments could be
/// recovered along with the errors describing what was wrong.
pub fn tokenize<'a>(rule: impl Into<Option<&'a str>>) -> Tokenized {
    let mut out = Tokenized::default();
    let Some(rule) = rule.into() else {
        return out;
    };

    let mut depth: i64 = 0;
    let mut in_tag = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in rule.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '[' => {
                if depth == 0 && !in_tag {
                    out.push(rule, start, i, SegmentKind::PlainText);
                    start = i + 1;
                }
                depth += 1;
            }
            ']' => {
                depth -= 1;
                if depth == 0 && !in_tag {
                    out.push(rule, start, i, SegmentKind::Action);
                    start = i + 1;
                }
            }
            '#' if depth == 0 => {
                let kind = if in_tag {
                    SegmentKind::Tag
                } else {
                    SegmentKind::PlainText
                };
                out.push(rule, start, i, kind);
                start = i + 1;
                in_tag = !in_tag;
            }
            '\\' => escaped = true,
            _ => {}
        }
    }
    out.push(rule, start, rule.len(), SegmentKind::PlainText);

    if in_tag {
        out.errors.push(ExpansionError::UnclosedTag);
    }
    if depth > 0 {
        out.errors.push(ExpansionError::TooManyOpenBrackets);
    }
    if depth < 0 {
        out.errors.push(ExpansionError::TooManyCloseBrackets);
    }

    out
}

/// Resolve escape markers: `\\` becomes a literal backslash and any other
/// `\` is dropped, leaving the character it protected.
pub fn resolve_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'\\') {
            chars.next();
            out.push('\\');
        }
    }
    out
}
