/// Tag head parsing: `#[pre:actions]symbol.mod1.mod2(p1,p2)#`.
use tracing::warn;

use super::error::{ExpansionError, GrammarError};
use super::tokenizer::{tokenize, SegmentKind};

/// A tag head broken into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTag {
    /// Symbol to resolve. Empty when the tag held only actions.
    pub symbol: String,
    /// Modifier calls as written, applied left to right.
    pub modifiers: Vec<String>,
    /// Raw bodies of the actions to run before the symbol resolves.
    pub preactions: Vec<String>,
    pub errors: Vec<ExpansionError>,
}

/// Parse the text between a tag's `#` delimiters.
///
/// Fails only when the head holds more than one plain-text section, since
/// then there is no telling which one names the symbol.
pub fn parse_tag(raw: &str) -> Result<ParsedTag, GrammarError> {
    let tokenized = tokenize(raw);
    let mut parsed = ParsedTag {
        errors: tokenized.errors,
        ..ParsedTag::default()
    };
    let mut main: Option<String> = None;

    for segment in tokenized.segments {
        match segment.kind {
            SegmentKind::PlainText => {
                if main.is_some() {
                    warn!(tag = raw, "tag head has more than one plain-text section");
                    return Err(GrammarError::AmbiguousTag(raw.to_string()));
                }
                main = Some(segment.raw);
            }
            SegmentKind::Action | SegmentKind::Tag => parsed.preactions.push(segment.raw),
        }
    }

    if let Some(main) = main {
        let mut parts = main.split('.');
        parsed.symbol = parts.next().unwrap_or_default().to_string();
        parsed.modifiers = parts.map(str::to_string).collect();
    }

    Ok(parsed)
}

/// A modifier name with its parameter list, e.g. `replace(a,b)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierCall {
    pub name: String,
    pub params: Vec<String>,
}

impl ModifierCall {
    /// Split `name(p1,p2)` into a name and comma-separated parameters.
    ///
    /// Commas and parentheses inside parameters cannot be escaped. A text
    /// with empty or unterminated parentheses is kept whole as the name.
    pub fn parse(text: &str) -> Self {
        if let Some(open) = text.find('(').filter(|&i| i > 0) {
            if let Some(len) = text[open + 1..].find(')') {
                let inner = &text[open + 1..open + 1 + len];
                if !inner.is_empty() {
                    return Self {
                        name: text[..open].to_string(),
                        params: inner.split(',').map(str::to_string).collect(),
                    };
                }
            }
        }
        Self {
            name: text.to_string(),
            params: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_only() {
        let t = parse_tag("hero").unwrap();
        assert_eq!(t.symbol, "hero");
        assert!(t.modifiers.is_empty());
        assert!(t.preactions.is_empty());
    }

    #[test]
    fn modifier_chain_keeps_order() {
        let t = parse_tag("animal.s.capitalize").unwrap();
        assert_eq!(t.symbol, "animal");
        assert_eq!(t.modifiers, vec!["s".to_string(), "capitalize".to_string()]);
    }

    #[test]
    fn preactions_are_collected() {
        let t = parse_tag("[hero:#name#][pet:#animal#]story.capitalize").unwrap();
        assert_eq!(t.symbol, "story");
        assert_eq!(
            t.preactions,
            vec!["hero:#name#".to_string(), "pet:#animal#".to_string()]
        );
        assert_eq!(t.modifiers, vec!["capitalize".to_string()]);
    }

    #[test]
    fn actions_only_leave_symbol_empty() {
        let t = parse_tag("[x:y]").unwrap();
        assert_eq!(t.symbol, "");
        assert_eq!(t.preactions, vec!["x:y".to_string()]);
    }

    #[test]
    fn two_plain_sections_are_fatal() {
        let err = parse_tag("a[x:y]b").unwrap_err();
        assert!(matches!(err, GrammarError::AmbiguousTag(raw) if raw == "a[x:y]b"));
    }

    #[test]
    fn modifier_params_are_split_on_commas() {
        assert_eq!(
            ModifierCall::parse("replace(a,b)"),
            ModifierCall {
                name: "replace".to_string(),
                params: vec!["a".to_string(), "b".to_string()],
            }
        );
    }

    #[test]
    fn modifier_without_params() {
        let call = ModifierCall::parse("capitalize");
        assert_eq!(call.name, "capitalize");
        assert!(call.params.is_empty());

        let call = ModifierCall::parse("odd()");
        assert_eq!(call.name, "odd()");
        assert!(call.params.is_empty());
    }
}
