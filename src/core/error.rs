/// Error types shared by the tokenizer, the rule stacks, and the expansion engine.
use thiserror::Error;

/// A non-fatal problem found while tokenizing or expanding a rule.
///
/// These are collected on the node (or tokenizer call) that found them and
/// copied upward into every ancestor, so the root of an expansion carries the
/// full list. Each one is paired with a visible placeholder in the output
/// wherever a placeholder makes sense.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("unclosed tag")]
    UnclosedTag,
    #[error("too many '['")]
    TooManyOpenBrackets,
    #[error("too many ']'")]
    TooManyCloseBrackets,
    #[error("{position}: empty tag")]
    EmptyTag { position: usize },
    #[error("{position}: empty action")]
    EmptyAction { position: usize },
    #[error("no symbol for '{0}'")]
    MissingSymbol(String),
    #[error("missing modifier '{0}'")]
    MissingModifier(String),
    #[error("the rule stack for '{0}' is empty, too many pops?")]
    EmptyRuleStack(String),
    #[error("can't pop '{0}': its rule stack is already empty")]
    NothingToPop(String),
    #[error("can't pop: no symbol for '{0}'")]
    NoSymbolToPop(String),
    #[error("no default rules defined for '{0}'")]
    NoDefaultRules(String),
    #[error("recursion limit of {limit} exceeded while expanding '{raw}'")]
    RecursionLimit { limit: usize, raw: String },
}

/// A fatal error. Expansion stops and the caller gets `Err`.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// A tag head holds more than one plain-text section, so there is no way
    /// to tell which one names the symbol.
    #[error("multiple main sections in tag '{0}'")]
    AmbiguousTag(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        assert_eq!(
            ExpansionError::MissingSymbol("hero".to_string()).to_string(),
            "no symbol for 'hero'"
        );
        assert_eq!(
            ExpansionError::EmptyTag { position: 4 }.to_string(),
            "4: empty tag"
        );
        assert_eq!(
            GrammarError::AmbiguousTag("a[x]b".to_string()).to_string(),
            "multiple main sections in tag 'a[x]b'"
        );
    }
}
