//! Narrative Grammar: Tracery-style generative text grammars.
//!
//! Rules are expanded into a tree of nodes: plain text, `#symbol.modifier#`
//! tags, and `[target:rule]` actions that push and pop rule stacks while
//! the expansion runs. Randomness comes from a caller-supplied seeded RNG,
//! so every expansion is reproducible.

pub mod core;

pub use crate::core::action::{Action, ActionKind, PushGuard};
pub use crate::core::builder::{GrammarBuilder, GrammarConfig};
pub use crate::core::context::{ExpandOptions, ExpansionContext};
pub use crate::core::error::{ExpansionError, GrammarError};
pub use crate::core::grammar::{ConditionalRules, Grammar, Modifier, RawGrammar, RawRules};
pub use crate::core::node::{ExpansionNode, NodeKind, NodeRef};
pub use crate::core::rule_set::{RuleSet, Rules};
pub use crate::core::symbol::Symbol;
pub use crate::core::tokenizer::{tokenize, Segment, SegmentKind, Tokenized};
