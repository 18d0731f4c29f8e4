/// Expansion context: the grammar, RNG, and recursion budget threaded
/// through one top-level expansion.
use rand::rngs::StdRng;
use tracing::{trace, warn};

use super::error::{ExpansionError, GrammarError};
use super::grammar::Grammar;
use super::node::{ExpansionNode, NodeRef};
use super::rule_set::RuleSet;

/// How a root expansion is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Run the escape-resolution pass on the root's text.
    pub resolve_escapes: bool,
    /// Build only the root's children, without expanding them.
    pub prevent_recursion: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            resolve_escapes: true,
            prevent_recursion: false,
        }
    }
}

impl ExpandOptions {
    /// Sub-expansions run by actions and conditions: escapes stay in place
    /// for the enclosing root to resolve.
    pub fn nested() -> Self {
        Self {
            resolve_escapes: false,
            prevent_recursion: false,
        }
    }
}

/// Mutable state shared by every node of one expansion, including the
/// nested expansions started by actions and conditions.
pub struct ExpansionContext<'a> {
    grammar: &'a mut Grammar,
    rng: &'a mut StdRng,
    depth: usize,
    max_depth: usize,
    /// Set once the ceiling is hit. Every later node is refused, so a
    /// branching cycle stops instead of filling the whole tree.
    tripped: bool,
}

impl<'a> ExpansionContext<'a> {
    pub fn new(grammar: &'a mut Grammar, rng: &'a mut StdRng) -> Self {
        let max_depth = grammar.config().max_depth;
        Self {
            grammar,
            rng,
            depth: 0,
            max_depth,
            tripped: false,
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &*self.grammar
    }

    pub fn grammar_mut(&mut self) -> &mut Grammar {
        &mut *self.grammar
    }

    /// Number of node expansions currently in progress.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether the recursion ceiling has been hit during this expansion.
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Claim one level of recursion. `false` once the ceiling has been
    /// reached anywhere in this expansion.
    pub(crate) fn enter(&mut self) -> bool {
        if self.tripped {
            return false;
        }
        if self.depth >= self.max_depth {
            warn!(limit = self.max_depth, "recursion limit reached, refusing further expansion");
            self.tripped = true;
            return false;
        }
        self.depth += 1;
        true
    }

    pub(crate) fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Build and expand a fresh root node for `rule`.
    pub fn expand_root(
        &mut self,
        rule: &str,
        options: ExpandOptions,
    ) -> Result<ExpansionNode, GrammarError> {
        let mut root = ExpansionNode::root(rule);
        root.expand(self, options.prevent_recursion)?;
        if options.resolve_escapes {
            root.clear_escape_chars();
        }
        Ok(root)
    }

    /// Resolve `key` to rule text, evaluating any conditional rule sets on
    /// the way. Condition errors are added to `errors`.
    pub fn select_rule(
        &mut self,
        key: &str,
        origin: Option<NodeRef>,
        errors: &mut Vec<ExpansionError>,
    ) -> Result<Option<String>, GrammarError> {
        let path = self.condition_path(key, errors)?;
        trace!(symbol = key, ?path, "resolving symbol");
        Ok(self
            .grammar
            .select_with_path(key, origin, &path, self.rng, errors))
    }

    /// Evaluate nested conditions from the outermost set inward, stopping at
    /// the first value that matches no branch.
    fn condition_path(
        &mut self,
        key: &str,
        errors: &mut Vec<ExpansionError>,
    ) -> Result<Vec<String>, GrammarError> {
        let mut path: Vec<String> = Vec::new();
        while path.len() < self.max_depth {
            let Some(condition) = self
                .current_set(key, &path)
                .and_then(RuleSet::condition)
                .map(str::to_string)
            else {
                break;
            };

            let evaluated = self.expand_root(&condition, ExpandOptions::nested())?;
            errors.extend(evaluated.errors().iter().cloned());
            let value = evaluated.into_finished_text();

            let matched = self
                .current_set(key, &path)
                .and_then(|set| set.branch(&value))
                .is_some();
            if !matched {
                break;
            }
            path.push(value);
        }
        Ok(path)
    }

    fn current_set(&self, key: &str, path: &[String]) -> Option<&RuleSet> {
        self.grammar.rule_set_for(key)?.descend(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::GrammarConfig;
    use crate::core::grammar::{ConditionalRules, RawRules};
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    #[test]
    fn nested_options_keep_escapes() {
        let mut grammar = Grammar::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = ExpansionContext::new(&mut grammar, &mut rng);
        let node = ctx.expand_root(r"\#x\#", ExpandOptions::nested()).unwrap();
        assert_eq!(node.finished_text(), r"\#x\#");
        let node = ctx.expand_root(r"\#x\#", ExpandOptions::default()).unwrap();
        assert_eq!(node.finished_text(), "#x#");
    }

    #[test]
    fn depth_is_released_after_expansion() {
        let mut grammar = Grammar::from_map([("a", "#b#"), ("b", "deep")]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = ExpansionContext::new(&mut grammar, &mut rng);
        ctx.expand_root("#a#", ExpandOptions::default()).unwrap();
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn ceiling_stops_the_rest_of_the_expansion() {
        let mut grammar = Grammar::builder()
            .rules([("a", "#a##a#")])
            .config(GrammarConfig {
                max_depth: 4,
                ..GrammarConfig::default()
            })
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = ExpansionContext::new(&mut grammar, &mut rng);
        let root = ctx.expand_root("#a#", ExpandOptions::default()).unwrap();
        assert!(ctx.is_tripped());
        assert_eq!(ctx.depth(), 0);

        // The refusal at the ceiling, then one per sibling still waiting.
        assert_eq!(root.errors().len(), 4);
        assert!(!ctx.enter());
        assert_eq!(root.finished_text(), "((a))".repeat(4));
    }

    #[test]
    fn conditions_pick_nested_branches() {
        let inner = ConditionalRules {
            condition: "#weather#".to_string(),
            branches: BTreeMap::from([("rain".to_string(), RawRules::from("wet night"))]),
            default: vec!["dry night".to_string()],
        };
        let outer = ConditionalRules {
            condition: "#time#".to_string(),
            branches: BTreeMap::from([("night".to_string(), RawRules::from(inner))]),
            default: vec!["day".to_string()],
        };
        let mut grammar = Grammar::from_map([
            ("time", RawRules::from("night")),
            ("weather", RawRules::from("rain")),
            ("scene", RawRules::from(outer)),
        ]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut errors = Vec::new();
        let mut ctx = ExpansionContext::new(&mut grammar, &mut rng);
        let rule = ctx.select_rule("scene", None, &mut errors).unwrap();
        assert_eq!(rule.as_deref(), Some("wet night"));
        assert!(errors.is_empty());
    }
}
