/// Symbols: named stacks of rule sets.
use rand::rngs::StdRng;
use tracing::{debug, trace};

use super::error::ExpansionError;
use super::node::NodeRef;
use super::rule_set::RuleSet;

/// A named grammar slot. Selection always reads the top of the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    key: String,
    /// The rules declared by the grammar; the stack is reset to this.
    base: RuleSet,
    stack: Vec<RuleSet>,
    /// Nodes that selected from this symbol, in order.
    uses: Vec<Option<NodeRef>>,
    /// Created by a push rather than declared by the grammar.
    dynamic: bool,
}

impl Symbol {
    pub fn new(key: impl Into<String>, base: RuleSet) -> Self {
        Self {
            key: key.into(),
            stack: vec![base.clone()],
            base,
            uses: Vec::new(),
            dynamic: false,
        }
    }

    pub(crate) fn dynamic(key: impl Into<String>, base: RuleSet) -> Self {
        Self {
            dynamic: true,
            ..Self::new(key, base)
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// The rules as declared, kept pristine for `clear_state`. Selections
    /// count uses on the stack copy, see [`Symbol::active_rules`].
    pub fn base_rules(&self) -> &RuleSet {
        &self.base
    }

    /// Rule sets from the bottom of the stack to the top.
    pub fn stack(&self) -> &[RuleSet] {
        &self.stack
    }

    pub fn uses(&self) -> &[Option<NodeRef>] {
        &self.uses
    }

    /// The rule set selection currently reads, if any.
    pub fn active_rules(&self) -> Option<&RuleSet> {
        self.stack.last()
    }

    pub fn push_rules(&mut self, rules: RuleSet) {
        self.stack.push(rules);
        debug!(symbol = %self.key, depth = self.stack.len(), "pushed rules");
    }

    /// Pop the top rule set. The base set can be popped too, which leaves
    /// the symbol empty until the next push or `clear_state`.
    pub fn pop_rules(&mut self) -> Result<RuleSet, ExpansionError> {
        let popped = self
            .stack
            .pop()
            .ok_or_else(|| ExpansionError::NothingToPop(self.key.clone()))?;
        debug!(symbol = %self.key, depth = self.stack.len(), "popped rules");
        Ok(popped)
    }

    /// Select a rule for `origin`, logging the use.
    ///
    /// An empty stack yields the visible placeholder `((key))` plus an error.
    /// `None` means the active set had no alternatives to offer.
    pub fn select_rule(
        &mut self,
        origin: Option<NodeRef>,
        path: &[String],
        rng: &mut StdRng,
        errors: &mut Vec<ExpansionError>,
    ) -> Option<String> {
        self.uses.push(origin);
        self.select_unlogged(path, rng, errors)
    }

    /// Select without recording a use, as subgrammar lookups do.
    pub(crate) fn select_unlogged(
        &mut self,
        path: &[String],
        rng: &mut StdRng,
        errors: &mut Vec<ExpansionError>,
    ) -> Option<String> {
        let Some(top) = self.stack.last_mut() else {
            errors.push(ExpansionError::EmptyRuleStack(self.key.clone()));
            return Some(format!("(({}))", self.key));
        };
        let selected = top.select_rule(path, rng);
        trace!(symbol = %self.key, rule = ?selected, "selected rule");
        if selected.is_none() {
            errors.push(ExpansionError::NoDefaultRules(self.key.clone()));
        }
        selected
    }

    /// Restore the declared rules and forget all usage.
    pub fn clear_state(&mut self) {
        self.base.clear_state();
        self.stack = vec![self.base.clone()];
        self.uses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn selection_reads_the_top() {
        let mut sym = Symbol::new("a", RuleSet::literal(["x"]));
        let mut errors = Vec::new();
        sym.push_rules(RuleSet::literal(["y"]));
        assert_eq!(
            sym.select_rule(None, &[], &mut rng(), &mut errors).as_deref(),
            Some("y")
        );
        sym.pop_rules().unwrap();
        assert_eq!(
            sym.select_rule(None, &[], &mut rng(), &mut errors).as_deref(),
            Some("x")
        );
        assert!(errors.is_empty());
        assert_eq!(sym.uses().len(), 2);
    }

    #[test]
    fn popping_the_base_leaves_a_placeholder() {
        let mut sym = Symbol::new("a", RuleSet::literal(["x"]));
        sym.pop_rules().unwrap();

        let mut errors = Vec::new();
        let selected = sym.select_rule(None, &[], &mut rng(), &mut errors);
        assert_eq!(selected.as_deref(), Some("((a))"));
        assert_eq!(errors, vec![ExpansionError::EmptyRuleStack("a".to_string())]);
    }

    #[test]
    fn popping_an_empty_stack_is_an_error() {
        let mut sym = Symbol::new("a", RuleSet::literal(["x"]));
        sym.pop_rules().unwrap();
        assert_eq!(
            sym.pop_rules().unwrap_err(),
            ExpansionError::NothingToPop("a".to_string())
        );
    }

    #[test]
    fn empty_alternatives_report_no_default_rules() {
        let mut sym = Symbol::new("a", RuleSet::literal(Vec::<String>::new()));
        let mut errors = Vec::new();
        assert_eq!(sym.select_rule(None, &[], &mut rng(), &mut errors), None);
        assert_eq!(errors, vec![ExpansionError::NoDefaultRules("a".to_string())]);
    }

    #[test]
    fn clear_state_restores_base() {
        let mut sym = Symbol::new("a", RuleSet::literal(["x"]));
        sym.select_rule(None, &[], &mut rng(), &mut Vec::new());
        sym.push_rules(RuleSet::literal(["y"]));
        sym.select_rule(None, &[], &mut rng(), &mut Vec::new());
        assert_eq!(sym.stack()[0].uses(), &[1]);
        assert_eq!(sym.base_rules().uses(), &[0]);

        sym.clear_state();
        assert_eq!(sym.stack().len(), 1);
        assert_eq!(sym.active_rules().unwrap().defaults(), &["x".to_string()]);
        assert_eq!(sym.active_rules().unwrap().uses(), &[0]);
        assert!(sym.uses().is_empty());
    }
}
