/// Actions: `[target:rule]` push, `[target:POP]` pop, `[target]` call.
use tracing::debug;

use super::context::{ExpandOptions, ExpansionContext};
use super::error::{ExpansionError, GrammarError};
use super::grammar::Grammar;

/// What an action does to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Push the comma-separated alternatives in `rule`, each expanded first.
    Push { rule: String },
    /// Pop one level off the target's stack.
    Pop,
    /// Expand the target as a rule for its side effects only.
    Call,
}

/// A parsed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub target: String,
    pub kind: ActionKind,
}

impl Action {
    /// Parse an action body. Only the first `:` separates target from rule.
    pub fn parse(raw: &str) -> Self {
        let (target, kind) = match raw.split_once(':') {
            None => (raw, ActionKind::Call),
            Some((target, "POP")) => (target, ActionKind::Pop),
            Some((target, rule)) => (
                target,
                ActionKind::Push {
                    rule: rule.to_string(),
                },
            ),
        };
        Self {
            target: target.to_string(),
            kind,
        }
    }

    pub fn pop(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: ActionKind::Pop,
        }
    }

    /// Run the action against the context's grammar.
    ///
    /// A push returns the guard that undoes it; the caller decides whether
    /// to release it. Non-fatal problems are added to `errors`.
    pub fn activate(
        &self,
        ctx: &mut ExpansionContext<'_>,
        errors: &mut Vec<ExpansionError>,
    ) -> Result<Option<PushGuard>, GrammarError> {
        match &self.kind {
            ActionKind::Push { rule } => {
                // Alternatives are expanded now, so later selections see
                // literal text rather than re-rolling each time.
                let mut finished = Vec::new();
                for section in rule.split(',') {
                    let node = ctx.expand_root(section, ExpandOptions::nested())?;
                    errors.extend(node.errors().iter().cloned());
                    finished.push(node.into_finished_text());
                }
                debug!(symbol = %self.target, rules = ?finished, "push action");
                ctx.grammar_mut().push_rules(&self.target, finished);
                Ok(Some(PushGuard {
                    target: self.target.clone(),
                }))
            }
            ActionKind::Pop => {
                if let Err(e) = ctx.grammar_mut().pop_rules(&self.target) {
                    errors.push(e);
                }
                Ok(None)
            }
            ActionKind::Call => {
                let node = ctx.expand_root(&self.target, ExpandOptions::nested())?;
                errors.extend(node.errors().iter().cloned());
                Ok(None)
            }
        }
    }

    /// The action in source form, without brackets.
    pub fn to_text(&self) -> String {
        match &self.kind {
            ActionKind::Push { rule } => format!("{}:{}", self.target, rule),
            ActionKind::Pop => format!("{}:POP", self.target),
            ActionKind::Call => self.target.clone(),
        }
    }
}

/// Release token for one push. Releasing pops the pushed rules.
#[must_use = "a push stays on the stack until its guard is released"]
#[derive(Debug, PartialEq, Eq)]
pub struct PushGuard {
    target: String,
}

impl PushGuard {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The pop this guard performs, as an action.
    pub fn undo_action(&self) -> Action {
        Action::pop(self.target.as_str())
    }

    pub fn release(self, grammar: &mut Grammar) -> Result<(), ExpansionError> {
        grammar.pop_rules(&self.target)
    }
}
