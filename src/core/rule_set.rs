/// Rule sets: weighted random selection among rule alternatives.
use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use super::grammar::{ConditionalRules, RawRules};

/// The alternatives of a rule set, decided once at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Rules {
    /// Plain alternatives.
    Literal(Vec<String>),
    /// `condition` is expanded at selection time; its text picks a branch.
    /// `defaults` is used when no branch matches or the branch yields nothing.
    Conditional {
        condition: String,
        branches: FxHashMap<String, RuleSet>,
        defaults: Vec<String>,
    },
}

/// One level of a symbol's rule stack.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Rules,
    /// Exponent applied to the uniform roll. 1 is uniform, larger values
    /// favour earlier alternatives, smaller ones later alternatives.
    falloff: f64,
    /// Times each default alternative was picked. Diagnostic only.
    uses: Vec<u32>,
}

impl RuleSet {
    pub fn literal<S: Into<String>>(alternatives: impl IntoIterator<Item = S>) -> Self {
        Self::new(Rules::Literal(
            alternatives.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn conditional(
        condition: impl Into<String>,
        branches: FxHashMap<String, RuleSet>,
        defaults: Vec<String>,
    ) -> Self {
        Self::new(Rules::Conditional {
            condition: condition.into(),
            branches,
            defaults,
        })
    }

    fn new(rules: Rules) -> Self {
        let uses = vec![0; defaults_of(&rules).len()];
        Self {
            rules,
            falloff: 1.0,
            uses,
        }
    }

    /// Build a rule set from grammar input. Nested branches share `falloff`.
    pub fn from_raw(raw: &RawRules, falloff: f64) -> Self {
        let set = match raw {
            RawRules::One(rule) => Self::literal([rule.as_str()]),
            RawRules::Many(rules) => Self::literal(rules.iter().map(String::as_str)),
            RawRules::Conditional(cond) => Self::conditional(
                cond.condition.as_str(),
                cond.branches
                    .iter()
                    .map(|(key, branch)| (key.clone(), Self::from_raw(branch, falloff)))
                    .collect(),
                cond.default.clone(),
            ),
        };
        set.with_falloff(falloff)
    }

    /// The grammar-input form of this rule set.
    pub fn to_raw(&self) -> RawRules {
        match &self.rules {
            Rules::Literal(rules) => RawRules::Many(rules.clone()),
            Rules::Conditional {
                condition,
                branches,
                defaults,
            } => RawRules::Conditional(ConditionalRules {
                condition: condition.clone(),
                branches: branches
                    .iter()
                    .map(|(key, branch)| (key.clone(), branch.to_raw()))
                    .collect::<BTreeMap<_, _>>(),
                default: defaults.clone(),
            }),
        }
    }

    pub fn with_falloff(mut self, falloff: f64) -> Self {
        self.falloff = falloff;
        self
    }

    pub fn falloff(&self) -> f64 {
        self.falloff
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Alternatives used when no conditional branch applies.
    pub fn defaults(&self) -> &[String] {
        defaults_of(&self.rules)
    }

    pub fn uses(&self) -> &[u32] {
        &self.uses
    }

    /// The condition expression, for conditional sets.
    pub fn condition(&self) -> Option<&str> {
        match &self.rules {
            Rules::Conditional { condition, .. } => Some(condition),
            Rules::Literal(_) => None,
        }
    }

    pub fn branch(&self, key: &str) -> Option<&RuleSet> {
        match &self.rules {
            Rules::Conditional { branches, .. } => branches.get(key),
            Rules::Literal(_) => None,
        }
    }

    /// Follow a path of branch keys down through nested conditional sets.
    pub fn descend(&self, path: &[String]) -> Option<&RuleSet> {
        match path.split_first() {
            None => Some(self),
            Some((key, rest)) => self.branch(key)?.descend(rest),
        }
    }

    /// Pick an alternative.
    ///
    /// `path` holds the already-evaluated condition values, outermost first.
    /// A branch that yields nothing falls through to this set's defaults.
    /// Returns `None` when there are no defaults to fall back on.
    pub fn select_rule(&mut self, path: &[String], rng: &mut StdRng) -> Option<String> {
        if let (Rules::Conditional { branches, .. }, Some((key, rest))) =
            (&mut self.rules, path.split_first())
        {
            if let Some(rule) = branches
                .get_mut(key)
                .and_then(|branch| branch.select_rule(rest, rng))
            {
                return Some(rule);
            }
        }

        let defaults = defaults_of(&self.rules);
        if defaults.is_empty() {
            return None;
        }

        let roll: f64 = rng.gen();
        let scaled = roll.powf(self.falloff) * defaults.len() as f64;
        let index = (scaled.floor() as usize).min(defaults.len() - 1);

        if self.uses.len() < defaults.len() {
            self.uses.resize(defaults.len(), 0);
        }
        self.uses[index] += 1;
        Some(defaults[index].clone())
    }

    /// Reset usage counters, including those of nested branches.
    pub fn clear_state(&mut self) {
        self.uses.iter_mut().for_each(|n| *n = 0);
        if let Rules::Conditional { branches, .. } = &mut self.rules {
            branches.values_mut().for_each(RuleSet::clear_state);
        }
    }
}

fn defaults_of(rules: &Rules) -> &[String] {
    match rules {
        Rules::Literal(rules) => rules,
        Rules::Conditional { defaults, .. } => defaults,
    }
}
