/// Grammar registry: symbols, modifiers, fallback subgrammars, and the
/// `expand`/`flatten` entry points.
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::builder::{GrammarBuilder, GrammarConfig};
use super::context::{ExpandOptions, ExpansionContext};
use super::error::{ExpansionError, GrammarError};
use super::node::{ExpansionNode, NodeRef};
use super::rule_set::RuleSet;
use super::symbol::Symbol;

/// A text transform applied by name from a tag: `#noun.s#`.
pub type Modifier = Arc<dyn Fn(&str, &[String]) -> String + Send + Sync>;

/// Rules for one symbol as written in grammar input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRules {
    One(String),
    Many(Vec<String>),
    Conditional(ConditionalRules),
}

/// A conditional rule set as written in grammar input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRules {
    /// Rule text expanded at selection time to choose a branch.
    pub condition: String,
    #[serde(default)]
    pub branches: BTreeMap<String, RawRules>,
    #[serde(default)]
    pub default: Vec<String>,
}

impl From<&str> for RawRules {
    fn from(rule: &str) -> Self {
        RawRules::One(rule.to_string())
    }
}

impl From<String> for RawRules {
    fn from(rule: String) -> Self {
        RawRules::One(rule)
    }
}

impl<S: Into<String>> From<Vec<S>> for RawRules {
    fn from(rules: Vec<S>) -> Self {
        RawRules::Many(rules.into_iter().map(Into::into).collect())
    }
}

impl From<ConditionalRules> for RawRules {
    fn from(rules: ConditionalRules) -> Self {
        RawRules::Conditional(rules)
    }
}

/// Grammar input: symbol name to rules.
pub type RawGrammar = BTreeMap<String, RawRules>;

/// A generative grammar.
///
/// Expansion mutates the rule stacks in place, so a grammar must not be
/// shared between concurrent expansions. Call [`Grammar::clear_state`]
/// between unrelated expansions to drop pushed rules.
#[derive(Clone, Default)]
pub struct Grammar {
    symbols: FxHashMap<String, Symbol>,
    modifiers: FxHashMap<String, Modifier>,
    subgrammars: Vec<Grammar>,
    config: GrammarConfig,
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modifiers: Vec<&str> = self.modifiers.keys().map(String::as_str).collect();
        modifiers.sort_unstable();
        f.debug_struct("Grammar")
            .field("symbols", &self.symbol_names())
            .field("modifiers", &modifiers)
            .field("subgrammars", &self.subgrammars.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::new()
    }

    /// Create a grammar from `(symbol, rules)` pairs with default settings.
    pub fn from_map<I, K, R>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
        R: Into<RawRules>,
    {
        let raw = iter
            .into_iter()
            .map(|(key, rules)| (key.into(), rules.into()))
            .collect();
        Self::from_raw(&raw, GrammarConfig::default())
    }

    pub(crate) fn from_raw(raw: &RawGrammar, config: GrammarConfig) -> Self {
        let symbols = raw
            .iter()
            .map(|(key, rules)| {
                let base = RuleSet::from_raw(rules, config.falloff);
                (key.clone(), Symbol::new(key.as_str(), base))
            })
            .collect();
        Self {
            symbols,
            modifiers: FxHashMap::default(),
            subgrammars: Vec::new(),
            config,
        }
    }

    /// Parse a grammar from a RON map of symbol name to rules.
    pub fn parse_ron(input: &str) -> Result<Grammar, GrammarError> {
        let raw: RawGrammar = ron::from_str(input)?;
        Ok(Self::from_raw(&raw, GrammarConfig::default()))
    }

    /// Load a grammar from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Grammar, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a grammar from a JSON object of symbol name to rules.
    pub fn from_json(input: &str) -> Result<Grammar, GrammarError> {
        let raw: RawGrammar = serde_json::from_str(input)?;
        Ok(Self::from_raw(&raw, GrammarConfig::default()))
    }

    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    /// Merge another grammar into this one. Symbols and modifiers from
    /// `other` override those in `self` with the same name.
    pub fn merge(&mut self, other: Grammar) {
        self.symbols.extend(other.symbols);
        self.modifiers.extend(other.modifiers);
        self.subgrammars.extend(other.subgrammars);
    }

    pub fn add_modifier<F>(&mut self, name: impl Into<String>, modifier: F)
    where
        F: Fn(&str, &[String]) -> String + Send + Sync + 'static,
    {
        self.modifiers.insert(name.into(), Arc::new(modifier));
    }

    pub fn add_modifiers<I, K>(&mut self, modifiers: I)
    where
        I: IntoIterator<Item = (K, Modifier)>,
        K: Into<String>,
    {
        self.modifiers
            .extend(modifiers.into_iter().map(|(name, m)| (name.into(), m)));
    }

    pub fn modifier(&self, name: &str) -> Option<Modifier> {
        self.modifiers.get(name).cloned()
    }

    /// Register a grammar consulted, in registration order, when a symbol is
    /// missing here.
    pub fn add_subgrammar(&mut self, grammar: Grammar) {
        self.subgrammars.push(grammar);
    }

    pub fn subgrammars(&self) -> &[Grammar] {
        &self.subgrammars
    }

    pub fn symbol(&self, key: &str) -> Option<&Symbol> {
        self.symbols.get(key)
    }

    /// Symbol names in sorted order.
    pub fn symbol_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.symbols.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Push literal alternatives onto `key`, creating the symbol if needed.
    pub fn push_rules<S: Into<String>>(&mut self, key: &str, rules: impl IntoIterator<Item = S>) {
        let set = RuleSet::literal(rules).with_falloff(self.config.falloff);
        match self.symbols.get_mut(key) {
            Some(symbol) => symbol.push_rules(set),
            None => {
                debug!(symbol = key, "created symbol from push");
                self.symbols
                    .insert(key.to_string(), Symbol::dynamic(key, set));
            }
        }
    }

    pub fn pop_rules(&mut self, key: &str) -> Result<(), ExpansionError> {
        let symbol = self
            .symbols
            .get_mut(key)
            .ok_or_else(|| ExpansionError::NoSymbolToPop(key.to_string()))?;
        symbol.pop_rules().map(|_| ())
    }

    /// The rule set a selection of `key` would read: the local symbol's top,
    /// or the first subgrammar defining `key`.
    pub(crate) fn rule_set_for(&self, key: &str) -> Option<&RuleSet> {
        if let Some(symbol) = self.symbols.get(key) {
            return symbol.active_rules();
        }
        self.subgrammars
            .iter()
            .find_map(|sub| sub.symbols.get(key))
            .and_then(Symbol::active_rules)
    }

    /// Select a rule for `key` with conditions already evaluated into `path`.
    pub(crate) fn select_with_path(
        &mut self,
        key: &str,
        origin: Option<NodeRef>,
        path: &[String],
        rng: &mut StdRng,
        errors: &mut Vec<ExpansionError>,
    ) -> Option<String> {
        if let Some(symbol) = self.symbols.get_mut(key) {
            return symbol.select_rule(origin, path, rng, errors);
        }

        for sub in &mut self.subgrammars {
            if let Some(symbol) = sub.symbols.get_mut(key) {
                return symbol.select_unlogged(path, rng, errors);
            }
        }

        errors.push(ExpansionError::MissingSymbol(key.to_string()));
        Some(format!("(({}))", key))
    }

    /// Select a rule for `key` outside of any expansion.
    pub fn select_rule(
        &mut self,
        key: &str,
        rng: &mut StdRng,
        errors: &mut Vec<ExpansionError>,
    ) -> Result<Option<String>, GrammarError> {
        ExpansionContext::new(self, rng).select_rule(key, None, errors)
    }

    /// Expand `rule` into a node tree, resolving escapes at the root unless
    /// the configuration turns that off.
    pub fn expand(&mut self, rule: &str, rng: &mut StdRng) -> Result<ExpansionNode, GrammarError> {
        let options = ExpandOptions {
            resolve_escapes: self.config.resolve_escapes,
            ..ExpandOptions::default()
        };
        self.expand_with(rule, rng, options)
    }

    pub fn expand_with(
        &mut self,
        rule: &str,
        rng: &mut StdRng,
        options: ExpandOptions,
    ) -> Result<ExpansionNode, GrammarError> {
        ExpansionContext::new(self, rng).expand_root(rule, options)
    }

    /// Expand `rule` and return only the generated text.
    pub fn flatten(&mut self, rule: &str, rng: &mut StdRng) -> Result<String, GrammarError> {
        Ok(self.expand(rule, rng)?.into_finished_text())
    }

    /// Drop pushed rules and usage records. Symbols that only existed
    /// because of a push are removed.
    pub fn clear_state(&mut self) {
        self.symbols.retain(|_, symbol| !symbol.is_dynamic());
        self.symbols.values_mut().for_each(Symbol::clear_state);
        self.subgrammars.iter_mut().for_each(Grammar::clear_state);
    }

    /// The live state of every symbol as grammar input: each symbol maps to
    /// the rule set currently on top of its stack.
    pub fn to_raw(&self) -> RawGrammar {
        self.symbols
            .iter()
            .map(|(key, symbol)| {
                let rules = symbol
                    .active_rules()
                    .map(RuleSet::to_raw)
                    .unwrap_or_else(|| RawRules::Many(Vec::new()));
                (key.clone(), rules)
            })
            .collect()
    }

    /// Render [`Grammar::to_raw`] as pretty JSON, keys sorted.
    pub fn to_json(&self) -> Result<String, GrammarError> {
        Ok(serde_json::to_string_pretty(&self.to_raw())?)
    }
}
