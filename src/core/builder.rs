/// Grammar construction: configuration plus the builder that gathers rule
/// sources, modifiers, and subgrammars into a `Grammar`.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::GrammarError;
use super::grammar::{Grammar, Modifier, RawGrammar, RawRules};
use super::modifiers;

/// Engine settings. Every field has a default, so a RON file only needs
/// the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Ceiling on nested node expansions within one top-level call.
    pub max_depth: usize,
    /// Falloff given to every rule set the grammar creates.
    pub falloff: f64,
    /// Resolve escape markers at the root of `expand`/`flatten`.
    pub resolve_escapes: bool,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            falloff: 1.0,
            resolve_escapes: true,
        }
    }
}

impl GrammarConfig {
    pub fn load_from_ron(path: &Path) -> Result<GrammarConfig, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    pub fn validate(&self) -> Result<(), GrammarError> {
        if self.max_depth == 0 {
            return Err(GrammarError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if !self.falloff.is_finite() || self.falloff < 0.0 {
            return Err(GrammarError::InvalidConfig(format!(
                "falloff must be a finite, non-negative number, got {}",
                self.falloff
            )));
        }
        Ok(())
    }
}

/// Where builder rules come from. Applied in the order added.
enum RuleSource {
    Map(RawGrammar),
    RonStr(String),
    RonFile(PathBuf),
    RonDir(PathBuf),
    JsonStr(String),
}

/// Builder for constructing a `Grammar`. Built via `Grammar::builder()`.
#[derive(Default)]
pub struct GrammarBuilder {
    sources: Vec<RuleSource>,
    config: Option<GrammarConfig>,
    config_path: Option<PathBuf>,
    base_modifiers: bool,
    modifiers: Vec<(String, Modifier)>,
    subgrammars: Vec<Grammar>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide rules directly.
    pub fn rules<I, K, R>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
        R: Into<RawRules>,
    {
        let raw = iter
            .into_iter()
            .map(|(key, rules)| (key.into(), rules.into()))
            .collect();
        self.sources.push(RuleSource::Map(raw));
        self
    }

    pub fn ron_str(mut self, input: &str) -> Self {
        self.sources.push(RuleSource::RonStr(input.to_string()));
        self
    }

    pub fn ron_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(RuleSource::RonFile(path.into()));
        self
    }

    /// Every `.ron` file in `path`, in file-name order.
    pub fn grammars_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(RuleSource::RonDir(path.into()));
        self
    }

    pub fn json_str(mut self, input: &str) -> Self {
        self.sources.push(RuleSource::JsonStr(input.to_string()));
        self
    }

    pub fn config(mut self, config: GrammarConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the configuration from a RON file. Overrides `config`.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Register the built-in English modifiers.
    pub fn base_modifiers(mut self) -> Self {
        self.base_modifiers = true;
        self
    }

    pub fn modifier<F>(mut self, name: impl Into<String>, modifier: F) -> Self
    where
        F: Fn(&str, &[String]) -> String + Send + Sync + 'static,
    {
        self.modifiers
            .push((name.into(), std::sync::Arc::new(modifier)));
        self
    }

    /// Register a prepared set of modifiers, such as a shared registry.
    pub fn modifiers<I, K>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = (K, Modifier)>,
        K: Into<String>,
    {
        self.modifiers
            .extend(modifiers.into_iter().map(|(name, m)| (name.into(), m)));
        self
    }

    pub fn subgrammar(mut self, grammar: Grammar) -> Self {
        self.subgrammars.push(grammar);
        self
    }

    pub fn build(self) -> Result<Grammar, GrammarError> {
        let config = match self.config_path {
            Some(ref path) => GrammarConfig::load_from_ron(path)?,
            None => self.config.unwrap_or_default(),
        };
        config.validate()?;

        // Later sources override earlier ones.
        let mut raw = RawGrammar::new();
        for source in self.sources {
            match source {
                RuleSource::Map(map) => raw.extend(map),
                RuleSource::RonStr(input) => raw.extend(ron::from_str::<RawGrammar>(&input)?),
                RuleSource::RonFile(path) => raw.extend(read_ron(&path)?),
                RuleSource::RonDir(dir) => {
                    load_ron_files_from_dir(&dir, |path| {
                        raw.extend(read_ron(path)?);
                        Ok(())
                    })?;
                }
                RuleSource::JsonStr(input) => {
                    raw.extend(serde_json::from_str::<RawGrammar>(&input)?)
                }
            }
        }

        let mut grammar = Grammar::from_raw(&raw, config);
        if self.base_modifiers {
            grammar.add_modifiers(modifiers::base_english());
        }
        grammar.add_modifiers(self.modifiers);
        for sub in self.subgrammars {
            grammar.add_subgrammar(sub);
        }
        debug!(symbols = raw.len(), "built grammar");
        Ok(grammar)
    }
}

fn read_ron(path: &Path) -> Result<RawGrammar, GrammarError> {
    let contents = std::fs::read_to_string(path)?;
    let raw: RawGrammar = ron::from_str(&contents)?;
    debug!(path = %path.display(), symbols = raw.len(), "loaded grammar file");
    Ok(raw)
}

/// Load all .ron files from a directory, calling `loader` for each in
/// file-name order.
fn load_ron_files_from_dir<F>(dir: &Path, mut loader: F) -> Result<(), GrammarError>
where
    F: FnMut(&Path) -> Result<(), GrammarError>,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in &paths {
        loader(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn later_sources_override_earlier() {
        let mut g = Grammar::builder()
            .rules([("a", "first"), ("b", "kept")])
            .ron_str(r#"{ "a": "second" }"#)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(g.flatten("#a# #b#", &mut rng).unwrap(), "second kept");
    }

    #[test]
    fn falloff_reaches_rule_sets() {
        let g = Grammar::builder()
            .rules([("a", vec!["x", "y"])])
            .config(GrammarConfig {
                falloff: 3.0,
                ..GrammarConfig::default()
            })
            .build()
            .unwrap();
        assert_eq!(g.symbol("a").unwrap().base_rules().falloff(), 3.0);
        assert_eq!(g.config().falloff, 3.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Grammar::builder()
            .config(GrammarConfig {
                max_depth: 0,
                ..GrammarConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, GrammarError::InvalidConfig(_)));

        let err = Grammar::builder()
            .config(GrammarConfig {
                falloff: f64::NAN,
                ..GrammarConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, GrammarError::InvalidConfig(_)));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: GrammarConfig = ron::from_str("(max_depth: 12)").unwrap();
        assert_eq!(config.max_depth, 12);
        assert_eq!(config.falloff, 1.0);
        assert!(config.resolve_escapes);
    }

    #[test]
    fn custom_modifiers_and_subgrammars() {
        let mut g = Grammar::builder()
            .rules([("origin", "#word.shout#")])
            .modifier("shout", |s, _| s.to_uppercase())
            .subgrammar(Grammar::from_map([("word", "hey")]))
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(g.flatten("#origin#", &mut rng).unwrap(), "HEY");
    }

    #[test]
    fn modifier_registries_are_registered() {
        let mut g = Grammar::builder()
            .rules([("pet", "owl")])
            .modifiers(modifiers::base_english())
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(g.flatten("#pet.a#", &mut rng).unwrap(), "an owl");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Grammar::builder()
            .ron_file("does/not/exist.ron")
            .build()
            .unwrap_err();
        assert!(matches!(err, GrammarError::Io(_)));
    }
}
