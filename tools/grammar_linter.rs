/// Grammar Linter: checks grammar files for malformed rules and dangling
/// references.
///
/// Usage: grammar_linter <grammar_file_or_dir>

use narrative_grammar::core::action::{Action, ActionKind};
use narrative_grammar::core::modifiers;
use narrative_grammar::core::tag::{parse_tag, ModifierCall};
use narrative_grammar::core::tokenizer::{tokenize, SegmentKind};
use narrative_grammar::{Grammar, GrammarError, RuleSet, Rules};
use std::collections::BTreeSet;
use std::path::Path;
use std::process;
use tracing::{debug, info};

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: grammar_linter <grammar_file_or_dir>");
        process::exit(0);
    }

    let path = Path::new(&args[1]);
    let mut grammar = Grammar::new();

    if path.is_file() {
        match load_grammar(path) {
            Ok(g) => grammar.merge(g),
            Err(e) => {
                eprintln!("ERROR: Failed to load grammar file: {}", e);
                process::exit(1);
            }
        }
    } else if path.is_dir() {
        load_grammars_recursive(path, &mut grammar);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", path.display());
        process::exit(1);
    }

    info!(symbols = grammar.symbol_names().len(), "loaded grammar");

    let (errors, warnings) = lint_grammar(&grammar);

    println!("\n=== Grammar Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    process::exit(if errors.is_empty() { 0 } else { 1 });
}

fn load_grammar(path: &Path) -> Result<Grammar, GrammarError> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => Grammar::from_json(&std::fs::read_to_string(path)?),
        _ => Grammar::load_from_ron(path),
    }
}

fn load_grammars_recursive(dir: &Path, grammar: &mut Grammar) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<_> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            load_grammars_recursive(&path, grammar);
            continue;
        }
        let ext = path.extension().and_then(|s| s.to_str());
        if !matches!(ext, Some("ron") | Some("json")) {
            continue;
        }
        match load_grammar(&path) {
            Ok(g) => {
                println!("  Loaded: {}", path.display());
                grammar.merge(g);
            }
            Err(e) => eprintln!("  ERROR loading {}: {}", path.display(), e),
        }
    }
}

/// Everything one rule refers to, gathered by walking its tags and actions.
#[derive(Default)]
struct Refs {
    symbols: BTreeSet<String>,
    modifiers: BTreeSet<String>,
    pushed: BTreeSet<String>,
    problems: Vec<String>,
}

impl Refs {
    fn walk(&mut self, rule: &str) {
        let tokenized = tokenize(rule);
        for error in tokenized.errors {
            self.problems.push(format!("{} in \"{}\"", error, rule));
        }
        for segment in tokenized.segments {
            match segment.kind {
                SegmentKind::PlainText => {}
                SegmentKind::Action => self.walk_action(&segment.raw),
                SegmentKind::Tag => match parse_tag(&segment.raw) {
                    Ok(tag) => {
                        for pre in &tag.preactions {
                            self.walk_action(pre);
                        }
                        for text in &tag.modifiers {
                            self.modifiers.insert(ModifierCall::parse(text).name);
                        }
                        if !tag.symbol.is_empty() {
                            self.symbols.insert(tag.symbol);
                        }
                    }
                    Err(e) => self.problems.push(e.to_string()),
                },
            }
        }
    }

    fn walk_action(&mut self, raw: &str) {
        let action = Action::parse(raw);
        match &action.kind {
            ActionKind::Push { rule } => {
                self.pushed.insert(action.target.clone());
                for section in rule.split(',') {
                    self.walk(section);
                }
            }
            ActionKind::Pop => {}
            ActionKind::Call => self.walk(&action.target),
        }
    }
}

/// The texts of one rule set: alternatives, including those of nested
/// branches, kept apart from the condition expressions that pick them.
#[derive(Default)]
struct RuleTexts<'a> {
    alternatives: Vec<&'a str>,
    conditions: Vec<&'a str>,
}

impl<'a> RuleTexts<'a> {
    fn collect(set: &'a RuleSet) -> Self {
        let mut texts = Self::default();
        texts.add(set);
        texts
    }

    fn add(&mut self, set: &'a RuleSet) {
        match set.rules() {
            Rules::Literal(alternatives) => {
                self.alternatives.extend(alternatives.iter().map(String::as_str))
            }
            Rules::Conditional {
                condition,
                branches,
                defaults,
            } => {
                self.conditions.push(condition);
                self.alternatives.extend(defaults.iter().map(String::as_str));
                for branch in branches.values() {
                    self.add(branch);
                }
            }
        }
    }
}

fn lint_grammar(grammar: &Grammar) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let known_modifiers = modifiers::base_english();

    // Symbols pushed anywhere count as defined everywhere.
    let mut pushed = BTreeSet::new();
    let mut per_symbol = Vec::new();
    for name in grammar.symbol_names() {
        let Some(symbol) = grammar.symbol(name) else {
            continue;
        };
        let texts = RuleTexts::collect(symbol.base_rules());
        let mut all = Refs::default();
        for condition in &texts.conditions {
            all.walk(condition);
        }
        let mut self_refs = 0;
        for text in &texts.alternatives {
            let mut refs = Refs::default();
            refs.walk(text);
            if refs.symbols.contains(name) {
                self_refs += 1;
            }
            all.symbols.extend(refs.symbols);
            all.modifiers.extend(refs.modifiers);
            all.pushed.extend(refs.pushed);
            all.problems.extend(refs.problems);
        }
        debug!(symbol = name, rules = texts.alternatives.len(), "linted symbol");

        let alternatives = texts.alternatives.len();
        if alternatives > 0 && self_refs == alternatives {
            errors.push(format!(
                "Symbol '{}' has no non-recursive alternative (infinite recursion)",
                name
            ));
        }
        pushed.extend(all.pushed.iter().cloned());
        per_symbol.push((name, all));
    }

    for (name, refs) in per_symbol {
        for problem in refs.problems {
            errors.push(format!("Symbol '{}': {}", name, problem));
        }
        for target in &refs.symbols {
            if grammar.symbol(target).is_none() && !pushed.contains(target) {
                errors.push(format!(
                    "Symbol '{}' references non-existent symbol '{}'",
                    name, target
                ));
            }
        }
        for modifier in &refs.modifiers {
            if !known_modifiers.contains_key(modifier) {
                warnings.push(format!(
                    "Symbol '{}' uses modifier '{}' which is not a built-in",
                    name, modifier
                ));
            }
        }
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lint_json(input: &str) -> (Vec<String>, Vec<String>) {
        lint_grammar(&Grammar::from_json(input).unwrap())
    }

    #[test]
    fn condition_is_not_counted_as_an_alternative() {
        let (errors, _) = lint_json(
            r##"{
                "time": "night",
                "walk": { "condition": "#time#", "default": ["on and #walk#"] }
            }"##,
        );
        assert_eq!(
            errors,
            vec!["Symbol 'walk' has no non-recursive alternative (infinite recursion)"]
        );
    }

    #[test]
    fn conditional_with_an_exit_passes() {
        let (errors, warnings) = lint_json(
            r##"{
                "time": "night",
                "walk": {
                    "condition": "#time#",
                    "branches": { "night": ["home"] },
                    "default": ["on and #walk#"]
                }
            }"##,
        );
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty());
    }

    #[test]
    fn condition_references_are_checked() {
        let (errors, _) = lint_json(r##"{ "sky": { "condition": "#time#", "default": ["grey"] } }"##);
        assert_eq!(
            errors,
            vec!["Symbol 'sky' references non-existent symbol 'time'"]
        );
    }
}
