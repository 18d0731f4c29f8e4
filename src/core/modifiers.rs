/// Built-in English modifiers: capitalization, articles, plurals, past tense.
///
/// The engine only ever looks modifiers up by name, so these are a
/// convenience registry rather than part of the expansion rules.
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::grammar::Modifier;

/// The English modifier registry, keyed by the names used in tags.
pub fn base_english() -> FxHashMap<String, Modifier> {
    let mut mods: FxHashMap<String, Modifier> = FxHashMap::default();
    mods.insert("capitalize".to_string(), Arc::new(|s, _| capitalize(s)));
    mods.insert("capitalizeAll".to_string(), Arc::new(|s, _| capitalize_all(s)));
    mods.insert("a".to_string(), Arc::new(|s, _| article(s)));
    mods.insert("s".to_string(), Arc::new(|s, _| plural(s)));
    mods.insert("ed".to_string(), Arc::new(|s, _| past_tense(s)));
    mods.insert("firstS".to_string(), Arc::new(|s, _| first_plural(s)));
    mods.insert("replace".to_string(), Arc::new(replace));
    mods
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Capitalize the first letter of every run of ASCII letters and digits.
pub fn capitalize_all(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut cap_next = true;
    for c in s.chars() {
        if !c.is_ascii_alphanumeric() {
            cap_next = true;
            out.push(c);
        } else if cap_next {
            out.extend(c.to_uppercase());
            cap_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Prefix the indefinite article: "an owl", "a unicorn", "a cat".
pub fn article(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if let Some(&first) = chars.first() {
        // "u" + consonant + "i" reads as "you": a unicorn, a unit.
        let you_sound = first.eq_ignore_ascii_case(&'u')
            && chars.get(2).is_some_and(|c| c.eq_ignore_ascii_case(&'i'));
        if !you_sound && is_vowel(first) {
            return format!("an {}", s);
        }
    }
    format!("a {}", s)
}

pub fn plural(s: &str) -> String {
    let mut rev = s.chars().rev();
    match rev.next() {
        Some('s' | 'h' | 'x') => format!("{}es", s),
        Some('y') if !rev.next().is_some_and(is_vowel) => {
            format!("{}ies", &s[..s.len() - 1])
        }
        _ => format!("{}s", s),
    }
}

pub fn past_tense(s: &str) -> String {
    let mut rev = s.chars().rev();
    match rev.next() {
        Some('e') => format!("{}d", s),
        Some('y') if !rev.next().is_some_and(is_vowel) => {
            format!("{}ied", &s[..s.len() - 1])
        }
        _ => format!("{}ed", s),
    }
}

/// Pluralize the first word only.
pub fn first_plural(s: &str) -> String {
    match s.split_once(' ') {
        Some((first, rest)) => format!("{} {}", plural(first), rest),
        None => plural(s),
    }
}

/// `replace(from,to)`: replace every occurrence of `from`.
pub fn replace(s: &str, params: &[String]) -> String {
    match params {
        [from, to, ..] if !from.is_empty() => s.replace(from.as_str(), to),
        _ => s.to_string(),
    }
}
