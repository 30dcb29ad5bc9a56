//! Keyword lookup tables.
//!
//! Free text inside a mode is split into candidate words by the mode's keyword
//! pattern; each candidate is looked up here.
//!
//! ```text
//! Keywords { "keyword": ["if", "else|0"], "_hidden": ["then"] }
//!        │
//!        v
//! KeywordTable { "if" -> (keyword, 1), "else" -> (keyword, 0), "then" -> (_hidden, 1) }
//! ```
//!
//! ## Weights
//!
//! A word's relevance is its explicit `|N` suffix when present, otherwise the
//! language's [`KeywordWeight`]:
//!
//! - `Uniform`: every word weighs 1.
//! - `CommonWordsFree`: words in [`COMMON_KEYWORDS`] weigh 0, everything else 1.
//!   Words such as `if` or `for` appear in prose and in most languages, so they
//!   say little about which language a snippet is written in.
//!
//! Later categories override earlier ones for the same word.

use crate::grammar::{KeywordWeight, Keywords};
use std::collections::HashMap;

/// Words that carry no relevance under [`KeywordWeight::CommonWordsFree`].
pub const COMMON_KEYWORDS: &[&str] = &["of", "and", "for", "in", "not", "or", "if", "then", "parent", "list", "value"];

impl KeywordWeight {
    /// Relevance of `word` when it carries no explicit weight.
    pub fn weight(self, word: &str) -> u32 {
        match self {
            KeywordWeight::Uniform => 1,
            KeywordWeight::CommonWordsFree if COMMON_KEYWORDS.contains(&word.to_lowercase().as_str()) => 0,
            KeywordWeight::CommonWordsFree => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeywordEntry {
    pub category: String,
    pub relevance: u32,
}

impl KeywordEntry {
    /// Categories starting with `_` score but are not emitted.
    pub fn is_hidden(&self) -> bool {
        self.category.starts_with('_')
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct KeywordTable {
    entries: HashMap<String, KeywordEntry>,
    case_insensitive: bool,
}

impl KeywordTable {
    pub fn new(keywords: &Keywords, weight: KeywordWeight, case_insensitive: bool) -> Self {
        let mut entries = HashMap::new();

        for (category, words) in &keywords.categories {
            for raw in words {
                let (word, explicit) = match raw.split_once('|') {
                    Some((word, n)) => (word, n.trim().parse::<u32>().ok()),
                    None => (raw.as_str(), None),
                };
                if word.is_empty() {
                    continue;
                }
                let key = if case_insensitive { word.to_lowercase() } else { word.to_string() };
                let relevance = explicit.unwrap_or_else(|| weight.weight(word));
                entries.insert(key, KeywordEntry { category: category.clone(), relevance });
            }
        }

        KeywordTable { entries, case_insensitive }
    }

    pub fn lookup(&self, word: &str) -> Option<&KeywordEntry> {
        if self.case_insensitive { self.entries.get(&word.to_lowercase()) } else { self.entries.get(word) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_weights_override_the_default() {
        let k = Keywords::new().category("keyword", "if else|0 match|3");
        let table = KeywordTable::new(&k, KeywordWeight::Uniform, false);

        assert_eq!(table.lookup("if").map(|e| e.relevance), Some(1));
        assert_eq!(table.lookup("else").map(|e| e.relevance), Some(0));
        assert_eq!(table.lookup("match").map(|e| e.relevance), Some(3));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn common_words_are_free_when_requested() {
        let k = Keywords::from("if while");
        let table = KeywordTable::new(&k, KeywordWeight::CommonWordsFree, false);
        assert_eq!(table.lookup("if").map(|e| e.relevance), Some(0));
        assert_eq!(table.lookup("while").map(|e| e.relevance), Some(1));
    }

    #[test]
    fn lookup_is_case_folded_only_when_configured() {
        let k = Keywords::new().category("built_in", "Select");
        assert!(KeywordTable::new(&k, KeywordWeight::Uniform, true).lookup("SELECT").is_some());
        assert!(KeywordTable::new(&k, KeywordWeight::Uniform, false).lookup("SELECT").is_none());
        assert!(KeywordTable::new(&k, KeywordWeight::Uniform, false).lookup("Select").is_some());
    }

    #[test]
    fn later_categories_win_and_underscore_categories_are_hidden() {
        let k = Keywords::new().category("keyword", "null").category("literal", "null").category("_relevance", "fn");
        let table = KeywordTable::new(&k, KeywordWeight::Uniform, false);
        assert_eq!(table.lookup("null").map(|e| e.category.as_str()), Some("literal"));
        assert!(table.lookup("fn").is_some_and(KeywordEntry::is_hidden));
    }
}
