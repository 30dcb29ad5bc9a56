//! Small combinators for writing regex sources in grammars.
//!
//! Every function returns plain source text; nothing is compiled here.

/// Escape `text` so it matches literally.
pub fn escape(text: &str) -> String {
    regex::escape(text)
}

/// Join sources end to end.
pub fn concat(parts: &[&str]) -> String {
    parts.concat()
}

/// Match any one of `parts` (first listed wins on ties).
pub fn either(parts: &[&str]) -> String {
    format!("(?:{})", parts.join("|"))
}

/// Zero-width assertion that `source` follows.
pub fn lookahead(source: &str) -> String {
    format!("(?={source})")
}

pub fn optional(source: &str) -> String {
    format!("(?:{source})?")
}

pub fn any_number_of_times(source: &str) -> String {
    format!("(?:{source})*")
}

/// Alternation of whole words, e.g. for literal keyword lists.
pub fn words(list: &[&str]) -> String {
    let escaped: Vec<String> = list.iter().map(|w| escape(w)).collect();
    format!(r"\b(?:{})\b", escaped.join("|"))
}
