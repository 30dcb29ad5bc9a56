use crate::grammar::common::CommonModes;
use crate::grammar::{Keywords, Language, Mode};

const LITERALS: &str = "true false null";

/// JSON, tolerating C-style comments.
pub fn json(common: &CommonModes) -> Language {
    let attribute = Mode::new().scope("attr").begin(r#""(\\.|[^\\"\r\n])*"(?=\s*:)"#);
    let punctuation = Mode::new().scope("punctuation").matching(r"[{}\[\],:]").relevance(0);
    let literal = Mode::new()
        .scope("literal")
        .begin_keywords(LITERALS)
        .keywords(Keywords::new().category("_literal", LITERALS));

    Language::new("json")
        .alias("jsonc")
        .illegal(r"\S")
        .contains([
            attribute,
            punctuation,
            common.quote_string.clone(),
            literal,
            common.c_number.clone(),
            common.c_line_comment.clone(),
            common.c_block_comment.clone(),
        ])
}
