//! Shared building blocks handed to every language factory.
//!
//! Grammars clone what they need (`common.quote_string.clone()`); the values
//! held here are never mutated, so one grammar cannot affect another.

use super::{Mode, ModeFlags};
use once_cell::sync::Lazy;

pub const IDENT_RE: &str = r"[a-zA-Z]\w*";
pub const UNDERSCORE_IDENT_RE: &str = r"[a-zA-Z_]\w*";
pub const NUMBER_RE: &str = r"\b\d+(\.\d+)?";
pub const C_NUMBER_RE: &str = r"(-?)(\b0[xX][a-fA-F0-9]+|(\b\d+(\.\d*)?|\.\d+)([eE][-+]?\d+)?)";
pub const BINARY_NUMBER_RE: &str = r"\b(0b[01]+)";

const DOCTAG_WORDS: &str = "TODO|FIXME|NOTE|BUG|OPTIMIZE|HACK|XXX";

static COMMON: Lazy<CommonModes> = Lazy::new(CommonModes::new);

/// Process-wide instance passed to factories.
pub fn common_modes() -> &'static CommonModes {
    &COMMON
}

/// Frequently reused modes.
#[derive(Debug, Clone)]
pub struct CommonModes {
    pub backslash_escape: Mode,
    pub apos_string: Mode,
    pub quote_string: Mode,
    pub c_line_comment: Mode,
    pub c_block_comment: Mode,
    pub hash_comment: Mode,
    pub number: Mode,
    pub c_number: Mode,
    pub binary_number: Mode,
    pub title: Mode,
    pub underscore_title: Mode,
}

impl CommonModes {
    pub fn new() -> Self {
        let backslash_escape = Mode::new().begin(r"\\[\s\S]").relevance(0);
        let string = |quote: &str| {
            Mode::new().scope("string").begin(quote).end(quote).illegal(r"\n").contains([backslash_escape.clone()])
        };

        CommonModes {
            apos_string: string("'"),
            quote_string: string("\""),
            backslash_escape,
            c_line_comment: Self::comment("//", "$"),
            c_block_comment: Self::comment(r"/\*", r"\*/"),
            hash_comment: Self::comment("#", "$"),
            number: Mode::new().scope("number").begin(NUMBER_RE).relevance(0),
            c_number: Mode::new().scope("number").begin(C_NUMBER_RE).relevance(0),
            binary_number: Mode::new().scope("number").begin(BINARY_NUMBER_RE).relevance(0),
            title: Mode::new().scope("title").begin(IDENT_RE).relevance(0),
            underscore_title: Mode::new().scope("title").begin(UNDERSCORE_IDENT_RE).relevance(0),
        }
    }

    /// A comment running from `begin` to `end`, with `TODO:`-style doctags.
    pub fn comment(begin: &str, end: &str) -> Mode {
        Mode::new().scope("comment").begin(begin).end(end).contains([Self::doctag()])
    }

    /// Mark `mode` so that its end must repeat the begin's first capture.
    pub fn end_same_as_begin(mode: Mode) -> Mode {
        mode.flag(ModeFlags::END_SAME_AS_BEGIN)
    }

    fn doctag() -> Mode {
        Mode::new()
            .scope("doctag")
            .begin(format!("[ ]*(?=({DOCTAG_WORDS}):)"))
            .end(format!("({DOCTAG_WORDS}):"))
            .flag(ModeFlags::EXCLUDE_BEGIN)
            .relevance(0)
    }
}

impl Default for CommonModes {
    fn default() -> Self {
        Self::new()
    }
}
