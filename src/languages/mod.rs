//! Bundled grammars.
//!
//! Grammars are plain data built from [`CommonModes`]; they are registered by
//! [`Highlighter::with_bundled_languages`](crate::Highlighter::with_bundled_languages)
//! and by the CLI.

use crate::grammar::Language;
use crate::grammar::common::CommonModes;

mod ini;
mod json;

pub use ini::ini;
pub use json::json;

/// Grammar factory taking the shared building blocks.
pub type Factory = fn(&CommonModes) -> Language;

/// Every bundled grammar, by registration name.
pub const BUNDLED: &[(&str, Factory)] = &[("json", json), ("ini", ini)];
