//! Grammar-driven lexical highlighting.
//!
//! A [`Language`] describes a language's lexical structure as nested
//! [`Mode`]s. Registered grammars are compiled once into read-only
//! [`CompiledLanguage`]s; each scan walks the input a single time and
//! produces a [`TokenTree`] of labeled spans that [`render_html`] turns into
//! markup.
//!
//! ```
//! use glint::{Highlighter, Keywords, Language};
//! use std::convert::Infallible;
//!
//! let mut highlighter = Highlighter::new();
//! highlighter
//!     .register_language("tiny", |common| {
//!         Ok::<_, Infallible>(
//!             Language::new("tiny").keywords(Keywords::from("if else")).contains([common.apos_string.clone()]),
//!         )
//!     })
//!     .unwrap();
//!
//! let result = highlighter.highlight("tiny", "if 'x' then y", false).unwrap();
//! assert_eq!(result.value, r#"<span class="hl-keyword">if</span> <span class="hl-string">&#x27;x&#x27;</span> then y"#);
//! assert_eq!(result.relevance, 2);
//! ```

#[macro_use]
mod macros;
mod api;
mod engine;
pub mod error;
pub mod grammar;
pub mod languages;
pub mod registry;
pub mod render;

pub use api::{
    BeforeHighlight, CodeBlock, Detection, HighlightResult, Highlighter, Options, Plugin, highlight, highlight_auto,
    highlighter,
};
pub use engine::{
    COMMON_KEYWORDS, CandidateScore, CompiledLanguage, Element, Emitter, IllegalLexeme, Node, Scan, ScanMetrics,
    ScanOutcome, TokenTree, TokenTreeEmitter,
};
pub use error::{BoxError, CompileError, HighlightError, RegistrationError};
pub use grammar::common::{CommonModes, common_modes};
pub use grammar::{KeywordWeight, Keywords, Language, Mode, ModeFlags, ModeRef, Pattern, SubLanguage};
pub use registry::Registry;
pub use render::{escape_html, render_html, scope_to_class};
