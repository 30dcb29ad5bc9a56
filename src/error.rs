//! Error taxonomy.
//!
//! Two families, kept apart on purpose:
//!
//! - [`CompileError`] / [`RegistrationError`]: a grammar is broken. Raised once,
//!   when the grammar is registered, and never affects other grammars.
//! - [`HighlightError`]: raised per call. Illegal input is *not* an error in
//!   permissive mode (it comes back as an `illegal` result); only unknown
//!   languages and engine invariant violations surface here.

use thiserror::Error;

/// Boxed error returned by a failing language factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A grammar could not be compiled.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("language `{0}`: `self` is not allowed in the top-level `contains` list")]
    TopLevelSelfReference(String),

    #[error("mode {0}: `matches` cannot be combined with `begin` or `end`")]
    MatchWithBeginEnd(String),

    #[error("mode {0}: both `keywords.pattern` and the deprecated `lexemes` are set")]
    ConflictingKeywordPattern(String),

    #[error("unknown mode reference `{0}`")]
    UnknownReference(String),

    #[error("mode {0}: `starts` must resolve to exactly one mode (variants are not allowed)")]
    VariantsInStarts(String),

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },
}

/// Registering a language failed. The registry stays usable either way.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("language definition for `{name}` could not be built: {source}")]
    Factory {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("language `{name}` failed to compile: {source}")]
    Compile {
        name: String,
        #[source]
        source: CompileError,
    },
}

/// A highlight or detection call failed.
#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("unknown language: `{0}`")]
    UnknownLanguage(String),

    #[error("illegal lexeme {lexeme:?} at offset {index} for mode `{}`", scope.as_deref().unwrap_or("<unnamed>"))]
    IllegalLexeme { lexeme: String, scope: Option<String>, index: usize, context: String },

    #[error("zero-width match at offset {index} in mode `{}`; the grammar cannot make progress", scope.as_deref().unwrap_or("<unnamed>"))]
    ZeroWidthMatch { index: usize, scope: Option<String> },

    #[error("potential infinite loop: {iterations} iterations without getting past offset {offset}")]
    RunawayScan { iterations: usize, offset: usize },

    #[error("regex evaluation failed: {0}")]
    Regex(#[from] fancy_regex::Error),
}

impl HighlightError {
    /// Whether permissive mode may swallow this error and fall back to an
    /// unannotated result. Zero-width and runaway conditions never qualify.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HighlightError::Regex(_))
    }
}
