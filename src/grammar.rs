//! Authoring-time grammar model.
//!
//! A [`Language`] is a tree of [`Mode`]s. Modes are plain values: they are
//! cloned freely, shared building blocks (see [`common`]) are copied into every
//! grammar that uses them, and nothing here is ever mutated by compilation.
//!
//! The shapes in this module still carry authoring sugar (`matches`,
//! `begin_keywords`, `variants`, `lexemes`). The engine never sees any of it:
//! `engine::CompiledLanguage::compile` desugars everything into one canonical
//! compiled shape.
//!
//! ## Recursion
//!
//! Grammars recurse through explicit back-edges instead of shared mutable
//! objects:
//!
//! - [`ModeRef::This`] refers to the mode whose `contains` list it appears in.
//! - [`ModeRef::Named`] refers to an entry of [`Language::repository`], which
//!   lets two modes contain each other.
//!
//! ```text
//! Language ── root: Mode ── contains ─┬─ Inline(Mode) ── contains ── This
//!     │                               └─ Named("array") ──┐
//!     └── repository: { "array": Mode } <─────────────────┘
//! ```

#[path = "grammar/common.rs"]
pub mod common;
#[path = "grammar/patterns.rs"]
pub mod patterns;

use std::collections::HashMap;

// --- Patterns ----------------------------------------------------------------

/// A `begin`/`end`/`illegal` pattern.
///
/// Plain strings convert to [`Pattern::Regex`], matching how grammars are
/// usually written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Regular expression source.
    Regex(String),
    /// Literal text, escaped on compilation.
    Literal(String),
    /// Any of several patterns (first listed wins on ties).
    Either(Vec<Pattern>),
}

impl Pattern {
    pub fn re(source: impl Into<String>) -> Self {
        Pattern::Regex(source.into())
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    pub fn either<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Pattern>,
    {
        Pattern::Either(patterns.into_iter().map(Into::into).collect())
    }

    /// Regex source for this pattern.
    pub fn source(&self) -> String {
        match self {
            Pattern::Regex(source) => source.clone(),
            Pattern::Literal(text) => regex::escape(text),
            Pattern::Either(alternatives) => {
                alternatives.iter().map(|p| format!("(?:{})", p.source())).collect::<Vec<_>>().join("|")
            }
        }
    }
}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Pattern::Regex(source.to_string())
    }
}

impl From<String> for Pattern {
    fn from(source: String) -> Self {
        Pattern::Regex(source)
    }
}

impl<const N: usize> From<[&str; N]> for Pattern {
    fn from(sources: [&str; N]) -> Self {
        Pattern::either(sources)
    }
}

// --- Mode flags --------------------------------------------------------------

bitflags::bitflags! {
    /// Boolean switches on a [`Mode`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u16 {
        /// The begin lexeme belongs to the parent, not to this mode.
        const EXCLUDE_BEGIN    = 1 << 0;
        /// The end lexeme belongs to the parent, not to this mode.
        const EXCLUDE_END      = 1 << 1;
        /// The begin lexeme is not consumed; this mode rescans it.
        const RETURN_BEGIN     = 1 << 2;
        /// The end lexeme is not consumed; the parent rescans it.
        const RETURN_END       = 1 << 3;
        /// Matched text stays in the parent's buffer and earns no relevance.
        const SKIP             = 1 << 4;
        /// This mode also ends whenever its parent's end matches.
        const ENDS_WITH_PARENT = 1 << 5;
        /// Ending this mode ends its parent too.
        const ENDS_PARENT      = 1 << 6;
        /// The end lexeme must repeat the begin lexeme's first capture.
        const END_SAME_AS_BEGIN = 1 << 7;
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        ModeFlags::empty()
    }
}

// --- Keywords ----------------------------------------------------------------

/// Keyword categories for a mode.
///
/// Words are written space-separated. A word may carry an explicit relevance
/// as `word|3`; otherwise the language's [`KeywordWeight`] decides. Categories
/// whose name starts with `_` score relevance but are not emitted as nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keywords {
    /// Pattern deciding what counts as a candidate keyword (default `\w+`).
    pub pattern: Option<Pattern>,
    /// `(category, words)` in declaration order; later categories win.
    pub categories: Vec<(String, Vec<String>)>,
}

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category from a space-separated word list.
    pub fn category(mut self, name: impl Into<String>, words: &str) -> Self {
        self.categories.push((name.into(), words.split_whitespace().map(str::to_string).collect()));
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<Pattern>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

impl From<&str> for Keywords {
    /// A bare word list lands in the `keyword` category.
    fn from(words: &str) -> Self {
        Keywords::new().category("keyword", words)
    }
}

/// Default relevance of a keyword written without an explicit `|weight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeywordWeight {
    /// Every keyword weighs 1.
    #[default]
    Uniform,
    /// Like `Uniform`, but a short list of common English words weighs 0.
    CommonWordsFree,
}

// --- Sub-languages -----------------------------------------------------------

/// Grammar(s) that a mode hands its text to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubLanguage {
    /// Highlight with exactly this language.
    One(String),
    /// Autodetect among these languages (all registered ones when empty).
    Any(Vec<String>),
}

impl From<&str> for SubLanguage {
    fn from(name: &str) -> Self {
        SubLanguage::One(name.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for SubLanguage {
    fn from(names: [&str; N]) -> Self {
        SubLanguage::Any(names.iter().map(|n| n.to_string()).collect())
    }
}

// --- Modes -------------------------------------------------------------------

/// Entry of a `contains` list (or a `starts` continuation).
#[derive(Debug, Clone)]
pub enum ModeRef {
    /// The mode that owns this `contains` list.
    This,
    /// A mode defined in place.
    Inline(Box<Mode>),
    /// An entry of [`Language::repository`].
    Named(String),
}

impl ModeRef {
    pub fn named(name: impl Into<String>) -> Self {
        ModeRef::Named(name.into())
    }
}

impl From<Mode> for ModeRef {
    fn from(mode: Mode) -> Self {
        ModeRef::Inline(Box::new(mode))
    }
}

/// One rule of a grammar.
///
/// A mode opens when `begin` matches in its parent, collects text (and child
/// modes) until `end` matches, and labels everything in between with `scope`.
/// Unlabeled modes are structural only.
#[derive(Debug, Clone, Default)]
pub struct Mode {
    /// Label of the node this mode produces.
    pub scope: Option<String>,
    pub begin: Option<Pattern>,
    pub end: Option<Pattern>,
    /// Sugar for a begin-only rule that ends right after its match.
    pub matches: Option<Pattern>,
    /// Text that may never appear directly inside this mode.
    pub illegal: Option<Pattern>,
    /// Sugar: space-separated keywords that open this mode.
    pub begin_keywords: Option<String>,
    pub keywords: Option<Keywords>,
    /// Deprecated keyword pattern; conflicts with `keywords.pattern`.
    pub lexemes: Option<Pattern>,
    /// Relevance earned when this mode opens (default 1).
    pub relevance: Option<u32>,
    pub contains: Vec<ModeRef>,
    /// Alternative bodies, each merged over this mode's other fields.
    pub variants: Vec<Mode>,
    /// Mode opened automatically once this one ends.
    pub starts: Option<Box<ModeRef>>,
    pub sub_language: Option<SubLanguage>,
    pub flags: ModeFlags,
    /// Flags a variant removes from the mode it is merged over.
    pub cleared_flags: ModeFlags,
}

impl Mode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn begin(mut self, pattern: impl Into<Pattern>) -> Self {
        self.begin = Some(pattern.into());
        self
    }

    pub fn end(mut self, pattern: impl Into<Pattern>) -> Self {
        self.end = Some(pattern.into());
        self
    }

    pub fn matching(mut self, pattern: impl Into<Pattern>) -> Self {
        self.matches = Some(pattern.into());
        self
    }

    pub fn illegal(mut self, pattern: impl Into<Pattern>) -> Self {
        self.illegal = Some(pattern.into());
        self
    }

    pub fn begin_keywords(mut self, words: impl Into<String>) -> Self {
        self.begin_keywords = Some(words.into());
        self
    }

    pub fn keywords(mut self, keywords: impl Into<Keywords>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    pub fn relevance(mut self, relevance: u32) -> Self {
        self.relevance = Some(relevance);
        self
    }

    pub fn contains<I, M>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ModeRef>,
    {
        self.contains.extend(modes.into_iter().map(Into::into));
        self
    }

    pub fn variants(mut self, variants: impl IntoIterator<Item = Mode>) -> Self {
        self.variants.extend(variants);
        self
    }

    pub fn starts(mut self, mode: impl Into<ModeRef>) -> Self {
        self.starts = Some(Box::new(mode.into()));
        self
    }

    pub fn sub_language(mut self, sub: impl Into<SubLanguage>) -> Self {
        self.sub_language = Some(sub.into());
        self
    }

    pub fn flag(mut self, flags: ModeFlags) -> Self {
        self.flags |= flags;
        self.cleared_flags.remove(flags);
        self
    }

    /// Remove `flags`, including ones a variant would inherit.
    pub fn unflag(mut self, flags: ModeFlags) -> Self {
        self.flags.remove(flags);
        self.cleared_flags |= flags;
        self
    }

    /// Copy of this mode with `variant`'s fields laid over it.
    ///
    /// Set fields in the variant win and a non-empty `contains` list replaces
    /// the parent's. Flags are united, minus the ones the variant clears.
    pub(crate) fn merged_with(&self, variant: &Mode) -> Mode {
        let mut merged = self.clone();
        merged.variants.clear();

        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if variant.$field.is_some() { merged.$field = variant.$field.clone(); })*
            };
        }
        overlay!(scope, begin, end, matches, illegal, begin_keywords, keywords, lexemes, relevance, starts, sub_language);

        if !variant.contains.is_empty() {
            merged.contains = variant.contains.clone();
        }
        merged.flags = merged.flags.union(variant.flags).difference(variant.cleared_flags);
        merged.cleared_flags = ModeFlags::empty();
        merged
    }

    /// Human-readable name for error messages.
    pub(crate) fn describe(&self) -> String {
        match (&self.scope, &self.begin, &self.matches) {
            (Some(scope), _, _) => format!("`{scope}`"),
            (None, Some(begin), _) | (None, None, Some(begin)) => format!("beginning with `{}`", begin.source()),
            _ => "<unnamed>".to_string(),
        }
    }
}

// --- Languages ---------------------------------------------------------------

/// A complete grammar: the root mode plus language-wide settings.
///
/// The root mode spans the whole input; its `begin`/`end` are ignored.
#[derive(Debug, Clone, Default)]
pub struct Language {
    pub name: String,
    pub aliases: Vec<String>,
    pub case_insensitive: bool,
    /// Skip this language during autodetection.
    pub disable_autodetect: bool,
    /// This language refines another and wins relevance ties against it.
    pub superset_of: Option<String>,
    /// Label renames applied when nodes are emitted.
    pub scope_aliases: HashMap<String, String>,
    pub keyword_weight: KeywordWeight,
    /// Modes reachable through [`ModeRef::Named`].
    pub repository: HashMap<String, Mode>,
    pub root: Mode,
}

impl Language {
    pub fn new(name: impl Into<String>) -> Self {
        Language { name: name.into(), ..Default::default() }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn disable_autodetect(mut self) -> Self {
        self.disable_autodetect = true;
        self
    }

    pub fn superset_of(mut self, base: impl Into<String>) -> Self {
        self.superset_of = Some(base.into());
        self
    }

    pub fn scope_alias(mut self, scope: impl Into<String>, renamed: impl Into<String>) -> Self {
        self.scope_aliases.insert(scope.into(), renamed.into());
        self
    }

    pub fn keyword_weight(mut self, weight: KeywordWeight) -> Self {
        self.keyword_weight = weight;
        self
    }

    pub fn keywords(mut self, keywords: impl Into<Keywords>) -> Self {
        self.root.keywords = Some(keywords.into());
        self
    }

    pub fn illegal(mut self, pattern: impl Into<Pattern>) -> Self {
        self.root.illegal = Some(pattern.into());
        self
    }

    pub fn contains<I, M>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ModeRef>,
    {
        self.root.contains.extend(modes.into_iter().map(Into::into));
        self
    }

    /// Add a named mode to the repository.
    pub fn define(mut self, name: impl Into<String>, mode: Mode) -> Self {
        self.repository.insert(name.into(), mode);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_patterns_are_escaped() {
        assert_eq!(Pattern::literal("a.b*").source(), r"a\.b\*");
        assert_eq!(Pattern::re("a.b*").source(), "a.b*");
    }

    #[test]
    fn either_flattens_into_one_alternation() {
        let p = Pattern::from(["@", "\\$"]);
        assert_eq!(p.source(), r"(?:@)|(?:\$)");
    }

    #[test]
    fn variant_fields_override_parent() {
        let base = Mode::new().scope("string").begin("'").end("'").relevance(2).flag(ModeFlags::EXCLUDE_BEGIN);
        let variant = Mode::new().begin("\"").end("\"").flag(ModeFlags::EXCLUDE_END);
        let merged = base.merged_with(&variant);

        assert_eq!(merged.scope.as_deref(), Some("string"));
        assert_eq!(merged.begin, Some(Pattern::re("\"")));
        assert_eq!(merged.relevance, Some(2));
        assert_eq!(merged.flags, ModeFlags::EXCLUDE_BEGIN | ModeFlags::EXCLUDE_END);
        assert!(merged.variants.is_empty());
    }

    #[test]
    fn variants_can_clear_inherited_flags() {
        let base = Mode::new().scope("string").begin("'").flag(ModeFlags::EXCLUDE_BEGIN | ModeFlags::EXCLUDE_END);
        let variant = Mode::new().begin("`").unflag(ModeFlags::EXCLUDE_END).flag(ModeFlags::SKIP);
        let merged = base.merged_with(&variant);

        assert_eq!(merged.flags, ModeFlags::EXCLUDE_BEGIN | ModeFlags::SKIP);
        assert!(merged.cleared_flags.is_empty());

        let plain = base.merged_with(&Mode::new().begin("\""));
        assert_eq!(plain.flags, ModeFlags::EXCLUDE_BEGIN | ModeFlags::EXCLUDE_END);
    }

    #[test]
    fn keyword_words_split_on_whitespace() {
        let k = Keywords::from("if  else\twhile");
        assert_eq!(k.categories, vec![("keyword".to_string(), vec!["if".into(), "else".into(), "while".into()])]);
    }

    #[test]
    fn mode_macro_sets_named_fields() {
        let m = crate::mode! {
            scope: "string",
            begin: "'",
            end: "'",
            contains: [Mode::new().begin("\\\\."), ModeRef::This],
            flags: ModeFlags::EXCLUDE_BEGIN | ModeFlags::EXCLUDE_END,
        };
        assert_eq!(m.scope.as_deref(), Some("string"));
        assert_eq!(m.contains.len(), 2);
        assert!(matches!(m.contains[1], ModeRef::This));
        assert!(m.flags.contains(ModeFlags::EXCLUDE_END));
    }
}
