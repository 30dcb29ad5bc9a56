use crate::engine::{
    self, CandidateScore, Emitter, IllegalLexeme, ScanEnv, ScanMetrics, ScanOutcome, TokenTree, TokenTreeEmitter,
};
use crate::error::{BoxError, HighlightError, RegistrationError};
use crate::grammar::common::CommonModes;
use crate::grammar::Language;
use crate::registry::Registry;
use crate::render::{escape_html, render_html};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::sync::Arc;

static DEFAULT_HIGHLIGHTER: Lazy<Highlighter> = Lazy::new(Highlighter::with_bundled_languages);

/// Options that affect highlighting and rendering.
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// let options: glint::Options = serde_json::from_str(r#"{"class_prefix": "x-", "strict": true}"#).unwrap();
/// assert_eq!(options.class_prefix, "x-");
/// assert!(options.tab_replace.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Prefix of every label class in rendered HTML.
    pub class_prefix: String,
    /// Replacement for tab characters in rendered HTML.
    pub tab_replace: Option<String>,
    /// Compile every grammar case-insensitively.
    pub case_insensitive: bool,
    /// Detection pool; `None` means every registered language.
    pub languages: Option<Vec<String>>,
    /// Raise on illegal input and on registration failures instead of
    /// degrading to plain text.
    pub strict: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options { class_prefix: "hl-".to_string(), tab_replace: None, case_insensitive: false, languages: None, strict: false }
    }
}

impl Options {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Result of [`Highlighter::highlight`] and of each detection candidate.
#[derive(Debug, Clone)]
pub struct HighlightResult {
    /// `None` when plain text won detection.
    pub language: Option<String>,
    /// The input.
    pub code: String,
    /// Rendered HTML.
    pub value: String,
    pub relevance: u32,
    /// Set when illegal input (or a recovered engine error) flattened the result.
    pub illegal: bool,
    pub tree: TokenTree,
    pub illegal_by: Option<IllegalLexeme>,
    /// Message of a recoverable engine error swallowed in permissive mode.
    pub error_raised: Option<String>,
    pub metrics: ScanMetrics,
}

/// Result of [`Highlighter::detect`].
#[derive(Debug, Clone)]
pub struct Detection {
    pub best: HighlightResult,
    pub second_best: Option<HighlightResult>,
    /// Every candidate's score, best first.
    pub ranking: Vec<CandidateScore>,
}

/// Input of [`Plugin::before_highlight`].
///
/// A plugin may rewrite `code` or `language`, or supply `result` to skip the
/// scan altogether.
#[derive(Debug, Clone)]
pub struct BeforeHighlight {
    pub code: String,
    pub language: String,
    pub result: Option<HighlightResult>,
}

/// A piece of code handled by [`Highlighter::highlight_block`].
#[derive(Debug, Clone, Default)]
pub struct CodeBlock {
    /// Explicit language; detected when `None`.
    pub language: Option<String>,
    pub code: String,
    pub result: Option<HighlightResult>,
}

impl CodeBlock {
    pub fn new(code: impl Into<String>) -> Self {
        CodeBlock { code: code.into(), ..Default::default() }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Hooks fired around scans and blocks. Every hook defaults to doing nothing.
pub trait Plugin: Send + Sync {
    fn before_highlight(&self, _context: &mut BeforeHighlight) {}
    fn after_highlight(&self, _result: &mut HighlightResult) {}
    fn before_block(&self, _block: &mut CodeBlock) {}
    fn after_block(&self, _block: &mut CodeBlock) {}
}

// --- Highlighter -------------------------------------------------------------

/// A registry of grammars plus options and plugins.
///
/// Register everything first; afterwards a `&Highlighter` can be shared
/// across threads and used for any number of concurrent scans.
pub struct Highlighter {
    registry: Registry,
    options: Options,
    plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for Highlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Highlighter")
            .field("languages", &self.registry.names())
            .field("options", &self.options)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    /// An empty highlighter with default options.
    pub fn new() -> Self {
        Highlighter { registry: Registry::new(), options: Options::default(), plugins: Vec::new() }
    }

    /// A highlighter with every grammar in [`crate::languages`] registered.
    pub fn with_bundled_languages() -> Self {
        let mut highlighter = Self::new();
        for &(name, factory) in crate::languages::BUNDLED {
            if let Err(error) = highlighter.register_language(name, |common| Ok::<_, BoxError>(factory(common))) {
                tracing::warn!(%error, "bundled language failed to register");
            }
        }
        highlighter
    }

    /// Replace the options. Changing `case_insensitive` recompiles every grammar.
    pub fn configure(&mut self, options: Options) {
        self.registry.set_case_insensitive(options.case_insensitive);
        self.options = options;
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn register_language<F, E>(&mut self, name: &str, factory: F) -> Result<(), RegistrationError>
    where
        F: FnOnce(&CommonModes) -> Result<Language, E>,
        E: Into<BoxError>,
    {
        self.registry.register(name, factory, self.options.strict).map(|_| ())
    }

    pub fn register_aliases<S: AsRef<str>>(&mut self, aliases: &[S], language: &str) {
        self.registry.register_aliases(aliases, language);
    }

    pub fn unregister_language(&mut self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    pub fn get_language(&self, name: &str) -> Option<Arc<engine::CompiledLanguage>> {
        self.registry.get(name)
    }

    pub fn list_languages(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn add_plugin(&mut self, plugin: impl Plugin + 'static) {
        self.plugins.push(Box::new(plugin));
    }

    fn env(&self) -> ScanEnv<'_> {
        ScanEnv { registry: &self.registry, pool: self.options.languages.as_deref(), strict: self.options.strict }
    }

    /// Highlight `code` as `language`.
    ///
    /// With `ignore_illegals`, text matching a mode's `illegal` pattern is kept
    /// as plain text. Otherwise illegal input flattens the result (permissive)
    /// or fails with [`HighlightError::IllegalLexeme`] (strict).
    pub fn highlight(&self, language: &str, code: &str, ignore_illegals: bool) -> Result<HighlightResult, HighlightError> {
        let mut context = BeforeHighlight { code: code.to_string(), language: language.to_string(), result: None };
        for plugin in &self.plugins {
            plugin.before_highlight(&mut context);
        }

        let mut result = match context.result.take() {
            Some(result) => result,
            None => self.highlight_unhooked(&context.language, &context.code, ignore_illegals)?,
        };
        for plugin in &self.plugins {
            plugin.after_highlight(&mut result);
        }
        Ok(result)
    }

    fn highlight_unhooked(&self, language: &str, code: &str, ignore_illegals: bool) -> Result<HighlightResult, HighlightError> {
        let compiled = self.registry.get(language).ok_or_else(|| HighlightError::UnknownLanguage(language.to_string()))?;
        let name = Some(compiled.name().to_string());

        match engine::scan(self.env(), &compiled, code, ignore_illegals, TokenTreeEmitter::new()) {
            Ok(ScanOutcome::Complete(scan)) => Ok(self.finish(name, code, scan.tree, scan.relevance, scan.metrics)),
            Ok(ScanOutcome::Illegal(illegal)) if self.options.strict => Err(illegal.into()),
            Ok(ScanOutcome::Illegal(illegal)) => {
                tracing::warn!(language, lexeme = %illegal.lexeme, index = illegal.index, "illegal lexeme; returning plain text");
                Ok(HighlightResult { illegal: true, illegal_by: Some(illegal), ..self.flattened(name, code) })
            }
            Err(error) if error.is_recoverable() && !self.options.strict => {
                tracing::warn!(language, %error, "scan failed; returning plain text");
                Ok(HighlightResult { illegal: true, error_raised: Some(error.to_string()), ..self.flattened(name, code) })
            }
            Err(error) => Err(error),
        }
    }

    /// Scan with a caller-supplied emitter, bypassing rendering and plugins.
    pub fn scan_with<E: Emitter>(
        &self,
        language: &str,
        code: &str,
        ignore_illegals: bool,
        emitter: E,
    ) -> Result<ScanOutcome, HighlightError> {
        let compiled = self.registry.get(language).ok_or_else(|| HighlightError::UnknownLanguage(language.to_string()))?;
        engine::scan(self.env(), &compiled, code, ignore_illegals, emitter)
    }

    /// Guess the language of `code`.
    ///
    /// Candidates are `subset`, else the configured pool, else every
    /// registered language. Plain text (relevance 0) is always a candidate.
    pub fn detect<S: AsRef<str>>(&self, code: &str, subset: Option<&[S]>) -> Result<Detection, HighlightError> {
        let subset: Option<Vec<String>> = subset.map(|names| names.iter().map(|n| n.as_ref().to_string()).collect());

        let candidates = match engine::detect::rank(self.env(), code, subset.as_deref()) {
            Ok(candidates) => candidates,
            Err(error) if error.is_recoverable() && !self.options.strict => {
                tracing::warn!(%error, "detection failed; returning plain text");
                let best = HighlightResult { error_raised: Some(error.to_string()), ..self.flattened(None, code) };
                return Ok(Detection { best, second_best: None, ranking: Vec::new() });
            }
            Err(error) => return Err(error),
        };

        let ranking = candidates.iter().map(|c| c.score()).collect();
        let mut results = candidates.into_iter().take(2).map(|c| {
            let result = self.finish(c.language, code, c.tree, c.relevance, c.metrics);
            let illegal = c.illegal.is_some() || c.error.is_some();
            HighlightResult { illegal, illegal_by: c.illegal, error_raised: c.error, ..result }
        });
        let best = results.next().unwrap_or_else(|| self.flattened(None, code));
        let second_best = results.next();
        Ok(Detection { best, second_best, ranking })
    }

    /// Highlight a block: detect its language when none is given, firing the
    /// block hooks around the work. Illegal input is ignored.
    pub fn highlight_block(&self, block: &mut CodeBlock) -> Result<(), HighlightError> {
        for plugin in &self.plugins {
            plugin.before_block(block);
        }

        let result = match &block.language {
            Some(language) => self.highlight(language, &block.code, true)?,
            None => self.detect::<&str>(&block.code, None)?.best,
        };
        block.result = Some(result);

        for plugin in &self.plugins {
            plugin.after_block(block);
        }
        Ok(())
    }

    fn finish(&self, language: Option<String>, code: &str, tree: TokenTree, relevance: u32, metrics: ScanMetrics) -> HighlightResult {
        let value = self.expand_tabs(render_html(&tree, &self.options.class_prefix));
        HighlightResult {
            language,
            code: code.to_string(),
            value,
            relevance,
            illegal: false,
            tree,
            illegal_by: None,
            error_raised: None,
            metrics,
        }
    }

    /// The whole input as one escaped text leaf, relevance 0.
    fn flattened(&self, language: Option<String>, code: &str) -> HighlightResult {
        HighlightResult {
            language,
            code: code.to_string(),
            value: self.expand_tabs(escape_html(code)),
            relevance: 0,
            illegal: false,
            tree: TokenTree::plain(code),
            illegal_by: None,
            error_raised: None,
            metrics: ScanMetrics::default(),
        }
    }

    fn expand_tabs(&self, value: String) -> String {
        match &self.options.tab_replace {
            Some(replacement) if value.contains('\t') => value.replace('\t', replacement),
            _ => value,
        }
    }
}

// --- Process-wide default ----------------------------------------------------

/// The shared highlighter with the bundled grammars.
pub fn highlighter() -> &'static Highlighter {
    &DEFAULT_HIGHLIGHTER
}

/// Highlight with the shared highlighter, ignoring illegal input.
pub fn highlight(language: &str, code: &str) -> Result<HighlightResult, HighlightError> {
    highlighter().highlight(language, code, true)
}

/// Detect and highlight with the shared highlighter.
pub fn highlight_auto(code: &str) -> Result<Detection, HighlightError> {
    highlighter().detect::<&str>(code, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Keywords, Mode};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tiny() -> Highlighter {
        let mut h = Highlighter::new();
        h.register_language("tiny", |common| {
            Ok::<_, Infallible>(
                Language::new("tiny")
                    .alias("t")
                    .keywords(Keywords::from("if else"))
                    .illegal("@")
                    .contains([common.apos_string.clone(), Mode::new().begin("\t")]),
            )
        })
        .unwrap();
        h
    }

    #[test]
    fn renders_html_with_the_configured_prefix() {
        let mut h = tiny();
        h.configure(Options { class_prefix: "x-".into(), ..Options::default() });
        let result = h.highlight("t", "if '<'", false).unwrap();
        assert_eq!(result.language.as_deref(), Some("tiny"));
        assert_eq!(result.value, r#"<span class="x-keyword">if</span> <span class="x-string">&#x27;&lt;&#x27;</span>"#);
    }

    #[test]
    fn tab_replace_applies_to_rendered_output_only() {
        let mut h = tiny();
        h.configure(Options { tab_replace: Some("    ".into()), ..Options::default() });
        let result = h.highlight("tiny", "a\tb", false).unwrap();
        assert_eq!(result.value, "a    b");
        assert_eq!(result.tree.text(), "a\tb");
    }

    #[test]
    fn languages_are_listed_and_found_by_name_or_alias() {
        let mut h = tiny();
        assert_eq!(h.list_languages(), vec!["tiny"]);
        assert_eq!(h.get_language("T").map(|l| l.name().to_string()).as_deref(), Some("tiny"));

        h.register_aliases(&["mini"], "tiny");
        assert!(h.get_language("mini").is_some());
        assert!(h.unregister_language("tiny"));
        assert!(h.list_languages().is_empty());
        assert!(h.get_language("mini").is_none());
    }

    #[test]
    fn unknown_language_is_an_error() {
        assert!(matches!(tiny().highlight("nope", "x", false), Err(HighlightError::UnknownLanguage(n)) if n == "nope"));
    }

    #[test]
    fn illegal_input_degrades_or_raises() {
        let mut h = tiny();
        let result = h.highlight("tiny", "a @ <b>", false).unwrap();
        assert!(result.illegal);
        assert_eq!(result.relevance, 0);
        assert_eq!(result.value, "a @ &lt;b&gt;");
        assert_eq!(result.illegal_by.as_ref().map(|i| i.index), Some(2));

        let ignored = h.highlight("tiny", "a @ b", true).unwrap();
        assert!(!ignored.illegal);
        assert_eq!(ignored.tree.text(), "a @ b");

        h.configure(Options { strict: true, ..Options::default() });
        assert!(matches!(h.highlight("tiny", "a @ b", false), Err(HighlightError::IllegalLexeme { index: 2, .. })));
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Plugin for Counting {
        fn before_highlight(&self, context: &mut BeforeHighlight) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            context.code = context.code.to_uppercase();
        }

        fn after_highlight(&self, result: &mut HighlightResult) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            result.value.push_str("<!-- done -->");
        }

        fn before_block(&self, block: &mut CodeBlock) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            block.language.get_or_insert_with(|| "tiny".to_string());
        }

        fn after_block(&self, _block: &mut CodeBlock) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn plugins_see_and_rewrite_every_stage() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut h = tiny();
        h.add_plugin(Counting { calls: calls.clone() });

        let result = h.highlight("tiny", "else", false).unwrap();
        assert_eq!(result.code, "ELSE");
        assert!(result.value.ends_with("<!-- done -->"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let mut block = CodeBlock::new("if");
        h.highlight_block(&mut block).unwrap();
        assert_eq!(block.language.as_deref(), Some("tiny"));
        assert_eq!(block.result.as_ref().map(|r| r.relevance), Some(0));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    struct Canned;

    impl Plugin for Canned {
        fn before_highlight(&self, context: &mut BeforeHighlight) {
            let h = Highlighter::new();
            context.result = Some(h.flattened(Some("canned".into()), &context.code));
        }
    }

    #[test]
    fn before_highlight_may_supply_the_result() {
        let mut h = tiny();
        h.add_plugin(Canned);
        let result = h.highlight("missing-language", "x", false).unwrap();
        assert_eq!(result.language.as_deref(), Some("canned"));
    }

    #[test]
    fn blocks_without_language_are_detected() {
        let mut block = CodeBlock::new("if 'a' else");
        tiny().highlight_block(&mut block).unwrap();
        let result = block.result.unwrap();
        assert_eq!(result.language.as_deref(), Some("tiny"));
        assert!(result.relevance >= 3);
    }

    #[test]
    fn options_load_from_json_with_defaults() {
        let options = Options::from_json(r#"{"languages": ["json"], "case_insensitive": true}"#).unwrap();
        assert_eq!(options.class_prefix, "hl-");
        assert_eq!(options.languages, Some(vec!["json".to_string()]));
        assert!(options.case_insensitive);
        assert!(Options::from_json(r#"{"class_prefix": 3}"#).is_err());
    }

    #[test]
    fn default_highlighter_carries_the_bundled_grammars() {
        let names = highlighter().list_languages();
        assert!(names.contains(&"json") && names.contains(&"ini"));
        let result = highlight("json", r#"{"a": 1}"#).unwrap();
        assert_eq!(result.tree.text(), r#"{"a": 1}"#);
        assert!(highlight_auto("[1, 2]").is_ok());
    }
}
