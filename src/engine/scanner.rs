//! The scanning state machine.
//!
//! A scan walks the input once. At every step the mode on top of the stack
//! asks its combined matcher for the next interesting lexeme; the text before
//! it accumulates in a shared buffer that is flushed (as keywords, plain text
//! or an embedded-language scan) whenever the mode stack changes.
//!
//! ```text
//! input ── matcher.exec(top) ──> Lexeme ─┬─ Begin(child) ── do_begin ── push
//!   ^                                    ├─ End ─────────── do_end ──── pop (cascade)
//!   │                                    ├─ Illegal ─────── abort (or text when ignored)
//!   └──────── index += consumed ─────────┘
//!
//! no more lexemes: flush buffer, close every open mode, finalize emitter
//! ```
//!
//! ## Guarantees
//!
//! - Text preservation: every byte of the input reaches the emitter exactly
//!   once, in order. Unclaimed empty lexemes advance by one character and keep
//!   that character.
//! - Balance: every labeled mode pushed opens one node; every pop (including
//!   the implicit ones at end of input) closes one.
//! - Termination: a begin followed by an empty end at the same offset is
//!   reported as [`HighlightError::ZeroWidthMatch`]; a loop that stops making
//!   progress trips [`HighlightError::RunawayScan`].
//!
//! Set `GLINT_LOG=glint=trace` to follow every accepted begin and end.

use super::compiled_modes::{CompiledLanguage, ModeId, ROOT};
use super::detect;
use super::emitter::{Emitter, TokenTree, TokenTreeEmitter};
use super::metrics::ScanMetrics;
use super::multi_regex::{Cursor, Lexeme, MatchKind, next_char_boundary};
use crate::error::HighlightError;
use crate::grammar::{ModeFlags, SubLanguage};
use crate::registry::Registry;
use std::collections::HashMap;

/// A keyword stops earning relevance after this many hits in one scan.
const MAX_KEYWORD_HITS: u32 = 7;

/// Iterations allowed before the progress check applies.
const MAX_ITERATIONS: usize = 100_000;

/// Characters of input kept on each side of an illegal lexeme.
const CONTEXT_CHARS: usize = 100;

/// Read-only environment shared by a scan and its embedded scans.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScanEnv<'a> {
    pub registry: &'a Registry,
    /// Detection pool used when an embedded mode names no candidates.
    pub pool: Option<&'a [String]>,
    /// Propagate a detection candidate's scan error instead of scoring it 0.
    pub strict: bool,
}

/// A completed scan.
#[derive(Debug, Clone)]
pub struct Scan {
    pub tree: TokenTree,
    pub relevance: u32,
    pub metrics: ScanMetrics,
}

/// Where and why a scan stopped on illegal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalLexeme {
    pub lexeme: String,
    /// Label of the innermost open mode, if it has one.
    pub scope: Option<String>,
    pub index: usize,
    /// Input surrounding the lexeme.
    pub context: String,
}

impl From<IllegalLexeme> for HighlightError {
    fn from(illegal: IllegalLexeme) -> Self {
        HighlightError::IllegalLexeme {
            lexeme: illegal.lexeme,
            scope: illegal.scope,
            index: illegal.index,
            context: illegal.context,
        }
    }
}

/// Result of a scan that did not hit a broken-grammar condition.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Complete(Scan),
    /// An `illegal` pattern matched and illegals were not ignored.
    Illegal(IllegalLexeme),
}

/// Scan `code` with `language`, reporting events to `emitter`.
#[tracing::instrument(level = "debug", skip_all, fields(language = %language.name(), len = code.len()))]
pub(crate) fn scan<E: Emitter>(
    env: ScanEnv<'_>,
    language: &CompiledLanguage,
    code: &str,
    ignore_illegals: bool,
    emitter: E,
) -> Result<ScanOutcome, HighlightError> {
    let scanner = Scanner {
        env,
        language,
        code,
        ignore_illegals,
        emitter,
        stack: vec![Frame { mode: ROOT, cursor: Cursor::default(), begin_capture: None }],
        buffer: String::new(),
        relevance: 0,
        keyword_hits: HashMap::new(),
        last_match: None,
        resume: false,
        metrics: ScanMetrics::default(),
    };
    scanner.run()
}

// --- Scanner -----------------------------------------------------------------

#[derive(Debug)]
struct Frame {
    mode: ModeId,
    cursor: Cursor,
    /// What the end must repeat (`END_SAME_AS_BEGIN` only).
    begin_capture: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct LastMatch {
    begin: bool,
    index: usize,
}

enum Step {
    Advance(usize),
    Illegal(IllegalLexeme),
    /// Nothing left to consume.
    Exhausted,
}

struct Scanner<'a, E: Emitter> {
    env: ScanEnv<'a>,
    language: &'a CompiledLanguage,
    code: &'a str,
    ignore_illegals: bool,
    emitter: E,
    /// `stack[0]` is the root and is never popped.
    stack: Vec<Frame>,
    buffer: String,
    relevance: u32,
    keyword_hits: HashMap<String, u32>,
    last_match: Option<LastMatch>,
    resume: bool,
    metrics: ScanMetrics,
}

impl<'a, E: Emitter> Scanner<'a, E> {
    fn run(mut self) -> Result<ScanOutcome, HighlightError> {
        let language = self.language;
        let code = self.code;
        let mut index = 0;

        loop {
            self.metrics.iterations += 1;
            let resume = std::mem::take(&mut self.resume);
            let Some(top) = self.stack.last_mut() else { break };
            if !resume {
                top.cursor.consider_all();
            }
            let Some(lexeme) = language.mode(top.mode).matcher.exec(&mut top.cursor, code, index)? else { break };

            let before = &code[index..lexeme.start];
            match self.process_lexeme(before, &lexeme)? {
                Step::Advance(consumed) => index = lexeme.start + consumed,
                Step::Illegal(illegal) => {
                    tracing::debug!(lexeme = %illegal.lexeme, index = illegal.index, "illegal lexeme");
                    return Ok(ScanOutcome::Illegal(illegal));
                }
                Step::Exhausted => {
                    index = lexeme.start;
                    break;
                }
            }

            if self.metrics.iterations > MAX_ITERATIONS && self.metrics.iterations > index * 3 {
                return Err(HighlightError::RunawayScan { iterations: self.metrics.iterations, offset: index });
            }
        }

        self.buffer.push_str(&code[index..]);
        self.process_buffer()?;
        while self.stack.len() > 1 {
            self.pop_frame();
        }

        Ok(ScanOutcome::Complete(Scan { tree: self.emitter.finalize(), relevance: self.relevance, metrics: self.metrics }))
    }

    fn top_mode(&self) -> ModeId {
        self.stack.last().map_or(ROOT, |f| f.mode)
    }

    fn process_lexeme(&mut self, before: &str, lexeme: &Lexeme) -> Result<Step, HighlightError> {
        let code = self.code;
        let text = lexeme.text(code);
        self.buffer.push_str(before);

        let is_end = lexeme.kind == MatchKind::End;
        if let Some(last) = self.last_match {
            if last.begin && is_end && last.index == lexeme.start && text.is_empty() {
                let scope = self.language.mode(self.top_mode()).scope.clone();
                return Err(HighlightError::ZeroWidthMatch { index: lexeme.start, scope });
            }
        }
        self.last_match = Some(LastMatch { begin: matches!(lexeme.kind, MatchKind::Begin(_)), index: lexeme.start });

        match lexeme.kind {
            MatchKind::Begin(child) => return self.do_begin(child, lexeme),
            MatchKind::Illegal if !self.ignore_illegals => return Ok(Step::Illegal(self.illegal(lexeme))),
            MatchKind::End => {
                if let Some(step) = self.do_end(lexeme)? {
                    return Ok(step);
                }
            }
            MatchKind::Illegal => {}
        }

        // Nobody claimed the lexeme: it is plain text of the current mode.
        if text.is_empty() {
            return Ok(self.keep_one_char(lexeme.start));
        }
        self.buffer.push_str(text);
        Ok(Step::Advance(text.len()))
    }

    fn keep_one_char(&mut self, at: usize) -> Step {
        let next = next_char_boundary(self.code, at);
        if next == at {
            return Step::Exhausted;
        }
        self.buffer.push_str(&self.code[at..next]);
        Step::Advance(next - at)
    }

    fn do_begin(&mut self, child: ModeId, lexeme: &Lexeme) -> Result<Step, HighlightError> {
        let mode = self.language.mode(child);
        let text = lexeme.text(self.code);

        if mode.skip_after_dot && self.code[..lexeme.start].ends_with('.') {
            let resuming = self.stack.last().is_some_and(|f| f.cursor.resuming());
            if !resuming {
                return Ok(self.keep_one_char(lexeme.start));
            }
            self.resume = true;
            return Ok(Step::Advance(0));
        }

        if mode.has(ModeFlags::SKIP) {
            self.buffer.push_str(text);
        } else {
            if mode.has(ModeFlags::EXCLUDE_BEGIN) {
                self.buffer.push_str(text);
            }
            self.process_buffer()?;
            if !mode.has(ModeFlags::RETURN_BEGIN) && !mode.has(ModeFlags::EXCLUDE_BEGIN) {
                self.buffer.push_str(text);
            }
        }

        self.start_mode(child, Some(lexeme));
        Ok(Step::Advance(if mode.has(ModeFlags::RETURN_BEGIN) { 0 } else { text.len() }))
    }

    fn start_mode(&mut self, id: ModeId, lexeme: Option<&Lexeme>) {
        let mode = self.language.mode(id);
        if let Some(scope) = &mode.scope {
            self.emitter.open_node(scope);
        }
        if !mode.has(ModeFlags::SKIP) && mode.sub_language.is_none() {
            self.relevance += mode.relevance;
        }

        let begin_capture = match lexeme {
            Some(lexeme) if mode.has(ModeFlags::END_SAME_AS_BEGIN) => {
                Some(lexeme.group(self.code, 1).unwrap_or_else(|| lexeme.text(self.code)).to_string())
            }
            _ => None,
        };
        self.stack.push(Frame { mode: id, cursor: Cursor::default(), begin_capture });

        self.metrics.begins += 1;
        self.metrics.max_depth = self.metrics.max_depth.max(self.stack.len() - 1);
        tracing::trace!(mode = id, scope = ?mode.scope, index = lexeme.map(|l| l.start), "begin");
    }

    fn do_end(&mut self, lexeme: &Lexeme) -> Result<Option<Step>, HighlightError> {
        let Some(target) = self.end_of_mode(self.stack.len() - 1, lexeme.start)? else { return Ok(None) };
        let origin = self.language.mode(self.top_mode());
        let text = lexeme.text(self.code);

        if origin.has(ModeFlags::SKIP) {
            self.buffer.push_str(text);
        } else {
            if !origin.has(ModeFlags::RETURN_END) && !origin.has(ModeFlags::EXCLUDE_END) {
                self.buffer.push_str(text);
            }
            self.process_buffer()?;
            if origin.has(ModeFlags::EXCLUDE_END) {
                self.buffer.push_str(text);
            }
        }

        let ended = self.stack[target].mode;
        let popped = self.stack.len() - target;
        while self.stack.len() > target {
            self.pop_frame();
        }
        self.metrics.ends += popped;
        tracing::trace!(mode = ended, popped, index = lexeme.start, "end");

        if let Some(next) = self.language.mode(ended).starts {
            self.start_mode(next, Some(lexeme));
        }
        Ok(Some(Step::Advance(if origin.has(ModeFlags::RETURN_END) { 0 } else { text.len() })))
    }

    /// Stack depth of the mode ended by an end lexeme at `index`, if any.
    ///
    /// The innermost mode whose own end matches at `index` is the one that
    /// ends. A mode whose own end does not match hands over to its parent
    /// when it `ENDS_WITH_PARENT`; a matching mode that `ENDS_PARENT` takes
    /// its parents with it (never the root).
    fn end_of_mode(&self, mut depth: usize, index: usize) -> Result<Option<usize>, HighlightError> {
        let rest = &self.code[index..];
        while depth > 0 {
            let frame = &self.stack[depth];
            let mode = self.language.mode(frame.mode);

            // `end_re` is anchored, so a miss costs no scan of the remainder.
            if let Some(end_re) = &mode.end_re {
                if let Some(caps) = end_re.captures(rest)? {
                    let at_index = caps.get(0).is_some_and(|m| m.start() == 0);
                    let same_as_begin = !mode.has(ModeFlags::END_SAME_AS_BEGIN) || {
                        let captured = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
                        captured == frame.begin_capture.as_deref()
                    };
                    if at_index && same_as_begin {
                        let mut target = depth;
                        while target > 1 && self.language.mode(self.stack[target].mode).has(ModeFlags::ENDS_PARENT) {
                            target -= 1;
                        }
                        return Ok(Some(target));
                    }
                }
            }

            if !mode.has(ModeFlags::ENDS_WITH_PARENT) {
                break;
            }
            depth -= 1;
        }
        Ok(None)
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.stack.pop() {
            if self.language.mode(frame.mode).scope.is_some() {
                self.emitter.close_node();
            }
        }
    }

    fn illegal(&self, lexeme: &Lexeme) -> IllegalLexeme {
        let code = self.code;
        let mut start = lexeme.start.saturating_sub(CONTEXT_CHARS);
        while !code.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = (lexeme.end + CONTEXT_CHARS).min(code.len());
        while !code.is_char_boundary(end) {
            end += 1;
        }
        IllegalLexeme {
            lexeme: lexeme.text(code).to_string(),
            scope: self.language.mode(self.top_mode()).scope.clone(),
            index: lexeme.start,
            context: code[start..end].to_string(),
        }
    }

    // --- Buffer flushing ------------------------------------------------------

    fn process_buffer(&mut self) -> Result<(), HighlightError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffer = std::mem::take(&mut self.buffer);
        let mode = self.language.mode(self.top_mode());
        match &mode.sub_language {
            Some(sub) => self.process_sub_language(sub, mode.relevance, &buffer),
            None => self.process_keywords(self.top_mode(), &buffer),
        }
    }

    fn process_keywords(&mut self, id: ModeId, buffer: &str) -> Result<(), HighlightError> {
        let mode = self.language.mode(id);
        let (Some(table), Some(keyword_re)) = (&mode.keywords, &mode.keyword_re) else {
            self.emitter.add_text(buffer);
            return Ok(());
        };

        let case_insensitive = self.language.case_insensitive();
        let mut last = 0;
        for found in keyword_re.find_iter(buffer) {
            let found = found?;
            let word = found.as_str();
            let Some(entry) = table.lookup(word) else { continue };

            self.emitter.add_text(&buffer[last..found.start()]);
            let key = if case_insensitive { word.to_lowercase() } else { word.to_string() };
            let hits = self.keyword_hits.entry(key).or_default();
            *hits += 1;
            if *hits <= MAX_KEYWORD_HITS {
                self.relevance += entry.relevance;
            }
            self.metrics.keyword_hits += 1;

            if entry.is_hidden() {
                self.emitter.add_text(word);
            } else {
                self.emitter.open_node(&entry.category);
                self.emitter.add_text(word);
                self.emitter.close_node();
            }
            last = found.end();
        }
        self.emitter.add_text(&buffer[last..]);
        Ok(())
    }

    fn process_sub_language(&mut self, sub: &SubLanguage, mode_relevance: u32, buffer: &str) -> Result<(), HighlightError> {
        let (tree, relevance, language, metrics) = match sub {
            SubLanguage::One(name) => {
                let Some(inner) = self.env.registry.get(name) else {
                    self.emitter.add_text(buffer);
                    return Ok(());
                };
                match scan(self.env, &inner, buffer, true, TokenTreeEmitter::new())? {
                    ScanOutcome::Complete(scan) => (scan.tree, scan.relevance, Some(inner.name().to_string()), scan.metrics),
                    ScanOutcome::Illegal(_) => (TokenTree::plain(buffer), 0, Some(inner.name().to_string()), ScanMetrics::default()),
                }
            }
            SubLanguage::Any(names) => {
                let subset = (!names.is_empty()).then_some(names.as_slice());
                let best = detect::rank(self.env, buffer, subset)?.into_iter().next();
                match best {
                    Some(candidate) => (candidate.tree, candidate.relevance, candidate.language, candidate.metrics),
                    None => (TokenTree::plain(buffer), 0, None, ScanMetrics::default()),
                }
            }
        };

        if mode_relevance > 0 {
            self.relevance += relevance;
        }
        self.metrics.absorb(&metrics);
        self.emitter.add_sublanguage(tree, language.as_deref());
        Ok(())
    }
}
