//! Grammar compilation.
//!
//! This module holds the *static* side of the engine: turning an authored
//! [`Language`] into the canonical, read-only [`CompiledLanguage`] the scanner
//! runs on.
//!
//! Compilation is split into two phases:
//!
//! 1. **Desugar and lay out** (`Compiler::fill`): every reachable mode is
//!    expanded (variants), desugared (`matches`, `begin_keywords`), validated,
//!    and placed in an arena. A mode's own fields are settled before its
//!    children are visited, because a child's end terminator may inherit its
//!    parent's (`ENDS_WITH_PARENT`).
//! 2. **Build matchers** (`Compiler::finish`): once the arena is complete, each
//!    mode gets a [`ResumableMatcher`] over its children's begins, its own
//!    terminator and its `illegal` pattern.
//!
//! ```text
//! Language ── root ── contains ── Inline(string) ── contains ── This
//!                 \
//!                  Named("array") ──> repository["array"]
//!
//!   modes: [ 0: root | 1: string | 2: array | ... ]     ModeId = index
//!   0.contains = [1, 2]   1.contains = [1]   2.contains = [2, 1]
//! ```
//!
//! ## Invariants
//!
//! - `ModeId` indexes `CompiledLanguage::modes`; [`ROOT`] is always present.
//! - Compiled languages are immutable after `compile` returns. The only
//!   interior state is lazily built partial matchers, which live in
//!   thread-safe `OnceCell`s.
//! - `ModeRef::Inline` is compiled afresh at every use site (value
//!   semantics). `ModeRef::Named` is compiled once per language, or once per
//!   parent when its end depends on the parent's terminator.

use super::keywords::KeywordTable;
use super::multi_regex::{MatchKind, ResumableMatcher};
use crate::error::CompileError;
use crate::grammar::{Keywords, Language, Mode, ModeFlags, ModeRef, Pattern, SubLanguage};
use std::collections::{HashMap, HashSet};

/// Index of a mode in [`CompiledLanguage::modes`].
pub(crate) type ModeId = usize;

/// The mode spanning the whole input.
pub(crate) const ROOT: ModeId = 0;

/// End pattern of a rule that declares none: matches at the next position.
const BOUNDARY: &str = r"\B|\b";

const DEFAULT_KEYWORD_PATTERN: &str = r"\w+";

/// Compile `source` the way every grammar pattern is compiled.
///
/// `^`/`$` match at line boundaries; `case_insensitive` adds the `i` flag.
pub(crate) fn lang_re(source: &str, case_insensitive: bool) -> Result<fancy_regex::Regex, CompileError> {
    let flags = if case_insensitive { "(?mi)" } else { "(?m)" };
    fancy_regex::Regex::new(&format!("{flags}{source}"))
        .map_err(|e| CompileError::InvalidPattern { pattern: source.to_string(), source: Box::new(e) })
}

/// Like [`lang_re`], but the match must start at the beginning of the haystack.
fn anchored_re(source: &str, case_insensitive: bool) -> Result<fancy_regex::Regex, CompileError> {
    let flags = if case_insensitive { "(?mi)" } else { "(?m)" };
    fancy_regex::Regex::new(&format!(r"{flags}\A(?:{source})"))
        .map_err(|e| CompileError::InvalidPattern { pattern: source.to_string(), source: Box::new(e) })
}

// --- Compiled form -----------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct CompiledMode {
    pub scope: Option<String>,
    pub flags: ModeFlags,
    pub relevance: u32,
    pub parent: Option<ModeId>,
    /// Source of the begin pattern (`None` only for the root).
    pub begin: Option<String>,
    /// This mode's own end, without inherited alternatives, anchored at the
    /// start of the haystack.
    pub end_re: Option<fancy_regex::Regex>,
    /// Own end plus the parent's terminator when `ENDS_WITH_PARENT`.
    pub terminator_end: Option<String>,
    pub illegal: Option<String>,
    pub keywords: Option<KeywordTable>,
    pub keyword_re: Option<fancy_regex::Regex>,
    /// Reject a begin match directly preceded by `.` (`begin_keywords`).
    pub skip_after_dot: bool,
    pub contains: Vec<ModeId>,
    pub starts: Option<ModeId>,
    pub sub_language: Option<SubLanguage>,
    pub matcher: ResumableMatcher,
}

impl CompiledMode {
    pub fn has(&self, flag: ModeFlags) -> bool {
        self.flags.contains(flag)
    }
}

/// A language ready to scan with. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct CompiledLanguage {
    name: String,
    case_insensitive: bool,
    disable_autodetect: bool,
    superset_of: Option<String>,
    pub(crate) modes: Vec<CompiledMode>,
}

impl CompiledLanguage {
    /// Compile `language`. `force_case_insensitive` overrides the grammar's
    /// own setting.
    pub fn compile(language: &Language, force_case_insensitive: bool) -> Result<Self, CompileError> {
        let case_insensitive = language.case_insensitive || force_case_insensitive;
        let mut compiler = Compiler {
            language,
            case_insensitive,
            modes: Vec::new(),
            origins: Vec::new(),
            named: HashMap::new(),
        };

        if language.root.contains.iter().any(|m| matches!(m, ModeRef::This)) {
            return Err(CompileError::TopLevelSelfReference(language.name.clone()));
        }

        let root = compiler.alloc(None, None);
        let mut root_mode = language.root.clone();
        root_mode.variants.clear();
        compiler.fill(root, root_mode)?;
        let modes = compiler.finish()?;

        let keywords: usize = modes.iter().filter_map(|m| m.keywords.as_ref()).map(KeywordTable::len).sum();
        tracing::debug!(language = %language.name, modes = modes.len(), keywords, case_insensitive, "compiled language");

        Ok(CompiledLanguage {
            name: language.name.clone(),
            case_insensitive,
            disable_autodetect: language.disable_autodetect,
            superset_of: language.superset_of.clone(),
            modes,
        })
    }

    /// A language with no rules at all: every input is one text leaf.
    pub fn plaintext(name: impl Into<String>) -> Self {
        let root = CompiledMode { relevance: 0, ..Default::default() };
        CompiledLanguage {
            name: name.into(),
            case_insensitive: false,
            disable_autodetect: true,
            superset_of: None,
            modes: vec![root],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn disable_autodetect(&self) -> bool {
        self.disable_autodetect
    }

    pub fn superset_of(&self) -> Option<&str> {
        self.superset_of.as_deref()
    }

    /// Number of modes in the arena, root included.
    pub fn mode_count(&self) -> usize {
        self.modes.len()
    }

    pub(crate) fn mode(&self, id: ModeId) -> &CompiledMode {
        &self.modes[id]
    }
}

// --- Compiler ----------------------------------------------------------------

type NamedKey = (String, Option<ModeId>);

struct Compiler<'l> {
    language: &'l Language,
    case_insensitive: bool,
    modes: Vec<CompiledMode>,
    /// Repository key each mode was compiled under, if any.
    origins: Vec<Option<NamedKey>>,
    named: HashMap<NamedKey, Vec<ModeId>>,
}

impl<'l> Compiler<'l> {
    fn alloc(&mut self, parent: Option<ModeId>, origin: Option<NamedKey>) -> ModeId {
        self.modes.push(CompiledMode { parent, ..Default::default() });
        self.origins.push(origin);
        self.modes.len() - 1
    }

    /// Resolve a `contains`/`starts` entry to arena ids.
    ///
    /// `parent` is the mode the result is nested in; `this` is what
    /// `ModeRef::This` means at this site.
    fn compile_ref(&mut self, entry: &ModeRef, parent: ModeId, this: ModeId) -> Result<Vec<ModeId>, CompileError> {
        match entry {
            ModeRef::This => Ok(vec![this]),
            ModeRef::Inline(mode) => self.compile_expanded(mode, parent, None),
            ModeRef::Named(name) => {
                let language = self.language;
                let mode = language.repository.get(name).ok_or_else(|| CompileError::UnknownReference(name.clone()))?;

                let dependent = depends_on_parent(language, mode, &mut HashSet::new());
                let key = (name.clone(), dependent.then_some(parent));
                if let Some(ids) = self.named.get(&key) {
                    return Ok(ids.clone());
                }
                if dependent {
                    // A parent-dependent mode nested in itself reuses the
                    // enclosing instance; otherwise the arena would never close.
                    if let Some(ids) = self.enclosing_instance(name, parent) {
                        return Ok(ids);
                    }
                }
                self.compile_expanded(mode, parent, Some(key))
            }
        }
    }

    fn enclosing_instance(&self, name: &str, from: ModeId) -> Option<Vec<ModeId>> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if let Some(key) = &self.origins[id] {
                if key.0 == name {
                    return self.named.get(key).cloned();
                }
            }
            cursor = self.modes[id].parent;
        }
        None
    }

    /// Allocate one arena slot per variant, then fill each.
    fn compile_expanded(&mut self, mode: &Mode, parent: ModeId, key: Option<NamedKey>) -> Result<Vec<ModeId>, CompileError> {
        let bodies: Vec<Mode> = if mode.variants.is_empty() {
            vec![mode.clone()]
        } else {
            mode.variants.iter().map(|v| mode.merged_with(v)).collect()
        };

        let ids: Vec<ModeId> = bodies.iter().map(|_| self.alloc(Some(parent), key.clone())).collect();
        if let Some(key) = key {
            self.named.insert(key, ids.clone());
        }
        for (id, body) in ids.iter().zip(bodies) {
            self.fill(*id, body)?;
        }
        Ok(ids)
    }

    fn fill(&mut self, id: ModeId, mut mode: Mode) -> Result<(), CompileError> {
        let describe = mode.describe();
        let parent = self.modes[id].parent;
        let ci = self.case_insensitive;

        // Sugar.
        if let Some(matches) = mode.matches.take() {
            if mode.begin.is_some() || mode.end.is_some() {
                return Err(CompileError::MatchWithBeginEnd(describe));
            }
            mode.begin = Some(matches);
        }

        let mut skip_after_dot = false;
        if let Some(words) = mode.begin_keywords.take().filter(|_| parent.is_some()) {
            let alternatives: Vec<String> = words
                .split_whitespace()
                .map(|w| regex::escape(w.split('|').next().unwrap_or(w)))
                .collect();
            mode.begin = Some(Pattern::re(format!(r"\b({})(?!\.)(?=\b|\s)", alternatives.join("|"))));
            mode.keywords.get_or_insert_with(|| Keywords::from(words.as_str()));
            mode.relevance.get_or_insert(0);
            skip_after_dot = true;
        }

        // Keywords.
        let keyword_pattern = match (mode.keywords.as_ref().and_then(|k| k.pattern.as_ref()), &mode.lexemes) {
            (Some(_), Some(_)) => return Err(CompileError::ConflictingKeywordPattern(describe)),
            (Some(p), None) | (None, Some(p)) => p.source(),
            (None, None) => DEFAULT_KEYWORD_PATTERN.to_string(),
        };
        let (keywords, keyword_re) = match &mode.keywords {
            Some(k) => {
                let aliased = self.alias_categories(k);
                (Some(KeywordTable::new(&aliased, self.language.keyword_weight, ci)), Some(lang_re(&keyword_pattern, ci)?))
            }
            None => (None, None),
        };

        // Begin / end.
        let mut begin = None;
        let mut end_re = None;
        let mut terminator_end = None;
        if let Some(parent) = parent {
            begin = Some(mode.begin.as_ref().map_or_else(|| BOUNDARY.to_string(), Pattern::source));

            let ends_with_parent = mode.flags.contains(ModeFlags::ENDS_WITH_PARENT);
            let end = match &mode.end {
                Some(p) => Some(p.source()),
                None if !ends_with_parent => Some(BOUNDARY.to_string()),
                None => None,
            };
            if let Some(end) = &end {
                end_re = Some(anchored_re(end, ci)?);
            }

            let mut terminator = end.unwrap_or_default();
            if ends_with_parent {
                if let Some(inherited) = &self.modes[parent].terminator_end {
                    if !terminator.is_empty() {
                        terminator.push('|');
                    }
                    terminator.push_str(inherited);
                }
            }
            terminator_end = (!terminator.is_empty()).then_some(terminator);
        }

        let scope = mode.scope.take().map(|s| self.language.scope_aliases.get(&s).cloned().unwrap_or(s));
        {
            let slot = &mut self.modes[id];
            slot.scope = scope;
            slot.flags = mode.flags;
            slot.relevance = mode.relevance.unwrap_or(1);
            slot.begin = begin;
            slot.end_re = end_re;
            slot.terminator_end = terminator_end;
            slot.illegal = mode.illegal.as_ref().map(Pattern::source);
            slot.keywords = keywords;
            slot.keyword_re = keyword_re;
            slot.skip_after_dot = skip_after_dot;
            slot.sub_language = mode.sub_language.take();
        }

        // Children, now that this mode's terminator is known.
        let mut contains = Vec::with_capacity(mode.contains.len());
        for child in &mode.contains {
            contains.extend(self.compile_ref(child, id, id)?);
        }
        self.modes[id].contains = contains;

        if let (Some(starts), Some(parent)) = (&mode.starts, parent) {
            let ids = self.compile_ref(starts, parent, id)?;
            match ids.as_slice() {
                [next] => self.modes[id].starts = Some(*next),
                _ => return Err(CompileError::VariantsInStarts(describe)),
            }
        }
        Ok(())
    }

    fn alias_categories(&self, keywords: &Keywords) -> Keywords {
        let aliases = &self.language.scope_aliases;
        let mut aliased = keywords.clone();
        for (category, _) in &mut aliased.categories {
            if let Some(renamed) = aliases.get(category.as_str()) {
                *category = renamed.clone();
            }
        }
        aliased
    }

    fn finish(mut self) -> Result<Vec<CompiledMode>, CompileError> {
        for id in 0..self.modes.len() {
            let mode = &self.modes[id];
            let mut rules = Vec::with_capacity(mode.contains.len() + 2);
            for &child in &mode.contains {
                if let Some(begin) = &self.modes[child].begin {
                    rules.push((begin.clone(), MatchKind::Begin(child)));
                }
            }
            if let Some(end) = &mode.terminator_end {
                rules.push((end.clone(), MatchKind::End));
            }
            if let Some(illegal) = &mode.illegal {
                rules.push((illegal.clone(), MatchKind::Illegal));
            }
            self.modes[id].matcher = ResumableMatcher::new(rules, self.case_insensitive)?;
        }
        Ok(self.modes)
    }
}

/// Whether `mode`'s compiled end depends on where it is nested.
fn depends_on_parent(language: &Language, mode: &Mode, seen: &mut HashSet<String>) -> bool {
    let bodies = std::iter::once(mode).chain(mode.variants.iter());
    for body in bodies {
        if body.flags.contains(ModeFlags::ENDS_WITH_PARENT) {
            return true;
        }
        let continuation = match body.starts.as_deref() {
            Some(ModeRef::Inline(next)) => depends_on_parent(language, next, seen),
            Some(ModeRef::Named(name)) if seen.insert(name.clone()) => {
                language.repository.get(name).is_some_and(|next| depends_on_parent(language, next, seen))
            }
            _ => false,
        };
        if continuation {
            return true;
        }
    }
    false
}
