//! Combined-pattern matching.
//!
//! Every mode tries many patterns at once: the `begin` of each child, its own
//! end terminator and its `illegal` pattern. Instead of running them one by
//! one, they are joined into a single alternation:
//!
//! ```text
//! rules:     [ '(a)\1' , "b" , end: '\)' ]
//! combined:  ((a)\2)|(b)|(\))
//!             ^ ^      ^   ^
//!  group:     1 2      3   4      alternative starts at 1, 3, 4
//! ```
//!
//! Two details make this correct:
//!
//! - Numbered backreferences inside an alternative are shifted by the groups
//!   used by everything before it (`\1` became `\2` above), otherwise they
//!   would silently point into a different alternative.
//! - The group index at which each alternative starts is recorded, so after a
//!   match the winning rule is the first participating alternative group and
//!   its captures can be sliced out as if it had matched on its own.
//!
//! ## Resuming
//!
//! A begin match can be rejected after the fact (see `begin_keywords`). The
//! scanner then asks for the *remaining* alternatives at the same offset.
//! [`ResumableMatcher`] keeps one combined regex per starting rule index,
//! built on first use, and a per-scan [`Cursor`] records how far along the
//! list the current offset has got:
//!
//! ```text
//! cursor 0: (r0)|(r1)|(r2)|(end)     full search from offset
//! cursor 2:           (r2)|(end)     only at the same offset, otherwise
//!                                    restart with cursor 0 at offset + 1 char
//! ```
//!
//! The compiled matchers are shared and immutable after construction (the
//! lazily built ones live in `OnceCell`s); all per-scan state is in `Cursor`.

use super::compiled_modes::{ModeId, lang_re};
use crate::error::CompileError;
use once_cell::sync::OnceCell;

/// What a rule in a mode's alternation stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchKind {
    /// The `begin` of a child mode.
    Begin(ModeId),
    /// The mode's end terminator (possibly inherited from ancestors).
    End,
    Illegal,
}

/// One match reported by a [`ResumableMatcher`].
#[derive(Debug, Clone)]
pub(crate) struct Lexeme {
    pub kind: MatchKind,
    /// Absolute index of the winning rule in the mode's rule list.
    pub rule: usize,
    pub start: usize,
    pub end: usize,
    /// The winning rule's own groups; `groups[0]` is the whole match.
    pub groups: Vec<Option<(usize, usize)>>,
}

impl Lexeme {
    pub fn text<'t>(&self, input: &'t str) -> &'t str {
        &input[self.start..self.end]
    }

    /// Capture `index` of the winning rule, as that rule alone would report it.
    pub fn group<'t>(&self, input: &'t str, index: usize) -> Option<&'t str> {
        self.groups.get(index).copied().flatten().map(|(s, e)| &input[s..e])
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Terminator {
    pub source: String,
    pub kind: MatchKind,
    /// Capturing groups inside `source`.
    captures: usize,
}

/// Per-scan position in a [`ResumableMatcher`]'s rule list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Cursor {
    regex_index: usize,
}

impl Cursor {
    pub fn resuming(&self) -> bool {
        self.regex_index != 0
    }

    pub fn consider_all(&mut self) {
        self.regex_index = 0;
    }
}

// --- Alternation builder ------------------------------------------------------

/// Join `sources` into `(s0)|(s1)|...`, rewriting numbered backreferences.
///
/// `captures[i]` is the number of capturing groups inside `sources[i]`.
/// Returns the combined source and the group index each alternative starts at.
pub(crate) fn join_alternatives(sources: &[&str], captures: &[usize]) -> (String, Vec<usize>) {
    let mut out = String::new();
    let mut starts = Vec::with_capacity(sources.len());
    let mut groups_before = 0;

    for (i, source) in sources.iter().enumerate() {
        let offset = groups_before + 1;
        starts.push(offset);
        groups_before = offset + captures.get(i).copied().unwrap_or(0);

        if i > 0 {
            out.push('|');
        }
        out.push('(');
        out.push_str(&shift_backreferences(source, offset));
        out.push(')');
    }
    (out, starts)
}

/// Add `offset` to every numbered backreference in `source`.
///
/// Character classes and escaped characters are copied untouched.
fn shift_backreferences(source: &str, offset: usize) -> String {
    let token = crate::regex!(r"(?s)\[(?:[^\\\]]|\\.)*\]|\\([1-9][0-9]*)|\\.");
    let mut out = String::with_capacity(source.len() + 4);
    let mut copied = 0;

    for caps in token.captures_iter(source) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else { continue };
        let Ok(n) = number.as_str().parse::<usize>() else { continue };
        out.push_str(&source[copied..whole.start()]);
        out.push_str(&format!("\\{}", n + offset));
        copied = whole.end();
    }
    out.push_str(&source[copied..]);
    out
}

// --- Single combined regex ----------------------------------------------------

#[derive(Debug)]
struct MultiRegex {
    regex: Option<fancy_regex::Regex>,
    /// First rule index covered by this regex.
    first_rule: usize,
    /// Group index at which each alternative starts.
    starts: Vec<usize>,
    captures: Vec<usize>,
}

impl MultiRegex {
    fn build(rules: &[Terminator], first_rule: usize, case_insensitive: bool) -> Result<Self, CompileError> {
        let slice = rules.get(first_rule..).unwrap_or_default();
        if slice.is_empty() {
            return Ok(MultiRegex { regex: None, first_rule, starts: Vec::new(), captures: Vec::new() });
        }

        let sources: Vec<&str> = slice.iter().map(|r| r.source.as_str()).collect();
        let captures: Vec<usize> = slice.iter().map(|r| r.captures).collect();
        let (combined, starts) = join_alternatives(&sources, &captures);
        let regex = lang_re(&combined, case_insensitive)?;

        Ok(MultiRegex { regex: Some(regex), first_rule, starts, captures })
    }

    fn exec(&self, rules: &[Terminator], input: &str, from: usize) -> Result<Option<Lexeme>, fancy_regex::Error> {
        let Some(regex) = &self.regex else { return Ok(None) };
        let Some(caps) = regex.captures_from_pos(input, from)? else { return Ok(None) };

        for (alt, &group) in self.starts.iter().enumerate() {
            let Some(whole) = caps.get(group) else { continue };
            let own = self.captures[alt];
            let groups = (group..=group + own).map(|g| caps.get(g).map(|m| (m.start(), m.end()))).collect();
            let rule = self.first_rule + alt;
            return Ok(Some(Lexeme { kind: rules[rule].kind, rule, start: whole.start(), end: whole.end(), groups }));
        }
        Ok(None)
    }
}

// --- Resumable matcher --------------------------------------------------------

/// All terminators of one mode, matchable from any starting rule.
#[derive(Debug, Default)]
pub(crate) struct ResumableMatcher {
    rules: Vec<Terminator>,
    begin_count: usize,
    case_insensitive: bool,
    matchers: Vec<OnceCell<MultiRegex>>,
}

impl ResumableMatcher {
    /// Build the matcher for `rules`, given in priority order.
    ///
    /// Each rule is compiled on its own first (to count its groups and to
    /// point at the culprit when a pattern is invalid), then the full
    /// alternation is built eagerly. Partial alternations are built lazily.
    pub fn new(rules: Vec<(String, MatchKind)>, case_insensitive: bool) -> Result<Self, CompileError> {
        let mut terminators = Vec::with_capacity(rules.len());
        for (source, kind) in rules {
            let captures = lang_re(&source, case_insensitive)?.captures_len().saturating_sub(1);
            terminators.push(Terminator { source, kind, captures });
        }

        let begin_count = terminators.iter().filter(|t| matches!(t.kind, MatchKind::Begin(_))).count();
        let matchers: Vec<OnceCell<MultiRegex>> = (0..begin_count.max(1)).map(|_| OnceCell::new()).collect();
        let matcher = ResumableMatcher { rules: terminators, begin_count, case_insensitive, matchers };
        matcher.matcher(0)?;
        Ok(matcher)
    }

    fn matcher(&self, index: usize) -> Result<Option<&MultiRegex>, CompileError> {
        let index = if index < self.matchers.len() { index } else { 0 };
        let Some(cell) = self.matchers.get(index) else { return Ok(None) };
        cell.get_or_try_init(|| MultiRegex::build(&self.rules, index, self.case_insensitive)).map(Some)
    }

    /// Find the next terminator at or after `from`, honoring `cursor`.
    pub fn exec(&self, cursor: &mut Cursor, input: &str, from: usize) -> Result<Option<Lexeme>, fancy_regex::Error> {
        let mut result = self.exec_with(cursor.regex_index, input, from)?;

        if cursor.resuming() {
            let same_offset = matches!(&result, Some(lexeme) if lexeme.start == from);
            if !same_offset {
                // Every alternative has been tried here; move on by one character.
                let next = next_char_boundary(input, from);
                result = if next > from { self.exec_with(0, input, next)? } else { None };
            }
        }

        if let Some(lexeme) = &result {
            cursor.regex_index = lexeme.rule + 1;
            if cursor.regex_index >= self.begin_count {
                cursor.consider_all();
            }
        }
        Ok(result)
    }

    fn exec_with(&self, index: usize, input: &str, from: usize) -> Result<Option<Lexeme>, fancy_regex::Error> {
        if from > input.len() {
            return Ok(None);
        }
        match self.matcher(index) {
            Ok(Some(matcher)) => matcher.exec(&self.rules, input, from),
            Ok(None) => Ok(None),
            // Every alternative compiled on its own in `new`, so a failing
            // partial alternation can only come from exceeded size limits.
            Err(CompileError::InvalidPattern { source, .. }) => Err(*source),
            Err(_) => Ok(None),
        }
    }
}

/// Offset of the character after the one starting at `index`.
pub(crate) fn next_char_boundary(input: &str, index: usize) -> usize {
    input.get(index..).and_then(|rest| rest.chars().next()).map_or(index, |c| index + c.len_utf8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(rules: &[(&str, MatchKind)]) -> ResumableMatcher {
        ResumableMatcher::new(rules.iter().map(|(s, k)| (s.to_string(), *k)).collect(), false).unwrap()
    }

    #[test]
    fn backreferences_are_shifted_per_alternative() {
        let (combined, starts) = join_alternatives(&[r"(a)\1", r"(b)(c)\2\1", "x"], &[1, 2, 0]);
        assert_eq!(combined, r"((a)\2)|((b)(c)\5\4)|(x)");
        assert_eq!(starts, vec![1, 3, 6]);
    }

    #[test]
    fn character_classes_and_escapes_are_left_alone() {
        let (combined, _) = join_alternatives(&[r"[\1]\\1", r"(q)\1"], &[0, 1]);
        assert_eq!(combined, r"([\1]\\1)|((q)\3)");
    }

    #[test]
    fn reports_winning_rule_and_its_own_groups() {
        let m = matcher(&[
            (r"(['\x22])\w+\1", MatchKind::Begin(1)),
            (r"(\d)(\d)", MatchKind::Begin(2)),
            (r"\)", MatchKind::End),
        ]);
        let input = "x 42 'ab' )";
        let mut cursor = Cursor::default();

        let first = m.exec(&mut cursor, input, 0).unwrap().unwrap();
        assert_eq!(first.kind, MatchKind::Begin(2));
        assert_eq!(first.text(input), "42");
        assert_eq!(first.group(input, 1), Some("4"));
        assert_eq!(first.group(input, 2), Some("2"));

        cursor.consider_all();
        let second = m.exec(&mut cursor, input, first.end).unwrap().unwrap();
        assert_eq!(second.kind, MatchKind::Begin(1));
        assert_eq!(second.text(input), "'ab'");
        assert_eq!(second.group(input, 1), Some("'"));

        cursor.consider_all();
        let third = m.exec(&mut cursor, input, second.end).unwrap().unwrap();
        assert_eq!(third.kind, MatchKind::End);
    }

    #[test]
    fn earlier_rules_win_at_the_same_offset() {
        let m = matcher(&[("ab", MatchKind::Begin(1)), ("a", MatchKind::Begin(2))]);
        let lexeme = m.exec(&mut Cursor::default(), "ab", 0).unwrap().unwrap();
        assert_eq!(lexeme.rule, 0);
    }

    #[test]
    fn resuming_skips_rules_already_tried_at_this_offset() {
        let m = matcher(&[("class", MatchKind::Begin(1)), ("cla", MatchKind::Begin(2)), ("s", MatchKind::Begin(3))]);
        let input = "class";
        let mut cursor = Cursor::default();

        let first = m.exec(&mut cursor, input, 0).unwrap().unwrap();
        assert_eq!(first.rule, 0);
        assert!(cursor.resuming());

        let second = m.exec(&mut cursor, input, 0).unwrap().unwrap();
        assert_eq!((second.rule, second.start), (1, 0));

        // Rule 2 cannot match at offset 0, so the search restarts one char later.
        let third = m.exec(&mut cursor, input, 0).unwrap().unwrap();
        assert_eq!((third.rule, third.start), (2, 3));
        assert!(!cursor.resuming());
    }

    #[test]
    fn invalid_patterns_are_reported_individually() {
        let err = ResumableMatcher::new(vec![("ok".into(), MatchKind::End), ("(unclosed".into(), MatchKind::Illegal)], false)
            .unwrap_err();
        match err {
            CompileError::InvalidPattern { pattern, .. } => assert!(pattern.contains("(unclosed")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_rule_list_never_matches() {
        let m = ResumableMatcher::new(Vec::new(), false).unwrap();
        assert!(m.exec(&mut Cursor::default(), "anything", 0).unwrap().is_none());
    }
}
