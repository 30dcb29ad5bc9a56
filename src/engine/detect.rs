//! Language autodetection.
//!
//! Every candidate grammar scans the whole input; the relevance each scan
//! accumulates is its score.
//!
//! ```text
//! candidates = [plaintext baseline] + pool (registration order, minus
//!              grammars that opt out of detection)
//!      │
//!      ├─ scan each (illegal input or a broken grammar => relevance 0)
//!      ├─ stable sort by relevance, descending
//!      └─ within each run of equal relevance, a grammar declaring
//!         `superset_of` another moves just ahead of it
//! ```
//!
//! The baseline comes first, so a grammar must score above 0 to beat plain
//! text. Sorting is stable and the pool order is fixed, which makes the
//! ranking identical for identical input.

use super::compiled_modes::CompiledLanguage;
use super::emitter::{TokenTree, TokenTreeEmitter};
use super::metrics::{CandidateScore, ScanMetrics};
use super::scanner::{IllegalLexeme, ScanEnv, ScanOutcome, scan};
use crate::error::HighlightError;
use std::cmp::Reverse;

/// One scored candidate.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    /// `None` for the plain-text baseline.
    pub language: Option<String>,
    pub superset_of: Option<String>,
    pub relevance: u32,
    pub tree: TokenTree,
    pub illegal: Option<IllegalLexeme>,
    /// Scan error of a candidate whose grammar is broken.
    pub error: Option<String>,
    pub metrics: ScanMetrics,
}

impl Candidate {
    fn baseline(code: &str) -> Self {
        Candidate {
            language: None,
            superset_of: None,
            relevance: 0,
            tree: TokenTree::plain(code),
            illegal: None,
            error: None,
            metrics: ScanMetrics::default(),
        }
    }

    fn failed(language: &CompiledLanguage, code: &str, error: &HighlightError) -> Self {
        Candidate {
            language: Some(language.name().to_string()),
            superset_of: language.superset_of().map(str::to_string),
            error: Some(error.to_string()),
            ..Candidate::baseline(code)
        }
    }

    fn refines(&self, other: &Candidate) -> bool {
        match (&self.superset_of, &other.language) {
            (Some(base), Some(name)) => base.eq_ignore_ascii_case(name),
            _ => false,
        }
    }

    pub fn score(&self) -> CandidateScore {
        CandidateScore {
            language: self.language.clone(),
            relevance: self.relevance,
            illegal: self.illegal.is_some() || self.error.is_some(),
        }
    }
}

/// Scan `code` with every candidate and rank the results, best first.
///
/// `subset` restricts the candidates; without it the environment's pool (or
/// every registered grammar) is used. A candidate whose scan fails scores 0,
/// unless the environment is strict.
pub(crate) fn rank(env: ScanEnv<'_>, code: &str, subset: Option<&[String]>) -> Result<Vec<Candidate>, HighlightError> {
    let pool = subset.or(env.pool);
    let mut candidates = vec![Candidate::baseline(code)];

    for language in env.registry.candidates(pool) {
        if language.disable_autodetect() {
            continue;
        }
        let candidate = match score(env, &language, code) {
            Ok(candidate) => candidate,
            Err(error) if !env.strict => {
                tracing::warn!(language = %language.name(), %error, "candidate scan failed; scoring it 0");
                Candidate::failed(&language, code, &error)
            }
            Err(error) => return Err(error),
        };
        candidates.push(candidate);
    }

    candidates.sort_by_key(|c| Reverse(c.relevance));
    promote_supersets(&mut candidates);

    tracing::debug!(
        ranking = ?candidates.iter().map(|c| (c.language.as_deref().unwrap_or("plaintext"), c.relevance)).collect::<Vec<_>>(),
        "ranked candidates"
    );
    Ok(candidates)
}

/// Within each run of equal relevance, move every candidate ahead of the
/// earliest candidate it refines. Runs are already in registration order.
fn promote_supersets(candidates: &mut [Candidate]) {
    let mut start = 0;
    while start < candidates.len() {
        let relevance = candidates[start].relevance;
        let end = candidates[start..].iter().position(|c| c.relevance != relevance).map_or(candidates.len(), |n| start + n);
        for i in start + 1..end {
            if let Some(base) = (start..i).find(|&j| candidates[i].refines(&candidates[j])) {
                candidates[base..=i].rotate_right(1);
            }
        }
        start = end;
    }
}

fn score(env: ScanEnv<'_>, language: &CompiledLanguage, code: &str) -> Result<Candidate, HighlightError> {
    let name = Some(language.name().to_string());
    let superset_of = language.superset_of().map(str::to_string);

    Ok(match scan(env, language, code, false, TokenTreeEmitter::new())? {
        ScanOutcome::Complete(scan) => Candidate {
            language: name,
            superset_of,
            relevance: scan.relevance,
            tree: scan.tree,
            illegal: None,
            error: None,
            metrics: scan.metrics,
        },
        ScanOutcome::Illegal(illegal) => Candidate {
            language: name,
            superset_of,
            relevance: 0,
            tree: TokenTree::plain(code),
            illegal: Some(illegal),
            error: None,
            metrics: ScanMetrics::default(),
        },
    })
}
