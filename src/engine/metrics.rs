//! Scan metrics.
//!
//! Every scan counts what it did; the numbers travel with the result so the
//! CLI report and tests can inspect a run without a tracing subscriber.
//! Only deterministic counters live here; wall time is recorded by the
//! `scan` tracing span.
//!
//! Embedded-language scans fold their counters into the enclosing scan via
//! [`ScanMetrics::absorb`], so a result always describes the whole input.

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanMetrics {
    /// Iterations of the main loop (matcher invocations).
    pub iterations: usize,
    /// Modes opened, by begin match or `starts` continuation.
    pub begins: usize,
    /// Modes closed by an end match, cascades included.
    pub ends: usize,
    pub keyword_hits: usize,
    /// Deepest mode stack seen, root excluded.
    pub max_depth: usize,
    pub sublanguage_scans: usize,
}

impl ScanMetrics {
    /// Add the counters of an embedded scan.
    pub fn absorb(&mut self, inner: &ScanMetrics) {
        self.iterations += inner.iterations;
        self.begins += inner.begins;
        self.ends += inner.ends;
        self.keyword_hits += inner.keyword_hits;
        self.sublanguage_scans += inner.sublanguage_scans + 1;
    }
}

/// Per-candidate summary kept by autodetection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateScore {
    /// `None` for the plain-text baseline.
    pub language: Option<String>,
    pub relevance: u32,
    pub illegal: bool,
}
