//! Highlighting engine.
//!
//! This module is the entry point to everything that happens after a grammar
//! has been authored. It is split into focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! Language (grammar.rs)
//!     │  CompiledLanguage::compile                  (compiled_modes.rs)
//!     │    - expand variants, desugar, validate
//!     │    - arena of modes, ModeId back-edges
//!     │    - one ResumableMatcher per mode          (multi_regex.rs)
//!     │    - keyword tables                         (keywords.rs)
//!     v
//! CompiledLanguage ── shared read-only, Arc'd by the Registry
//!     │
//! input ── scan (scanner.rs)
//!     │     - mode stack, begin/end/illegal
//!     │     - keywords, embedded languages (recursive scan / detect)
//!     │     - events -> Emitter                     (emitter.rs)
//!     v
//! ScanOutcome { Complete(Scan { tree, relevance, metrics }) | Illegal(..) }
//!     │
//!     └── detect::rank: one scan per candidate, best first   (detect.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `compiled_modes.rs`: turns a `Language` into a `CompiledLanguage`.
//! - `multi_regex.rs`: joins a mode's patterns into one alternation and keeps
//!   a resumable cursor into it.
//! - `keywords.rs`: keyword tables and default keyword weights.
//! - `scanner.rs`: the state machine.
//! - `emitter.rs`: the `Emitter` trait and the token tree.
//! - `detect.rs`: ranking for autodetection.
//! - `metrics.rs`: counters collected per scan.
//!
//! ## Debugging
//!
//! The engine logs through `tracing`: `debug` for compilation and detection,
//! `trace` for every accepted begin and end.

#[path = "engine/compiled_modes.rs"]
mod compiled_modes;
#[path = "engine/detect.rs"]
pub(crate) mod detect;
#[path = "engine/emitter.rs"]
mod emitter;
#[path = "engine/keywords.rs"]
mod keywords;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/multi_regex.rs"]
mod multi_regex;
#[path = "engine/scanner.rs"]
mod scanner;


pub use compiled_modes::CompiledLanguage;
pub use emitter::{Element, Emitter, Node, TokenTree, TokenTreeEmitter};
pub use keywords::COMMON_KEYWORDS;
pub use metrics::{CandidateScore, ScanMetrics};
pub use scanner::{IllegalLexeme, Scan, ScanOutcome};

pub(crate) use scanner::{ScanEnv, scan};
