//! Property-based tests for the scanner.
//!
//! Whatever the input, a scan must hand every byte to the output exactly once
//! and open as many nodes as it closes. These run over the bundled grammars and
//! over a grammar that exercises most mode features at once.

use glint::{
    CommonModes, Emitter, Highlighter, Keywords, Language, Mode, ModeFlags, ModeRef, ScanOutcome, TokenTree,
};
use once_cell::sync::Lazy;
use proptest::prelude::*;
use std::convert::Infallible;

static HIGHLIGHTER: Lazy<Highlighter> = Lazy::new(|| {
    let mut h = Highlighter::with_bundled_languages();
    h.register_language("playground", |common| Ok::<_, Infallible>(playground(common))).unwrap();
    h
});

fn playground(common: &CommonModes) -> Language {
    let params = Mode::new().scope("params").begin(r"\(").end(r"\)").contains([
        ModeRef::This,
        Mode::new().scope("type").begin(":").end(",").flag(ModeFlags::ENDS_WITH_PARENT).into(),
        common.quote_string.clone().into(),
    ]);
    let class = Mode::new()
        .scope("class")
        .begin_keywords("class struct")
        .end(r"\{")
        .flag(ModeFlags::EXCLUDE_END)
        .contains([common.title.clone()]);
    let meta = Mode::new().scope("meta").begin("#").starts(Mode::new().scope("meta-string").end("$"));
    let fenced = Mode::new()
        .scope("embedded")
        .begin("```")
        .end("```")
        .sub_language("json")
        .flag(ModeFlags::EXCLUDE_BEGIN | ModeFlags::EXCLUDE_END);
    let heredoc = CommonModes::end_same_as_begin(Mode::new().scope("string").begin(r"<<(\w+)").end(r"\w+"));

    Language::new("playground")
        .keywords(Keywords::from("let fn if else return"))
        .illegal(r"[@$]")
        .contains([
            common.c_line_comment.clone(),
            common.apos_string.clone(),
            common.number.clone(),
            class,
            params,
            meta,
            fenced,
            heredoc,
        ])
}

static TAG: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"<[^>]*>").unwrap());

fn unescape(html: &str) -> String {
    let text = TAG.replace_all(html, "");
    text.replace("&lt;", "<").replace("&gt;", ">").replace("&quot;", "\"").replace("&#x27;", "'").replace("&amp;", "&")
}

/// Text drawn mostly from characters the grammars care about.
fn code_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        r#"[a-z0-9 _.=:,;#'"(){}\[\]`<>@$\\\n-]{0,120}"#,
        r#"(class |let |struct |fn |true |null |\[a\]\n|x = |<<EOF|EOF|```|// |; |"k": |\t|é|≠){0,30}"#,
        any::<String>(),
    ]
}

#[derive(Default)]
struct Balance {
    depth: usize,
    opened: usize,
    closed: usize,
    text: String,
}

impl Emitter for Balance {
    fn open_node(&mut self, _scope: &str) {
        self.opened += 1;
        self.depth += 1;
    }

    fn add_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn close_node(&mut self) {
        assert!(self.depth > 0, "close_node without a matching open_node");
        self.closed += 1;
        self.depth -= 1;
    }

    fn add_sublanguage(&mut self, tree: TokenTree, _language: Option<&str>) {
        self.text.push_str(&tree.text());
    }

    fn finalize(self) -> TokenTree {
        assert_eq!(self.opened, self.closed, "unbalanced events");
        TokenTree::plain(&self.text)
    }
}

#[cfg(test)]
mod scanning {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn every_byte_reaches_the_tree(code in code_strategy()) {
            let h = &*HIGHLIGHTER;
            for language in ["json", "ini", "playground"] {
                let result = h.highlight(language, &code, true).unwrap();
                prop_assert_eq!(result.tree.text(), code.clone());
                prop_assert_eq!(unescape(&result.value), code.clone());
            }
        }

        #[test]
        fn illegal_results_still_preserve_text(code in code_strategy()) {
            let h = &*HIGHLIGHTER;
            for language in ["json", "ini", "playground"] {
                let result = h.highlight(language, &code, false).unwrap();
                prop_assert_eq!(result.tree.text(), code.clone());
                if result.illegal {
                    prop_assert_eq!(result.relevance, 0);
                    prop_assert!(result.illegal_by.is_some() || result.error_raised.is_some());
                }
            }
        }

        #[test]
        fn events_are_balanced(code in code_strategy()) {
            let h = &*HIGHLIGHTER;
            for language in ["json", "ini", "playground"] {
                match h.scan_with(language, &code, true, Balance::default()).unwrap() {
                    ScanOutcome::Complete(scan) => prop_assert_eq!(scan.tree.text(), code.clone()),
                    ScanOutcome::Illegal(_) => prop_assert!(false, "illegal outcome while ignoring illegals"),
                }
            }
        }

        #[test]
        fn rendered_spans_are_balanced(code in code_strategy()) {
            let h = &*HIGHLIGHTER;
            let result = h.highlight("playground", &code, true).unwrap();
            prop_assert_eq!(result.value.matches("<span").count(), result.value.matches("</span>").count());
        }

        #[test]
        fn detection_is_deterministic(code in code_strategy()) {
            let h = &*HIGHLIGHTER;
            let first = h.detect::<&str>(&code, None).unwrap();
            let second = h.detect::<&str>(&code, None).unwrap();
            prop_assert_eq!(&first.ranking, &second.ranking);
            prop_assert_eq!(first.best.tree, second.best.tree);
            prop_assert!(first.ranking.windows(2).all(|w| w[0].relevance >= w[1].relevance));
        }
    }
}
