use crate::grammar::common::{CommonModes, NUMBER_RE};
use crate::grammar::patterns::{any_number_of_times, concat, either, lookahead};
use crate::grammar::{Language, Mode, ModeRef};

/// INI and TOML-style configuration files.
pub fn ini(common: &CommonModes) -> Language {
    let numbers = Mode::new()
        .scope("number")
        .relevance(0)
        .variants([Mode::new().begin(r"([+-]+)?[\d]+_[\d_]+"), Mode::new().begin(NUMBER_RE)]);
    let comments = CommonModes::comment(";", "$").variants([Mode::new().begin(";"), Mode::new().begin("#")]);
    let variables = Mode::new()
        .scope("variable")
        .variants([Mode::new().begin(r#"\$[\w\d"][\w\d_]*"#), Mode::new().begin(r"\$\{(.*?)\}")]);
    let literals = Mode::new().scope("literal").begin(r"\b(?:on|off|true|false|yes|no)\b");
    let strings = Mode::new().scope("string").contains([common.backslash_escape.clone()]).variants([
        Mode::new().begin("'''").end("'''").relevance(10),
        Mode::new().begin(r#"""""#).end(r#"""""#).relevance(10),
        Mode::new().begin("\"").end("\""),
        Mode::new().begin("'").end("'"),
    ]);
    let array = Mode::new().begin(r"\[").end(r"\]").relevance(0).contains([
        ModeRef::from(comments.clone()),
        literals.clone().into(),
        variables.clone().into(),
        strings.clone().into(),
        numbers.clone().into(),
        ModeRef::This,
    ]);

    let key = either(&["[A-Za-z0-9_-]+", r#""(\\"|[^"])*""#, "'[^']*'"]);
    // Keys never start inside a word, a quoted key or an escape.
    let dotted_key = concat(&[
        r#"(?<![\w"'\\-])"#,
        &key,
        &any_number_of_times(&concat(&[r"\s*\.\s*", &key])),
        &lookahead(r"\s*=\s*[^#\s]"),
    ]);
    let value = Mode::new().end("$").relevance(0).contains([comments.clone(), array, literals, variables, strings, numbers]);

    Language::new("ini")
        .alias("toml")
        .case_insensitive()
        .illegal(r"\S")
        .contains([
            comments,
            Mode::new().scope("section").begin(r"\[+").end(r"\]+"),
            Mode::new().scope("attr").begin(dotted_key).starts(value),
        ])
}

#[cfg(test)]
mod tests {
    use crate::{Element, Highlighter, Node};

    fn scoped<'t>(nodes: &'t [Node]) -> Vec<(&'t str, String)> {
        nodes
            .iter()
            .filter_map(|n| match n {
                Node::Element(e) => e.scope.as_deref().map(|scope| (scope, text_of(e))),
                Node::Text(_) => None,
            })
            .collect()
    }

    fn text_of(e: &Element) -> String {
        crate::TokenTree { root: e.clone() }.text()
    }

    #[test]
    fn sections_keys_and_values() {
        let h = Highlighter::with_bundled_languages();
        let code = "[server]\nhost = \"example.org\" ; primary\nports = [80, [443]]\nDEBUG = ON\n";
        let result = h.highlight("toml", code, false).unwrap();

        assert!(!result.illegal);
        assert_eq!(result.tree.text(), code);
        assert_eq!(
            scoped(result.tree.children()),
            vec![
                ("section", "[server]".to_string()),
                ("attr", "host".to_string()),
                ("string", "\"example.org\"".to_string()),
                ("comment", "; primary".to_string()),
                ("attr", "ports".to_string()),
                ("number", "80".to_string()),
                ("number", "443".to_string()),
                ("attr", "DEBUG".to_string()),
                ("literal", "ON".to_string()),
            ]
        );
    }

    #[test]
    fn dotted_and_quoted_keys() {
        let h = Highlighter::with_bundled_languages();
        let result = h.highlight("ini", "a.b = 1\n\"q\" = 2", false).unwrap();
        assert_eq!(scoped(result.tree.children())[0], ("attr", "a.b".to_string()));
        assert_eq!(scoped(result.tree.children())[2], ("attr", "\"q\"".to_string()));
    }

    #[test]
    fn long_lines_without_keys_scan_quickly() {
        let h = Highlighter::with_bundled_languages();
        let started = std::time::Instant::now();
        for code in ["a".repeat(20_000), format!("\"{}", "\\\"".repeat(10_000))] {
            let result = h.highlight("ini", &code, true).unwrap();
            assert_eq!(result.tree.text(), code);
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(10), "took {:?}", started.elapsed());
    }

    #[test]
    fn triple_quoted_strings_dominate_relevance() {
        let h = Highlighter::with_bundled_languages();
        let result = h.highlight("ini", "text = '''a\nb'''", false).unwrap();
        // attr 1 + string 10
        assert_eq!(result.relevance, 11);
    }
}
