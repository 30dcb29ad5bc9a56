use glint::{CandidateScore, HighlightResult, Node, TokenTree};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const RED: &str = "\x1b[31m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(result: &HighlightResult, ranking: &[CandidateScore], color: bool) {
    let palette = ansi::Palette::new(color);
    let language = result.language.as_deref().unwrap_or("plaintext");
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Highlighting as {language}"), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Tree ━━━", ansi::GRAY));
    print_tree(&result.tree, &palette);

    if result.illegal {
        println!("\n{}", palette.paint("━━━ Illegal ━━━", ansi::GRAY));
        if let Some(illegal) = &result.illegal_by {
            println!(
                "  {} {:?} {} {}",
                palette.paint("lexeme", ansi::RED),
                illegal.lexeme,
                palette.dim("at offset"),
                palette.paint(illegal.index.to_string(), ansi::YELLOW),
            );
            println!("  {} {}", palette.dim("mode:"), illegal.scope.as_deref().unwrap_or("<unnamed>"));
            println!("  {} {:?}", palette.dim("context:"), illegal.context);
        }
        if let Some(error) = &result.error_raised {
            println!("  {} {}", palette.paint("error", ansi::RED), error);
        }
    }

    if !ranking.is_empty() {
        println!("\n{}", palette.paint("━━━ Detection ━━━", ansi::GRAY));
        print_ranking(ranking, &palette);
    }

    let m = &result.metrics;
    println!("\n{}", palette.paint("━━━ Scan ━━━", ansi::GRAY));
    println!(
        "  Relevance: {}  │  Iterations: {}  │  Begins/ends: {}/{}  │  Keywords: {}  │  Depth: {}  │  Embedded: {}",
        palette.paint(result.relevance.to_string(), ansi::GREEN),
        palette.paint(m.iterations.to_string(), ansi::BLUE),
        m.begins,
        m.ends,
        m.keyword_hits,
        m.max_depth,
        m.sublanguage_scans,
    );
    println!();
}

fn print_tree(tree: &TokenTree, palette: &ansi::Palette) {
    if tree.children().is_empty() {
        println!("{}", palette.dim("  (empty input)"));
    }
    for node in tree.children() {
        print_node(node, 1, palette);
    }
}

fn print_node(node: &Node, depth: usize, palette: &ansi::Palette) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Text(text) => println!("{indent}{}", palette.dim(format!("{text:?}"))),
        Node::Element(element) => {
            let label = match (&element.scope, &element.language) {
                (_, Some(language)) if element.sublanguage => palette.paint(format!("[{language}]"), ansi::MAGENTA),
                _ if element.sublanguage => palette.paint("[embedded]", ansi::MAGENTA),
                (Some(scope), _) => palette.paint(scope, ansi::BLUE),
                (None, _) => palette.dim("(group)"),
            };
            println!("{indent}{label}");
            for child in &element.children {
                print_node(child, depth + 1, palette);
            }
        }
    }
}

fn print_ranking(ranking: &[CandidateScore], palette: &ansi::Palette) {
    for (idx, candidate) in ranking.iter().enumerate() {
        let name = candidate.language.as_deref().unwrap_or("plaintext");
        let name = if idx == 0 { palette.bold(palette.paint(name, ansi::GREEN)) } else { palette.paint(name, ansi::CYAN) };
        println!(
            "  {} {} {} {}{}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            name,
            palette.dim("│ relevance"),
            palette.paint(candidate.relevance.to_string(), ansi::YELLOW),
            if candidate.illegal { palette.paint("  (illegal)", ansi::RED) } else { String::new() },
        );
    }
}
