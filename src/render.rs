//! HTML rendering of token trees.
//!
//! Labeled elements become `<span>`s; every text leaf is escaped exactly once.
//!
//! ```text
//! scope "keyword"          -> <span class="hl-keyword">
//! scope "title.class"      -> <span class="hl-title class_">
//! scope "a.b.c"            -> <span class="hl-a b_ c__">
//! embedded language "css"  -> <span class="language-css">
//! unlabeled element        -> children only
//! ```

use crate::engine::{Element, Node, TokenTree};

/// Escape `& < > " '` for HTML text and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// CSS class list for a label.
pub fn scope_to_class(scope: &str, prefix: &str) -> String {
    let mut pieces = scope.split('.');
    let first = pieces.next().unwrap_or_default();
    let mut class = format!("{prefix}{first}");
    for (i, piece) in pieces.enumerate() {
        class.push(' ');
        class.push_str(piece);
        class.push_str(&"_".repeat(i + 1));
    }
    class
}

/// Render `tree` as HTML, prefixing label classes with `prefix`.
pub fn render_html(tree: &TokenTree, prefix: &str) -> String {
    let mut out = String::new();
    render_children(&tree.root, prefix, &mut out);
    out
}

fn render_children(element: &Element, prefix: &str, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(&escape_html(text)),
            Node::Element(inner) => render_element(inner, prefix, out),
        }
    }
}

fn render_element(element: &Element, prefix: &str, out: &mut String) {
    let class = match (&element.scope, &element.language) {
        (_, Some(language)) if element.sublanguage => Some(format!("language-{language}")),
        (Some(scope), _) => Some(scope_to_class(scope, prefix)),
        _ => None,
    };

    match class {
        Some(class) => {
            out.push_str("<span class=\"");
            out.push_str(&escape_html(&class));
            out.push_str("\">");
            render_children(element, prefix, out);
            out.push_str("</span>");
        }
        None => render_children(element, prefix, out),
    }
}
