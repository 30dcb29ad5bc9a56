//! Token tree construction.
//!
//! The scanner never builds output itself; it reports events to an
//! [`Emitter`]:
//!
//! ```text
//! scanner ── open_node("string") ──┐
//!         ── add_text("'x'") ──────┤    TokenTreeEmitter
//!         ── close_node() ─────────┤ ─> stack: [root, string]
//!         ── add_sublanguage(..) ──┘    finalize() -> TokenTree
//! ```
//!
//! [`TokenTreeEmitter`] keeps a stack of open elements mirroring the scanner's
//! labeled modes. Adjacent text leaves are merged only in `finalize`; events are
//! never reordered.
//!
//! A [`TokenTree`] serializes to JSON with `serde`:
//!
//! ```json
//! {"children": ["if ", {"scope": "string", "children": ["'x'"]}]}
//! ```

use serde::{Deserialize, Serialize};

/// Sink for scanner events.
pub trait Emitter {
    fn open_node(&mut self, scope: &str);
    fn add_text(&mut self, text: &str);
    fn close_node(&mut self);
    /// Splice in the tree of an embedded scan; `language` is `None` when
    /// detection found nothing better than plain text.
    fn add_sublanguage(&mut self, tree: TokenTree, language: Option<&str>);
    /// Close everything still open and return the finished tree.
    fn finalize(self) -> TokenTree;
}

/// A tree node: a text leaf or a labeled element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Element(Element),
}

impl Node {
    fn push_text_into(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => element.children.iter().for_each(|c| c.push_text_into(out)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Set on the root of a spliced embedded-language tree.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sublanguage: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Element {
    fn scoped(scope: &str) -> Self {
        Element { scope: Some(scope.to_string()), ..Default::default() }
    }

    fn merge_text(&mut self) {
        let mut merged: Vec<Node> = Vec::with_capacity(self.children.len());
        for child in self.children.drain(..) {
            match child {
                Node::Text(text) => {
                    if let Some(Node::Text(prev)) = merged.last_mut() {
                        prev.push_str(&text);
                    } else {
                        merged.push(Node::Text(text));
                    }
                }
                Node::Element(mut element) => {
                    element.merge_text();
                    merged.push(Node::Element(element));
                }
            }
        }
        self.children = merged;
    }
}

/// Result of a scan: an unlabeled root element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenTree {
    pub root: Element,
}

impl TokenTree {
    /// A tree holding `text` as its only leaf.
    pub fn plain(text: &str) -> Self {
        let mut root = Element::default();
        if !text.is_empty() {
            root.children.push(Node::Text(text.to_string()));
        }
        TokenTree { root }
    }

    pub fn children(&self) -> &[Node] {
        &self.root.children
    }

    /// Concatenation of every text leaf, in order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.root.children.iter().for_each(|c| c.push_text_into(&mut out));
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// --- Default emitter ---------------------------------------------------------

/// Builds a [`TokenTree`] in memory.
#[derive(Debug)]
pub struct TokenTreeEmitter {
    stack: Vec<Element>,
}

impl TokenTreeEmitter {
    pub fn new() -> Self {
        TokenTreeEmitter { stack: vec![Element::default()] }
    }

    fn top(&mut self) -> &mut Element {
        // The root is never popped.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }
}

impl Default for TokenTreeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter for TokenTreeEmitter {
    fn open_node(&mut self, scope: &str) {
        self.stack.push(Element::scoped(scope));
    }

    fn add_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.top().children.push(Node::Text(text.to_string()));
        }
    }

    fn close_node(&mut self) {
        if self.stack.len() > 1 {
            if let Some(element) = self.stack.pop() {
                self.top().children.push(Node::Element(element));
            }
        }
    }

    fn add_sublanguage(&mut self, tree: TokenTree, language: Option<&str>) {
        let mut element = tree.root;
        element.sublanguage = true;
        element.language = language.map(str::to_string);
        self.top().children.push(Node::Element(element));
    }

    fn finalize(mut self) -> TokenTree {
        while self.stack.len() > 1 {
            self.close_node();
        }
        let mut root = self.stack.pop().unwrap_or_default();
        root.merge_text();
        TokenTree { root }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    #[test]
    fn builds_nested_elements_and_merges_text_on_finalize() {
        let mut e = TokenTreeEmitter::new();
        e.add_text("a");
        e.add_text("b");
        e.open_node("string");
        e.add_text("'");
        e.add_text("x'");
        e.close_node();
        e.add_text("");
        e.add_text("c");
        let tree = e.finalize();

        assert_eq!(
            tree.children(),
            &[
                text("ab"),
                Node::Element(Element { scope: Some("string".into()), children: vec![text("'x'")], ..Default::default() }),
                text("c"),
            ]
        );
        assert_eq!(tree.text(), "ab'x'c");
    }

    #[test]
    fn finalize_closes_dangling_nodes() {
        let mut e = TokenTreeEmitter::new();
        e.open_node("a");
        e.open_node("b");
        e.add_text("x");
        let tree = e.finalize();
        assert_eq!(tree.text(), "x");
        let Node::Element(a) = &tree.children()[0] else { panic!("expected element") };
        assert!(matches!(&a.children[0], Node::Element(b) if b.scope.as_deref() == Some("b")));
    }

    #[test]
    fn extra_close_is_ignored_at_the_root() {
        let mut e = TokenTreeEmitter::new();
        e.close_node();
        e.add_text("x");
        assert_eq!(e.finalize(), TokenTree::plain("x"));
    }

    #[test]
    fn sublanguage_trees_are_marked() {
        let mut e = TokenTreeEmitter::new();
        e.add_sublanguage(TokenTree::plain("1+1"), Some("inner"));
        let tree = e.finalize();
        let Node::Element(sub) = &tree.children()[0] else { panic!("expected element") };
        assert!(sub.sublanguage);
        assert_eq!(sub.language.as_deref(), Some("inner"));
        assert_eq!(sub.scope, None);
    }

    #[test]
    fn json_dump_round_trips() {
        let mut e = TokenTreeEmitter::new();
        e.open_node("keyword");
        e.add_text("if");
        e.close_node();
        e.add_text(" <&> ");
        e.add_sublanguage(TokenTree::plain("1"), None);
        let tree = e.finalize();

        let json = tree.to_json().unwrap();
        assert!(json.starts_with(r#"{"children":[{"scope":"keyword","children":["if"]}"#));
        assert_eq!(TokenTree::from_json(&json).unwrap(), tree);
    }
}
