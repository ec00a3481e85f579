//! Tree assembly from a token stream.
//!
//! The builder keeps its own stack of open elements, separate from the
//! tokenizer's raw-text contexts. Mismatched markup is repaired rather than
//! rejected: a closing tag closes the nearest open element with that name
//! (and everything opened after it), and a closing tag with no open
//! counterpart is ignored.

use super::tokenizer::{ElementKind, ParseError, Token, Tokenizer};
use std::collections::BTreeMap;

/// Elements that never have children in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "embed", "frame", "hr", "img", "input", "isindex",
    "link", "meta", "param",
];

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: ElementKind,
    /// Tag name as written in the source.
    pub name: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
    /// Text content for text, comment and directive nodes.
    pub data: Option<String>,
    /// Source slice, kept only when [`DomOptions::verbose`] is set.
    pub raw: Option<String>,
}

impl Node {
    /// Builds an element node; mainly useful in tests.
    pub fn element(name: &str, attributes: &[(&str, &str)], children: Vec<Node>) -> Self {
        Self {
            kind: ElementKind::Tag,
            name: Some(name.to_owned()),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            children,
            data: None,
            raw: None,
        }
    }

    /// Builds a text node.
    pub fn text(data: &str) -> Self {
        Self {
            kind: ElementKind::Text,
            name: None,
            attributes: BTreeMap::new(),
            children: Vec::new(),
            data: Some(data.to_owned()),
            raw: None,
        }
    }

    fn from_token(token: Token, verbose: bool) -> Self {
        let attributes = token.attributes().into_iter().collect();
        let data = match token.kind {
            ElementKind::Text | ElementKind::Comment | ElementKind::Directive => Some(token.data),
            _ => None,
        };
        let name = match token.kind {
            ElementKind::Text | ElementKind::Comment => None,
            _ => token.name,
        };
        Self {
            kind: token.kind,
            name,
            attributes,
            children: Vec::new(),
            data,
            raw: verbose.then_some(token.raw),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// True for tag-like nodes whose name matches ASCII case-insensitively.
    pub fn is_named(&self, name: &str) -> bool {
        self.kind.is_tag_like()
            && self
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.is_named(name))
    }

    fn is_whitespace_text(&self) -> bool {
        self.kind == ElementKind::Text
            && self
                .data
                .as_deref()
                .map_or(true, |d| d.trim().is_empty())
    }
}

/// DOM builder behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomOptions {
    /// Drop text nodes made only of whitespace.
    pub ignore_whitespace: bool,
    /// Keep each node's source slice in [`Node::raw`].
    pub verbose: bool,
    /// Treat HTML void elements (`<br>`, `<img>`, ...) as childless.
    pub enforce_void_elements: bool,
}

impl Default for DomOptions {
    fn default() -> Self {
        Self {
            ignore_whitespace: false,
            verbose: true,
            enforce_void_elements: true,
        }
    }
}

impl DomOptions {
    /// Settings for HTML fragments such as item descriptions.
    pub fn html() -> Self {
        Self {
            ignore_whitespace: true,
            verbose: false,
            enforce_void_elements: true,
        }
    }

    /// Settings for XML feed documents, where `<link>` has content.
    pub fn feed() -> Self {
        Self {
            ignore_whitespace: true,
            verbose: false,
            enforce_void_elements: false,
        }
    }
}

/// Builds a forest of [`Node`]s from tokens written one at a time.
#[derive(Debug, Default)]
pub struct DomBuilder {
    options: DomOptions,
    /// Open elements, innermost last.
    open: Vec<Node>,
    roots: Vec<Node>,
    done: bool,
}

impl DomBuilder {
    pub fn new(options: DomOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        self.open.clear();
        self.roots.clear();
        self.done = false;
    }

    /// Adds one token to the tree.
    pub fn write(&mut self, token: Token) -> Result<(), ParseError> {
        if self.done {
            return Err(ParseError::WriteAfterDone);
        }

        if token.kind.is_tag_like() && token.closing {
            self.close(token.name.as_deref().unwrap_or_default());
            return Ok(());
        }

        let node = Node::from_token(token, self.options.verbose);
        if self.options.ignore_whitespace && node.is_whitespace_text() {
            return Ok(());
        }

        if node.kind.is_tag_like() {
            let void = self.options.enforce_void_elements
                && node.name.as_deref().is_some_and(is_void);
            if void {
                self.attach(node);
            } else {
                self.open.push(node);
            }
        } else {
            self.attach(node);
        }
        Ok(())
    }

    /// Closes every open element and returns the finished forest.
    pub fn finish(&mut self) -> Result<Vec<Node>, ParseError> {
        if self.done {
            return Err(ParseError::FinishedTwice);
        }
        self.done = true;
        while let Some(node) = self.open.pop() {
            self.attach(node);
        }
        Ok(std::mem::take(&mut self.roots))
    }

    fn attach(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn close(&mut self, name: &str) {
        if self.options.enforce_void_elements && is_void(name) {
            return;
        }
        let Some(depth) = self.open.iter().rposition(|n| n.is_named(name)) else {
            tracing::trace!(name, "ignoring unmatched closing tag");
            return;
        };
        while self.open.len() > depth {
            if let Some(node) = self.open.pop() {
                self.attach(node);
            }
        }
    }
}

/// Tokenizes and assembles a complete document.
///
/// # Examples
///
/// ```
/// use feedpost::markup::{parse_document, DomOptions};
///
/// let roots = parse_document("<p>One<br>Two</p>", DomOptions::html()).unwrap();
/// assert_eq!(roots.len(), 1);
/// assert_eq!(roots[0].children.len(), 3);
/// ```
pub fn parse_document(input: &str, options: DomOptions) -> Result<Vec<Node>, ParseError> {
    let mut builder = DomBuilder::new(options);
    for token in Tokenizer::default().parse_complete(input) {
        builder.write(token)?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::tokenizer::tokenize;
    use pretty_assertions::assert_eq;

    fn quiet() -> DomOptions {
        DomOptions {
            verbose: false,
            ..DomOptions::default()
        }
    }

    #[test]
    fn test_nested_tree() {
        let roots = parse_document("<a href=\"x\"><b>bold</b> tail</a>", quiet()).unwrap();
        assert_eq!(
            roots,
            vec![Node::element(
                "a",
                &[("href", "x")],
                vec![
                    Node::element("b", &[], vec![Node::text("bold")]),
                    Node::text(" tail"),
                ]
            )]
        );
    }

    #[test]
    fn test_closing_tag_pops_intervening_elements() {
        let roots = parse_document("<div><p><i>x</div>after", quiet()).unwrap();
        assert_eq!(roots.len(), 2);
        let p = &roots[0].children[0];
        assert!(p.is_named("p"));
        assert!(p.children[0].is_named("i"));
        assert_eq!(roots[1], Node::text("after"));
    }

    #[test]
    fn test_unmatched_closing_tag_ignored() {
        let roots = parse_document("<p>a</span>b</p>", quiet()).unwrap();
        assert_eq!(
            roots,
            vec![Node::element("p", &[], vec![Node::text("a"), Node::text("b")])]
        );
    }

    #[test]
    fn test_closing_match_is_case_insensitive() {
        let roots = parse_document("<P>x</p><q>", quiet()).unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name.as_deref(), Some("P"));
    }

    #[test]
    fn test_void_elements_have_no_children() {
        let roots = parse_document("<p><img src=\"a\">text<br>more</p>", quiet()).unwrap();
        let p = &roots[0];
        assert_eq!(p.children.len(), 4);
        assert!(p.children[0].children.is_empty());
        assert_eq!(p.children[0].attr("src"), Some("a"));
    }

    #[test]
    fn test_void_enforcement_disabled_for_feeds() {
        let roots = parse_document("<item><link>http://x/</link></item>", DomOptions::feed()).unwrap();
        let link = roots[0].child("link").unwrap();
        assert_eq!(link.children, vec![Node::text("http://x/")]);
    }

    #[test]
    fn test_link_is_void_in_html_mode() {
        let roots = parse_document("<item><link>http://x/</link></item>", DomOptions::html()).unwrap();
        let item = &roots[0];
        assert_eq!(item.children.len(), 2);
        assert!(item.children[0].children.is_empty());
    }

    #[test]
    fn test_self_closing_element() {
        let roots = parse_document("<a><b/>c</a>", quiet()).unwrap();
        let a = &roots[0];
        assert_eq!(a.children.len(), 2);
        assert!(a.children[0].children.is_empty());
        assert_eq!(a.children[1], Node::text("c"));
    }

    #[test]
    fn test_ignore_whitespace() {
        let input = "<rss>\n  <channel>\n  </channel>\n</rss>";
        let kept = parse_document(input, quiet()).unwrap();
        assert_eq!(kept[0].children.len(), 3);

        let stripped = parse_document(input, DomOptions::feed()).unwrap();
        assert_eq!(stripped[0].children.len(), 1);
    }

    #[test]
    fn test_verbose_keeps_raw() {
        let roots = parse_document("<a x=1>t</a>", DomOptions::default()).unwrap();
        assert_eq!(roots[0].raw.as_deref(), Some("<a x=1>"));
        assert_eq!(roots[0].children[0].raw.as_deref(), Some("t"));

        let roots = parse_document("<a x=1>t</a>", quiet()).unwrap();
        assert_eq!(roots[0].raw, None);
    }

    #[test]
    fn test_comments_and_directives_become_leaves() {
        let roots = parse_document("<?xml version=\"1.0\"?><r><!-- c --></r>", quiet()).unwrap();
        assert_eq!(roots[0].kind, ElementKind::Directive);
        assert_eq!(roots[0].name.as_deref(), Some("?xml"));
        assert_eq!(roots[1].children[0].kind, ElementKind::Comment);
        assert_eq!(roots[1].children[0].data.as_deref(), Some(" c "));
    }

    #[test]
    fn test_script_body_is_single_text_child() {
        let roots = parse_document("<script>a < b</script>", quiet()).unwrap();
        assert_eq!(roots[0].kind, ElementKind::Script);
        assert_eq!(roots[0].children, vec![Node::text("a < b")]);
    }

    #[test]
    fn test_write_after_finish() {
        let mut builder = DomBuilder::new(quiet());
        for token in tokenize("<a>") {
            builder.write(token).unwrap();
        }
        builder.finish().unwrap();
        let token = tokenize("<b>").remove(0);
        assert_eq!(builder.write(token), Err(ParseError::WriteAfterDone));
        assert_eq!(builder.finish(), Err(ParseError::FinishedTwice));

        builder.reset();
        assert!(builder.finish().unwrap().is_empty());
    }
}
