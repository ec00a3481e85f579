//! Searching and flattening DOM trees.

use super::dom::Node;
use super::tokenizer::ElementKind;
use regex::Regex;

/// A test applied to a node during search.
#[derive(Debug, Clone, Copy)]
pub enum Predicate<'a> {
    /// Tag-like node with this name (ASCII case-insensitive).
    Name(&'a str),
    /// Tag-like node whose name is one of these.
    NameIn(&'a [&'a str]),
    Kind(ElementKind),
    /// Text, comment or directive node whose data matches.
    TextMatches(&'a Regex),
    /// Attribute present with exactly this value.
    Attribute(&'a str, &'a str),
    HasAttribute(&'a str),
}

impl Predicate<'_> {
    pub fn matches(&self, node: &Node) -> bool {
        match *self {
            Self::Name(name) => node.is_named(name),
            Self::NameIn(names) => names.iter().any(|n| node.is_named(n)),
            Self::Kind(kind) => node.kind == kind,
            Self::TextMatches(re) => {
                matches!(
                    node.kind,
                    ElementKind::Text | ElementKind::Comment | ElementKind::Directive
                ) && node.data.as_deref().is_some_and(|d| re.is_match(d))
            }
            Self::Attribute(name, value) => node.attr(name) == Some(value),
            Self::HasAttribute(name) => node.attributes.contains_key(name),
        }
    }
}

/// True when every predicate matches; an empty set matches everything.
pub fn matches_all(node: &Node, predicates: &[Predicate<'_>]) -> bool {
    predicates.iter().all(|p| p.matches(node))
}

/// Collects matching nodes in document order, descending into children.
///
/// Predicates are AND-combined. A `limit` of `None` returns every match.
pub fn find_all<'n>(
    nodes: &'n [Node],
    predicates: &[Predicate<'_>],
    recurse: bool,
    limit: Option<usize>,
) -> Vec<&'n Node> {
    let mut found = Vec::new();
    collect(nodes, predicates, recurse, limit, &mut found);
    found
}

fn collect<'n>(
    nodes: &'n [Node],
    predicates: &[Predicate<'_>],
    recurse: bool,
    limit: Option<usize>,
    found: &mut Vec<&'n Node>,
) {
    for node in nodes {
        if limit.is_some_and(|l| found.len() >= l) {
            return;
        }
        if matches_all(node, predicates) {
            found.push(node);
        }
        if recurse && !node.children.is_empty() {
            collect(&node.children, predicates, recurse, limit, found);
        }
    }
}

pub fn find_first<'n>(
    nodes: &'n [Node],
    predicates: &[Predicate<'_>],
    recurse: bool,
) -> Option<&'n Node> {
    find_all(nodes, predicates, recurse, Some(1)).into_iter().next()
}

pub fn find_by_name<'n>(nodes: &'n [Node], name: &str, recurse: bool) -> Vec<&'n Node> {
    find_all(nodes, &[Predicate::Name(name)], recurse, None)
}

pub fn find_by_kind<'n>(nodes: &'n [Node], kind: ElementKind, recurse: bool) -> Vec<&'n Node> {
    find_all(nodes, &[Predicate::Kind(kind)], recurse, None)
}

pub fn find_by_id<'n>(nodes: &'n [Node], id: &str) -> Option<&'n Node> {
    find_first(nodes, &[Predicate::Attribute("id", id)], true)
}

/// Flattens a subtree to readable text.
///
/// Text nodes contribute their data, `<img>` its `alt` (or `title`) and
/// `<br>` a newline. Comments, directives and script/style bodies are
/// skipped. The outermost result is trimmed.
pub fn text_content(node: &Node) -> String {
    let mut out = String::new();
    append_text(node, &mut out);
    out.trim().to_owned()
}

fn append_text(node: &Node, out: &mut String) {
    match node.kind {
        ElementKind::Text => {
            if let Some(data) = &node.data {
                out.push_str(data);
            }
        }
        ElementKind::Tag if node.is_named("img") => {
            if let Some(alt) = node.attr("alt").or_else(|| node.attr("title")) {
                out.push_str(alt);
            }
        }
        ElementKind::Tag if node.is_named("br") => out.push('\n'),
        ElementKind::Tag => {
            for child in &node.children {
                append_text(child, out);
            }
        }
        ElementKind::Script | ElementKind::Style | ElementKind::Comment | ElementKind::Directive => {}
    }
}

/// Trimmed text of the first direct child named `name`, if non-empty.
pub fn child_text(node: &Node, name: &str) -> Option<String> {
    node.child(name)
        .map(text_content)
        .filter(|text| !text.is_empty())
}
