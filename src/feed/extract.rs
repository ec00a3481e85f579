//! RSS 2.0 and RDF (RSS 1.0) documents to normalized [`Entry`] values.
//!
//! Extraction is forgiving: a missing or malformed item field leaves that
//! field unset and never aborts the feed. Only a document without an
//! `rss` or `rdf:RDF` root element is rejected.

use super::entry::{Entry, ImageObject, Named};
use super::source::FeedError;
use crate::iso8601;
use crate::markup::{
    child_text, find_all, find_by_name, parse_document, text_content, DomOptions, Node,
    Predicate,
};
use crate::uri::Uri;
use std::fmt;

/// Base for in-body image sources, so protocol-relative `//host/x.png`
/// values become absolute.
const IMAGE_BASE: &str = "http://example.org";

/// Ad and tracking pixel hosts never used as thumbnails.
const AD_HOSTS: [&str; 4] = [".doubleclick.net", ".pheedo.com", ".feedburner.com", ".fsdn.com"];

/// Namespaces whose item children are copied through verbatim.
const PASSTHROUGH_PREFIXES: [&str; 2] = ["jf:", "joshfire:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// RSS 1.0: items are siblings of `channel` under `rdf:RDF`.
    Rdf,
    /// RSS 2.0: items live inside `channel`.
    Rss2,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rdf => "rdf",
            Self::Rss2 => "rss2",
        })
    }
}

/// Per-query extraction switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Take thumbnails from `media:*` elements only, never from the body.
    pub disable_thumbnail_extraction: bool,
}

/// Finds the feed root among the top-level nodes.
pub fn find_root(roots: &[Node]) -> Option<(Dialect, &Node)> {
    roots
        .iter()
        .find(|n| n.is_named("rdf:RDF"))
        .map(|n| (Dialect::Rdf, n))
        .or_else(|| {
            roots
                .iter()
                .find(|n| n.is_named("rss"))
                .map(|n| (Dialect::Rss2, n))
        })
}

/// Returns the `item` elements of a parsed feed, in document order.
pub fn locate_items(roots: &[Node]) -> Result<(Dialect, Vec<&Node>), FeedError> {
    let (dialect, root) = find_root(roots).ok_or(FeedError::MissingRoot)?;

    let container = match dialect {
        Dialect::Rdf => root,
        Dialect::Rss2 => match root.child("channel") {
            Some(channel) => channel,
            None => {
                tracing::warn!("RSS document has no channel element, no items extracted");
                return Ok((dialect, Vec::new()));
            }
        },
    };

    let items = container
        .children
        .iter()
        .filter(|n| n.is_named("item"))
        .collect();
    Ok((dialect, items))
}

/// Parses feed markup and normalizes every item.
///
/// # Examples
///
/// ```
/// use feedpost::feed::{extract_entries, ExtractOptions};
///
/// let rss = "<rss><channel><item><title>Hi</title></item></channel></rss>";
/// let entries = extract_entries(rss, ExtractOptions::default()).unwrap();
/// assert_eq!(entries[0].name, "Hi");
/// ```
pub fn extract_entries(text: &str, options: ExtractOptions) -> Result<Vec<Entry>, FeedError> {
    let roots = parse_document(text, DomOptions::feed())?;
    let (dialect, items) = locate_items(&roots)?;
    let entries: Vec<Entry> = items
        .into_iter()
        .map(|item| normalize_item(item, options))
        .collect();
    tracing::debug!(%dialect, entries = entries.len(), "Extracted feed entries");
    Ok(entries)
}

/// Builds an [`Entry`] from one `item` element.
pub fn normalize_item(item: &Node, options: ExtractOptions) -> Entry {
    let mut entry = Entry::new(child_text(item, "title").unwrap_or_default());

    entry.url = child_text(item, "link")
        .or_else(|| {
            item.attr("rdf:about")
                .filter(|about| !about.is_empty())
                .map(str::to_owned)
        })
        .map(|link| strip_tracking_params(&link));

    let description = child_text(item, "description");
    entry.description = description.as_deref().map(|raw| {
        parse_fragment(raw)
            .map(|fragment| fragment.text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| raw.to_owned())
    });
    entry.article_body = child_text(item, "content:encoded").or(description);

    entry.date_published = child_text(item, "dc:date")
        .or_else(|| child_text(item, "pubDate"))
        .and_then(|date| iso8601::canonicalize(&date));

    entry.author = child_text(item, "dc:creator")
        .or_else(|| child_text(item, "author"))
        .map(Named::person);
    entry.about = child_text(item, "dc:subject").map(Named::thing);

    if !options.disable_thumbnail_extraction {
        entry.image = entry
            .article_body
            .as_deref()
            .and_then(parse_fragment)
            .and_then(|fragment| fragment.image);
    }
    if entry.image.is_none() {
        entry.image = media_thumbnail(item).or_else(|| media_content_image(item));
    }

    for child in &item.children {
        let Some(name) = child.name.as_deref() else {
            continue;
        };
        if child.kind.is_tag_like() && PASSTHROUGH_PREFIXES.iter().any(|p| name.starts_with(p)) {
            entry
                .extensions
                .insert(name.to_owned(), text_content(child));
        }
    }

    entry.keywords = find_by_name(&item.children, "category", true)
        .into_iter()
        .map(text_content)
        .filter(|keyword| !keyword.is_empty())
        .collect();

    entry
}

/// An HTML fragment reduced to text, plus its first usable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub image: Option<ImageObject>,
}

/// Parses an HTML fragment, which may have several root elements.
///
/// Returns `None` when the fragment contains no nodes at all.
pub fn parse_fragment(html: &str) -> Option<Fragment> {
    let roots = parse_document(html, DomOptions::html()).ok()?;
    if roots.is_empty() {
        return None;
    }

    let text = roots
        .iter()
        .map(text_content)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let base = Uri::new(IMAGE_BASE);
    let image = find_all(&roots, &[Predicate::Name("img")], true, None)
        .into_iter()
        .find_map(|img| {
            let src = img.attr("src").filter(|s| !s.is_empty())?;
            if AD_HOSTS.iter().any(|host| src.contains(host)) {
                return None;
            }
            let mut image = ImageObject::new(base.resolve(src).into_string());
            image.name = img.attr("alt").filter(|a| !a.is_empty()).map(str::to_owned);
            image.width = img.attr("width").and_then(parse_dimension);
            image.height = img.attr("height").and_then(parse_dimension);
            Some(image)
        });

    Some(Fragment { text, image })
}

fn media_thumbnail(item: &Node) -> Option<ImageObject> {
    let thumbnail = item.child("media:thumbnail")?;
    image_from_media(thumbnail)
}

fn media_content_image(item: &Node) -> Option<ImageObject> {
    item.children
        .iter()
        .filter(|n| n.is_named("media:content"))
        .find(|n| {
            n.attr("url").is_some_and(|u| !u.is_empty())
                && (n.attr("medium") == Some("image")
                    || n.attr("type").is_some_and(|t| t.starts_with("image/")))
        })
        .and_then(image_from_media)
}

fn image_from_media(node: &Node) -> Option<ImageObject> {
    let url = node.attr("url").filter(|u| !u.is_empty())?;
    let mut image = ImageObject::new(url);
    image.width = node.attr("width").and_then(parse_dimension);
    image.height = node.attr("height").and_then(parse_dimension);
    Some(image)
}

/// Leading decimal digits as a positive integer (`"120px"` → 120).
fn parse_dimension(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok().filter(|&n| n > 0)
}

/// Removes `utm_*` analytics parameters from a link's query string.
///
/// The fragment is kept; the `?` is dropped when no parameter survives.
///
/// ```
/// use feedpost::feed::strip_tracking_params;
///
/// assert_eq!(
///     strip_tracking_params("http://a/?utm_source=x&id=1"),
///     "http://a/?id=1"
/// );
/// ```
pub fn strip_tracking_params(link: &str) -> String {
    let Some(q) = link.find('?') else {
        return link.to_owned();
    };
    let (head, rest) = (&link[..q], &link[q + 1..]);
    let (query, fragment) = match rest.find('#') {
        Some(f) => (&rest[..f], Some(&rest[f..])),
        None => (rest, None),
    };

    let kept: Vec<&str> = query.split('&').filter(|p| !is_tracking_param(p)).collect();
    let mut out = head.to_owned();
    if kept.iter().any(|p| !p.is_empty()) {
        out.push('?');
        out.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        out.push_str(fragment);
    }
    out
}

fn is_tracking_param(param: &str) -> bool {
    let key = param.split('=').next().unwrap_or(param);
    key.strip_prefix("utm_")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_lowercase()))
}
