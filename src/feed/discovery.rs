use crate::markup::{find_all, parse_document, DomOptions, Predicate};
use crate::uri::Uri;

const FEED_TYPE: &str = "application/rss+xml";

/// Scans an HTML page for `<link rel="alternate" type="application/rss+xml">`.
///
/// The `href` is resolved against the page's effective base: the first
/// `<base href>` (itself resolved against `page_url`) or `page_url`.
/// Returns the first matching feed URL, or `None` if no feed link is found,
/// in which case the page is assumed to be the feed itself.
///
/// # Examples
///
/// ```
/// use feedpost::feed::find_feed_link;
///
/// let html = r#"<head><link rel="alternate" type="application/rss+xml" href="/feed"></head>"#;
/// assert_eq!(
///     find_feed_link(html, "http://site/page").as_deref(),
///     Some("http://site/feed")
/// );
/// ```
pub fn find_feed_link(html: &str, page_url: &str) -> Option<String> {
    let roots = parse_document(html, DomOptions::html()).ok()?;

    let page = Uri::new(page_url);
    let base = find_all(
        &roots,
        &[Predicate::Name("base"), Predicate::HasAttribute("href")],
        true,
        Some(1),
    )
    .first()
    .and_then(|node| node.attr("href"))
    .map(|href| page.resolve(href))
    .unwrap_or(page)
    .defrag();

    let link = find_all(
        &roots,
        &[Predicate::Name("link"), Predicate::HasAttribute("href")],
        true,
        None,
    )
    .into_iter()
    .find(|node| {
        let alternate = node.attr("rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|t| t.eq_ignore_ascii_case("alternate"))
        });
        let feed_type = node
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(FEED_TYPE));
        alternate && feed_type
    })?;

    let href = link.attr("href")?;
    let resolved = base.resolve(href).into_string();
    tracing::debug!(href = %href, feed_url = %resolved, "Discovered feed link");
    Some(resolved)
}
