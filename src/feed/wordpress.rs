//! WordPress blogs as a feed source.
//!
//! WordPress serves RSS for the whole blog, a tag, a category or a search,
//! and an RDF document for a single post or page. [`WordPressQuery::feed_url`]
//! maps the filter fields onto those URL forms.

use super::entry::Feed;
use super::fetcher::Transport;
use super::source::{FeedError, FeedSource, Filter, Query};
use serde::Deserialize;
use url::form_urlencoded;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WordPressQuery {
    /// Root URL of the blog.
    pub url: Option<String>,
    /// Path of a single post or page; overrides every other filter.
    pub path: Option<String>,
    /// Maximum number of entries returned.
    pub quantity: Option<usize>,
    /// A category name, or comma separated category IDs.
    pub categories: Option<String>,
    /// Comma separated category IDs to leave out. Ignored when
    /// `categories` is set.
    pub exclude_categories: Option<String>,
    /// A tag name, or comma separated tag IDs.
    pub tags: Option<String>,
    pub search: Option<String>,
    pub disable_thumbnail_extraction: bool,
}

/// How a tag or category filter is expressed.
enum Selector {
    /// IDs go in a query parameter.
    Ids(String),
    /// A name changes the feed path.
    Name(String),
}

impl Selector {
    fn parse(value: Option<&str>) -> Option<Self> {
        let value = compact(value?);
        if value.is_empty() {
            None
        } else if is_id_list(&value) {
            Some(Self::Ids(value))
        } else {
            Some(Self::Name(value))
        }
    }
}

impl WordPressQuery {
    /// The feed URL for this query, or `None` without a blog URL.
    ///
    /// ```
    /// use feedpost::feed::WordPressQuery;
    ///
    /// let query = WordPressQuery {
    ///     url: Some("http://blog.example.com/".into()),
    ///     tags: Some("rust".into()),
    ///     ..Default::default()
    /// };
    /// assert_eq!(
    ///     query.feed_url().as_deref(),
    ///     Some("http://blog.example.com/tag/rust/feed")
    /// );
    /// ```
    pub fn feed_url(&self) -> Option<String> {
        let base = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let base = base.trim_end_matches('/');

        if let Some(path) = self.path.as_deref().filter(|p| !p.trim().is_empty()) {
            return Some(format!(
                "{base}/{}?feed=rdf",
                path.trim().trim_start_matches('/')
            ));
        }

        let search = self.search.as_deref().map(compact).filter(|s| !s.is_empty());
        let mut params = form_urlencoded::Serializer::new(String::new());
        let mut unique_path = None;

        match Selector::parse(self.tags.as_deref()) {
            Some(Selector::Ids(ids)) => {
                params.append_pair("tag", &ids);
            }
            Some(Selector::Name(name)) => unique_path = Some(format!("{base}/tag/{name}/feed")),
            None => {}
        }

        match Selector::parse(self.categories.as_deref()) {
            Some(Selector::Ids(ids)) => {
                params.append_pair("cat", &ids);
            }
            Some(Selector::Name(name)) => {
                unique_path.get_or_insert_with(|| format!("{base}/category/{name}/feed"));
            }
            None => {
                if let Some(excluded) = self.excluded_categories() {
                    params.append_pair("cat", &excluded);
                }
            }
        }

        if let Some(search) = &search {
            params.append_pair("s", search);
        }

        match unique_path {
            Some(path) => Some(match search {
                Some(search) => {
                    let query = form_urlencoded::Serializer::new(String::new())
                        .append_pair("s", &search)
                        .finish();
                    format!("{path}?{query}")
                }
                None => path,
            }),
            None => {
                params.append_pair("feed", "rss2");
                Some(format!("{base}/?{}", params.finish()))
            }
        }
    }

    /// Entry limit: 1 for a single post, else `quantity` when positive.
    pub fn limit(&self) -> Option<usize> {
        if self.path.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            Some(1)
        } else {
            self.quantity.filter(|&q| q > 0)
        }
    }

    fn excluded_categories(&self) -> Option<String> {
        let value = compact(self.exclude_categories.as_deref()?);
        let ids: Vec<String> = value
            .split(',')
            .filter(|id| !id.is_empty())
            .map(|id| format!("-{}", id.trim_start_matches('-')))
            .collect();
        (!ids.is_empty()).then(|| ids.join(","))
    }
}

/// Fetches posts from a WordPress blog.
///
/// A query without a blog URL falls through to a plain `find`, which yields
/// an empty feed.
pub async fn find_posts<T: Transport>(
    source: &FeedSource<T>,
    query: &WordPressQuery,
) -> Result<Feed, FeedError> {
    let feed_url = query.feed_url();
    if let Some(url) = &feed_url {
        tracing::debug!(url = %url, "Built WordPress feed URL");
    }

    let mut feed = source
        .find(&Query {
            filter: Filter {
                url: feed_url,
                disable_thumbnail_extraction: query.disable_thumbnail_extraction,
            },
        })
        .await?;

    if let Some(limit) = query.limit() {
        feed.entries.truncate(limit);
    }
    Ok(feed)
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_id_list(value: &str) -> bool {
    value.bytes().any(|b| b.is_ascii_digit())
        && value.bytes().all(|b| b.is_ascii_digit() || b == b',')
}
