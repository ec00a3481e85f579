//! Feed retrieval and normalization.
//!
//! - **Fetching**: [`Transport`] abstracts the HTTP GET; [`HttpTransport`]
//!   adds timeouts, retries and body limits
//! - **Autodiscovery**: HTML pages are scanned for an RSS `<link>`
//! - **Extraction**: RSS 2.0 and RDF items become schema.org-style [`Entry`]
//!   records
//!
//! # Architecture
//!
//! - [`source`] - the `fetch` / `process` / `find` pipeline
//! - [`collection`] - concurrent fan-out over several queries
//! - [`wordpress`] - WordPress feed URL construction
//!
//! # Example
//!
//! ```no_run
//! use feedpost::config::Config;
//! use feedpost::feed::{FeedSource, HttpTransport, Query};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = FeedSource::new(HttpTransport::new(&Config::default())?);
//! let feed = source.find(&Query::for_url("https://blog.rust-lang.org/")).await?;
//! for entry in &feed.entries {
//!     println!("{}", entry.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod collection;
mod discovery;
mod entry;
mod extract;
mod fetcher;
pub mod source;
pub mod wordpress;

pub use collection::find_many;
pub use discovery::find_feed_link;
pub use entry::{Entry, Feed, ImageObject, ItemType, Named};
pub use extract::{
    extract_entries, find_root, locate_items, normalize_item, parse_fragment,
    strip_tracking_params, Dialect, ExtractOptions, Fragment,
};
pub use fetcher::{FetchError, HttpTransport, Transport};
pub use source::{FeedError, FeedSource, Filter, Query, Stage};
pub use wordpress::{find_posts, WordPressQuery};
