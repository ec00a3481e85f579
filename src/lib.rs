//! Forgiving RSS 2.0 and RDF feed extraction.
//!
//! Feeds (or HTML pages that link to one) are fetched, parsed with a
//! tolerant markup tokenizer and normalized into schema.org-style
//! `BlogPosting` entries.

pub mod config;
pub mod feed;
pub mod iso8601;
pub mod markup;
pub mod uri;
pub mod util;
