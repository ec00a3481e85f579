//! Forgiving markup processing: tokenizer, DOM builder and queries.
//!
//! The same stack reads RSS/RDF documents and the HTML fragments embedded in
//! their items. It never fails on malformed input; errors only signal API
//! misuse such as writing after completion.

pub mod dom;
pub mod entities;
pub mod query;
pub mod tokenizer;

pub use dom::{parse_document, DomBuilder, DomOptions, Node};
pub use query::{
    child_text, find_all, find_by_id, find_by_kind, find_by_name, find_first, matches_all,
    text_content, Predicate,
};
pub use tokenizer::{
    tokenize, ElementKind, Location, ParseError, Token, Tokenizer, TokenizerOptions,
};
