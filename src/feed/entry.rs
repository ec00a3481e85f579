//! Normalized output records, serialized in schema.org style.
//!
//! Every object carries its schema.org type twice, as `@type` and
//! `itemType`, so that both JSON-LD and microdata consumers can read it.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// schema.org type of a serialized object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    BlogPosting,
    Person,
    Thing,
    ImageObject,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlogPosting => "BlogPosting",
            Self::Person => "Person",
            Self::Thing => "Thing",
            Self::ImageObject => "ImageObject",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ItemType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The `@type` / `itemType` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct Schema {
    #[serde(rename = "@type")]
    at_type: ItemType,
    #[serde(rename = "itemType")]
    item_type: ItemType,
}

impl Schema {
    fn of(kind: ItemType) -> Self {
        Self {
            at_type: kind,
            item_type: kind,
        }
    }
}

/// A named reference: an author ([`ItemType::Person`]) or a subject
/// ([`ItemType::Thing`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Named {
    #[serde(flatten)]
    schema: Schema,
    pub name: String,
}

impl Named {
    pub fn person(name: impl Into<String>) -> Self {
        Self {
            schema: Schema::of(ItemType::Person),
            name: name.into(),
        }
    }

    pub fn thing(name: impl Into<String>) -> Self {
        Self {
            schema: Schema::of(ItemType::Thing),
            name: name.into(),
        }
    }

    pub fn item_type(&self) -> ItemType {
        self.schema.item_type
    }
}

/// Thumbnail of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageObject {
    #[serde(flatten)]
    schema: Schema,
    #[serde(rename = "contentURL")]
    pub content_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ImageObject {
    pub fn new(content_url: impl Into<String>) -> Self {
        Self {
            schema: Schema::of(ItemType::ImageObject),
            content_url: content_url.into(),
            name: None,
            width: None,
            height: None,
        }
    }
}

/// One feed item, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(flatten)]
    schema: Schema,
    /// Item title; empty when the item has none.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Plain-text rendering of the item description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Full item body with its markup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_body: Option<String>,
    /// Canonical UTC ISO-8601 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Named>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<Named>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageObject>,
    pub keywords: Vec<String>,
    /// `jf:*` / `joshfire:*` elements, keyed by tag name.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, String>,
}

impl Entry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: Schema::of(ItemType::BlogPosting),
            name: name.into(),
            url: None,
            description: None,
            article_body: None,
            date_published: None,
            author: None,
            about: None,
            image: None,
            keywords: Vec::new(),
            extensions: BTreeMap::new(),
        }
    }

    pub fn item_type(&self) -> ItemType {
        self.schema.item_type
    }
}

/// Result of processing one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub entries: Vec<Entry>,
}

impl Feed {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_minimal_entry_serialization() {
        let entry = Entry::new("Hi");
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "@type": "BlogPosting",
                "itemType": "BlogPosting",
                "name": "Hi",
                "keywords": []
            })
        );
    }

    #[test]
    fn test_full_entry_serialization() {
        let mut entry = Entry::new("Post");
        entry.url = Some("http://example.com/p".to_owned());
        entry.description = Some("Text".to_owned());
        entry.article_body = Some("<p>Text</p>".to_owned());
        entry.date_published = Some("2018-01-01T00:00:00Z".to_owned());
        entry.author = Some(Named::person("Ada"));
        entry.about = Some(Named::thing("Engines"));
        let mut image = ImageObject::new("http://example.com/i.png");
        image.name = Some("diagram".to_owned());
        image.width = Some(64);
        entry.image = Some(image);
        entry.keywords = vec!["rust".to_owned()];
        entry
            .extensions
            .insert("jf:rating".to_owned(), "5".to_owned());

        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "@type": "BlogPosting",
                "itemType": "BlogPosting",
                "name": "Post",
                "url": "http://example.com/p",
                "description": "Text",
                "articleBody": "<p>Text</p>",
                "datePublished": "2018-01-01T00:00:00Z",
                "author": {"@type": "Person", "itemType": "Person", "name": "Ada"},
                "about": {"@type": "Thing", "itemType": "Thing", "name": "Engines"},
                "image": {
                    "@type": "ImageObject",
                    "itemType": "ImageObject",
                    "contentURL": "http://example.com/i.png",
                    "name": "diagram",
                    "width": 64
                },
                "keywords": ["rust"],
                "jf:rating": "5"
            })
        );
    }

    #[test]
    fn test_item_types() {
        assert_eq!(Entry::new("").item_type(), ItemType::BlogPosting);
        assert_eq!(Named::person("a").item_type(), ItemType::Person);
        assert_eq!(Named::thing("a").item_type().to_string(), "Thing");
    }

    #[test]
    fn test_feed_serialization() {
        let feed = Feed {
            entries: vec![Entry::new("a")],
        };
        let value = serde_json::to_value(&feed).unwrap();
        assert_eq!(value["entries"][0]["name"], "a");
        assert_eq!(feed.len(), 1);
        assert!(Feed::default().is_empty());
    }
}
