//! URI references and RFC 3986 reference resolution.
//!
//! [`Uri`] wraps a URI string and exposes its components as borrowed views
//! computed on demand. Resolution never mutates its inputs; it builds a new
//! value.

use regex::Regex;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Generic URI-reference split, with the scheme restricted to the RFC grammar
/// so that a relative path containing `:` after a `/` is not mistaken for one.
static URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:([A-Za-z][A-Za-z0-9+.\-]*):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$")
        .expect("URI pattern is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Parts<'a> {
    scheme: Option<&'a str>,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> Parts<'a> {
    fn split(value: &'a str) -> Self {
        // Every group is optional or may be empty, so the pattern matches any input.
        let Some(caps) = URI_RE.captures(value) else {
            return Self {
                path: value,
                ..Self::default()
            };
        };
        Self {
            scheme: caps.get(1).map(|m| m.as_str()),
            authority: caps.get(2).map(|m| m.as_str()),
            path: caps.get(3).map_or("", |m| m.as_str()),
            query: caps.get(4).map(|m| m.as_str()),
            fragment: caps.get(5).map(|m| m.as_str()),
        }
    }
}

/// Owned result components, recomposed per RFC 3986 §5.3.
#[derive(Debug, Default)]
struct Target {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Target {
    fn recompose(self) -> String {
        let mut out = String::new();
        if let Some(scheme) = self.scheme {
            out.push_str(&scheme);
            out.push(':');
        }
        if let Some(authority) = self.authority {
            out.push_str("//");
            out.push_str(&authority);
        }
        out.push_str(&self.path);
        if let Some(query) = self.query {
            out.push('?');
            out.push_str(&query);
        }
        if let Some(fragment) = self.fragment {
            out.push('#');
            out.push_str(&fragment);
        }
        out
    }
}

/// An immutable URI reference.
///
/// # Examples
///
/// ```
/// use feedpost::uri::Uri;
///
/// let base = Uri::new("http://example.com/blog/post.html");
/// assert_eq!(base.resolve("../feed.xml").as_str(), "http://example.com/feed.xml");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri {
    value: String,
}

impl Uri {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }

    fn parts(&self) -> Parts<'_> {
        Parts::split(&self.value)
    }

    /// Scheme without the trailing `:`.
    pub fn scheme(&self) -> Option<&str> {
        self.parts().scheme
    }

    /// Authority without the leading `//`; may be empty (`file:///x`).
    pub fn authority(&self) -> Option<&str> {
        self.parts().authority
    }

    pub fn path(&self) -> &str {
        self.parts().path
    }

    /// Query without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.parts().query
    }

    /// Fragment without the leading `#`.
    pub fn fragment(&self) -> Option<&str> {
        self.parts().fragment
    }

    pub fn userinfo(&self) -> Option<&str> {
        let authority = self.authority()?;
        authority.rfind('@').map(|at| &authority[..at])
    }

    /// Host part of the authority. IPv6 literals keep their brackets.
    pub fn host(&self) -> Option<&str> {
        let authority = self.authority()?;
        let host_port = authority.rfind('@').map_or(authority, |at| &authority[at + 1..]);
        Some(&host_port[..port_separator(host_port).unwrap_or(host_port.len())])
    }

    pub fn port(&self) -> Option<u16> {
        let authority = self.authority()?;
        let host_port = authority.rfind('@').map_or(authority, |at| &authority[at + 1..]);
        let sep = port_separator(host_port)?;
        host_port[sep + 1..].parse().ok()
    }

    /// The same reference with any fragment removed.
    pub fn defrag(&self) -> Uri {
        match self.value.find('#') {
            Some(idx) => Uri::new(&self.value[..idx]),
            None => self.clone(),
        }
    }

    /// An absolute URI has a scheme and no fragment.
    pub fn is_absolute(&self) -> bool {
        let parts = self.parts();
        parts.scheme.is_some() && parts.fragment.is_none()
    }

    /// Normalized absolute form: dot segments removed, fragment dropped.
    ///
    /// Returns `None` when the reference has no scheme.
    pub fn to_absolute(&self) -> Option<Uri> {
        self.scheme()?;
        Some(resolve_reference(self, self).defrag())
    }

    /// Resolves `reference` using `self` as the base URI.
    pub fn resolve(&self, reference: &str) -> Uri {
        resolve_reference(self, &Uri::new(reference))
    }
}

/// Byte index of the `:` separating host and port, ignoring colons inside an
/// IPv6 literal.
fn port_separator(host_port: &str) -> Option<usize> {
    let idx = host_port.rfind(':')?;
    match host_port.rfind(']') {
        Some(bracket) if bracket > idx => None,
        _ => Some(idx),
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Uri {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Uri::new(s))
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Uri::new(value)
    }
}

impl From<String> for Uri {
    fn from(value: String) -> Self {
        Uri::new(value)
    }
}

/// Resolves a URI reference against a base (RFC 3986 §5.2.2, strict).
pub fn resolve_reference(base: &Uri, reference: &Uri) -> Uri {
    let b = base.parts();
    let r = reference.parts();
    let owned = |s: Option<&str>| s.map(str::to_owned);

    let mut target = Target {
        fragment: owned(r.fragment),
        ..Target::default()
    };

    if r.scheme.is_some() {
        target.scheme = owned(r.scheme);
        target.authority = owned(r.authority);
        target.path = remove_dot_segments(r.path);
        target.query = owned(r.query);
    } else {
        if r.authority.is_some() {
            target.authority = owned(r.authority);
            target.path = remove_dot_segments(r.path);
            target.query = owned(r.query);
        } else {
            if r.path.is_empty() {
                target.path = b.path.to_owned();
                target.query = owned(r.query.or(b.query));
            } else {
                if r.path.starts_with('/') {
                    target.path = remove_dot_segments(r.path);
                } else {
                    target.path = remove_dot_segments(&merge(&b, r.path));
                }
                target.query = owned(r.query);
            }
            target.authority = owned(b.authority);
        }
        target.scheme = owned(b.scheme);
    }

    Uri::new(target.recompose())
}

/// RFC 3986 §5.2.3.
fn merge(base: &Parts<'_>, reference_path: &str) -> String {
    if base.authority.is_some() && base.path.is_empty() {
        return format!("/{reference_path}");
    }
    match base.path.rfind('/') {
        Some(idx) => format!("{}{}", &base.path[..=idx], reference_path),
        None => reference_path.to_owned(),
    }
}

/// Interprets and removes `.` and `..` segments (RFC 3986 §5.2.4).
///
/// ```
/// use feedpost::uri::remove_dot_segments;
///
/// assert_eq!(remove_dot_segments("/a/b/c/./../../g"), "/a/g");
/// assert_eq!(remove_dot_segments("mid/content=5/../6"), "mid/6");
/// ```
pub fn remove_dot_segments(path: &str) -> String {
    let mut input = path;
    let mut output = String::with_capacity(path.len());

    while !input.is_empty() {
        if let Some(rest) = input.strip_prefix("../") {
            input = rest;
        } else if let Some(rest) = input.strip_prefix("./") {
            input = rest;
        } else if input.starts_with("/./") {
            input = &input[2..];
        } else if input == "/." {
            input = "/";
        } else if input.starts_with("/../") {
            input = &input[3..];
            pop_segment(&mut output);
        } else if input == "/.." {
            input = "/";
            pop_segment(&mut output);
        } else if input == "." || input == ".." {
            input = "";
        } else {
            let start = usize::from(input.starts_with('/'));
            let end = input[start..]
                .find('/')
                .map_or(input.len(), |idx| idx + start);
            output.push_str(&input[..end]);
            input = &input[end..];
        }
    }

    output
}

fn pop_segment(output: &mut String) {
    match output.rfind('/') {
        Some(idx) => output.truncate(idx),
        None => output.clear(),
    }
}
