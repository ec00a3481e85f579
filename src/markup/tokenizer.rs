//! Streaming, forgiving markup tokenizer.
//!
//! The tokenizer accepts a document in arbitrary chunks and yields typed
//! [`Token`]s as soon as the buffered input is enough to complete them. It
//! never rejects markup: anything it cannot classify becomes text.
//!
//! Recognized constructs:
//!
//! - `<!-- ... -->` comments, which may span any number of chunks
//! - `<![CDATA[ ... ]]>` sections, emitted as undecoded text
//! - `<!...>` and `<?...>` directives
//! - `<script>` / `<style>` bodies, emitted as raw text up to the matching
//!   closing tag (a `<!--` inside the body opens a nested comment)
//! - self-terminating tags (`<br/>`), followed by a synthesized closing token
//!
//! Concatenating the `raw` field of every token reproduces the input exactly.

use super::entities;
use regex::Regex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Leading tag name, with an optional `/` marking a closing tag.
static TAG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(/?)\s*([^\s/]+)").expect("tag name pattern is valid"));

/// Double-quoted, single-quoted, unquoted and valueless attributes.
static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"([^=<>"'\s]+)\s*=\s*"([^"]*)"|([^=<>"'\s]+)\s*=\s*'([^']*)'|([^=<>"'\s]+)\s*=\s*([^'"\s]+)|([^=<>"'\s/]+)"#,
    )
    .expect("attribute pattern is valid")
});

/// Errors raised while tokenizing or assembling a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// `parse_chunk` was called after `done()` without a `reset()`.
    #[error("attempted to parse a chunk after parsing was done")]
    ChunkAfterDone,
    /// A token was written to a DOM builder that already finished.
    #[error("token written after the document was finished; reset() first")]
    WriteAfterDone,
    /// `finish()` was called twice on the same DOM builder.
    #[error("document already finished")]
    FinishedTwice,
}

/// Kind of a token or DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Text,
    Tag,
    Script,
    Style,
    Comment,
    Directive,
}

impl ElementKind {
    /// Tags, including `<script>` and `<style>`.
    pub fn is_tag_like(self) -> bool {
        matches!(self, Self::Tag | Self::Script | Self::Style)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Tag => "tag",
            Self::Script => "script",
            Self::Style => "style",
            Self::Comment => "comment",
            Self::Directive => "directive",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based position of the first character of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Default for Location {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

/// A single lexical unit of markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: ElementKind,
    /// Exact input slice, delimiters included. Empty for synthesized tokens.
    pub raw: String,
    /// Entity-decoded text for text and comments; trimmed tag body for tags
    /// and directives; undecoded content for CDATA and script/style bodies.
    pub data: String,
    /// Tag name without the closing `/`, or the leading word of a directive.
    pub name: Option<String>,
    pub closing: bool,
    /// The tag ended with `/>`; a closing token follows it.
    pub self_closing: bool,
    pub location: Option<Location>,
}

impl Token {
    fn text(raw: &str, data: String) -> Self {
        Self {
            kind: ElementKind::Text,
            raw: raw.to_owned(),
            data,
            name: None,
            closing: false,
            self_closing: false,
            location: None,
        }
    }

    fn comment(raw: &str, body: &str) -> Self {
        Self {
            kind: ElementKind::Comment,
            data: entities::decode(body).into_owned(),
            ..Self::text(raw, String::new())
        }
    }

    /// Parses the attributes of an opening tag.
    ///
    /// Attributes are extracted on demand rather than during the scan.
    /// Values are entity-decoded; a valueless attribute maps to its own name.
    pub fn attributes(&self) -> Vec<(String, String)> {
        if !self.kind.is_tag_like() || self.closing {
            return Vec::new();
        }

        let name_end = self
            .data
            .find(char::is_whitespace)
            .unwrap_or(self.data.len());
        let mut source = &self.data[name_end..];
        if self.self_closing {
            let trimmed = source.trim_end();
            source = trimmed.strip_suffix('/').unwrap_or(trimmed);
        }

        ATTRIBUTE_RE
            .captures_iter(source)
            .filter_map(|caps| {
                if let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) {
                    Some((name.as_str(), decode_owned(value.as_str())))
                } else if let (Some(name), Some(value)) = (caps.get(3), caps.get(4)) {
                    Some((name.as_str(), decode_owned(value.as_str())))
                } else if let (Some(name), Some(value)) = (caps.get(5), caps.get(6)) {
                    Some((name.as_str(), decode_owned(value.as_str())))
                } else {
                    caps.get(7)
                        .map(|name| (name.as_str(), name.as_str().to_owned()))
                }
            })
            .map(|(name, value)| (name.to_owned(), value))
            .collect()
    }
}

fn decode_owned(value: &str) -> String {
    entities::decode(value).into_owned()
}

/// Tokenizer behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenizerOptions {
    /// Record the line and column where each token starts.
    pub track_location: bool,
}

/// Contexts in which `<` does not start ordinary markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawContext {
    Comment,
    Script,
    Style,
}

impl RawContext {
    fn closing_tag(self) -> &'static str {
        match self {
            Self::Script => "</script",
            Self::Style => "</style",
            Self::Comment => COMMENT_CLOSE,
        }
    }

    fn kind(self) -> ElementKind {
        match self {
            Self::Script => ElementKind::Script,
            Self::Style => ElementKind::Style,
            Self::Comment => ElementKind::Comment,
        }
    }
}

/// Outcome of one scanning step over the unconsumed input.
#[derive(Debug, Default)]
struct Step {
    tokens: Vec<Token>,
    enter: Option<RawContext>,
    leave: bool,
}

impl Step {
    fn emit(tokens: Vec<Token>) -> Option<Self> {
        Some(Self {
            tokens,
            ..Self::default()
        })
    }

    fn enter(context: RawContext) -> Option<Self> {
        Some(Self {
            enter: Some(context),
            ..Self::default()
        })
    }

    fn leave(tokens: Vec<Token>) -> Option<Self> {
        Some(Self {
            tokens,
            leave: true,
            ..Self::default()
        })
    }
}

/// Where the next piece of markup begins in a text run.
enum MarkupStart {
    At(usize),
    /// A `<` is the last buffered character; its meaning depends on the next chunk.
    Undecided(usize),
    Absent,
}

/// Incremental tokenizer over a single document.
///
/// Feed input with [`parse_chunk`](Self::parse_chunk), signal the end with
/// [`done`](Self::done), and pull tokens through the [`Iterator`]
/// implementation. Tokens become available as soon as they are complete.
///
/// # Examples
///
/// ```
/// use feedpost::markup::{ElementKind, Tokenizer};
///
/// let mut tokenizer = Tokenizer::default();
/// tokenizer.parse_chunk("<p>Fish &amp; ").unwrap();
/// tokenizer.parse_chunk("chips</p>").unwrap();
/// tokenizer.done();
///
/// let tokens: Vec<_> = tokenizer.collect();
/// assert_eq!(tokens.len(), 3);
/// assert_eq!(tokens[1].kind, ElementKind::Text);
/// assert_eq!(tokens[1].data, "Fish & chips");
/// ```
#[derive(Debug, Default)]
pub struct Tokenizer {
    options: TokenizerOptions,
    buffer: String,
    /// Byte offset of the first unconsumed character in `buffer`.
    cursor: usize,
    /// Comment/script/style contexts, innermost last.
    contexts: Vec<RawContext>,
    ready: VecDeque<Token>,
    location: Location,
    done: bool,
}

impl Tokenizer {
    pub fn new(options: TokenizerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Clears all state so the tokenizer can take a new document.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.contexts.clear();
        self.ready.clear();
        self.location = Location::default();
        self.done = false;
    }

    /// Appends a chunk of input and tokenizes as much as possible.
    pub fn parse_chunk(&mut self, chunk: &str) -> Result<(), ParseError> {
        if self.done {
            return Err(ParseError::ChunkAfterDone);
        }
        self.buffer.push_str(chunk);
        self.scan(false);
        Ok(())
    }

    /// Flushes any unterminated content as a final token.
    ///
    /// Only the first call has an effect.
    pub fn done(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.scan(true);
        self.contexts.clear();
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Tokenizes a complete document, discarding any previous state.
    pub fn parse_complete(&mut self, input: &str) -> Vec<Token> {
        self.reset();
        self.buffer.push_str(input);
        self.done();
        self.ready.drain(..).collect()
    }

    fn scan(&mut self, at_eof: bool) {
        while self.cursor < self.buffer.len() {
            let rest = &self.buffer[self.cursor..];
            let step = match self.contexts.last().copied() {
                None => scan_markup(rest, at_eof),
                Some(RawContext::Comment) => scan_comment(rest, at_eof),
                Some(context) => scan_raw_text(rest, context, at_eof),
            };
            let Some(step) = step else {
                break;
            };

            if step.leave {
                self.contexts.pop();
            }
            if let Some(context) = step.enter {
                self.contexts.push(context);
            }
            for mut token in step.tokens {
                if self.options.track_location {
                    token.location = Some(self.location);
                    advance(&mut self.location, &token.raw);
                }
                self.cursor += token.raw.len();
                self.ready.push_back(token);
            }
        }

        self.buffer.drain(..self.cursor);
        self.cursor = 0;
    }
}

impl Iterator for Tokenizer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.ready.pop_front()
    }
}

/// Tokenizes a complete document in one call.
pub fn tokenize(input: &str) -> Vec<Token> {
    Tokenizer::default().parse_complete(input)
}

fn advance(location: &mut Location, consumed: &str) {
    for c in consumed.chars() {
        match c {
            '\n' => {
                location.line += 1;
                location.column = 1;
            }
            '\r' => {}
            _ => location.column += 1,
        }
    }
}

fn opens_markup(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || matches!(byte, b'/' | b'!' | b'?')
}

fn markup_start(text: &str) -> MarkupStart {
    let bytes = text.as_bytes();
    for (idx, &byte) in bytes.iter().enumerate() {
        if byte != b'<' {
            continue;
        }
        match bytes.get(idx + 1) {
            None => return MarkupStart::Undecided(idx),
            Some(&next) if opens_markup(next) => return MarkupStart::At(idx),
            Some(_) => {}
        }
    }
    MarkupStart::Absent
}

/// True when `rest` could still grow into `marker` with more input.
fn is_partial(rest: &str, marker: &str) -> bool {
    rest.len() < marker.len() && marker.starts_with(rest)
}

fn text_token(raw: &str) -> Token {
    Token::text(raw, decode_owned(raw))
}

fn scan_markup(rest: &str, at_eof: bool) -> Option<Step> {
    match markup_start(rest) {
        MarkupStart::At(0) => scan_tag(rest, at_eof),
        MarkupStart::At(idx) => Step::emit(vec![text_token(&rest[..idx])]),
        MarkupStart::Undecided(_) | MarkupStart::Absent if at_eof => {
            Step::emit(vec![text_token(rest)])
        }
        MarkupStart::Undecided(_) | MarkupStart::Absent => None,
    }
}

fn scan_tag(rest: &str, at_eof: bool) -> Option<Step> {
    if rest.starts_with(COMMENT_OPEN) {
        return Step::enter(RawContext::Comment);
    }
    if rest.starts_with(CDATA_OPEN) {
        return scan_cdata(rest, at_eof);
    }
    if !at_eof && (is_partial(rest, COMMENT_OPEN) || is_partial(rest, CDATA_OPEN)) {
        return None;
    }

    let (raw, inner) = match rest.find('>') {
        Some(end) => (&rest[..=end], &rest[1..end]),
        None if at_eof => (rest, &rest[1..]),
        None => return None,
    };

    if inner.starts_with('!') || inner.starts_with('?') {
        let data = inner.trim();
        let name = data.split_whitespace().next().map(str::to_owned);
        return Step::emit(vec![Token {
            kind: ElementKind::Directive,
            data: data.to_owned(),
            name,
            ..Token::text(raw, String::new())
        }]);
    }

    let Some(caps) = TAG_NAME_RE.captures(inner) else {
        return Step::emit(vec![text_token(raw)]);
    };
    let closing = !caps[1].is_empty();
    let name = caps[2].to_owned();
    let data = inner.trim();
    let self_closing = !closing && data.ends_with('/');

    let context = if name.eq_ignore_ascii_case("script") {
        Some(RawContext::Script)
    } else if name.eq_ignore_ascii_case("style") {
        Some(RawContext::Style)
    } else {
        None
    };
    let kind = context.map_or(ElementKind::Tag, RawContext::kind);

    let token = Token {
        kind,
        raw: raw.to_owned(),
        data: data.to_owned(),
        name: Some(name.clone()),
        closing,
        self_closing,
        location: None,
    };

    let mut tokens = vec![token];
    if self_closing {
        tokens.push(Token {
            kind,
            raw: String::new(),
            data: format!("/{name}"),
            name: Some(name),
            closing: true,
            self_closing: false,
            location: None,
        });
    }

    let enter = context.filter(|_| !closing && !self_closing && raw.ends_with('>'));
    Some(Step {
        tokens,
        enter,
        leave: false,
    })
}

fn scan_cdata(rest: &str, at_eof: bool) -> Option<Step> {
    let body_start = CDATA_OPEN.len();
    match rest[body_start..].find(CDATA_CLOSE) {
        Some(offset) => {
            let end = body_start + offset;
            let raw = &rest[..end + CDATA_CLOSE.len()];
            Step::emit(vec![Token::text(raw, rest[body_start..end].to_owned())])
        }
        None if at_eof => Step::emit(vec![Token::text(rest, rest[body_start..].to_owned())]),
        None => None,
    }
}

/// `rest` always begins with `<!--` while a comment context is open.
fn scan_comment(rest: &str, at_eof: bool) -> Option<Step> {
    let body_start = COMMENT_OPEN.len();
    match rest[body_start..].find(COMMENT_CLOSE) {
        Some(offset) => {
            let end = body_start + offset;
            let raw = &rest[..end + COMMENT_CLOSE.len()];
            Step::leave(vec![Token::comment(raw, &rest[body_start..end])])
        }
        None if at_eof => Step::leave(vec![Token::comment(rest, &rest[body_start..])]),
        None => None,
    }
}

/// Finds the closing tag of a script/style body, ASCII case-insensitively.
fn find_closing_tag(haystack: &str, closing: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let needle = closing.as_bytes();
    (0..bytes.len().saturating_sub(needle.len() - 1)).find(|&idx| {
        bytes[idx..idx + needle.len()].eq_ignore_ascii_case(needle)
            && bytes
                .get(idx + needle.len())
                .map_or(true, |&b| b == b'>' || b == b'/' || b.is_ascii_whitespace())
    })
}

fn scan_raw_text(rest: &str, context: RawContext, at_eof: bool) -> Option<Step> {
    let comment = rest.find(COMMENT_OPEN);
    let closing = find_closing_tag(rest, context.closing_tag());

    match (comment, closing) {
        (Some(0), close) if close.map_or(true, |c| c > 0) => Step::enter(RawContext::Comment),
        (Some(start), close) if close.map_or(true, |c| c > start) => {
            Step::emit(vec![Token::text(&rest[..start], rest[..start].to_owned())])
        }
        (_, Some(close)) => {
            let Some(offset) = rest[close..].find('>') else {
                return at_eof.then(|| raw_text_remainder(rest)).flatten();
            };
            let tag_end = close + offset;
            let inner = &rest[close + 1..tag_end];
            let name = inner.trim_start_matches('/').trim();
            let name = name
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or(name);

            let mut tokens = Vec::with_capacity(2);
            if close > 0 {
                tokens.push(Token::text(&rest[..close], rest[..close].to_owned()));
            }
            tokens.push(Token {
                kind: context.kind(),
                raw: rest[close..=tag_end].to_owned(),
                data: inner.trim().to_owned(),
                name: Some(name.to_owned()),
                closing: true,
                self_closing: false,
                location: None,
            });
            Step::leave(tokens)
        }
        _ if at_eof => raw_text_remainder(rest),
        _ => None,
    }
}

fn raw_text_remainder(rest: &str) -> Option<Step> {
    Step::leave(vec![Token::text(rest, rest.to_owned())])
}
