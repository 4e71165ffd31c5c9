use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::namespace::NamespaceTable;
use super::types::{FeedDocument, FeedHeader, Item};

/// Maximum element nesting accepted in an export.
///
/// Real WXR files nest five or six levels deep (`rss > channel > item >
/// wp:postmeta > wp:meta_value`); anything far beyond that is hostile input.
const MAX_FEED_DEPTH: usize = 64;

/// Returned by qualified lookups when the element is missing from the item.
pub const NO_CONTENT: &str = "No Content Found";

/// Errors that can occur while reading an export.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The document has no `channel` element under its root.
    #[error("Malformed feed: no <channel> element under the document root")]
    MalformedFeed,

    /// Element nesting exceeds the safety limit.
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// File I/O error.
    #[error("Failed to read feed file: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads and parses the export at `path`.
pub fn parse(path: &Path) -> Result<FeedDocument, FeedError> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parses an export held in memory.
///
/// The document is walked once. Namespace declarations are collected into a
/// [`NamespaceTable`] as they are met, the text of every direct child of
/// `channel` and of each `item` is recorded under its expanded name, and the
/// typed fields are then pulled out through qualified lookups against the
/// finished table.
///
/// # Errors
///
/// - [`FeedError::MalformedFeed`] if the root has no `channel` child
/// - [`FeedError::Xml`] on malformed XML (including unknown entities; custom
///   `<!ENTITY>` declarations are never expanded)
/// - [`FeedError::MaxDepthExceeded`] past [`MAX_FEED_DEPTH`] nested elements
pub fn parse_str(content: &str) -> Result<FeedDocument, FeedError> {
    let mut reader = Reader::from_str(content);
    let mut walker = Walker::default();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(&reader, e))?;
        match event {
            Event::Start(e) => walker.open(&e, &reader)?,
            Event::Empty(e) => {
                walker.open(&e, &reader)?;
                walker.close();
            }
            Event::End(_) => walker.close(),
            Event::Text(e) => {
                if walker.capturing() {
                    let text = e.unescape().map_err(|e| xml_error(&reader, e))?;
                    walker.push_text(&text);
                }
            }
            Event::CData(e) => {
                if walker.capturing() {
                    let text = reader
                        .decoder()
                        .decode(&e)
                        .map_err(|e| xml_error(&reader, e))?;
                    walker.push_text(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    walker.finish()
}

fn xml_error(reader: &Reader<&[u8]>, e: impl std::fmt::Display) -> FeedError {
    FeedError::Xml {
        position: reader.buffer_position(),
        message: e.to_string(),
    }
}

/// Direct-child texts of one element, keyed by expanded name.
type FieldMap = HashMap<String, String>;

/// Text being collected for a direct child of `channel` or of an `item`.
struct Capture {
    name: String,
    /// Stack depth of the captured element; text from deeper elements is ignored.
    depth: usize,
    text: String,
}

/// Streaming state for a single parse.
#[derive(Default)]
struct Walker {
    namespaces: NamespaceTable,
    stack: Vec<String>,
    channel_seen: bool,
    in_channel: bool,
    header: FieldMap,
    current_item: Option<FieldMap>,
    items: Vec<FieldMap>,
    capture: Option<Capture>,
}

impl Walker {
    fn open(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<(), FeedError> {
        if self.stack.len() >= MAX_FEED_DEPTH {
            return Err(FeedError::MaxDepthExceeded(MAX_FEED_DEPTH));
        }

        // Declarations on this element apply to its own name, so record them first.
        for attr_result in e.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping malformed attribute");
                    continue;
                }
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key == "xmlns" || key.starts_with("xmlns:") {
                let value = attr
                    .decode_and_unescape_value(reader.decoder())
                    .map_err(|err| xml_error(reader, err))?;
                self.namespaces.declare_from_attribute(&key, &value);
            }
        }

        let raw = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let name = self.namespaces.expand(&raw);
        let depth = self.stack.len();

        match depth {
            1 if !self.channel_seen && self.is(&name, "channel") => {
                self.channel_seen = true;
                self.in_channel = true;
            }
            2 if self.in_channel => {
                if self.is(&name, "item") {
                    self.current_item = Some(FieldMap::new());
                } else {
                    self.start_capture(&name, depth);
                }
            }
            3 if self.current_item.is_some() => self.start_capture(&name, depth),
            _ => {}
        }

        self.stack.push(name);
        Ok(())
    }

    fn close(&mut self) {
        let depth = self.stack.len().saturating_sub(1);
        self.stack.pop();

        if self.capture.as_ref().is_some_and(|c| c.depth == depth) {
            if let Some(capture) = self.capture.take() {
                let target = match self.current_item.as_mut() {
                    Some(fields) => fields,
                    None => &mut self.header,
                };
                // First occurrence wins, like a find() on the element tree.
                target.entry(capture.name).or_insert(capture.text);
            }
            return;
        }

        match depth {
            2 => {
                if let Some(fields) = self.current_item.take() {
                    self.items.push(fields);
                }
            }
            1 if self.in_channel => self.in_channel = false,
            _ => {}
        }
    }

    fn capturing(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|c| c.depth + 1 == self.stack.len())
    }

    fn push_text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            capture.text.push_str(text);
        }
    }

    fn start_capture(&mut self, name: &str, depth: usize) {
        self.capture = Some(Capture {
            name: name.to_string(),
            depth,
            text: String::new(),
        });
    }

    fn is(&self, expanded: &str, query: &str) -> bool {
        self.namespaces
            .expand_query(query)
            .is_some_and(|q| q == expanded)
    }

    fn finish(self) -> Result<FeedDocument, FeedError> {
        if !self.channel_seen {
            return Err(FeedError::MalformedFeed);
        }

        let header_fields = Fields::new(&self.header, &self.namespaces);
        let header = FeedHeader {
            title: header_fields.text_or_empty("title"),
            link: header_fields.text_or_empty("link"),
            description: header_fields.text_or_empty("description"),
        };

        let items = self
            .items
            .iter()
            .map(|fields| build_item(&Fields::new(fields, &self.namespaces)))
            .collect::<Vec<_>>();

        tracing::debug!(
            title = %header.title,
            items = items.len(),
            "Parsed feed document"
        );

        Ok(FeedDocument { header, items })
    }
}

/// Qualified lookups over one element's recorded children.
struct Fields<'a> {
    map: &'a FieldMap,
    namespaces: &'a NamespaceTable,
}

impl<'a> Fields<'a> {
    fn new(map: &'a FieldMap, namespaces: &'a NamespaceTable) -> Self {
        Self { map, namespaces }
    }

    /// Text of the child named by `query` (`prefix:tag` or `tag`), if present.
    fn get(&self, query: &str) -> Option<&'a str> {
        let key = self.namespaces.expand_query(query)?;
        self.map.get(&key).map(String::as_str)
    }

    /// Text of the child, or [`NO_CONTENT`] when it is missing.
    fn text(&self, query: &str) -> String {
        self.get(query).unwrap_or(NO_CONTENT).to_string()
    }

    fn text_or_empty(&self, query: &str) -> String {
        self.get(query).unwrap_or_default().to_string()
    }
}

fn build_item(fields: &Fields<'_>) -> Item {
    let body = fields
        .get("content:encoded")
        .filter(|b| !b.is_empty())
        .map(str::to_string);

    Item {
        title: fields.text("title"),
        link: fields.text("link"),
        author: fields.text("dc:creator"),
        publish_date_gmt: fields.text("wp:post_date_gmt"),
        slug: fields.text_or_empty("wp:post_name"),
        status: fields.text("wp:status"),
        post_type: fields.text("wp:post_type"),
        wp_id: fields.text("wp:post_id"),
        parent_wp_id: fields.text("wp:post_parent"),
        comments_open: fields.get("wp:comment_status") == Some("open"),
        body,
        excerpt: fields.text_or_empty("excerpt:encoded"),
        image_refs: Vec::new(),
    }
}
