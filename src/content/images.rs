use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use thiserror::Error;

/// Deepest element nesting the scanner walks before giving up.
const MAX_SCAN_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ImageParseError {
    #[error("HTML nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Finds image sources in an HTML fragment.
pub trait ImageScanner {
    /// Returns every `<img>` source in document order.
    fn image_sources(&self, html: &str) -> Result<Vec<String>, ImageParseError>;
}

/// [`ImageScanner`] backed by html5ever, so unbalanced post markup is handled
/// the way a browser would handle it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlImageScanner;

impl ImageScanner for HtmlImageScanner {
    fn image_sources(&self, html: &str) -> Result<Vec<String>, ImageParseError> {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        let mut sources = Vec::new();
        collect_sources(&dom.document, &mut sources, 0)?;
        Ok(sources)
    }
}

fn collect_sources(
    node: &Handle,
    sources: &mut Vec<String>,
    depth: usize,
) -> Result<(), ImageParseError> {
    if depth > MAX_SCAN_DEPTH {
        return Err(ImageParseError::TooDeep(MAX_SCAN_DEPTH));
    }

    if let NodeData::Element {
        ref name,
        ref attrs,
        ..
    } = node.data
    {
        if name.local.as_ref() == "img" {
            // An <img> without src has nothing to download.
            if let Some(src) = attrs
                .borrow()
                .iter()
                .find(|attr| attr.name.local.as_ref() == "src")
            {
                sources.push(src.value.to_string());
            }
        }
    }

    for child in node.children.borrow().iter() {
        collect_sources(child, sources, depth + 1)?;
    }
    Ok(())
}
