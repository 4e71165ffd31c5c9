//! Item body processing and the external collaborators it relies on.
//!
//! - [`sanitize`] - configured regex rewrites plus image discovery
//! - [`images`] - `<img>` source extraction ([`ImageScanner`])
//! - [`markdown`] - HTML to Markdown conversion ([`HtmlToMarkdown`])
//! - [`fetch`] - image downloads ([`ImageFetcher`])
//!
//! The three collaborators sit behind traits so the export pipeline can be
//! driven with stand-ins in tests, and each reports failure through its own
//! error type instead of panicking.

pub mod fetch;
pub mod images;
pub mod markdown;
pub mod sanitize;

pub use fetch::{FetchError, HttpImageFetcher, ImageFetcher};
pub use images::{HtmlImageScanner, ImageParseError, ImageScanner};
pub use markdown::{ConversionError, HtmlToMarkdown, MarkdownConverter};
pub use sanitize::{sanitize, sanitize_document, PatternError, Substitutions};
