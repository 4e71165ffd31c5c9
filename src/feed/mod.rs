//! Reading WXR blog exports.
//!
//! - `parser` - streaming parse of the export into a [`FeedDocument`]
//! - `namespace` - prefix bindings collected during the parse
//! - `types` - the parsed document model
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! let doc = wxr2md::feed::parse(Path::new("wordpress-xml/export.xml"))?;
//! for item in &doc.items {
//!     println!("{} ({})", item.title, item.post_type);
//! }
//! # Ok::<(), wxr2md::feed::FeedError>(())
//! ```

mod namespace;
mod parser;
mod types;

pub use namespace::NamespaceTable;
pub use parser::{parse, parse_str, FeedError, NO_CONTENT};
pub use types::{FeedDocument, FeedHeader, Item};
