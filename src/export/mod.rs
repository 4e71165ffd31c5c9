//! Turning a parsed export into a Markdown tree.
//!
//! [`Emitter`] drives the conversion item by item. It relies on the
//! [`UidRegistry`] and [`Hierarchy`] for file names and nesting, and on the
//! [`AttachmentRegistry`] for where downloaded images go.

mod attachments;
mod emitter;
mod resolver;

pub use attachments::{AttachmentRegistry, IMAGES_DIR};
pub use emitter::{ConversionReport, EmitError, EmitOptions, Emitter, PLACEHOLDER_TITLE};
pub use resolver::{
    classify, resolve_output_path, Hierarchy, ItemKind, ResolveError, UidRegistry,
    DEFAULT_SCOPE, HIERARCHICAL_TYPES,
};
