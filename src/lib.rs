//! Converts WordPress WXR exports into a tree of Markdown files.

pub mod config;
pub mod content;
pub mod export;
pub mod feed;
pub mod util;
