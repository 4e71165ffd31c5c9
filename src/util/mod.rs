//! Utility functions for naming output files and directories.
//!
//! # Examples
//!
//! ```
//! use wxr2md::util::{blog_dir_name, uid_token};
//!
//! assert_eq!(blog_dir_name("My Site: Blog"), "My Site - Blog");
//! assert_eq!(uid_token("Hello World"), "Hello_World");
//! ```

mod text;

pub use text::{blog_dir_name, is_uid_char, uid_token, UNTITLED};
