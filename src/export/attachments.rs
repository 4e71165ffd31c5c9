use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use url::Url;

/// Parent directory for downloaded images, under the blog root.
pub const IMAGES_DIR: &str = "images";

// Base for relative and protocol-relative sources, used only to extract a path.
const PLACEHOLDER_BASE: &str = "http://localhost/";

#[derive(Debug, Default)]
struct DirectoryFiles {
    by_url: HashMap<String, String>,
    taken: HashSet<String>,
}

/// Local file names for downloaded images, one namespace per directory.
///
/// The same source in the same directory always maps to the same file.
/// Distinct sources that would share a name get `stem-1.ext`, `stem-2.ext`, …
#[derive(Debug)]
pub struct AttachmentRegistry {
    images_root: PathBuf,
    directories: HashMap<String, DirectoryFiles>,
}

impl AttachmentRegistry {
    pub fn new(blog_root: &Path) -> Self {
        Self {
            images_root: blog_root.join(IMAGES_DIR),
            directories: HashMap::new(),
        }
    }

    /// Local path for `source` inside `images/<directory>/`, creating the directory.
    pub fn allocate(&mut self, source: &str, directory: &str) -> std::io::Result<PathBuf> {
        let dir_path = self.images_root.join(directory);
        std::fs::create_dir_all(&dir_path)?;

        let files = self.directories.entry(directory.to_string()).or_default();
        if let Some(existing) = files.by_url.get(source) {
            return Ok(dir_path.join(existing));
        }

        let (stem, ext) = split_file_name(&file_name_from_source(source));
        let mut name = join_file_name(&stem, ext.as_deref(), None);
        let mut n = 0;
        while files.taken.contains(&name) {
            n += 1;
            name = join_file_name(&stem, ext.as_deref(), Some(n));
        }

        tracing::debug!(source = %source, directory = %directory, file = %name, "Allocated image path");
        files.taken.insert(name.clone());
        files.by_url.insert(source.to_string(), name.clone());
        Ok(dir_path.join(name))
    }
}

/// Last path segment of an image source.
fn file_name_from_source(source: &str) -> String {
    let parsed = match Url::parse(source) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(PLACEHOLDER_BASE)
            .and_then(|base| base.join(source))
            .ok(),
        Err(_) => None,
    };

    match parsed {
        Some(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        None => source
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default()
            .to_string(),
    }
}

fn split_file_name(name: &str) -> (String, Option<String>) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let stem = if stem.is_empty() { "1".to_string() } else { stem };
    (stem, ext)
}

fn join_file_name(stem: &str, ext: Option<&str>, suffix: Option<usize>) -> String {
    let stem = match suffix {
        Some(n) => format!("{}-{}", stem, n),
        None => stem.to_string(),
    };
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn test_allocate_uses_url_file_name() {
        let root = temp_root("wxr2md_attach_basic");
        let mut registry = AttachmentRegistry::new(&root);
        let path = registry
            .allocate("http://example.com/wp-content/uploads/cat.png?w=300", "post")
            .unwrap();
        assert_eq!(path, root.join("images").join("post").join("cat.png"));
        assert!(root.join("images").join("post").is_dir());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let root = temp_root("wxr2md_attach_idempotent");
        let mut registry = AttachmentRegistry::new(&root);
        let first = registry.allocate("http://a.com/x.png", "d").unwrap();
        let second = registry.allocate("http://a.com/x.png", "d").unwrap();
        assert_eq!(first, second);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_collisions_get_dash_suffix() {
        let root = temp_root("wxr2md_attach_collide");
        let mut registry = AttachmentRegistry::new(&root);
        let dir = root.join("images").join("d");
        assert_eq!(registry.allocate("http://a.com/x.png", "d").unwrap(), dir.join("x.png"));
        assert_eq!(registry.allocate("http://b.com/x.png", "d").unwrap(), dir.join("x-1.png"));
        assert_eq!(registry.allocate("http://c.com/x.png", "d").unwrap(), dir.join("x-2.png"));
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_directories_are_independent() {
        let root = temp_root("wxr2md_attach_dirs");
        let mut registry = AttachmentRegistry::new(&root);
        registry.allocate("http://a.com/x.png", "one").unwrap();
        let other = registry.allocate("http://b.com/x.png", "two").unwrap();
        assert_eq!(other, root.join("images").join("two").join("x.png"));
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_file_name_from_relative_sources() {
        assert_eq!(file_name_from_source("/uploads/2012/dog.jpg"), "dog.jpg");
        assert_eq!(file_name_from_source("//cdn.example.com/a/b.gif"), "b.gif");
        assert_eq!(file_name_from_source("pics/c.png#frag"), "c.png");
    }

    #[test]
    fn test_empty_stem_becomes_one() {
        assert_eq!(split_file_name(""), ("1".to_string(), None));
        assert_eq!(
            file_name_from_source("http://example.com/"),
            String::new(),
        );
        let root = temp_root("wxr2md_attach_empty");
        let mut registry = AttachmentRegistry::new(&root);
        let path = registry.allocate("http://example.com/", "d").unwrap();
        assert_eq!(path.file_name().unwrap(), "1");
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_no_extension_collision() {
        assert_eq!(join_file_name("img", None, Some(1)), "img-1");
        assert_eq!(join_file_name("img", Some("jpeg"), Some(3)), "img-3.jpeg");
    }
}
