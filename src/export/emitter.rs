use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

use super::attachments::AttachmentRegistry;
use super::resolver::{classify, Hierarchy, ItemKind, ResolveError, UidRegistry};
use crate::config::{BodyReplacement, Config};
use crate::content::{HtmlToMarkdown, ImageFetcher, PatternError, Substitutions};
use crate::feed::{FeedDocument, FeedHeader, Item};
use crate::util::blog_dir_name;

/// Title WordPress gives its sample post. Never exported.
pub const PLACEHOLDER_TITLE: &str = "Hello world!";

/// Rewrites applied to converter output, in order.
const CLEANUP_FILTERS: [(&str, &str); 4] = [
    (r"\n{3,10}", "\n\n"),
    (r"\n{2,10}#", "\n\n#"),
    (r"\[caption\sid=([^\]]+)\]", ""),
    (r"\[/caption\]", ""),
];

#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Counts for one converted document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Files written with converted content.
    pub written: usize,
    /// Filtered types, placeholder posts and items without a body.
    pub skipped: usize,
    /// Files left with only their heading because conversion failed.
    pub failed: usize,
    /// Titles of the `failed` items, in document order.
    pub failed_titles: Vec<String>,
    pub images_fetched: usize,
    pub images_failed: usize,
}

/// What the emitter needs from [`Config`].
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub build_dir: PathBuf,
    pub download_images: bool,
    pub flat_output: bool,
    pub item_type_filter: std::collections::BTreeSet<String>,
    pub item_field_filter: std::collections::BTreeMap<String, String>,
}

impl From<&Config> for EmitOptions {
    fn from(config: &Config) -> Self {
        Self {
            build_dir: config.build_dir.clone(),
            download_images: config.download_images,
            flat_output: config.flat_output,
            item_type_filter: config.item_type_filter.clone(),
            item_field_filter: config.item_field_filter.clone(),
        }
    }
}

/// Writes the items of a sanitized document as Markdown files.
///
/// Conversion and downloads go through the collaborator traits. Their
/// failures are logged and counted; only unknown item types, cyclic parent
/// chains and filesystem errors stop the document.
pub struct Emitter<'a> {
    options: EmitOptions,
    converter: &'a dyn HtmlToMarkdown,
    fetcher: Option<&'a dyn ImageFetcher>,
    cleanup: Substitutions,
}

impl<'a> Emitter<'a> {
    pub fn new(options: EmitOptions, converter: &'a dyn HtmlToMarkdown) -> Result<Self, PatternError> {
        let rules: Vec<BodyReplacement> = CLEANUP_FILTERS
            .iter()
            .map(|(pattern, replacement)| BodyReplacement {
                pattern: pattern.to_string(),
                replacement: replacement.to_string(),
            })
            .collect();
        Ok(Self {
            options,
            converter,
            fetcher: None,
            cleanup: Substitutions::compile(&rules)?,
        })
    }

    /// Fetcher used when `download_images` is on. Without one, downloads are skipped.
    pub fn with_fetcher(mut self, fetcher: &'a dyn ImageFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// `build_dir/<sanitized title>`.
    pub fn blog_root(&self, header: &FeedHeader) -> PathBuf {
        self.options.build_dir.join(blog_dir_name(&header.title))
    }

    /// Converts `doc` with fresh registries.
    pub fn emit(&self, doc: &FeedDocument) -> Result<ConversionReport, EmitError> {
        let mut uids = UidRegistry::new();
        let mut attachments = AttachmentRegistry::new(&self.blog_root(&doc.header));
        self.emit_with(doc, &mut uids, &mut attachments)
    }

    /// Converts `doc`, recording uids and image paths in the given registries.
    pub fn emit_with(
        &self,
        doc: &FeedDocument,
        uids: &mut UidRegistry,
        attachments: &mut AttachmentRegistry,
    ) -> Result<ConversionReport, EmitError> {
        let blog_root = self.blog_root(&doc.header);
        let hierarchy = Hierarchy::new(&doc.items);
        let base_url = Url::parse(&doc.header.link).ok();
        let mut report = ConversionReport::default();

        for item in &doc.items {
            match classify(item, &self.options.item_type_filter) {
                Ok(ItemKind::Hierarchical) => {}
                Ok(ItemKind::Skipped) => {
                    tracing::debug!(wp_id = %item.wp_id, post_type = %item.post_type, "Filtered item type");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            self.log_field_filter_matches(item);

            let uid = uids.assign_uid(item);
            let parent_dir = hierarchy.resolve_output_path(item, uids, self.options.flat_output)?;
            let output_path = item_output_path(&blog_root.join(&parent_dir), &uid, &item.post_type);

            let Some(body) = item.body.as_deref() else {
                tracing::debug!(wp_id = %item.wp_id, title = %item.title, "No body, skipping");
                report.skipped += 1;
                continue;
            };
            if item.title == PLACEHOLDER_TITLE {
                tracing::debug!(wp_id = %item.wp_id, "Skipping placeholder post");
                report.skipped += 1;
                continue;
            }

            if self.options.download_images {
                self.download_images(item, &uid, base_url.as_ref(), attachments, &mut report);
            }

            let mut out = format!("# {}\n\n", item.title);
            match self.converter.convert(body) {
                Ok(markdown) => {
                    out.push_str(&self.cleanup.apply(&markdown));
                    report.written += 1;
                }
                Err(e) => {
                    println!("Parse error on: {}", item.title);
                    tracing::warn!(title = %item.title, error = %e, "Parse error, writing heading only");
                    report.failed += 1;
                    report.failed_titles.push(item.title.clone());
                }
            }
            write_file(&output_path, &out)?;
            tracing::debug!(path = %output_path.display(), "Wrote item");
        }

        tracing::info!(
            blog = %blog_root.display(),
            written = report.written,
            skipped = report.skipped,
            failed = report.failed,
            images_fetched = report.images_fetched,
            images_failed = report.images_failed,
            "Document converted"
        );
        Ok(report)
    }

    // Matches are logged only; they never cause a skip.
    fn log_field_filter_matches(&self, item: &Item) {
        for (field, value) in &self.options.item_field_filter {
            if item.field(field) == Some(value.as_str()) {
                tracing::debug!(
                    wp_id = %item.wp_id,
                    field = %field,
                    value = %value,
                    "Item matches item_field_filter, still exported"
                );
            }
        }
    }

    fn download_images(
        &self,
        item: &Item,
        uid: &str,
        base_url: Option<&Url>,
        attachments: &mut AttachmentRegistry,
        report: &mut ConversionReport,
    ) {
        let Some(fetcher) = self.fetcher else {
            return;
        };

        for src in &item.image_refs {
            let url = match base_url {
                Some(base) => base.join(src),
                None => Url::parse(src),
            };
            let url = match url {
                Ok(url) => url,
                Err(e) => {
                    println!("unable to download {}", src);
                    tracing::warn!(src = %src, error = %e, "Unresolvable image source");
                    report.images_failed += 1;
                    continue;
                }
            };

            let result = attachments
                .allocate(src, uid)
                .map_err(crate::content::FetchError::from)
                .and_then(|destination| fetcher.fetch(&url, &destination));
            match result {
                Ok(bytes) => {
                    tracing::debug!(url = %url, bytes, "Downloaded image");
                    report.images_fetched += 1;
                }
                Err(e) => {
                    println!("unable to download {}", url);
                    tracing::warn!(url = %url, error = %e, "Image download failed");
                    report.images_failed += 1;
                }
            }
        }
    }
}

/// `<dir>/<uid>/index.md` for pages, `<dir>/<uid>.md` for everything else.
fn item_output_path(dir: &Path, uid: &str, post_type: &str) -> PathBuf {
    if post_type == "page" {
        dir.join(uid).join("index.md")
    } else {
        dir.join(format!("{}.md", uid))
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), EmitError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| EmitError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| EmitError::Write {
        path: path.to_path_buf(),
        source,
    })
}
