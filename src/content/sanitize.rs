use regex::Regex;
use thiserror::Error;

use super::images::{ImageParseError, ImageScanner};
use crate::config::BodyReplacement;
use crate::feed::{FeedDocument, Item};

#[derive(Debug, Error)]
#[error("Invalid body_replace pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Ordered regex find/replace pairs applied to every item body.
///
/// Order is significant: a later pattern may be written against the output of
/// an earlier one.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    rules: Vec<(Regex, String)>,
}

impl Substitutions {
    /// Compiles configured replacements, failing on the first invalid pattern.
    pub fn compile(replacements: &[BodyReplacement]) -> Result<Self, PatternError> {
        let rules = replacements
            .iter()
            .map(|r| {
                Regex::new(&r.pattern)
                    .map(|re| (re, r.replacement.clone()))
                    .map_err(|source| PatternError {
                        pattern: r.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn apply(&self, body: &str) -> String {
        self.rules
            .iter()
            .fold(body.to_string(), |acc, (re, replacement)| {
                re.replace_all(&acc, replacement.as_str()).into_owned()
            })
    }
}

/// Applies the substitutions to a raw body, then collects its image sources.
///
/// Image scanning is best effort: if the scanner fails, the failure is logged
/// and the item proceeds with no images. The returned body is the substituted
/// text; scanning never alters it.
pub fn sanitize(
    raw_body: &str,
    substitutions: &Substitutions,
    scanner: &dyn ImageScanner,
) -> (String, Vec<String>) {
    let (clean, images) = substitute_and_scan(raw_body, substitutions, scanner);
    let images = images.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not parse body HTML, ignoring its images");
        Vec::new()
    });
    (clean, images)
}

fn substitute_and_scan(
    raw_body: &str,
    substitutions: &Substitutions,
    scanner: &dyn ImageScanner,
) -> (String, Result<Vec<String>, ImageParseError>) {
    let clean = substitutions.apply(raw_body);
    let images = scanner.image_sources(&clean);
    (clean, images)
}

/// Sanitizes every item that has a body.
///
/// A scanner failure is reported on the console with the item's title.
pub fn sanitize_document(
    doc: FeedDocument,
    substitutions: &Substitutions,
    scanner: &dyn ImageScanner,
) -> FeedDocument {
    let items = doc
        .items
        .into_iter()
        .map(|item| match item.body {
            Some(ref raw) => {
                let (clean, images) = substitute_and_scan(raw, substitutions, scanner);
                let image_refs = images.unwrap_or_else(|e| {
                    println!("Image parse error on: {}", item.title);
                    tracing::warn!(title = %item.title, error = %e, "Could not parse body HTML, ignoring its images");
                    Vec::new()
                });
                Item {
                    body: Some(clean),
                    image_refs,
                    ..item
                }
            }
            None => item,
        })
        .collect();

    FeedDocument {
        header: doc.header,
        items,
    }
}
