use std::collections::HashMap;

/// Prefix → namespace URI bindings collected while walking a feed.
///
/// WXR exports usually declare every prefix on the root `<rss>` element, but
/// nothing requires that: a declaration may sit on any element. The table is
/// therefore filled incrementally as start tags are read, and every qualified
/// field lookup goes through [`NamespaceTable::resolve`].
///
/// The empty prefix is always bound; it starts out mapped to the empty
/// namespace and is rebound by a default `xmlns="..."` declaration.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    bindings: HashMap<String, String>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(String::new(), String::new());
        Self { bindings }
    }
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a declaration. Later declarations of the same prefix win.
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        tracing::trace!(prefix = %prefix, uri = %uri, "Namespace declared");
        self.bindings.insert(prefix.to_string(), uri.to_string());
    }

    /// Records a declaration if `attr_key` is an `xmlns` or `xmlns:prefix` key.
    ///
    /// Returns `true` when the attribute was a namespace declaration.
    pub fn declare_from_attribute(&mut self, attr_key: &str, value: &str) -> bool {
        if attr_key == "xmlns" {
            self.declare("", value);
            true
        } else if let Some(prefix) = attr_key.strip_prefix("xmlns:") {
            self.declare(prefix, value);
            true
        } else {
            false
        }
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    /// Expands a raw element name (`wp:post_id`, `title`) into `{uri}local` form.
    ///
    /// Unknown prefixes cannot be expanded; the raw name is returned untouched
    /// so the element is still recorded, just never matched by a qualified lookup.
    pub fn expand(&self, raw: &str) -> String {
        let (prefix, local) = split_qualified(raw);
        match self.resolve(prefix) {
            Some(uri) => expanded_name(uri, local),
            None => raw.to_string(),
        }
    }

    /// Expands a lookup token of the form `prefix:tag` or bare `tag`.
    ///
    /// Returns `None` when the prefix was never declared in the document.
    pub fn expand_query(&self, query: &str) -> Option<String> {
        let (prefix, local) = split_qualified(query);
        self.resolve(prefix).map(|uri| expanded_name(uri, local))
    }
}

fn split_qualified(name: &str) -> (&str, &str) {
    match name.find(':') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos + 1..]),
        _ => ("", name),
    }
}

fn expanded_name(uri: &str, local: &str) -> String {
    if uri.is_empty() {
        local.to_string()
    } else {
        format!("{{{}}}{}", uri, local)
    }
}
