/// Channel-level metadata of an export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedHeader {
    pub title: String,
    /// Site URL. Relative image references are resolved against it.
    pub link: String,
    pub description: String,
}

/// A parsed export: channel header plus items in document order.
#[derive(Debug, Clone, Default)]
pub struct FeedDocument {
    pub header: FeedHeader,
    pub items: Vec<Item>,
}

/// One post, page or chapter-like unit from the export.
///
/// `wp_id` and `parent_wp_id` are kept as strings: exports in the wild carry
/// placeholder values, and the parent lookup only needs equality.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub author: String,
    pub publish_date_gmt: String,
    pub slug: String,
    pub status: String,
    pub post_type: String,
    pub wp_id: String,
    /// `"0"` means the item sits at the top level.
    pub parent_wp_id: String,
    pub comments_open: bool,
    /// Raw HTML body. `None` when the export has no content for the item.
    pub body: Option<String>,
    pub excerpt: String,
    /// Image sources found in the body, in document order.
    pub image_refs: Vec<String>,
}

impl Item {
    /// Parent id that marks a top-level item.
    pub const NO_PARENT: &'static str = "0";

    pub fn has_parent(&self) -> bool {
        self.parent_wp_id != Self::NO_PARENT
    }

    /// Looks up a field by its config name, as used by `item_field_filter`.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "title" => &self.title,
            "link" => &self.link,
            "author" => &self.author,
            "date" => &self.publish_date_gmt,
            "slug" => &self.slug,
            "status" => &self.status,
            "type" => &self.post_type,
            "wp_id" => &self.wp_id,
            "parent" => &self.parent_wp_id,
            "excerpt" => &self.excerpt,
            "body" => return self.body.as_deref(),
            _ => return None,
        };
        Some(value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_parent() {
        let mut item = Item {
            parent_wp_id: "0".to_string(),
            ..Default::default()
        };
        assert!(!item.has_parent());
        item.parent_wp_id = "12".to_string();
        assert!(item.has_parent());
    }

    #[test]
    fn test_field_lookup_by_config_name() {
        let item = Item {
            status: "draft".to_string(),
            post_type: "post".to_string(),
            ..Default::default()
        };
        assert_eq!(item.field("status"), Some("draft"));
        assert_eq!(item.field("type"), Some("post"));
        assert_eq!(item.field("body"), None);
        assert_eq!(item.field("nonexistent"), None);
    }
}
