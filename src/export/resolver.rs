use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;

use crate::feed::Item;
use crate::util::{uid_token, UNTITLED};

/// Post types written as Markdown. Everything else must be filtered explicitly.
pub const HIERARCHICAL_TYPES: [&str; 5] = ["page", "post", "chapter", "back-matter", "front-matter"];

/// Scope used when the caller does not partition uids.
pub const DEFAULT_SCOPE: &str = "";

#[derive(Debug, Error)]
pub enum ResolveError {
    /// A post type that is neither written nor filtered. Fatal for the run.
    #[error("Unknown item type '{}' (item {}, {:?})", .post_type, .wp_id, .item.title)]
    UnrecognizedItemType {
        post_type: String,
        wp_id: String,
        /// The offending item, for the console report.
        item: Box<Item>,
    },

    /// Following parent ids from `wp_id` came back to `repeated`.
    #[error("Cyclic parent chain: walking up from item {wp_id} revisits item {repeated}")]
    CyclicHierarchy { wp_id: String, repeated: String },
}

/// How the emitter should treat an item, decided by its post type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Written as Markdown.
    Hierarchical,
    /// Listed in `item_type_filter`: dropped without a uid or path.
    Skipped,
}

/// Sorts an item into written, skipped or unknown.
///
/// The skip list is checked first, so a recognized type can still be filtered out.
pub fn classify(item: &Item, skip_types: &BTreeSet<String>) -> Result<ItemKind, ResolveError> {
    if skip_types.contains(&item.post_type) {
        Ok(ItemKind::Skipped)
    } else if HIERARCHICAL_TYPES.contains(&item.post_type.as_str()) {
        Ok(ItemKind::Hierarchical)
    } else {
        Err(ResolveError::UnrecognizedItemType {
            post_type: item.post_type.clone(),
            wp_id: item.wp_id.clone(),
            item: Box::new(item.clone()),
        })
    }
}

#[derive(Debug, Default)]
struct ScopeUids {
    by_id: HashMap<String, String>,
    taken: HashSet<String>,
}

/// Uids handed out during one document's conversion.
///
/// Each `(scope, wp_id)` pair gets exactly one uid, however many times it is
/// asked for: hierarchy walks look up the same ancestors over and over.
#[derive(Debug, Default)]
pub struct UidRegistry {
    scopes: HashMap<String, ScopeUids>,
}

impl UidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns (or recalls) the uid of `item` in the default scope.
    pub fn assign_uid(&mut self, item: &Item) -> String {
        self.assign_uid_in(DEFAULT_SCOPE, item)
    }

    /// Assigns (or recalls) the uid of `item` within `scope`.
    ///
    /// The base is the slug, else the title, else `untitled`, reduced to
    /// `[A-Za-z0-9_-]`. When another item already holds the base, the first
    /// free of `base_2`, `base_3`, … is used instead.
    pub fn assign_uid_in(&mut self, scope: &str, item: &Item) -> String {
        let uids = self.scopes.entry(scope.to_string()).or_default();
        if let Some(uid) = uids.by_id.get(&item.wp_id) {
            return uid.clone();
        }

        let base = uid_token(base_candidate(item));
        let mut uid = base.clone();
        let mut n = 1;
        while uids.taken.contains(&uid) {
            n += 1;
            uid = format!("{}_{}", base, n);
        }

        if n > 1 {
            tracing::debug!(wp_id = %item.wp_id, base = %base, uid = %uid, "Uid collision resolved");
        }
        uids.taken.insert(uid.clone());
        uids.by_id.insert(item.wp_id.clone(), uid.clone());
        uid
    }

    /// Previously assigned uid, if any.
    pub fn get(&self, scope: &str, wp_id: &str) -> Option<&str> {
        self.scopes
            .get(scope)
            .and_then(|s| s.by_id.get(wp_id))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scopes.values().map(|s| s.by_id.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn base_candidate(item: &Item) -> &str {
    if !item.slug.is_empty() {
        &item.slug
    } else if !item.title.is_empty() {
        &item.title
    } else {
        UNTITLED
    }
}

/// Parent lookup over one document's items.
pub struct Hierarchy<'a> {
    by_id: HashMap<&'a str, &'a Item>,
}

impl<'a> Hierarchy<'a> {
    pub fn new(items: &'a [Item]) -> Self {
        let mut by_id = HashMap::with_capacity(items.len());
        for item in items {
            // Duplicate ids resolve to the first item, as a linear search would.
            by_id.entry(item.wp_id.as_str()).or_insert(item);
        }
        Self { by_id }
    }

    pub fn parent_of(&self, item: &Item) -> Option<&'a Item> {
        if !item.has_parent() {
            return None;
        }
        self.by_id.get(item.parent_wp_id.as_str()).copied()
    }

    /// Directory of `item` relative to the blog root, e.g. `"grandparent/parent/"`.
    ///
    /// Returns `""` in flat mode or for top-level items. A parent id that
    /// matches no item ends the walk with whatever was gathered so far.
    ///
    /// # Errors
    ///
    /// [`ResolveError::CyclicHierarchy`] if the chain revisits an item.
    pub fn resolve_output_path(
        &self,
        item: &Item,
        uids: &mut UidRegistry,
        flat_output: bool,
    ) -> Result<String, ResolveError> {
        if flat_output {
            return Ok(String::new());
        }

        let mut path = String::new();
        let mut visited: HashSet<&str> = HashSet::from([item.wp_id.as_str()]);
        let mut current = item;

        while let Some(parent) = self.parent_of(current) {
            if !visited.insert(parent.wp_id.as_str()) {
                return Err(ResolveError::CyclicHierarchy {
                    wp_id: item.wp_id.clone(),
                    repeated: parent.wp_id.clone(),
                });
            }
            path = format!("{}/{}", uids.assign_uid(parent), path);
            current = parent;
        }

        if current.has_parent() {
            tracing::debug!(
                wp_id = %item.wp_id,
                missing_parent = %current.parent_wp_id,
                "Parent not found in feed, truncating hierarchy"
            );
        }
        Ok(path)
    }
}

/// One-shot form of [`Hierarchy::resolve_output_path`].
pub fn resolve_output_path(
    item: &Item,
    all_items: &[Item],
    uids: &mut UidRegistry,
    flat_output: bool,
) -> Result<String, ResolveError> {
    Hierarchy::new(all_items).resolve_output_path(item, uids, flat_output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn item(wp_id: &str, parent: &str, slug: &str) -> Item {
        Item {
            wp_id: wp_id.to_string(),
            parent_wp_id: parent.to_string(),
            slug: slug.to_string(),
            title: format!("Title {}", wp_id),
            post_type: "page".to_string(),
            ..Default::default()
        }
    }

    fn skip(types: &[&str]) -> BTreeSet<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_uid_prefers_slug_then_title_then_untitled() {
        let mut uids = UidRegistry::new();
        assert_eq!(uids.assign_uid(&item("1", "0", "the-slug")), "the-slug");

        let mut no_slug = item("2", "0", "");
        no_slug.title = "A Title!".to_string();
        assert_eq!(uids.assign_uid(&no_slug), "A_Title");

        let mut bare = item("3", "0", "");
        bare.title = String::new();
        assert_eq!(uids.assign_uid(&bare), "untitled");
    }

    #[test]
    fn test_uid_memoized_per_wp_id() {
        let mut uids = UidRegistry::new();
        let first = uids.assign_uid(&item("5", "0", "hello"));
        let again = uids.assign_uid(&item("5", "0", "hello"));
        assert_eq!(first, again);
        assert_eq!(uids.len(), 1);
        assert_eq!(uids.get(DEFAULT_SCOPE, "5"), Some("hello"));
    }

    #[test]
    fn test_uid_collisions_get_numeric_suffixes() {
        let mut uids = UidRegistry::new();
        assert_eq!(uids.assign_uid(&item("1", "0", "about")), "about");
        assert_eq!(uids.assign_uid(&item("2", "0", "about")), "about_2");
        assert_eq!(uids.assign_uid(&item("3", "0", "about")), "about_3");
    }

    #[test]
    fn test_uid_suffix_skips_taken_names() {
        let mut uids = UidRegistry::new();
        assert_eq!(uids.assign_uid(&item("1", "0", "x")), "x");
        assert_eq!(uids.assign_uid(&item("2", "0", "x_2")), "x_2");
        assert_eq!(uids.assign_uid(&item("3", "0", "x")), "x_3");
    }

    #[test]
    fn test_uid_scopes_are_independent() {
        let mut uids = UidRegistry::new();
        assert_eq!(uids.assign_uid_in("a", &item("1", "0", "same")), "same");
        assert_eq!(uids.assign_uid_in("b", &item("2", "0", "same")), "same");
        assert_eq!(uids.get("b", "1"), None);
    }

    #[test]
    fn test_classify() {
        let filter = skip(&["attachment"]);
        let mut it = item("1", "0", "x");
        for t in HIERARCHICAL_TYPES {
            it.post_type = t.to_string();
            assert_eq!(classify(&it, &filter).unwrap(), ItemKind::Hierarchical);
        }

        it.post_type = "attachment".to_string();
        assert_eq!(classify(&it, &filter).unwrap(), ItemKind::Skipped);

        let err = classify(&it, &skip(&[])).unwrap_err();
        assert!(matches!(err, ResolveError::UnrecognizedItemType { ref post_type, .. } if post_type == "attachment"));
        assert!(err.to_string().contains("attachment"));
        if let ResolveError::UnrecognizedItemType { item, .. } = &err {
            assert_eq!(**item, it);
        }
    }

    #[test]
    fn test_classify_filter_wins_over_recognized() {
        let mut it = item("1", "0", "x");
        it.post_type = "post".to_string();
        assert_eq!(classify(&it, &skip(&["post"])).unwrap(), ItemKind::Skipped);
    }

    #[test]
    fn test_path_for_parent_chain() {
        let items = vec![item("1", "2", "a"), item("2", "3", "b"), item("3", "0", "c")];
        let mut uids = UidRegistry::new();
        let path = resolve_output_path(&items[0], &items, &mut uids, false).unwrap();
        assert_eq!(path, "c/b/");
    }

    #[test]
    fn test_path_top_level_is_empty() {
        let items = vec![item("1", "0", "a")];
        let mut uids = UidRegistry::new();
        assert_eq!(resolve_output_path(&items[0], &items, &mut uids, false).unwrap(), "");
    }

    #[test]
    fn test_path_flat_output_is_empty() {
        let items = vec![item("1", "2", "a"), item("2", "0", "b")];
        let mut uids = UidRegistry::new();
        assert_eq!(resolve_output_path(&items[0], &items, &mut uids, true).unwrap(), "");
        assert!(uids.is_empty());
    }

    #[test]
    fn test_path_missing_parent_degrades() {
        // A's parent B is not in the feed.
        let items = vec![item("1", "2", "a"), item("3", "0", "c")];
        let mut uids = UidRegistry::new();
        assert_eq!(resolve_output_path(&items[0], &items, &mut uids, false).unwrap(), "");
    }

    #[test]
    fn test_path_missing_grandparent_keeps_partial_path() {
        let items = vec![item("1", "2", "a"), item("2", "9", "b")];
        let mut uids = UidRegistry::new();
        assert_eq!(resolve_output_path(&items[0], &items, &mut uids, false).unwrap(), "b/");
    }

    #[test]
    fn test_self_parent_is_cycle() {
        let items = vec![item("1", "1", "a")];
        let mut uids = UidRegistry::new();
        let err = resolve_output_path(&items[0], &items, &mut uids, false).unwrap_err();
        assert!(matches!(err, ResolveError::CyclicHierarchy { ref repeated, .. } if repeated == "1"));
    }

    #[test]
    fn test_mutual_parents_is_cycle() {
        let items = vec![item("1", "2", "a"), item("2", "1", "b")];
        let mut uids = UidRegistry::new();
        assert!(matches!(
            resolve_output_path(&items[0], &items, &mut uids, false),
            Err(ResolveError::CyclicHierarchy { .. })
        ));
    }

    #[test]
    fn test_longer_cycle_above_item() {
        let items = vec![
            item("1", "2", "a"),
            item("2", "3", "b"),
            item("3", "4", "c"),
            item("4", "2", "d"),
        ];
        let mut uids = UidRegistry::new();
        let err = resolve_output_path(&items[0], &items, &mut uids, false).unwrap_err();
        assert!(err.to_string().contains("revisits item 2"));
    }

    #[test]
    fn test_duplicate_wp_id_resolves_to_first() {
        let items = vec![item("1", "2", "a"), item("2", "0", "first"), item("2", "0", "second")];
        let hierarchy = Hierarchy::new(&items);
        assert_eq!(hierarchy.parent_of(&items[0]).map(|p| p.slug.as_str()), Some("first"));
    }

    #[test]
    fn test_ancestor_uid_shared_with_own_uid() {
        let items = vec![item("1", "2", "child"), item("2", "0", "parent")];
        let mut uids = UidRegistry::new();
        let hierarchy = Hierarchy::new(&items);
        let path = hierarchy.resolve_output_path(&items[0], &mut uids, false).unwrap();
        assert_eq!(path, "parent/");
        assert_eq!(uids.assign_uid(&items[1]), "parent");
    }

    proptest! {
        #[test]
        fn prop_colliding_items_get_ascending_suffixes(count in 1usize..20, base in "[a-z]{1,8}") {
            let mut uids = UidRegistry::new();
            for i in 0..count {
                let uid = uids.assign_uid(&item(&i.to_string(), "0", &base));
                let expected = if i == 0 { base.clone() } else { format!("{}_{}", base, i + 1) };
                prop_assert_eq!(uid, expected);
            }
        }

        #[test]
        fn prop_uids_unique_and_safe(slugs in proptest::collection::vec(".{0,12}", 1..30)) {
            let mut uids = UidRegistry::new();
            let mut seen = HashSet::new();
            for (i, slug) in slugs.iter().enumerate() {
                let uid = uids.assign_uid(&item(&i.to_string(), "0", slug));
                prop_assert!(uid.chars().all(crate::util::is_uid_char));
                prop_assert!(seen.insert(uid));
            }
        }
    }
}
