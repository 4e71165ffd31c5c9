/// Fallback identifier for items with neither slug nor title.
pub const UNTITLED: &str = "untitled";

/// Returns true for characters allowed in an item uid.
pub fn is_uid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Reduces a slug or title to a uid token.
///
/// Spaces become underscores, then everything outside `[A-Za-z0-9_-]` is
/// dropped. A candidate that ends up empty (an all-CJK title, say) becomes
/// [`UNTITLED`] so the token is always usable as a file name.
///
/// # Examples
///
/// ```
/// use wxr2md::util::uid_token;
///
/// assert_eq!(uid_token("Hello World!"), "Hello_World");
/// assert_eq!(uid_token("my-post"), "my-post");
/// assert_eq!(uid_token("日本語"), "untitled");
/// ```
pub fn uid_token(candidate: &str) -> String {
    let token: String = candidate
        .replace(' ', "_")
        .chars()
        .filter(|&c| is_uid_char(c))
        .collect();
    if token.is_empty() {
        UNTITLED.to_string()
    } else {
        token
    }
}

/// Turns a feed title into the name of the blog's output directory.
///
/// A leading `http`/`https` is dropped, colons become ` -`, and only
/// `[A-Za-z0-9 _.-]` survives.
///
/// # Examples
///
/// ```
/// use wxr2md::util::blog_dir_name;
///
/// assert_eq!(blog_dir_name("My Site: Blog"), "My Site - Blog");
/// assert_eq!(blog_dir_name("Café & Co."), "Caf  Co.");
/// ```
pub fn blog_dir_name(title: &str) -> String {
    let title = title
        .strip_prefix("https")
        .or_else(|| title.strip_prefix("http"))
        .unwrap_or(title);
    title
        .replace(':', " -")
        .chars()
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uid_token_replaces_spaces() {
        assert_eq!(uid_token("a b  c"), "a_b__c");
    }

    #[test]
    fn test_uid_token_strips_punctuation() {
        assert_eq!(uid_token("What's new? (2012)"), "Whats_new_2012");
    }

    #[test]
    fn test_uid_token_empty_falls_back() {
        assert_eq!(uid_token(""), UNTITLED);
        assert_eq!(uid_token("!!!"), UNTITLED);
    }

    #[test]
    fn test_blog_dir_name_colon() {
        assert_eq!(blog_dir_name("My Site: Blog"), "My Site - Blog");
    }

    #[test]
    fn test_blog_dir_name_strips_scheme_prefix() {
        assert_eq!(blog_dir_name("https://example.com"), " -example.com");
        assert_eq!(blog_dir_name("http example"), " example");
    }

    #[test]
    fn test_blog_dir_name_keeps_allowed() {
        assert_eq!(blog_dir_name("a_b.c-d 1"), "a_b.c-d 1");
    }

    proptest! {
        #[test]
        fn prop_uid_token_is_filesystem_safe(s in ".*") {
            let token = uid_token(&s);
            prop_assert!(!token.is_empty());
            prop_assert!(token.chars().all(is_uid_char));
        }

        #[test]
        fn prop_blog_dir_name_charset(s in ".*") {
            let name = blog_dir_name(&s);
            prop_assert!(!name.contains(':'));
            prop_assert!(name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-')));
        }
    }
}
