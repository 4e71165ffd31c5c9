//! HTML to Markdown conversion for post bodies.
//!
//! The converter parses with html5ever and walks the resulting DOM, emitting
//! CommonMark for the elements blog posts actually use: headings, paragraphs,
//! links, images, lists, emphasis, code, quotes and rules. Anything else is
//! treated as a transparent container. Scripts and styles are dropped.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use thiserror::Error;

const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("HTML nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Turns an HTML fragment into Markdown.
pub trait HtmlToMarkdown {
    fn convert(&self, html: &str) -> Result<String, ConversionError>;
}

/// [`HtmlToMarkdown`] implementation over an html5ever DOM.
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    max_depth: usize,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HtmlToMarkdown for MarkdownConverter {
    fn convert(&self, html: &str) -> Result<String, ConversionError> {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        let mut output = String::new();
        let mut state = WalkState::default();
        self.walk(&dom.document, &mut output, &mut state, 0)?;
        Ok(normalize_output(&output))
    }
}

#[derive(Default)]
struct WalkState {
    /// Open lists, innermost last. `Some(n)` is an ordered list at item `n`.
    lists: Vec<Option<usize>>,
    in_pre: bool,
}

impl MarkdownConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn walk(
        &self,
        node: &Handle,
        output: &mut String,
        state: &mut WalkState,
        depth: usize,
    ) -> Result<(), ConversionError> {
        if depth > self.max_depth {
            return Err(ConversionError::TooDeep(self.max_depth));
        }

        match node.data {
            NodeData::Document => self.walk_children(node, output, state, depth)?,
            NodeData::Element { ref name, .. } => {
                let tag = name.local.as_ref();
                self.handle_element(node, tag, output, state, depth)?;
            }
            NodeData::Text { ref contents } => {
                let text = contents.borrow();
                if state.in_pre {
                    output.push_str(&text);
                } else {
                    push_inline_text(output, &text);
                }
            }
            NodeData::Comment { .. }
            | NodeData::Doctype { .. }
            | NodeData::ProcessingInstruction { .. } => {}
        }
        Ok(())
    }

    fn walk_children(
        &self,
        node: &Handle,
        output: &mut String,
        state: &mut WalkState,
        depth: usize,
    ) -> Result<(), ConversionError> {
        for child in node.children.borrow().iter() {
            self.walk(child, output, state, depth + 1)?;
        }
        Ok(())
    }

    /// Renders the children of `node` into a fresh buffer.
    fn render_children(
        &self,
        node: &Handle,
        state: &mut WalkState,
        depth: usize,
    ) -> Result<String, ConversionError> {
        let mut inner = String::new();
        self.walk_children(node, &mut inner, state, depth)?;
        Ok(inner)
    }

    fn handle_element(
        &self,
        node: &Handle,
        tag: &str,
        output: &mut String,
        state: &mut WalkState,
        depth: usize,
    ) -> Result<(), ConversionError> {
        match tag {
            "script" | "style" | "noscript" | "head" | "template" => {}

            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let inner = self.render_children(node, state, depth)?;
                let text = collapse_whitespace(&inner);
                if !text.is_empty() {
                    ensure_blank_line(output);
                    output.push_str(&"#".repeat(level));
                    output.push(' ');
                    output.push_str(&text);
                    ensure_blank_line(output);
                }
            }

            "p" | "div" | "section" | "article" | "figure" | "figcaption" | "table" => {
                ensure_blank_line(output);
                self.walk_children(node, output, state, depth)?;
                ensure_blank_line(output);
            }

            "tr" => {
                ensure_newline(output);
                self.walk_children(node, output, state, depth)?;
                ensure_newline(output);
            }

            "br" => {
                trim_trailing_spaces(output);
                output.push('\n');
            }

            "hr" => {
                ensure_blank_line(output);
                output.push_str("---");
                ensure_blank_line(output);
            }

            "a" => {
                let inner = self.render_children(node, state, depth)?;
                let text = inner.trim();
                match attribute(node, "href") {
                    Some(href) if !text.is_empty() => {
                        output.push('[');
                        output.push_str(text);
                        output.push_str("](");
                        output.push_str(&href);
                        output.push(')');
                    }
                    _ => output.push_str(text),
                }
            }

            "img" => {
                if let Some(src) = attribute(node, "src") {
                    let alt = attribute(node, "alt").unwrap_or_default();
                    output.push_str("![");
                    output.push_str(&collapse_whitespace(&alt));
                    output.push_str("](");
                    output.push_str(&src);
                    output.push(')');
                }
            }

            "strong" | "b" => self.wrap_inline(node, "**", output, state, depth)?,
            "em" | "i" => self.wrap_inline(node, "_", output, state, depth)?,
            "del" | "s" | "strike" => self.wrap_inline(node, "~~", output, state, depth)?,

            "code" if !state.in_pre => {
                let inner = self.render_children(node, state, depth)?;
                let text = inner.trim();
                if !text.is_empty() {
                    let fence = if text.contains('`') { "``" } else { "`" };
                    output.push_str(fence);
                    output.push_str(text);
                    output.push_str(fence);
                }
            }

            "pre" => {
                let was_in_pre = std::mem::replace(&mut state.in_pre, true);
                let inner = self.render_children(node, state, depth)?;
                state.in_pre = was_in_pre;

                ensure_blank_line(output);
                output.push_str("```\n");
                output.push_str(inner.trim_matches('\n'));
                output.push_str("\n```");
                ensure_blank_line(output);
            }

            "blockquote" => {
                let inner = self.render_children(node, state, depth)?;
                let quoted = normalize_output(&inner);
                if !quoted.is_empty() {
                    ensure_blank_line(output);
                    for line in quoted.lines() {
                        if line.is_empty() {
                            output.push_str(">\n");
                        } else {
                            output.push_str("> ");
                            output.push_str(line);
                            output.push('\n');
                        }
                    }
                    ensure_blank_line(output);
                }
            }

            "ul" | "ol" => self.handle_list(node, tag == "ol", output, state, depth)?,

            _ => self.walk_children(node, output, state, depth)?,
        }
        Ok(())
    }

    fn wrap_inline(
        &self,
        node: &Handle,
        marker: &str,
        output: &mut String,
        state: &mut WalkState,
        depth: usize,
    ) -> Result<(), ConversionError> {
        let inner = self.render_children(node, state, depth)?;
        let text = inner.trim();
        if text.is_empty() {
            output.push_str(&inner);
            return Ok(());
        }
        if inner.starts_with(char::is_whitespace) && !ends_with_space_or_break(output) {
            output.push(' ');
        }
        output.push_str(marker);
        output.push_str(text);
        output.push_str(marker);
        if inner.ends_with(char::is_whitespace) {
            output.push(' ');
        }
        Ok(())
    }

    fn handle_list(
        &self,
        node: &Handle,
        ordered: bool,
        output: &mut String,
        state: &mut WalkState,
        depth: usize,
    ) -> Result<(), ConversionError> {
        let nested = !state.lists.is_empty();
        if nested {
            ensure_newline(output);
        } else {
            ensure_blank_line(output);
        }

        state.lists.push(if ordered { Some(0) } else { None });
        let indent = "  ".repeat(state.lists.len() - 1);

        for child in node.children.borrow().iter() {
            let is_item = matches!(
                child.data,
                NodeData::Element { ref name, .. } if name.local.as_ref() == "li"
            );
            if !is_item {
                continue;
            }

            let marker = match state.lists.last_mut() {
                Some(Some(n)) => {
                    *n += 1;
                    format!("{}. ", n)
                }
                _ => "- ".to_string(),
            };

            let inner = self.render_children(child, state, depth + 1)?;
            let body = normalize_output(&inner);
            let continuation = format!("{}{}", indent, " ".repeat(marker.len()));

            ensure_newline(output);
            output.push_str(&indent);
            output.push_str(&marker);
            for (i, line) in body.lines().enumerate() {
                if i > 0 {
                    output.push('\n');
                    // Nested list lines already carry their own indentation.
                    if !line.is_empty() && !is_list_line(line) {
                        output.push_str(&continuation);
                    }
                }
                output.push_str(line);
            }
            output.push('\n');
        }

        state.lists.pop();
        if !nested {
            ensure_blank_line(output);
        }
        Ok(())
    }
}

fn attribute(node: &Handle, name: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| attr.name.local.as_ref() == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

fn is_list_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("- ")
        || trimmed
            .split_once(". ")
            .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ends_with_space_or_break(output: &str) -> bool {
    output.is_empty() || output.ends_with(' ') || output.ends_with('\n')
}

/// Appends text with HTML whitespace rules: runs collapse to one space and
/// no space is emitted at the start of a line.
fn push_inline_text(output: &mut String, text: &str) {
    let collapsed = collapse_whitespace(text);
    let leading = text.starts_with(char::is_whitespace);
    let trailing = text.ends_with(char::is_whitespace);

    if collapsed.is_empty() {
        if leading && !ends_with_space_or_break(output) {
            output.push(' ');
        }
        return;
    }
    if leading && !ends_with_space_or_break(output) {
        output.push(' ');
    }
    output.push_str(&collapsed);
    if trailing {
        output.push(' ');
    }
}

fn trim_trailing_spaces(output: &mut String) {
    let trimmed = output.trim_end_matches(' ').len();
    output.truncate(trimmed);
}

fn ensure_newline(output: &mut String) {
    trim_trailing_spaces(output);
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
}

fn ensure_blank_line(output: &mut String) {
    ensure_newline(output);
    if !output.is_empty() && !output.ends_with("\n\n") {
        output.push('\n');
    }
}

/// Strips trailing whitespace per line, collapses blank-line runs and
/// trims the document. Fenced code keeps its lines verbatim.
fn normalize_output(output: &str) -> String {
    let mut result = String::with_capacity(output.len());
    let mut in_fence = false;
    let mut blank_run = 0;

    for line in output.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        let line = if in_fence { line } else { line.trim_end() };
        if line.is_empty() && !in_fence {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push_str(line);
        result.push('\n');
    }

    let trimmed = result.trim_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn convert(html: &str) -> String {
        MarkdownConverter::new().convert(html).unwrap()
    }

    #[test]
    fn test_paragraph() {
        assert_eq!(convert("<p>Hi</p>"), "Hi\n");
    }

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        assert_eq!(convert("<p>One</p><p>Two</p>"), "One\n\nTwo\n");
    }

    #[test]
    fn test_headings() {
        assert_eq!(convert("<h2>Section  title</h2><p>x</p>"), "## Section title\n\nx\n");
        assert_eq!(convert("<h6>Deep</h6>"), "###### Deep\n");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(convert("<p>a\n   b\t c</p>"), "a b c\n");
    }

    #[test]
    fn test_link() {
        assert_eq!(
            convert(r#"<p>see <a href="https://example.com">the site</a>.</p>"#),
            "see [the site](https://example.com).\n"
        );
    }

    #[test]
    fn test_link_without_href_is_text() {
        assert_eq!(convert("<p><a name=\"x\">anchor</a></p>"), "anchor\n");
    }

    #[test]
    fn test_image() {
        assert_eq!(
            convert(r#"<p><img src="/a.png" alt="An image"></p>"#),
            "![An image](/a.png)\n"
        );
    }

    #[test]
    fn test_emphasis() {
        assert_eq!(
            convert("<p>a <strong>bold</strong> and <em>soft</em> word</p>"),
            "a **bold** and _soft_ word\n"
        );
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(convert("<p>run <code>ls -l</code></p>"), "run `ls -l`\n");
    }

    #[test]
    fn test_pre_block_keeps_whitespace() {
        assert_eq!(
            convert("<pre>fn main() {\n    println!();\n}</pre>"),
            "```\nfn main() {\n    println!();\n}\n```\n"
        );
    }

    #[test]
    fn test_unordered_list() {
        assert_eq!(convert("<ul><li>one</li><li>two</li></ul>"), "- one\n- two\n");
    }

    #[test]
    fn test_ordered_list() {
        assert_eq!(
            convert("<ol><li>first</li><li>second</li></ol>"),
            "1. first\n2. second\n"
        );
    }

    #[test]
    fn test_nested_list() {
        assert_eq!(
            convert("<ul><li>outer<ul><li>inner</li></ul></li><li>next</li></ul>"),
            "- outer\n  - inner\n- next\n"
        );
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            convert("<blockquote><p>quoted</p><p>more</p></blockquote>"),
            "> quoted\n>\n> more\n"
        );
    }

    #[test]
    fn test_line_break() {
        assert_eq!(convert("<p>a<br>b</p>"), "a\nb\n");
    }

    #[test]
    fn test_script_and_style_removed() {
        assert_eq!(
            convert("<style>p{}</style><p>kept</p><script>alert(1)</script>"),
            "kept\n"
        );
    }

    #[test]
    fn test_plain_text_body() {
        // WordPress bodies are often bare text with blank-line paragraphs.
        assert_eq!(convert("just text"), "just text\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(convert(""), "");
    }

    #[test]
    fn test_depth_limit() {
        let html = "<div>".repeat(40);
        let result = MarkdownConverter::with_max_depth(10).convert(&html);
        assert!(matches!(result, Err(ConversionError::TooDeep(10))));
    }
}
