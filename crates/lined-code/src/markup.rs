//! Markup import and HTML export.
//!
//! The host parses markup into [`MarkupNode`] trees. Code-shaped elements become code blocks,
//! picked by tag and shape; everything else becomes plain paragraphs.

use crate::document::{Document, NodeId, NodeKind};
use crate::error::{CodeError, CodeResult};
use crate::reconcile::{code_block_from_text, raw_text};
use crate::settings::CodeBlockOptions;
use crate::view::{
    ElementView, LANGUAGE_DATA_ATTRIBUTE, create_block_view, create_line_view, create_run_view,
};
use std::collections::BTreeMap;

/// A host-parsed markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    /// An element.
    Element {
        /// Lowercase tag name.
        tag: String,
        /// Attributes by name.
        attributes: BTreeMap<String, String>,
        /// Children.
        children: Vec<MarkupNode>,
    },
    /// A text node.
    Text(String),
}

const LINE_TAGS: &[&str] = &["div", "p", "tr", "li"];

impl MarkupNode {
    /// Element without attributes or children.
    pub fn element(tag: impl Into<String>) -> Self {
        MarkupNode::Element {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Text node.
    pub fn text(text: impl Into<String>) -> Self {
        MarkupNode::Text(text.into())
    }

    /// Builder: set an attribute (ignored on text nodes).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let MarkupNode::Element { attributes, .. } = &mut self {
            attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Builder: append a child (ignored on text nodes).
    pub fn with_child(mut self, child: MarkupNode) -> Self {
        if let MarkupNode::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    /// Tag name, `None` for text.
    pub fn tag(&self) -> Option<&str> {
        match self {
            MarkupNode::Element { tag, .. } => Some(tag),
            MarkupNode::Text(_) => None,
        }
    }

    /// Attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            MarkupNode::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            MarkupNode::Text(_) => None,
        }
    }

    /// Children (empty for text).
    pub fn children(&self) -> &[MarkupNode] {
        match self {
            MarkupNode::Element { children, .. } => children,
            MarkupNode::Text(_) => &[],
        }
    }

    /// Returns `true` if the `class` attribute lists `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Text of the subtree; `<br>` counts as a newline.
    pub fn text_content(&self) -> String {
        match self {
            MarkupNode::Text(text) => text.clone(),
            MarkupNode::Element { tag, children, .. } => {
                if tag == "br" {
                    return "\n".to_string();
                }
                children.iter().map(MarkupNode::text_content).collect()
            }
        }
    }

    fn is_line_element(&self) -> bool {
        self.tag().is_some_and(|tag| LINE_TAGS.contains(&tag))
    }
}

/// How a code-shaped element converts into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupConversion {
    /// `<pre>`, optionally wrapping a `<code>`.
    Pre,
    /// A multi-line `<code>` outside `<pre>` (or one carrying a language attribute).
    MultiLineCode,
    /// A `<div>` styled with a monospace font.
    MonospaceDiv,
    /// A GitHub file view table (`table.js-file-line-container`).
    GitHubTable,
}

impl MarkupConversion {
    /// Higher wins when several conversions claim a node.
    pub fn priority(self) -> u8 {
        match self {
            MarkupConversion::Pre => 1,
            MarkupConversion::MultiLineCode | MarkupConversion::MonospaceDiv => 2,
            MarkupConversion::GitHubTable => 4,
        }
    }
}

fn is_monospace(style: &str) -> bool {
    style.split(';').any(|declaration| {
        let mut parts = declaration.splitn(2, ':');
        let name = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").to_ascii_lowercase();
        name.eq_ignore_ascii_case("font-family") && value.contains("monospace")
    })
}

/// The conversion that claims `node`, if any.
pub fn conversion_for(node: &MarkupNode, parent_tag: Option<&str>) -> Option<MarkupConversion> {
    let candidates = [
        (node.tag() == Some("pre")).then_some(MarkupConversion::Pre),
        (node.tag() == Some("code")
            && (node.attribute(LANGUAGE_DATA_ATTRIBUTE).is_some()
                || (parent_tag != Some("pre") && node.text_content().contains('\n'))))
        .then_some(MarkupConversion::MultiLineCode),
        (node.tag() == Some("div")
            && node.attribute("style").is_some_and(is_monospace))
        .then_some(MarkupConversion::MonospaceDiv),
        (node.tag() == Some("table") && node.has_class("js-file-line-container"))
            .then_some(MarkupConversion::GitHubTable),
    ];
    candidates
        .into_iter()
        .flatten()
        .max_by_key(|conversion| conversion.priority())
}

fn line_fragment(node: &MarkupNode) -> String {
    let text = node.text_content();
    if text == "\n" { String::new() } else { text }
}

fn fragments_of(children: &[MarkupNode]) -> Vec<String> {
    if children.iter().any(MarkupNode::is_line_element) {
        children
            .iter()
            .filter(|child| child.tag().is_some() || !child.text_content().trim().is_empty())
            .map(line_fragment)
            .collect()
    } else {
        vec![children.iter().map(MarkupNode::text_content).collect()]
    }
}

fn table_rows(node: &MarkupNode, rows: &mut Vec<MarkupNode>) {
    for child in node.children() {
        match child.tag() {
            Some("tr") => rows.push(child.clone()),
            Some(_) => table_rows(child, rows),
            None => {}
        }
    }
}

fn row_text(row: &MarkupNode) -> String {
    let cells: Vec<&MarkupNode> = row
        .children()
        .iter()
        .filter(|cell| cell.tag() == Some("td"))
        .collect();
    cells
        .iter()
        .find(|cell| cell.has_class("blob-code"))
        .or(cells.last())
        .map(|cell| line_fragment(cell))
        .unwrap_or_default()
}

/// Language and raw text of a code-shaped element.
pub fn code_source(node: &MarkupNode, conversion: MarkupConversion) -> (Option<String>, String) {
    let language = node.attribute(LANGUAGE_DATA_ATTRIBUTE).map(str::to_string);
    match conversion {
        MarkupConversion::Pre => {
            let inner = match node.children().first() {
                Some(code) if code.tag() == Some("code") => code,
                _ => node,
            };
            let language = language.or_else(|| {
                inner
                    .attribute(LANGUAGE_DATA_ATTRIBUTE)
                    .map(str::to_string)
            });
            (language, raw_text(&fragments_of(inner.children()), "", ""))
        }
        MarkupConversion::MultiLineCode | MarkupConversion::MonospaceDiv => {
            (language, raw_text(&fragments_of(node.children()), "", ""))
        }
        MarkupConversion::GitHubTable => {
            let mut rows = Vec::new();
            table_rows(node, &mut rows);
            let fragments: Vec<String> = rows.iter().map(row_text).collect();
            (language, raw_text(&fragments, "", ""))
        }
    }
}

struct Importer<'a> {
    doc: &'a mut Document,
    out: Vec<NodeId>,
    paragraph: Option<NodeId>,
}

impl Importer<'_> {
    fn flush(&mut self) {
        if let Some(paragraph) = self.paragraph.take() {
            self.out.push(paragraph);
        }
    }

    fn push_text(&mut self, text: String) -> CodeResult<()> {
        let paragraph = match self.paragraph {
            Some(paragraph) => paragraph,
            None => {
                let paragraph = self.doc.create_paragraph();
                self.paragraph = Some(paragraph);
                paragraph
            }
        };
        let node = self.doc.create_text(text);
        self.doc.append(paragraph, node)
    }

    fn visit(&mut self, node: &MarkupNode, parent_tag: Option<&str>) -> CodeResult<()> {
        if let Some(conversion) = conversion_for(node, parent_tag) {
            self.flush();
            let (language, text) = code_source(node, conversion);
            let options = CodeBlockOptions {
                initial_language: language,
                ..CodeBlockOptions::default()
            };
            let block = code_block_from_text(self.doc, &options, &text)?;
            self.out.push(block);
            return Ok(());
        }
        match node {
            MarkupNode::Text(text) => {
                if !text.trim().is_empty() {
                    self.push_text(text.clone())?;
                }
            }
            MarkupNode::Element { tag, children, .. } => {
                if tag == "br" {
                    self.flush();
                } else if node.is_line_element() || children.iter().any(|c| c.tag().is_some()) {
                    self.flush();
                    for child in children {
                        self.visit(child, Some(tag))?;
                    }
                    self.flush();
                } else {
                    let text = node.text_content();
                    if !text.trim().is_empty() {
                        self.push_text(text)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Import markup as detached top-level nodes (code blocks and paragraphs), in order.
pub fn import_markup(doc: &mut Document, nodes: &[MarkupNode]) -> CodeResult<Vec<NodeId>> {
    let mut importer = Importer {
        doc,
        out: Vec::new(),
        paragraph: None,
    };
    for node in nodes {
        importer.visit(node, None)?;
    }
    importer.flush();
    Ok(importer.out)
}

fn push_open(out: &mut String, view: &ElementView) {
    out.push_str(&view.open_tag());
}

fn push_close(out: &mut String, view: &ElementView) {
    out.push_str("</");
    out.push_str(&view.tag);
    out.push('>');
}

/// Render a code block as HTML.
pub fn export_html(doc: &Document, block: NodeId) -> CodeResult<String> {
    if !doc.is(block, NodeKind::CodeBlock) {
        return Err(CodeError::NotACodeBlock(block));
    }
    let settings = doc.settings(block)?;
    let block_view = create_block_view(settings);
    let mut out = String::new();
    push_open(&mut out, &block_view);
    for &line in doc.children(block) {
        let line_view = create_line_view(doc, line)?;
        push_open(&mut out, &line_view);
        if doc.child_count(line) == 0 {
            out.push_str("<br>");
        }
        for &run in doc.children(line) {
            let Some(data) = doc.code_run(run) else {
                continue;
            };
            let run_view = create_run_view(settings, data);
            push_open(&mut out, &run_view);
            out.push_str(&html_escape::encode_text(&data.text));
            push_close(&mut out, &run_view);
        }
        push_close(&mut out, &line_view);
    }
    push_close(&mut out, &block_view);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn block_lines(doc: &Document, block: NodeId) -> Vec<String> {
        doc.children(block)
            .iter()
            .map(|&l| doc.text_content(l))
            .collect()
    }

    #[test]
    fn test_pre_with_code_child() {
        let pre = MarkupNode::element("pre").with_child(
            MarkupNode::element("code")
                .with_attribute(LANGUAGE_DATA_ATTRIBUTE, "rust")
                .with_child(MarkupNode::text("fn a() {}\n  b")),
        );
        let mut doc = Document::new();
        let nodes = import_markup(&mut doc, &[pre]).unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(block_lines(&doc, nodes[0]), vec!["fn a() {}", "  b"]);
        assert_eq!(doc.settings(nodes[0]).unwrap().language, "rust");
    }

    #[test]
    fn test_single_line_code_is_inline_text() {
        let p = MarkupNode::element("p")
            .with_child(MarkupNode::text("use "))
            .with_child(MarkupNode::element("code").with_child(MarkupNode::text("x")));
        let mut doc = Document::new();
        let nodes = import_markup(&mut doc, &[p]).unwrap();

        assert_eq!(nodes.len(), 1);
        assert!(doc.is(nodes[0], NodeKind::Paragraph));
        assert_eq!(doc.text_content(nodes[0]), "use x");
    }

    #[test]
    fn test_monospace_div_with_line_children() {
        let div = MarkupNode::element("div")
            .with_attribute("style", "color: red; font-family: Menlo, monospace")
            .with_child(MarkupNode::element("div").with_child(MarkupNode::text("a")))
            .with_child(MarkupNode::element("div").with_child(MarkupNode::element("br")))
            .with_child(MarkupNode::element("div").with_child(MarkupNode::text("b")));
        let mut doc = Document::new();
        let nodes = import_markup(&mut doc, &[div]).unwrap();

        assert_eq!(block_lines(&doc, nodes[0]), vec!["a", "", "b"]);
    }

    #[test]
    fn test_github_table_outranks_everything() {
        let row = |n: &str, code: &str| {
            MarkupNode::element("tr")
                .with_child(MarkupNode::element("td").with_child(MarkupNode::text(n)))
                .with_child(
                    MarkupNode::element("td")
                        .with_attribute("class", "blob-code blob-code-inner")
                        .with_child(MarkupNode::text(code)),
                )
        };
        let table = MarkupNode::element("table")
            .with_attribute("class", "highlight js-file-line-container")
            .with_child(
                MarkupNode::element("tbody")
                    .with_child(row("1", "let a;"))
                    .with_child(row("2", "let b;")),
            );

        assert_eq!(
            conversion_for(&table, None),
            Some(MarkupConversion::GitHubTable)
        );
        let mut doc = Document::new();
        let nodes = import_markup(&mut doc, &[table]).unwrap();
        assert_eq!(block_lines(&doc, nodes[0]), vec!["let a;", "let b;"]);
    }

    #[test]
    fn test_code_inside_pre_is_left_to_pre() {
        let code = MarkupNode::element("code").with_child(MarkupNode::text("a\nb"));
        assert_eq!(conversion_for(&code, Some("pre")), None);
        assert_eq!(
            conversion_for(&code, Some("div")),
            Some(MarkupConversion::MultiLineCode)
        );
    }

    #[test]
    fn test_export_escapes_and_numbers_lines() {
        let mut doc = Document::new();
        let block = code_block_from_text(
            &mut doc,
            &CodeBlockOptions::with_language("markup"),
            "<a>\n",
        )
        .unwrap();

        let html = export_html(&doc, block).unwrap();

        assert!(html.starts_with("<code class=\"lined-code-node line-number\""));
        assert!(html.contains("data-highlight-language=\"markup\""));
        assert!(html.contains("spellcheck=\"false\""));
        assert!(html.contains("data-line-number=\"1\""));
        assert!(html.contains("&lt;"));
        assert!(!html.contains("<a>"));
        assert!(html.contains("data-line-number=\"2\"><br></div>"));
        assert!(html.ends_with("</code>"));
    }

    #[test]
    fn test_export_then_import_keeps_lines() {
        let mut doc = Document::new();
        let block =
            code_block_from_text(&mut doc, &CodeBlockOptions::with_language("rust"), "fn a()\n\n}")
                .unwrap();
        let html = export_html(&doc, block).unwrap();
        assert!(html.contains("<br>"));

        // Rebuild the markup tree the way a host parser would see it.
        let mut code = MarkupNode::element("code").with_attribute(LANGUAGE_DATA_ATTRIBUTE, "rust");
        for &line in doc.children(block) {
            let mut div = MarkupNode::element("div");
            div = if doc.child_count(line) == 0 {
                div.with_child(MarkupNode::element("br"))
            } else {
                div.with_child(MarkupNode::text(doc.text_content(line)))
            };
            code = code.with_child(div);
        }
        let nodes = import_markup(&mut doc, &[code]).unwrap();

        assert_eq!(block_lines(&doc, nodes[0]), vec!["fn a()", "", "}"]);
        assert_eq!(doc.settings(nodes[0]).unwrap().language, "rust");
    }
}
