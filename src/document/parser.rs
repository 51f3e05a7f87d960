// HTML parser using tree-sitter
//
// Parses a document once and flattens every element into an `Element`
// record holding byte ranges into the source, so searches and splices never
// need to hold on to the syntax tree.

use crate::document::{Attribute, Document, Element};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser};

/// Elements that never have children or an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Parser for HTML documents
pub struct HtmlParser {
    parser: Parser,
}

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_html::LANGUAGE.into())
            .map_err(|e| Error::Parser(format!("Failed to set HTML language: {}", e)))?;

        Ok(Self { parser })
    }

    /// Parse an HTML file
    pub fn parse_file(&mut self, path: &Path) -> Result<Document> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
        })?;

        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    "file is not valid UTF-8, replacing invalid bytes"
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        self.parse_source(source, path.to_path_buf())
    }

    /// Parse HTML source text
    pub fn parse_source(&mut self, source: String, origin: PathBuf) -> Result<Document> {
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| Error::parser(format!("Failed to parse {}", origin.display())))?;

        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!(document = %origin.display(), "document contains malformed markup");
        }

        let elements = collect_elements(root, &source);
        Ok(Document::from_parts(source, origin, elements))
    }
}

/// Walk the tree in document order, collecting every element
fn collect_elements(root: Node, source: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if matches!(node.kind(), "element" | "script_element" | "style_element") {
            if let Some(element) = parse_element(node, source) {
                elements.push(element);
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    elements
}

fn parse_element(node: Node, source: &str) -> Option<Element> {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();

    let open = children
        .iter()
        .find(|c| matches!(c.kind(), "start_tag" | "self_closing_tag"))
        .copied()?;
    let end = children.iter().rev().find(|c| c.kind() == "end_tag").copied();

    let mut tag = String::new();
    let mut attributes = Vec::new();
    let mut tag_cursor = open.walk();
    for part in open.named_children(&mut tag_cursor) {
        match part.kind() {
            "tag_name" => tag = node_text(&part, source).to_ascii_lowercase(),
            "attribute" => {
                if let Some(attribute) = parse_attribute(part, source) {
                    attributes.push(attribute);
                }
            }
            _ => {}
        }
    }

    let self_closing = open.kind() == "self_closing_tag";
    let content_end = end.map(|e| e.start_byte()).unwrap_or(node.end_byte());
    let content = if self_closing {
        open.end_byte()..open.end_byte()
    } else {
        open.end_byte()..content_end.max(open.end_byte())
    };

    let void = VOID_ELEMENTS.contains(&tag.as_str());
    let insertion_point = match end {
        Some(end_tag) => Some(end_tag.start_byte()),
        None if void => None,
        None if self_closing => Some(open.end_byte()),
        None => Some(node.end_byte()),
    };

    Some(Element {
        tag,
        attributes,
        span: node.start_byte()..node.end_byte(),
        content,
        insertion_point,
        self_closing: self_closing && !void,
    })
}

fn parse_attribute(node: Node, source: &str) -> Option<Attribute> {
    let mut cursor = node.walk();
    let mut name = None;
    let mut value = String::new();

    for part in node.named_children(&mut cursor) {
        match part.kind() {
            "attribute_name" => name = Some(node_text(&part, source).to_string()),
            "attribute_value" => value = node_text(&part, source).to_string(),
            "quoted_attribute_value" => {
                let mut inner_cursor = part.walk();
                value = part
                    .named_children(&mut inner_cursor)
                    .find(|c| c.kind() == "attribute_value")
                    .map(|c| node_text(&c, source).to_string())
                    .unwrap_or_default();
            }
            _ => {}
        }
    }

    name.map(|name| Attribute { name, value })
}

fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}
