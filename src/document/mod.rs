// Document module: parsed HTML documents, element search and loading

mod parser;
pub mod search;
pub mod store;

pub use parser::HtmlParser;
pub use search::*;
pub use store::DocumentStore;

use crate::error::{Error, Result};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A single attribute on an element. Bare attributes have an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// An element located in a parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name
    tag: String,
    /// Attributes as written
    attributes: Vec<Attribute>,
    /// Byte range of the whole element, tags included
    span: Range<usize>,
    /// Byte range of the element's children
    content: Range<usize>,
    /// Where a new last child goes; `None` for void elements
    insertion_point: Option<usize>,
    /// Written as `<tag/>`; a splice expands it into an open and end tag pair
    self_closing: bool,
}

impl Element {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Value of an attribute, matched case-insensitively by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn insertion_point(&self) -> Option<usize> {
        self.insertion_point
    }

    /// One-line description used in ambiguity reports
    pub fn describe(&self) -> String {
        let attrs: Vec<String> = self
            .attributes
            .iter()
            .map(|a| format!("{}={}", a.name, a.value))
            .collect();
        format!("{}: {}", self.tag, attrs.join(", "))
    }
}

/// A parsed HTML document and the path it came from
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    origin: PathBuf,
    elements: Vec<Element>,
}

impl Document {
    pub(crate) fn from_parts(source: String, origin: PathBuf, elements: Vec<Element>) -> Self {
        Self {
            source,
            origin,
            elements,
        }
    }

    /// Parse a document from source text
    pub fn parse(source: impl Into<String>, origin: impl Into<PathBuf>) -> Result<Self> {
        HtmlParser::new()?.parse_source(source.into(), origin.into())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Every element in document order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Markup of the element including its own tags
    pub fn outer_html(&self, element: &Element) -> &str {
        &self.source[element.span.clone()]
    }

    /// Markup of the element's children, in order
    pub fn inner_html(&self, element: &Element) -> &str {
        &self.source[element.content.clone()]
    }

    /// Append a fragment as the last child(ren) of `target` and re-parse.
    pub fn append_fragment(
        &self,
        target: &Element,
        fragment: &str,
        parser: &mut HtmlParser,
    ) -> Result<Document> {
        let at = target.insertion_point.ok_or_else(|| {
            Error::validation(format!(
                "<{}> in '{}' cannot hold child content",
                target.tag,
                self.origin.display()
            ))
        })?;

        let mut source = String::with_capacity(self.source.len() + fragment.len());
        if target.self_closing {
            let head = &self.source[..at];
            source.push_str(head.strip_suffix("/>").unwrap_or(head).trim_end());
            source.push('>');
            source.push_str(fragment);
            source.push_str(&format!("</{}>", target.tag));
        } else {
            source.push_str(&self.source[..at]);
            source.push_str(fragment);
        }
        source.push_str(&self.source[at..]);

        parser.parse_source(source, self.origin.clone())
    }

    /// Write the document to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.source)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_fragment_as_last_child() {
        let mut parser = HtmlParser::new().unwrap();
        let doc = Document::parse("<div id=\"slot\"><i>a</i></div>", "a.html").unwrap();
        let slot = doc.elements()[0].clone();

        let merged = doc.append_fragment(&slot, "<b>b</b>", &mut parser).unwrap();
        assert_eq!(merged.source(), "<div id=\"slot\"><i>a</i><b>b</b></div>");
        assert_eq!(merged.elements().len(), 3);
        assert_eq!(merged.origin(), Path::new("a.html"));
    }

    #[test]
    fn test_append_into_void_element_fails() {
        let mut parser = HtmlParser::new().unwrap();
        let doc = Document::parse("<p><img id=\"logo\"></p>", "a.html").unwrap();
        let img = doc.elements().iter().find(|e| e.tag() == "img").unwrap().clone();

        let err = doc.append_fragment(&img, "<b>x</b>", &mut parser).unwrap_err();
        assert!(err.to_string().contains("cannot hold child content"));
    }

    #[test]
    fn test_append_into_self_closing_element() {
        let mut parser = HtmlParser::new().unwrap();
        let doc = Document::parse("<section><div id=\"slot\" /><br/></section>", "a.html").unwrap();
        let slot = doc.elements().iter().find(|e| e.tag() == "div").unwrap().clone();

        let merged = doc.append_fragment(&slot, "<b>x</b>", &mut parser).unwrap();
        assert_eq!(merged.source(), "<section><div id=\"slot\"><b>x</b></div><br/></section>");

        let div = merged.elements().iter().find(|e| e.tag() == "div").unwrap().clone();
        assert_eq!(merged.inner_html(&div), "<b>x</b>");
        let again = merged.append_fragment(&div, "<i>y</i>", &mut parser).unwrap();
        assert_eq!(
            again.source(),
            "<section><div id=\"slot\"><b>x</b><i>y</i></div><br/></section>"
        );

        let br = merged.elements().iter().find(|e| e.tag() == "br").unwrap().clone();
        assert!(merged.append_fragment(&br, "<b>x</b>", &mut parser).is_err());
    }

    #[test]
    fn test_describe_lists_attributes() {
        let doc = Document::parse("<a href=\"/\" class=\"nav\">home</a>", "a.html").unwrap();
        assert_eq!(doc.elements()[0].describe(), "a: href=/, class=nav");
    }

    #[test]
    fn test_save_writes_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        let doc = Document::parse("<p>saved</p>", "in.html").unwrap();
        doc.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>saved</p>");
    }
}
