// Element search over parsed documents
//
// Criteria are an optional tag filter plus attribute equality predicates,
// all of which must hold. Three access modes enforce how many matches are
// acceptable.

use crate::document::{Document, Element};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One attribute equality predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParam {
    pub name: String,
    pub value: String,
}

impl SearchParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse an `attr=value` pair
    pub fn parse(input: &str) -> Option<Self> {
        let (name, value) = input.split_once('=')?;
        if name.is_empty() || value.contains('=') {
            return None;
        }
        Some(Self::new(name, value))
    }

    fn matches(&self, element: &Element) -> bool {
        element.attribute(&self.name) == Some(self.value.as_str())
    }
}

/// Tag filter plus attribute predicates, ANDed together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<SearchParam>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict matches to one tag name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an attribute predicate
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(SearchParam::new(name, value));
        self
    }

    /// Build criteria from CLI-style `attr=value` terms; `name=<tag>` sets the tag filter.
    pub fn from_terms<S: AsRef<str>>(terms: &[S]) -> Option<Self> {
        let mut criteria = Self::new();
        for term in terms {
            let param = SearchParam::parse(term.as_ref())?;
            if param.name.eq_ignore_ascii_case("name") {
                criteria.name = Some(param.value);
            } else {
                criteria.attributes.push(param);
            }
        }
        Some(criteria)
    }

    pub fn matches(&self, element: &Element) -> bool {
        if let Some(name) = &self.name {
            if !element.tag().eq_ignore_ascii_case(name) {
                return false;
            }
        }
        self.attributes.iter().all(|p| p.matches(element))
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "'{}' ", name)?;
        }
        let attrs: Vec<String> = self
            .attributes
            .iter()
            .map(|p| format!("{}='{}'", p.name, p.value))
            .collect();
        if attrs.is_empty() {
            write!(f, "with any attributes")
        } else {
            write!(f, "with attributes: {}", attrs.join(", "))
        }
    }
}

/// Search failures
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("failed to find element {criteria} in '{}'", .document.display())]
    NotFound {
        criteria: SearchCriteria,
        document: PathBuf,
    },

    #[error(
        "query for element {criteria} in '{}' was ambiguous between {} results:{}",
        .document.display(),
        .candidates.len(),
        format_candidates(.candidates)
    )]
    Ambiguous {
        criteria: SearchCriteria,
        document: PathBuf,
        candidates: Vec<String>,
    },
}

fn format_candidates(candidates: &[String]) -> String {
    candidates.iter().map(|c| format!("\n\t{}", c)).collect()
}

/// All elements matching the criteria, in document order
pub fn find_all<'d>(document: &'d Document, criteria: &SearchCriteria) -> Vec<&'d Element> {
    document
        .elements()
        .iter()
        .filter(|e| criteria.matches(e))
        .collect()
}

/// Exactly one match
pub fn for_single<'d>(
    document: &'d Document,
    criteria: &SearchCriteria,
) -> Result<&'d Element, SearchError> {
    match for_single_or_none(document, criteria)? {
        Some(element) => Ok(element),
        None => Err(not_found(document, criteria)),
    }
}

/// Zero or one match
pub fn for_single_or_none<'d>(
    document: &'d Document,
    criteria: &SearchCriteria,
) -> Result<Option<&'d Element>, SearchError> {
    let matches = find_all(document, criteria);
    if matches.len() > 1 {
        return Err(SearchError::Ambiguous {
            criteria: criteria.clone(),
            document: document.origin().to_path_buf(),
            candidates: matches.iter().map(|e| e.describe()).collect(),
        });
    }
    Ok(matches.into_iter().next())
}

/// One or more matches
pub fn for_multiple<'d>(
    document: &'d Document,
    criteria: &SearchCriteria,
) -> Result<Vec<&'d Element>, SearchError> {
    let matches = find_all(document, criteria);
    if matches.is_empty() {
        return Err(not_found(document, criteria));
    }
    Ok(matches)
}

fn not_found(document: &Document, criteria: &SearchCriteria) -> SearchError {
    SearchError::NotFound {
        criteria: criteria.clone(),
        document: document.origin().to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str) -> Document {
        Document::parse(source, "page.html").unwrap()
    }

    const PAGE: &str = r#"<html><body>
<div id="main" class="box"><p class="note">one</p></div>
<div id="side" class="box"><p class="note">two</p></div>
<section class="box"></section>
</body></html>"#;

    #[test]
    fn test_for_single_by_id() {
        let page = doc(PAGE);
        let criteria = SearchCriteria::new().with_attribute("id", "main");
        let found = for_single(&page, &criteria).unwrap();
        assert_eq!(found.tag(), "div");
        assert_eq!(found.attribute("id"), Some("main"));
    }

    #[test]
    fn test_predicates_are_anded() {
        let page = doc(PAGE);
        let criteria = SearchCriteria::new()
            .with_attribute("class", "box")
            .with_attribute("id", "side");
        let found = for_single(&page, &criteria).unwrap();
        assert_eq!(found.attribute("id"), Some("side"));
    }

    #[test]
    fn test_name_filter() {
        let page = doc(PAGE);
        let criteria = SearchCriteria::new()
            .with_name("section")
            .with_attribute("class", "box");
        assert_eq!(for_single(&page, &criteria).unwrap().tag(), "section");

        let upper = SearchCriteria::new().with_name("SECTION");
        assert!(for_single(&page, &upper).is_ok());
    }

    #[test]
    fn test_for_single_zero_names_criteria() {
        let page = doc(PAGE);
        let criteria = SearchCriteria::new()
            .with_name("nav")
            .with_attribute("id", "menu");
        let err = for_single(&page, &criteria).unwrap_err();
        assert!(matches!(err, SearchError::NotFound { .. }));
        let msg = err.to_string();
        assert!(msg.contains("'nav'"));
        assert!(msg.contains("id='menu'"));
        assert!(msg.contains("page.html"));
    }

    #[test]
    fn test_for_single_many_lists_candidates() {
        let page = doc(PAGE);
        let criteria = SearchCriteria::new().with_attribute("class", "box");
        let err = for_single(&page, &criteria).unwrap_err();
        match &err {
            SearchError::Ambiguous { candidates, .. } => {
                assert_eq!(candidates.len(), 3);
                assert_eq!(candidates[0], "div: id=main, class=box");
                assert_eq!(candidates[2], "section: class=box");
            }
            other => panic!("Expected Ambiguous, got {:?}", other),
        }
        assert!(err.to_string().contains("ambiguous between 3 results"));
    }

    #[test]
    fn test_for_single_or_none() {
        let page = doc(PAGE);
        let none = SearchCriteria::new().with_attribute("id", "absent");
        assert!(for_single_or_none(&page, &none).unwrap().is_none());

        let one = SearchCriteria::new().with_attribute("id", "main");
        assert!(for_single_or_none(&page, &one).unwrap().is_some());

        let many = SearchCriteria::new().with_attribute("class", "note");
        assert!(for_single_or_none(&page, &many).is_err());
    }

    #[test]
    fn test_for_multiple() {
        let page = doc(PAGE);
        let notes = SearchCriteria::new().with_attribute("class", "note");
        let found = for_multiple(&page, &notes).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(page.inner_html(found[0]), "one");
        assert_eq!(page.inner_html(found[1]), "two");

        let none = SearchCriteria::new().with_name("table");
        assert!(matches!(
            for_multiple(&page, &none),
            Err(SearchError::NotFound { .. })
        ));
    }

    #[test]
    fn test_empty_criteria_matches_every_element() {
        let page = doc("<div><span></span></div>");
        assert_eq!(find_all(&page, &SearchCriteria::new()).len(), 2);
    }

    #[test]
    fn test_from_terms() {
        let criteria = SearchCriteria::from_terms(&["name=div", "id=slot"]).unwrap();
        assert_eq!(criteria.name.as_deref(), Some("div"));
        assert_eq!(criteria.attributes, vec![SearchParam::new("id", "slot")]);

        assert!(SearchCriteria::from_terms(&["broken"]).is_none());
        assert!(SearchCriteria::from_terms(&["a=b=c"]).is_none());
    }

    #[test]
    fn test_display() {
        let criteria = SearchCriteria::new().with_name("div").with_attribute("id", "x");
        assert_eq!(criteria.to_string(), "'div' with attributes: id='x'");
        assert_eq!(SearchCriteria::new().to_string(), "with any attributes");
    }
}
