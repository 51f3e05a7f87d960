// Entity types for the reference/mapping graph

use crate::document::SearchCriteria;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// What a reference path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    File,
    Folder,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::File => "file",
            ReferenceKind::Folder => "folder",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(ReferenceKind::File),
            "folder" => Ok(ReferenceKind::Folder),
            _ => Err(Error::validation(format!(
                "Path type '{}' is not valid (file or folder)",
                s
            ))),
        }
    }
}

/// Reference options. Not consulted by the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceFlag {
    Reverse,
}

impl ReferenceFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceFlag::Reverse => "reverse",
        }
    }
}

impl FromStr for ReferenceFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reverse" => Ok(ReferenceFlag::Reverse),
            _ => Err(Error::validation(format!("Unknown reference option '{}'", s))),
        }
    }
}

/// Mapping options
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingFlag {
    /// Insert the extraction node's children instead of the node itself
    Unpack,
}

impl MappingFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingFlag::Unpack => "unpack",
        }
    }
}

impl FromStr for MappingFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unpack" => Ok(MappingFlag::Unpack),
            _ => Err(Error::validation(format!("Unknown mapping option '{}'", s))),
        }
    }
}

pub type ReferenceFlags = BTreeSet<ReferenceFlag>;
pub type MappingFlags = BTreeSet<MappingFlag>;

/// A named source of HTML content: one file or a folder of files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub key: String,
    pub path: PathBuf,
    pub kind: ReferenceKind,
    pub flags: ReferenceFlags,
    /// Keys of mappings where this reference is the consumer, in insertion order
    pub(crate) contributors: Vec<String>,
    /// Keys of mappings where this reference is the contributor
    pub(crate) consumers: Vec<String>,
    /// Every reference this one draws content from, directly or not
    pub(crate) recursive_dependencies: BTreeSet<String>,
}

impl Reference {
    pub fn new(
        key: impl Into<String>,
        path: impl Into<PathBuf>,
        kind: ReferenceKind,
        flags: ReferenceFlags,
    ) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            kind,
            flags,
            contributors: Vec::new(),
            consumers: Vec::new(),
            recursive_dependencies: BTreeSet::new(),
        }
    }

    /// Mapping keys feeding into this reference
    pub fn contributor_mappings(&self) -> &[String] {
        &self.contributors
    }

    /// Mapping keys this reference feeds
    pub fn consumer_mappings(&self) -> &[String] {
        &self.consumers
    }

    pub fn recursive_dependencies(&self) -> &BTreeSet<String> {
        &self.recursive_dependencies
    }

    pub fn depends_on(&self, key: &str) -> bool {
        self.recursive_dependencies.contains(key)
    }

    pub fn has_mappings(&self) -> bool {
        !self.contributors.is_empty() || !self.consumers.is_empty()
    }
}

/// A directed edge: how the contributor's content is located and spliced into the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub key: String,
    pub consumer: String,
    pub contributor: String,
    pub consumer_search: SearchCriteria,
    pub contributor_search: SearchCriteria,
    pub flags: MappingFlags,
}

impl Mapping {
    pub fn new(
        key: impl Into<String>,
        consumer: impl Into<String>,
        contributor: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            consumer: consumer.into(),
            contributor: contributor.into(),
            consumer_search: SearchCriteria::default(),
            contributor_search: SearchCriteria::default(),
            flags: MappingFlags::new(),
        }
    }

    pub fn with_consumer_search(mut self, criteria: SearchCriteria) -> Self {
        self.consumer_search = criteria;
        self
    }

    pub fn with_contributor_search(mut self, criteria: SearchCriteria) -> Self {
        self.contributor_search = criteria;
        self
    }

    pub fn with_flag(mut self, flag: MappingFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn unpack(&self) -> bool {
        self.flags.contains(&MappingFlag::Unpack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_kind_parsing() {
        assert_eq!("file".parse::<ReferenceKind>().unwrap(), ReferenceKind::File);
        assert_eq!("Folder".parse::<ReferenceKind>().unwrap(), ReferenceKind::Folder);
        assert!("dir".parse::<ReferenceKind>().is_err());
        assert_eq!(ReferenceKind::Folder.to_string(), "folder");
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!("UNPACK".parse::<MappingFlag>().unwrap(), MappingFlag::Unpack);
        assert_eq!("reverse".parse::<ReferenceFlag>().unwrap(), ReferenceFlag::Reverse);
        assert!("explode".parse::<MappingFlag>().is_err());
    }

    #[test]
    fn test_mapping_builder() {
        let mapping = Mapping::new("m", "index", "nav")
            .with_consumer_search(SearchCriteria::new().with_attribute("id", "slot"))
            .with_flag(MappingFlag::Unpack);
        assert!(mapping.unpack());
        assert_eq!(mapping.consumer_search.attributes.len(), 1);
        assert!(mapping.contributor_search.attributes.is_empty());
    }

    #[test]
    fn test_new_reference_has_no_edges() {
        let reference = Reference::new("a", "a.html", ReferenceKind::File, ReferenceFlags::new());
        assert!(!reference.has_mappings());
        assert!(reference.recursive_dependencies().is_empty());
    }
}
