// Persisted graph definition
//
// The on-disk form is a TOML file with `[[reference]]` and `[[mapping]]`
// tables. Every field is optional at the serde level so that missing fields
// surface as validation errors naming the offending entry.

use crate::document::SearchCriteria;
use crate::error::{Error, Result};
use crate::graph::{
    GraphStore, Mapping, MappingFlag, MappingFlags, ReferenceFlag, ReferenceFlags, ReferenceKind,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Serialized form of a whole graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    #[serde(default, rename = "reference")]
    pub references: Vec<ReferenceEntry>,
    #[serde(default, rename = "mapping")]
    pub mappings: Vec<MappingEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_search: Option<SearchCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor_search: Option<SearchCriteria>,
}

impl GraphDefinition {
    /// Load a definition from a TOML file. A missing file is an empty graph.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "graph definition not found, starting empty");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Write the definition as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Snapshot a graph. Mappings are grouped by consumer in insertion order
    /// so that merge order survives a round trip.
    pub fn from_store(graph: &GraphStore) -> Self {
        let references = graph
            .references()
            .map(|r| ReferenceEntry {
                key: Some(r.key.clone()),
                path: Some(r.path.to_string_lossy().into_owned()),
                kind: Some(r.kind.to_string()),
                flags: r.flags.iter().map(|f| f.as_str().to_string()).collect(),
            })
            .collect();

        let mappings = graph
            .references()
            .flat_map(|r| graph.contributors_of(&r.key))
            .map(|m| MappingEntry {
                key: Some(m.key.clone()),
                consumer: Some(m.consumer.clone()),
                contributor: Some(m.contributor.clone()),
                flags: m.flags.iter().map(|f| f.as_str().to_string()).collect(),
                consumer_search: Some(m.consumer_search.clone()),
                contributor_search: Some(m.contributor_search.clone()),
            })
            .collect();

        Self {
            references,
            mappings,
        }
    }

    /// Validate every entry and build the graph
    pub fn into_store(self) -> Result<GraphStore> {
        let mut graph = GraphStore::new();

        let mut last_key = "<start of references>".to_string();
        for entry in self.references {
            let key = required(entry.key, || {
                format!("Reference entry after '{}' did not have a key", last_key)
            })?;
            let path = required(entry.path, || format!("Reference '{}' did not have a path", key))?;
            let kind = required(entry.kind, || {
                format!("Reference '{}' did not have a kind (file or folder)", key)
            })?;
            let kind = ReferenceKind::from_str(&kind)?;

            if graph.reference(&key).is_some() {
                return Err(Error::validation(format!("Duplicate reference key '{}'", key)));
            }

            let flags: ReferenceFlags = parse_flags::<ReferenceFlag>(&entry.flags, &key);
            graph.upsert_reference(&key, path, kind, flags)?;
            last_key = key;
        }
        tracing::info!(count = graph.references().count(), "loaded references");

        let mut last_key = "<start of mappings>".to_string();
        for entry in self.mappings {
            let key = required(entry.key, || {
                format!("Mapping entry after '{}' did not have a key", last_key)
            })?;
            let consumer = required(entry.consumer, || {
                format!("Mapping '{}' did not have a consumer", key)
            })?;
            let contributor = required(entry.contributor, || {
                format!("Mapping '{}' did not have a contributor", key)
            })?;
            if graph.reference(&consumer).is_none() {
                return Err(Error::validation(format!(
                    "Mapping '{}' has an invalid consumer '{}'",
                    key, consumer
                )));
            }
            if graph.reference(&contributor).is_none() {
                return Err(Error::validation(format!(
                    "Mapping '{}' has an invalid contributor '{}'",
                    key, contributor
                )));
            }
            let consumer_search = required(entry.consumer_search, || {
                format!("Mapping '{}' did not have a consumer search", key)
            })?;
            let contributor_search = required(entry.contributor_search, || {
                format!("Mapping '{}' did not have a contributor search", key)
            })?;

            let flags: MappingFlags = parse_flags::<MappingFlag>(&entry.flags, &key);
            let mut mapping = Mapping::new(&key, consumer, contributor)
                .with_consumer_search(consumer_search)
                .with_contributor_search(contributor_search);
            mapping.flags = flags;

            graph.add_mapping(mapping)?;
            last_key = key;
        }
        tracing::info!(count = graph.mappings().count(), "loaded mappings");

        Ok(graph)
    }
}

fn required<T>(value: Option<T>, message: impl FnOnce() -> String) -> Result<T> {
    value.ok_or_else(|| Error::validation(message()))
}

/// Parse known flags; unknown ones are logged and skipped
fn parse_flags<F>(names: &[String], owner: &str) -> std::collections::BTreeSet<F>
where
    F: FromStr<Err = Error> + Ord,
{
    names
        .iter()
        .filter_map(|name| match F::from_str(name) {
            Ok(flag) => Some(flag),
            Err(_) => {
                tracing::warn!(entry = %owner, flag = %name, "ignoring invalid flag");
                None
            }
        })
        .collect()
}
