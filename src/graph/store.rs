// Reference/mapping graph with a materialized transitive closure
//
// References and mappings live in two key-indexed tables. Each reference
// keeps the keys of its edges and the set of everything it transitively
// draws from, so cycle checks are a single set lookup.

use crate::error::{Error, Result};
use crate::graph::{Mapping, Reference, ReferenceFlags, ReferenceKind};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::PathBuf;

/// Outcome of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// Owner of every reference and mapping
#[derive(Debug, Default, Clone)]
pub struct GraphStore {
    references: BTreeMap<String, Reference>,
    mappings: BTreeMap<String, Mapping>,
    /// References that are never a contributor
    heads: BTreeSet<String>,
}

impl GraphStore {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference(&self, key: &str) -> Option<&Reference> {
        self.references.get(key)
    }

    pub fn mapping(&self, key: &str) -> Option<&Mapping> {
        self.mappings.get(key)
    }

    /// All references ordered by key
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    /// All mappings ordered by key
    pub fn mappings(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.values()
    }

    /// Build roots, ordered by key
    pub fn heads(&self) -> impl Iterator<Item = &str> {
        self.heads.iter().map(String::as_str)
    }

    pub fn is_head(&self, key: &str) -> bool {
        self.heads.contains(key)
    }

    /// Mappings whose consumer is `key`, in insertion order
    pub fn contributors_of(&self, key: &str) -> Vec<&Mapping> {
        self.edge_mappings(key, |r| &r.contributors)
    }

    /// Mappings whose contributor is `key`, in insertion order
    pub fn consumers_of(&self, key: &str) -> Vec<&Mapping> {
        self.edge_mappings(key, |r| &r.consumers)
    }

    fn edge_mappings<'a>(
        &'a self,
        key: &str,
        edges: impl Fn(&'a Reference) -> &'a Vec<String>,
    ) -> Vec<&'a Mapping> {
        self.references
            .get(key)
            .map(|r| edges(r).iter().filter_map(|m| self.mappings.get(m)).collect())
            .unwrap_or_default()
    }

    /// References whose key contains `filter`
    pub fn list_references(&self, filter: Option<&str>) -> Vec<&Reference> {
        self.references
            .values()
            .filter(|r| filter.map_or(true, |f| r.key.contains(f)))
            .collect()
    }

    /// Mappings whose key contains `filter`
    pub fn list_mappings(&self, filter: Option<&str>) -> Vec<&Mapping> {
        self.mappings
            .values()
            .filter(|m| filter.map_or(true, |f| m.key.contains(f)))
            .collect()
    }

    /// Insert or update a reference by key
    pub fn upsert_reference(
        &mut self,
        key: &str,
        path: impl Into<PathBuf>,
        kind: ReferenceKind,
        flags: ReferenceFlags,
    ) -> Result<Upsert> {
        match self.references.get_mut(key) {
            Some(existing) => {
                if kind == ReferenceKind::Folder && !existing.contributors.is_empty() {
                    return Err(Error::state_conflict(format!(
                        "Cannot change reference '{}' to a folder while it consumes {} mapping(s). \
                         Remove them first.",
                        key,
                        existing.contributors.len()
                    )));
                }
                existing.path = path.into();
                existing.kind = kind;
                existing.flags = flags;
                Ok(Upsert::Updated)
            }
            None => {
                self.references
                    .insert(key.to_string(), Reference::new(key, path, kind, flags));
                self.heads.insert(key.to_string());
                Ok(Upsert::Created)
            }
        }
    }

    /// Remove a reference. Attached mappings are removed only when `cascade` is set.
    pub fn remove_reference(&mut self, key: &str, cascade: bool) -> Result<Vec<Mapping>> {
        let reference = self
            .references
            .get(key)
            .ok_or_else(|| Error::unknown_reference(key))?;

        let attached: Vec<String> = reference
            .consumers
            .iter()
            .chain(reference.contributors.iter())
            .cloned()
            .collect();

        if !attached.is_empty() && !cascade {
            return Err(Error::state_conflict(format!(
                "Reference '{}' still has {} mapping(s): {}",
                key,
                attached.len(),
                attached.join(", ")
            )));
        }

        let mut removed = Vec::with_capacity(attached.len());
        for mapping_key in &attached {
            removed.push(self.remove_mapping(mapping_key)?);
        }

        self.references.remove(key);
        self.heads.remove(key);
        Ok(removed)
    }

    /// Add a new mapping, rejecting anything that would close a cycle
    pub fn add_mapping(&mut self, mapping: Mapping) -> Result<()> {
        self.attach(mapping, None)
    }

    /// Insert or replace a mapping by key. On failure the graph is unchanged.
    pub fn set_mapping(&mut self, mapping: Mapping) -> Result<Upsert> {
        if !self.mappings.contains_key(&mapping.key) {
            self.attach(mapping, None)?;
            return Ok(Upsert::Created);
        }

        let (previous, slots) = self.detach(&mapping.key)?;
        match self.attach(mapping, None) {
            Ok(()) => Ok(Upsert::Updated),
            Err(err) => {
                self.attach(previous, Some(slots))?;
                Err(err)
            }
        }
    }

    /// Remove a mapping and recompute the closures it fed
    pub fn remove_mapping(&mut self, key: &str) -> Result<Mapping> {
        self.detach(key).map(|(mapping, _)| mapping)
    }

    fn attach(&mut self, mapping: Mapping, slots: Option<(usize, usize)>) -> Result<()> {
        if self.mappings.contains_key(&mapping.key) {
            return Err(Error::validation(format!(
                "Mapping '{}' already exists",
                mapping.key
            )));
        }

        let consumer = self.references.get(&mapping.consumer).ok_or_else(|| {
            Error::validation(format!(
                "Consumer reference '{}' does not exist",
                mapping.consumer
            ))
        })?;
        let contributor = self.references.get(&mapping.contributor).ok_or_else(|| {
            Error::validation(format!(
                "Contributor reference '{}' does not exist",
                mapping.contributor
            ))
        })?;

        if consumer.kind == ReferenceKind::Folder {
            return Err(Error::state_conflict(format!(
                "Reference '{}' is a folder and cannot consume mapping '{}'",
                consumer.key, mapping.key
            )));
        }

        if consumer.key == contributor.key || contributor.depends_on(&consumer.key) {
            return Err(Error::Cycle {
                mapping: mapping.key.clone(),
                consumer: mapping.consumer.clone(),
                contributor: mapping.contributor.clone(),
            });
        }

        let mut added = contributor.recursive_dependencies.clone();
        added.insert(contributor.key.clone());

        let mut affected = vec![mapping.consumer.clone()];
        affected.extend(self.transitive_consumers(&mapping.consumer));
        for key in &affected {
            if let Some(reference) = self.references.get_mut(key) {
                reference.recursive_dependencies.extend(added.iter().cloned());
            }
        }

        let (consumer_slot, contributor_slot) = slots.unwrap_or((usize::MAX, usize::MAX));
        if let Some(consumer) = self.references.get_mut(&mapping.consumer) {
            insert_at(&mut consumer.contributors, consumer_slot, mapping.key.clone());
        }
        if let Some(contributor) = self.references.get_mut(&mapping.contributor) {
            insert_at(&mut contributor.consumers, contributor_slot, mapping.key.clone());
        }

        self.heads.remove(&mapping.contributor);
        tracing::debug!(
            mapping = %mapping.key,
            consumer = %mapping.consumer,
            contributor = %mapping.contributor,
            "mapping added"
        );
        self.mappings.insert(mapping.key.clone(), mapping);
        Ok(())
    }

    /// Remove a mapping, returning it with its positions in the endpoint edge lists
    fn detach(&mut self, key: &str) -> Result<(Mapping, (usize, usize))> {
        let mapping = self
            .mappings
            .remove(key)
            .ok_or_else(|| Error::unknown_mapping(key))?;

        let consumer_slot = self
            .references
            .get_mut(&mapping.consumer)
            .map(|r| remove_key(&mut r.contributors, key))
            .unwrap_or(0);

        let mut contributor_slot = 0;
        if let Some(contributor) = self.references.get_mut(&mapping.contributor) {
            contributor_slot = remove_key(&mut contributor.consumers, key);
            if contributor.consumers.is_empty() {
                self.heads.insert(contributor.key.clone());
            }
        }

        let mut affected = vec![mapping.consumer.clone()];
        affected.extend(self.transitive_consumers(&mapping.consumer));
        for reference_key in &affected {
            let closure = self.compute_closure(reference_key);
            if let Some(reference) = self.references.get_mut(reference_key) {
                reference.recursive_dependencies = closure;
            }
        }

        tracing::debug!(mapping = %key, "mapping removed");
        Ok((mapping, (consumer_slot, contributor_slot)))
    }

    /// Breadth-first walk over the "is consumed by" relation. Each reachable
    /// reference is visited once; `start` itself is never visited.
    pub fn iterate_consumers(&self, start: &str, mut visit: impl FnMut(&Reference)) {
        for key in self.transitive_consumers(start) {
            if let Some(reference) = self.references.get(&key) {
                visit(reference);
            }
        }
    }

    fn transitive_consumers(&self, start: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut order = Vec::new();

        seen.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let Some(reference) = self.references.get(current) else {
                continue;
            };
            for mapping_key in &reference.consumers {
                let Some(mapping) = self.mappings.get(mapping_key) else {
                    continue;
                };
                let next = mapping.consumer.as_str();
                if seen.insert(next) {
                    queue.push_back(next);
                    order.push(next.to_string());
                }
            }
        }

        order
    }

    /// Transitive closure of `key` over the contributor relation, from the edges alone
    pub fn compute_closure(&self, key: &str) -> BTreeSet<String> {
        let mut closure = BTreeSet::new();
        let mut stack = vec![key.to_string()];

        while let Some(current) = stack.pop() {
            for mapping in self.contributors_of(&current) {
                if closure.insert(mapping.contributor.clone()) {
                    stack.push(mapping.contributor.clone());
                }
            }
        }

        closure
    }
}

fn insert_at(keys: &mut Vec<String>, slot: usize, key: String) {
    if slot < keys.len() {
        keys.insert(slot, key);
    } else {
        keys.push(key);
    }
}

fn remove_key(keys: &mut Vec<String>, key: &str) -> usize {
    match keys.iter().position(|k| k == key) {
        Some(index) => {
            keys.remove(index);
            index
        }
        None => keys.len(),
    }
}
