// One build session: resolves every reference reachable from the heads into
// documents, merging contributor content into consumers along the way.

use crate::document::{search, Document, DocumentStore};
use crate::error::{Error, Result};
use crate::graph::{GraphStore, Mapping, ReferenceKind};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet, VecDeque};

/// Build state of a single reference
#[derive(Debug, Clone)]
pub enum BuildState {
    Building,
    Built(Vec<Document>),
}

/// Builds references against a graph, caching each result for the session
pub struct BuildSession<'g> {
    graph: &'g GraphStore,
    documents: DocumentStore,
    cache: HashMap<String, BuildState>,
    verbose: bool,
}

impl<'g> BuildSession<'g> {
    pub fn new(graph: &'g GraphStore, documents: DocumentStore) -> Self {
        Self {
            graph,
            documents,
            cache: HashMap::new(),
            verbose: false,
        }
    }

    /// Show a progress bar while building
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Number of files parsed during this session
    pub fn parsed_count(&self) -> usize {
        self.documents.parsed_count()
    }

    /// Number of references with a cached result
    pub fn built_count(&self) -> usize {
        self.cache
            .values()
            .filter(|state| matches!(state, BuildState::Built(_)))
            .count()
    }

    pub fn is_built(&self, key: &str) -> bool {
        matches!(self.cache.get(key), Some(BuildState::Built(_)))
    }

    /// Build every reference reachable from `heads`.
    ///
    /// Any failure discards everything cached so far.
    pub fn build_all(&mut self, heads: &[String]) -> Result<()> {
        let result = self.build_stack(heads);
        if result.is_err() {
            self.cache.clear();
        }
        result
    }

    /// Build a single reference and return its documents
    pub fn build(&mut self, key: &str) -> Result<&[Document]> {
        if let Err(e) = self.build_reference(key) {
            self.cache.clear();
            return Err(e);
        }
        self.cached(key)
    }

    /// Documents of an already built reference
    pub fn cached(&self, key: &str) -> Result<&[Document]> {
        match self.cache.get(key) {
            Some(BuildState::Built(documents)) => Ok(documents.as_slice()),
            _ => Err(Error::state_conflict(format!(
                "Reference '{}' has not been built",
                key
            ))),
        }
    }

    /// Breadth-first over contributors from every head, visiting each
    /// reference once across all heads. Discovery order is push order.
    fn discover(&self, heads: &[String]) -> Result<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack = Vec::new();

        for head in heads {
            if self.graph.reference(head).is_none() {
                return Err(Error::unknown_reference(head.as_str()));
            }
            if !visited.insert(head.as_str()) {
                continue;
            }

            let mut queue = VecDeque::from([head.as_str()]);
            stack.push(head.clone());

            while let Some(current) = queue.pop_front() {
                for mapping in self.graph.contributors_of(current) {
                    let next = mapping.contributor.as_str();
                    if visited.insert(next) {
                        stack.push(next.to_string());
                        queue.push_back(next);
                    }
                }
            }
        }

        Ok(stack)
    }

    fn build_stack(&mut self, heads: &[String]) -> Result<()> {
        let mut stack = self.discover(heads)?;
        tracing::debug!(references = stack.len(), "discovered build stack");

        let progress = if self.verbose {
            let pb = ProgressBar::new(stack.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        while let Some(key) = stack.pop() {
            if let Some(ref pb) = progress {
                pb.set_message(key.clone());
                pb.inc(1);
            }
            self.build_reference(&key)?;
        }

        if let Some(pb) = progress {
            pb.finish_with_message("Build complete");
        }

        Ok(())
    }

    fn build_reference(&mut self, key: &str) -> Result<()> {
        match self.cache.get(key) {
            Some(BuildState::Built(_)) => return Ok(()),
            Some(BuildState::Building) => {
                return Err(Error::state_conflict(format!(
                    "Reference '{}' was reached again while it was being built",
                    key
                )))
            }
            None => {}
        }

        let graph = self.graph;
        let reference = graph
            .reference(key)
            .ok_or_else(|| Error::unknown_reference(key))?;

        self.cache.insert(key.to_string(), BuildState::Building);
        tracing::debug!(reference = %key, kind = %reference.kind, "building");

        let documents = match reference.kind {
            ReferenceKind::Folder => self.documents.load(reference)?,
            ReferenceKind::File => {
                let mut document = self
                    .documents
                    .load(reference)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        Error::other(format!("Reference '{}' loaded no document", key))
                    })?;

                for mapping in graph.contributors_of(key) {
                    document = self.merge(document, mapping)?;
                }

                vec![document]
            }
        };

        self.cache
            .insert(key.to_string(), BuildState::Built(documents));
        Ok(())
    }

    /// Append the contributor's extracted content to the consumer's insertion node
    fn merge(&mut self, consumer: Document, mapping: &Mapping) -> Result<Document> {
        // Discovery order is not always topological; build on demand.
        self.build_reference(&mapping.contributor)?;

        let fragment = self.extract(mapping)?;

        let target = search::for_single(&consumer, &mapping.consumer_search).map_err(|source| {
            Error::MappingSearch {
                mapping: mapping.key.clone(),
                reference: mapping.consumer.clone(),
                side: "consumer",
                source,
            }
        })?;

        tracing::debug!(
            mapping = %mapping.key,
            contributor = %mapping.contributor,
            target = %target.describe(),
            "merging"
        );

        consumer.append_fragment(target, &fragment, self.documents.parser())
    }

    /// Markup contributed by every document of the mapping's contributor, in order
    fn extract(&self, mapping: &Mapping) -> Result<String> {
        let mut fragment = String::new();

        for document in self.cached(&mapping.contributor)? {
            let node = search::for_single(document, &mapping.contributor_search).map_err(|source| {
                Error::MappingSearch {
                    mapping: mapping.key.clone(),
                    reference: mapping.contributor.clone(),
                    side: "contributor",
                    source,
                }
            })?;

            if mapping.unpack() {
                fragment.push_str(document.inner_html(node));
            } else {
                fragment.push_str(document.outer_html(node));
            }
        }

        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SearchCriteria;
    use crate::error::ErrorKind;
    use crate::graph::ReferenceFlags;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn file_ref(graph: &mut GraphStore, key: &str, path: &str) {
        graph
            .upsert_reference(key, path, ReferenceKind::File, ReferenceFlags::new())
            .unwrap();
    }

    fn slot_mapping(key: &str, consumer: &str, contributor: &str) -> Mapping {
        Mapping::new(key, consumer, contributor)
            .with_consumer_search(SearchCriteria::new().with_attribute("id", "slot"))
            .with_contributor_search(SearchCriteria::new().with_attribute("id", "content"))
    }

    fn session<'g>(graph: &'g GraphStore, root: &Path) -> BuildSession<'g> {
        let documents = DocumentStore::new(root, vec!["html".to_string()]).unwrap();
        BuildSession::new(graph, documents)
    }

    #[test]
    fn test_basic_splice() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.html", "<div id=\"slot\"><p>x</p></div>");
        write(dir.path(), "part.html", "<span id=\"content\">y</span>");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "page", "page.html");
        file_ref(&mut graph, "part", "part.html");
        graph.add_mapping(slot_mapping("m", "page", "part")).unwrap();

        let mut session = session(&graph, dir.path());
        let docs = session.build("page").unwrap();
        assert_eq!(
            docs[0].source(),
            "<div id=\"slot\"><p>x</p><span id=\"content\">y</span></div>"
        );
    }

    #[test]
    fn test_unpack_inserts_children() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.html", "<div id=\"slot\"></div>");
        write(dir.path(), "part.html", "<ul id=\"content\"><li>a</li><li>b</li></ul>");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "page", "page.html");
        file_ref(&mut graph, "part", "part.html");
        let unpack = slot_mapping("m", "page", "part").with_flag(crate::graph::MappingFlag::Unpack);
        graph.add_mapping(unpack).unwrap();

        let mut session = session(&graph, dir.path());
        let docs = session.build("page").unwrap();
        assert_eq!(docs[0].source(), "<div id=\"slot\"><li>a</li><li>b</li></div>");
    }

    #[test]
    fn test_folder_contributor_in_file_name_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.html", "<section id=\"slot\"></section>");
        fs::create_dir(dir.path().join("posts")).unwrap();
        write(&dir.path().join("posts"), "b.html", "<article id=\"content\">B</article>");
        write(&dir.path().join("posts"), "a.html", "<article id=\"content\">A</article>");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "page", "page.html");
        graph
            .upsert_reference("posts", "posts", ReferenceKind::Folder, ReferenceFlags::new())
            .unwrap();
        graph.add_mapping(slot_mapping("m", "page", "posts")).unwrap();

        let mut session = session(&graph, dir.path());
        let docs = session.build("page").unwrap();
        assert_eq!(
            docs[0].source(),
            concat!(
                "<section id=\"slot\">",
                "<article id=\"content\">A</article><article id=\"content\">B</article>",
                "</section>"
            )
        );
    }

    #[test]
    fn test_empty_folder_contributor_leaves_consumer_unchanged() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.html", "<section id=\"slot\"><p>kept</p></section>");
        fs::create_dir(dir.path().join("posts")).unwrap();
        write(&dir.path().join("posts"), "notes.txt", "not a document");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "page", "page.html");
        graph
            .upsert_reference("posts", "posts", ReferenceKind::Folder, ReferenceFlags::new())
            .unwrap();
        graph.add_mapping(slot_mapping("m", "page", "posts")).unwrap();

        let mut session = session(&graph, dir.path());
        let docs = session.build("page").unwrap();
        assert_eq!(docs[0].source(), "<section id=\"slot\"><p>kept</p></section>");
        assert!(session.cached("posts").unwrap().is_empty());
    }

    #[test]
    fn test_chain_merges_transitively() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.html", "<main id=\"slot\"></main>");
        write(dir.path(), "b.html", "<div id=\"content\"><p id=\"slot\"></p></div>");
        write(dir.path(), "c.html", "<b id=\"leaf\">c</b>");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "a", "a.html");
        file_ref(&mut graph, "b", "b.html");
        file_ref(&mut graph, "c", "c.html");
        graph.add_mapping(slot_mapping("ab", "a", "b")).unwrap();
        graph
            .add_mapping(
                slot_mapping("bc", "b", "c")
                    .with_contributor_search(SearchCriteria::new().with_attribute("id", "leaf")),
            )
            .unwrap();

        let mut session = session(&graph, dir.path());
        session.build_all(&["a".to_string()]).unwrap();
        assert_eq!(
            session.cached("a").unwrap()[0].source(),
            concat!(
                "<main id=\"slot\"><div id=\"content\">",
                "<p id=\"slot\"><b id=\"leaf\">c</b></p>",
                "</div></main>"
            )
        );
        assert_eq!(session.built_count(), 3);
    }

    #[test]
    fn test_build_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.html", "<div id=\"slot\"></div>");
        write(dir.path(), "part.html", "<i id=\"content\"></i>");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "page", "page.html");
        file_ref(&mut graph, "part", "part.html");
        graph.add_mapping(slot_mapping("m", "page", "part")).unwrap();

        let mut session = session(&graph, dir.path());
        let first = session.build("page").unwrap()[0].source().to_string();
        let parsed = session.parsed_count();

        let second = session.build("page").unwrap()[0].source().to_string();
        assert_eq!(first, second);
        assert_eq!(session.parsed_count(), parsed);

        session.build_all(&["page".to_string()]).unwrap();
        assert_eq!(session.parsed_count(), parsed);
    }

    #[test]
    fn test_shared_contributor_built_once() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.html", "<div id=\"slot\"></div>");
        write(dir.path(), "b.html", "<div id=\"slot\"></div>");
        write(dir.path(), "nav.html", "<nav id=\"content\"></nav>");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "a", "a.html");
        file_ref(&mut graph, "b", "b.html");
        file_ref(&mut graph, "nav", "nav.html");
        graph.add_mapping(slot_mapping("a_nav", "a", "nav")).unwrap();
        graph.add_mapping(slot_mapping("b_nav", "b", "nav")).unwrap();

        let mut session = session(&graph, dir.path());
        session
            .build_all(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(session.parsed_count(), 3);
    }

    #[test]
    fn test_contributor_built_on_demand() {
        // Discovery from a pushes [a, b, c]; c is popped first but consumes b.
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.html", "<div id=\"slot\"></div><section id=\"slot2\"></section>");
        write(dir.path(), "b.html", "<b id=\"part\">b</b>");
        write(dir.path(), "c.html", "<div id=\"content\"><i id=\"slot\"></i></div>");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "a", "a.html");
        file_ref(&mut graph, "b", "b.html");
        file_ref(&mut graph, "c", "c.html");
        let part = SearchCriteria::new().with_attribute("id", "part");
        graph
            .add_mapping(slot_mapping("ab", "a", "b").with_contributor_search(part.clone()))
            .unwrap();
        graph
            .add_mapping(
                Mapping::new("ac", "a", "c")
                    .with_consumer_search(SearchCriteria::new().with_attribute("id", "slot2"))
                    .with_contributor_search(SearchCriteria::new().with_attribute("id", "content")),
            )
            .unwrap();
        graph
            .add_mapping(slot_mapping("cb", "c", "b").with_contributor_search(part))
            .unwrap();

        let mut session = session(&graph, dir.path());
        session.build_all(&["a".to_string()]).unwrap();
        assert_eq!(
            session.cached("a").unwrap()[0].source(),
            "<div id=\"slot\"><b id=\"part\">b</b></div>\
<section id=\"slot2\"><div id=\"content\"><i id=\"slot\"><b id=\"part\">b</b></i></div></section>"
        );
        assert_eq!(session.parsed_count(), 3);
    }

    #[test]
    fn test_ambiguous_consumer_search_fails_and_clears_cache() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.html", "<div id=\"slot\"></div><div id=\"slot\"></div>");
        write(dir.path(), "part.html", "<i id=\"content\"></i>");

        let mut graph = GraphStore::new();
        file_ref(&mut graph, "page", "page.html");
        file_ref(&mut graph, "part", "part.html");
        graph.add_mapping(slot_mapping("m", "page", "part")).unwrap();

        let mut session = session(&graph, dir.path());
        let err = session.build_all(&["page".to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Search);
        assert!(err.to_string().contains("consumer side"));
        assert_eq!(session.built_count(), 0);
        assert!(!session.is_built("part"));
    }

    #[test]
    fn test_missing_file_is_path_error() {
        let dir = TempDir::new().unwrap();
        let mut graph = GraphStore::new();
        file_ref(&mut graph, "page", "missing.html");

        let mut session = session(&graph, dir.path());
        let err = session.build("page").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
    }

    #[test]
    fn test_unknown_head() {
        let dir = TempDir::new().unwrap();
        let graph = GraphStore::new();
        let mut session = session(&graph, dir.path());
        assert!(session.build_all(&["nope".to_string()]).is_err());
    }
}
