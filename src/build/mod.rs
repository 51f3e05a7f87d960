//! Build orchestration
//!
//! Resolves every head reference into a finished page and writes the pages
//! to the output directory. Nothing is written unless every head built.

mod session;

pub use session::{BuildSession, BuildState};

use crate::confirm::Confirm;
use crate::document::{Document, DocumentStore};
use crate::error::Result;
use crate::graph::GraphStore;
use std::path::{Path, PathBuf};

/// Where and how a build writes its pages
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory reference paths are resolved against
    pub project_root: PathBuf,
    pub output_dir: PathBuf,
    pub extension: String,
    pub document_extensions: Vec<String>,
    pub verbose: bool,
}

impl BuildOptions {
    /// Output file for a head reference
    pub fn output_path(&self, head: &str) -> PathBuf {
        let dir = if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.project_root.join(&self.output_dir)
        };
        dir.join(format!("{}.{}", head, self.extension))
    }
}

/// How a build run ended
#[derive(Debug)]
pub enum BuildOutcome {
    Completed(BuildReport),
    /// Existing output was not confirmed for overwriting
    Cancelled { existing: Vec<PathBuf> },
}

/// Summary of a completed build
#[derive(Debug, Default)]
pub struct BuildReport {
    pub references_built: usize,
    pub files_parsed: usize,
    pub outputs: Vec<PathBuf>,
    /// Folder heads with no documents, which have nothing to write
    pub skipped: Vec<String>,
}

impl BuildReport {
    pub fn summary(&self) -> String {
        format!(
            "Built {} references from {} files, wrote {} pages",
            self.references_built,
            self.files_parsed,
            self.outputs.len()
        )
    }
}

/// Drives a full build of every head in the graph
pub struct Builder<'g> {
    graph: &'g GraphStore,
    options: BuildOptions,
}

impl<'g> Builder<'g> {
    pub fn new(graph: &'g GraphStore, options: BuildOptions) -> Self {
        Self { graph, options }
    }

    fn heads(&self) -> Vec<String> {
        self.graph.heads().map(str::to_string).collect()
    }

    /// Output files that a build would overwrite
    pub fn existing_outputs(&self) -> Vec<PathBuf> {
        self.heads()
            .iter()
            .map(|head| self.options.output_path(head))
            .filter(|path| path.exists())
            .collect()
    }

    /// Build every head and write the results
    pub fn run(&self, confirm: &dyn Confirm) -> Result<BuildOutcome> {
        let existing = self.existing_outputs();
        if !existing.is_empty() {
            let prompt = format!(
                "{} output file(s) already exist. Overwrite them?",
                existing.len()
            );
            if !confirm.confirm(&prompt) {
                tracing::info!("build cancelled");
                return Ok(BuildOutcome::Cancelled { existing });
            }
        }

        let heads = self.heads();
        let documents = DocumentStore::new(
            &self.options.project_root,
            self.options.document_extensions.clone(),
        )?;
        let mut session =
            BuildSession::new(self.graph, documents).with_verbose(self.options.verbose);

        session.build_all(&heads)?;

        // A folder head writes its first document in file-name order
        let mut finished: Vec<(String, &Document)> = Vec::with_capacity(heads.len());
        let mut skipped = Vec::new();
        for head in &heads {
            match session.cached(head)?.first() {
                Some(document) => finished.push((head.clone(), document)),
                None => {
                    tracing::warn!(reference = %head, "head built no document, skipping output");
                    skipped.push(head.clone());
                }
            }
        }

        let outputs = self.write_outputs(&finished)?;

        Ok(BuildOutcome::Completed(BuildReport {
            references_built: session.built_count(),
            files_parsed: session.parsed_count(),
            outputs,
            skipped,
        }))
    }

    fn write_outputs(&self, finished: &[(String, &Document)]) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(finished.len());

        for (head, document) in finished {
            let path = self.options.output_path(head);
            if let Some(parent) = path.parent() {
                ensure_dir(parent)?;
            }
            document.save(&path)?;
            tracing::debug!(reference = %head, path = %path.display(), "wrote output");
            written.push(path);
        }

        Ok(written)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
