// Loads the documents behind a reference
//
// A file reference yields one document. A folder reference yields one
// document per recognized file directly inside the folder, in file-name order.

use crate::document::{Document, HtmlParser};
use crate::error::{Error, Result};
use crate::graph::{Reference, ReferenceKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Resolves reference paths against a project root and parses them
pub struct DocumentStore {
    root: PathBuf,
    extensions: Vec<String>,
    parser: HtmlParser,
    parsed: usize,
}

impl DocumentStore {
    /// Create a store resolving relative paths against `root`
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            extensions,
            parser: HtmlParser::new()?,
            parsed: 0,
        })
    }

    /// Absolute (or root-relative) location of a reference path
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Number of files parsed so far
    pub fn parsed_count(&self) -> usize {
        self.parsed
    }

    /// Parser shared with merge steps
    pub fn parser(&mut self) -> &mut HtmlParser {
        &mut self.parser
    }

    /// Load every document backing a reference
    pub fn load(&mut self, reference: &Reference) -> Result<Vec<Document>> {
        match reference.kind {
            ReferenceKind::File => Ok(vec![self.load_file(reference)?]),
            ReferenceKind::Folder => self.load_folder(reference),
        }
    }

    fn load_file(&mut self, reference: &Reference) -> Result<Document> {
        let path = self.resolve(&reference.path);
        if !path.is_file() {
            return Err(Error::MissingSource {
                reference: reference.key.clone(),
                kind: "file",
                path,
            });
        }

        tracing::debug!(reference = %reference.key, path = %path.display(), "loading file");
        self.parsed += 1;
        self.parser.parse_file(&path)
    }

    fn load_folder(&mut self, reference: &Reference) -> Result<Vec<Document>> {
        let dir = self.resolve(&reference.path);
        if !dir.is_dir() {
            return Err(Error::MissingSource {
                reference: reference.key.clone(),
                kind: "folder",
                path: dir,
            });
        }

        let files = self.recognized_files(&dir)?;
        if files.is_empty() {
            tracing::warn!(
                reference = %reference.key,
                path = %dir.display(),
                "folder contains no recognized documents"
            );
        }

        tracing::debug!(
            reference = %reference.key,
            files = files.len(),
            "loading folder"
        );

        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            self.parsed += 1;
            documents.push(self.parser.parse_file(file)?);
            tracing::debug!(file = %file.display(), "loaded");
        }

        Ok(documents)
    }

    /// Files directly inside `dir` with a recognized extension
    fn recognized_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.is_recognized(path) {
                files.push(path.to_path_buf());
            } else {
                tracing::debug!(file = %path.display(), "skipping due to extension");
            }
        }

        Ok(files)
    }

    fn is_recognized(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}
