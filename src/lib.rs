//! Pagesmith - Compose HTML pages from reusable fragments
//!
//! A project names HTML files and folders as references and connects them
//! with mappings. Building splices each contributor's content into its
//! consumer and writes every head reference as a finished page.

pub mod build;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod document;
pub mod error;
pub mod graph;

// Re-export main types
pub use build::{BuildOptions, BuildOutcome, BuildReport, Builder};
pub use config::Config;
pub use document::{Document, DocumentStore, SearchCriteria};
pub use error::{Error, ErrorKind, Result};
pub use graph::{GraphDefinition, GraphStore, Mapping, Reference, ReferenceKind};
