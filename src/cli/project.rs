// A project directory: its config, its graph definition and the loaded graph

use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::graph::{GraphDefinition, GraphStore};
use std::path::{Path, PathBuf};

pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub graph: GraphStore,
}

impl Project {
    /// Load config and graph from `root`
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load_or_default(&root.join(CONFIG_FILE))?;
        let mut project = Self {
            root: root.to_path_buf(),
            config,
            graph: GraphStore::new(),
        };
        project.graph = GraphDefinition::load(&project.graph_path())?.into_store()?;
        Ok(project)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn graph_path(&self) -> PathBuf {
        self.resolve(&self.config.graph.file)
    }

    /// Resolve a project-relative path
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn save_graph(&self) -> Result<()> {
        let path = self.graph_path();
        GraphDefinition::from_store(&self.graph).save(&path)?;
        tracing::debug!(path = %path.display(), "saved graph definition");
        Ok(())
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path())
    }
}
