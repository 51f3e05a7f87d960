use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the project directory
pub const CONFIG_FILE: &str = "pagesmith.toml";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub documents: DocumentConfig,
    pub graph: GraphConfig,
}

/// Where built pages are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub extension: String,
}

/// Which files count as documents inside folder references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub extensions: Vec<String>,
}

/// Location of the persisted graph definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            extension: "html".to_string(),
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["html".to_string()],
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("pagesmith.graph.toml"),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file, or return defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Write config as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Merge CLI arguments into config (CLI takes precedence)
    pub fn merge_cli(&mut self, output: Option<PathBuf>) {
        if let Some(out) = output {
            self.output.directory = out;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.output.extension.trim().is_empty() {
            return Err(Error::config_validation("output extension must not be empty"));
        }

        if self.output.directory.as_os_str().is_empty() {
            return Err(Error::config_validation("output directory must not be empty"));
        }

        if self.documents.extensions.is_empty() {
            return Err(Error::config_validation(
                "at least one document extension required",
            ));
        }

        if self.graph.file.as_os_str().is_empty() {
            return Err(Error::config_validation("graph file must not be empty"));
        }

        Ok(())
    }

    /// Every option as a dotted key and its rendered value
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut entries = Vec::new();
        flatten("", &self.to_table()?, &mut entries);
        Ok(entries)
    }

    /// Look up one option by dotted key or unique leaf name
    pub fn get(&self, option: &str) -> Result<(String, String)> {
        let key = self.resolve_key(option)?;
        let value = self
            .entries()?
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .unwrap_or_default();
        Ok((key, value))
    }

    /// Set one option, returning the resolved key and the previous value
    pub fn set(&mut self, option: &str, value: &str) -> Result<(String, String)> {
        let (key, previous) = self.get(option)?;

        let mut table = self.to_table()?;
        let (section, field) = key.split_once('.').ok_or_else(|| {
            Error::config_validation(format!("'{}' is not a settable option", key))
        })?;
        let target = table
            .get_mut(section)
            .and_then(toml::Value::as_table_mut)
            .ok_or_else(|| {
                Error::config_validation(format!("Unknown config section '{}'", section))
            })?;

        let new_value = match target.get(field) {
            Some(toml::Value::Array(_)) => toml::Value::Array(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| toml::Value::String(v.to_string()))
                    .collect(),
            ),
            _ => toml::Value::String(value.to_string()),
        };
        target.insert(field.to_string(), new_value);

        let updated: Config = toml::Value::Table(table).try_into()?;
        updated.validate()?;
        *self = updated;
        Ok((key, previous))
    }

    fn to_table(&self) -> Result<toml::Table> {
        match toml::Value::try_from(self)? {
            toml::Value::Table(table) => Ok(table),
            _ => Err(Error::config_validation("config did not serialize to a table")),
        }
    }

    /// Resolve an exact dotted key, or a leaf name that appears exactly once
    fn resolve_key(&self, option: &str) -> Result<String> {
        let keys: Vec<String> = self.entries()?.into_iter().map(|(k, _)| k).collect();

        if keys.iter().any(|k| k == option) {
            return Ok(option.to_string());
        }

        let matches: Vec<&String> = keys
            .iter()
            .filter(|k| k.rsplit('.').next() == Some(option))
            .collect();

        match matches.as_slice() {
            [single] => Ok((*single).clone()),
            [] => Err(Error::config_validation(format!(
                "Unknown config option '{}'",
                option
            ))),
            many => Err(Error::config_validation(format!(
                "Option '{}' is ambiguous between: {}",
                option,
                many.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut Vec<(String, String)>) {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match value {
            toml::Value::Table(inner) => flatten(&key, inner, out),
            toml::Value::String(s) => out.push((key, s.clone())),
            toml::Value::Array(items) => {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .collect();
                out.push((key, rendered.join(",")));
            }
            other => out.push((key, other.to_string())),
        }
    }
}
