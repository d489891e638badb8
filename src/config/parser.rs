//! Loading of deployment specification files.
//!
//! A specification file holds one or more YAML documents, each describing a
//! single deployment. Endpoint maps used when writing connection strings are
//! loaded here too.

use crate::error::{ConfigError, ProvisionerError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::RawDeployment;

/// Parser for deployment specification files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Loads every deployment record from the given files, in order.
    ///
    /// # Errors
    ///
    /// Returns the first file that cannot be read or parsed.
    pub fn load_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<RawDeployment>> {
        let mut records = Vec::new();
        for path in paths {
            records.extend(self.load_file(path)?);
        }
        Ok(records)
    }

    /// Loads the deployment records of one file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Vec<RawDeployment>> {
        let path = self.resolve(path.as_ref());
        info!("Loading deployment specs from: {}", path.display());

        let content = read(&path)?;
        Self::parse_yaml(&content, Some(&path))
    }

    /// Parses deployment records from a YAML string of one or more documents.
    ///
    /// Empty documents are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if any document is invalid.
    pub fn parse_yaml(content: &str, source: Option<&Path>) -> Result<Vec<RawDeployment>> {
        let location = source.map(|p| p.display().to_string());
        let mut records = Vec::new();

        for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
            let value = serde_yaml::Value::deserialize(document)
                .map_err(|e| parse_error(format!("YAML parse error: {e}"), location.clone()))?;
            if value.is_null() {
                continue;
            }

            let record: RawDeployment = serde_yaml::from_value(value).map_err(|e| {
                parse_error(
                    format!("document {} is not a deployment spec: {e}", index + 1),
                    location.clone(),
                )
            })?;
            records.push(record);
        }

        debug!("Parsed {} deployment spec(s)", records.len());
        Ok(records)
    }

    /// Loads a map of remote host to replacement host.
    ///
    /// The file may be YAML or JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a string map.
    pub fn load_endpoint_map(&self, path: impl AsRef<Path>) -> Result<BTreeMap<String, String>> {
        let path = self.resolve(path.as_ref());
        let content = read(&path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_yaml::from_str(&content).map_err(|e| {
            parse_error(
                format!("endpoint map must map host names to host names: {e}"),
                Some(path.display().to_string()),
            )
        })
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                parse_error(
                    format!("Failed to load .env file: {e}"),
                    Some(env_path.display().to_string()),
                )
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn read(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    std::fs::read_to_string(path).map_err(|e| {
        parse_error(
            format!("Failed to read file: {e}"),
            Some(path.display().to_string()),
        )
    })
}

fn parse_error(message: String, location: Option<String>) -> ProvisionerError {
    ConfigError::ParseError { message, location }.into()
}
