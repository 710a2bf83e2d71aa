//! Installed distributions and their metadata files.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::requirement::{normalize, Requirement};

/// Name of the descriptor file that marks a directory as a distribution.
pub const DIST_FILE: &str = "dist.json";

/// Errors loading a distribution descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DistError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{path}' is not a valid distribution descriptor: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// An installed component: its identity, what it requires, the commands it
/// advertises, and where its metadata files live.
///
/// Metadata files are read from `location` on demand. Files attached with
/// [`Distribution::with_metadata`] take precedence, which is how tests and
/// embedded distributions supply them without touching disk.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Distribution {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub extras: BTreeMap<String, Vec<String>>,
    /// Advertised commands, in declaration order: public name to target.
    #[serde(default)]
    pub commands: IndexMap<String, String>,
    /// Keys this distribution contributes to extras flattening.
    #[serde(default)]
    pub extras_keys: Vec<String>,
    /// Declared artifacts: file name to the target of the builder producing it.
    #[serde(default)]
    pub artifacts: IndexMap<String, String>,
    #[serde(skip)]
    pub location: Option<PathBuf>,
    #[serde(skip)]
    files: BTreeMap<String, String>,
}

impl Distribution {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
            ..Default::default()
        }
    }

    /// Reads `dist.json` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, DistError> {
        let path = dir.join(DIST_FILE);
        let text = fs::read_to_string(&path).map_err(|source| DistError::Io {
            path: path.clone(),
            source,
        })?;
        let mut dist: Distribution =
            serde_json::from_str(&text).map_err(|source| DistError::Descriptor { path, source })?;
        dist.location = Some(dir.to_path_buf());
        Ok(dist)
    }

    pub fn with_requires(mut self, requires: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.requires.extend(requires.into_iter().map(Into::into));
        self
    }

    pub fn with_extra(
        mut self,
        extra: impl Into<String>,
        requires: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.extras
            .entry(extra.into())
            .or_default()
            .extend(requires.into_iter().map(Into::into));
        self
    }

    pub fn with_command(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.commands.insert(name.into(), target.into());
        self
    }

    pub fn with_extras_key(mut self, key: impl Into<String>) -> Self {
        self.extras_keys.push(key.into());
        self
    }

    pub fn with_artifact(mut self, name: impl Into<String>, builder: impl Into<String>) -> Self {
        self.artifacts.insert(name.into(), builder.into());
        self
    }

    pub fn with_metadata(mut self, filename: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(filename.into(), contents.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn key(&self) -> String {
        normalize(&self.name)
    }

    /// Human readable location, `?` when unknown.
    pub fn location_display(&self) -> String {
        self.location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "?".to_string())
    }

    /// Direct requirements plus those of the selected extras.
    ///
    /// Malformed declarations and unknown extras are logged and skipped.
    pub fn requirements(&self, extras: &[String]) -> Vec<Requirement> {
        let mut reqs = self.parse_declared(&self.requires);
        reqs.extend(self.extra_requirements(extras));
        reqs
    }

    /// Requirements contributed by the given extras only.
    pub fn extra_requirements(&self, extras: &[String]) -> Vec<Requirement> {
        let mut reqs = Vec::new();
        for extra in extras {
            match self.extras.get(extra) {
                Some(declared) => reqs.extend(self.parse_declared(declared)),
                None => warn!("'{}' has no extra named '{}'", self.name, extra),
            }
        }
        reqs
    }

    fn parse_declared(&self, declared: &[String]) -> Vec<Requirement> {
        declared
            .iter()
            .filter_map(|raw| match raw.parse::<Requirement>() {
                Ok(req) => Some(req),
                Err(err) => {
                    warn!("ignoring {} declared by '{}'", err, self.name);
                    None
                }
            })
            .collect()
    }

    /// Raw contents of a metadata file, `None` when the distribution has none.
    pub fn read_metadata(&self, filename: &str) -> io::Result<Option<String>> {
        if let Some(contents) = self.files.get(filename) {
            return Ok(Some(contents.clone()));
        }
        let Some(location) = &self.location else {
            return Ok(None);
        };
        let path = location.join(filename);
        if !path.is_file() {
            return Ok(None);
        }
        fs::read_to_string(path).map(Some)
    }

    /// A metadata file parsed as a JSON object.
    ///
    /// Absence is logged at debug level; unreadable or non-object contents
    /// are logged as warnings. Neither is an error for the caller.
    pub fn metadata_json(&self, filename: &str) -> Option<Map<String, Value>> {
        let text = match self.read_metadata(filename) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("no '{}' for '{}'", filename, self.name);
                return None;
            }
            Err(err) => {
                warn!("failed to read '{}' for '{}': {}", filename, self.name, err);
                return None;
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => {
                debug!("found '{}' for '{}'", filename, self.name);
                Some(map)
            }
            Ok(_) => {
                warn!(
                    "the '{}' found in '{}' is not a JSON object",
                    filename, self.name
                );
                None
            }
            Err(err) => {
                warn!(
                    "the '{}' found in '{}' is not valid JSON: {}",
                    filename, self.name, err
                );
                None
            }
        }
    }
}
