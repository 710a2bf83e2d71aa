//! Environment variable access.
//!
//! Settings are read through [`EnvReader`] so tests can supply variables
//! without touching the process environment.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Abstraction over environment variables.
pub trait EnvReader {
    /// Get an environment variable value.
    fn var(&self, name: &str) -> Option<String>;

    /// Read a platform path list (`:` separated on unix, `;` on windows).
    ///
    /// Returns `None` when the variable is unset; empty entries are dropped.
    fn paths(&self, name: &str) -> Option<Vec<PathBuf>> {
        let raw = self.var(name)?;
        Some(
            std::env::split_paths(&OsString::from(raw))
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        )
    }
}

/// Real environment variable reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealEnv;

impl EnvReader for RealEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Mock environment variable reader for testing.
#[derive(Debug, Clone, Default)]
pub struct MockEnv {
    vars: HashMap<String, String>,
}

impl MockEnv {
    /// Create an empty mock environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvReader for MockEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}
