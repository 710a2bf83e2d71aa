//! Settings read from the environment.

use std::path::PathBuf;

use cairn_input::EnvReader;

/// Path list of directories scanned for distributions.
pub const PATH_VAR: &str = "CAIRN_PATH";
/// Log filter directive overriding `-v`/`-q`.
pub const LOG_VAR: &str = "CAIRN_LOG";
/// Scanned when `CAIRN_PATH` is unset.
pub const DEFAULT_PATH: &str = ".cairn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub dist_paths: Vec<PathBuf>,
    pub log_directive: Option<String>,
}

impl Settings {
    pub fn from_env(env: &dyn EnvReader) -> Self {
        let dist_paths = env
            .paths(PATH_VAR)
            .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_PATH)]);
        let log_directive = env.var(LOG_VAR).filter(|v| !v.trim().is_empty());
        Self {
            dist_paths,
            log_directive,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dist_paths: vec![PathBuf::from(DEFAULT_PATH)],
            log_directive: None,
        }
    }
}
