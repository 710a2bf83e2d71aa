//! Command entry points.
//!
//! An entry point advertises a command: a public `name`, the `target` naming
//! the implementation, the `source` package that declared it, and a loader
//! that produces the handler on demand. Loading may fail; the table decides
//! what to do about it.

use std::fmt;
use std::rc::Rc;

use crate::handler::Handler;

/// Why an entry point could not produce a handler.
#[derive(Debug, thiserror::Error)]
pub enum PluginLoadError {
    #[error("target '{0}' could not be found")]
    MissingTarget(String),

    #[error("target '{0}' does not provide a command")]
    WrongCapability(String),

    #[error(transparent)]
    Construction(#[from] anyhow::Error),
}

pub type Loader = Rc<dyn Fn() -> Result<Rc<dyn Handler>, PluginLoadError>>;

/// One advertised command.
#[derive(Clone)]
pub struct CommandEntry {
    pub name: String,
    pub target: String,
    pub source: String,
    loader: Loader,
}

impl CommandEntry {
    pub fn new<F>(
        name: impl Into<String>,
        target: impl Into<String>,
        source: impl Into<String>,
        loader: F,
    ) -> Self
    where
        F: Fn() -> Result<Rc<dyn Handler>, PluginLoadError> + 'static,
    {
        Self {
            name: name.into(),
            target: target.into(),
            source: source.into(),
            loader: Rc::new(loader),
        }
    }

    /// An entry that always yields `handler`.
    pub fn from_handler(
        name: impl Into<String>,
        target: impl Into<String>,
        source: impl Into<String>,
        handler: Rc<dyn Handler>,
    ) -> Self {
        Self::new(name, target, source, move || Ok(handler.clone()))
    }

    pub fn load(&self) -> Result<Rc<dyn Handler>, PluginLoadError> {
        (self.loader)()
    }
}

impl fmt::Display for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.target)
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Where a dispatcher finds its entry points.
pub trait Registry {
    /// Entries in `group`, in discovery order.
    fn entries(&self, group: &str) -> Vec<CommandEntry>;
}

/// A registry holding a fixed list of entries per group.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    groups: Vec<(String, CommandEntry)>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, group: impl Into<String>, entry: CommandEntry) -> Self {
        self.add(group, entry);
        self
    }

    pub fn add(&mut self, group: impl Into<String>, entry: CommandEntry) {
        self.groups.push((group.into(), entry));
    }
}

impl Registry for StaticRegistry {
    fn entries(&self, group: &str) -> Vec<CommandEntry> {
        self.groups
            .iter()
            .filter(|(g, _)| g == group)
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}
