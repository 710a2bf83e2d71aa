//! Resolution of `module:item` targets to command handlers.
//!
//! Distributions advertise commands by target string. Only targets this
//! binary knows how to build resolve; everything else fails to load and is
//! reported while the command table is built.

use std::path::PathBuf;
use std::rc::Rc;

use cairn_dispatch::{CommandEntry, Handler, PluginLoadError, StaticRegistry, DEFAULT_GROUP};
use cairn_dist::WorkingSet;
use cairn_toolchain::NullToolchain;

use crate::commands::{PackageManagerCommand, ToolchainCommand};
use crate::driver::PackageManagerDriver;
use crate::invoke::{Invoker, ProcessInvoker};

pub const NPM: &str = "cairn.commands:npm";
pub const YARN: &str = "cairn.commands:yarn";
pub const NULL_TOOLCHAIN: &str = "cairn.toolchain:null";

/// Commands every `cairn` binary registers before any distribution's.
pub const BUILTINS: [(&str, &str); 3] = [("npm", NPM), ("yarn", YARN), ("null", NULL_TOOLCHAIN)];

/// Modules that exist but are not commands themselves.
const MODULES: [&str; 2] = ["cairn.commands", "cairn.toolchain"];

pub struct Catalogue {
    working_dir: PathBuf,
    working_set: Rc<dyn WorkingSet>,
    invoker: Rc<dyn Invoker>,
}

impl Catalogue {
    pub fn new(working_dir: impl Into<PathBuf>, working_set: Rc<dyn WorkingSet>) -> Self {
        Self {
            working_dir: working_dir.into(),
            working_set,
            invoker: Rc::new(ProcessInvoker),
        }
    }

    pub fn invoker(mut self, invoker: Rc<dyn Invoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// Builds the handler a target names.
    pub fn resolve(&self, target: &str) -> Result<Rc<dyn Handler>, PluginLoadError> {
        let driver = |driver: PackageManagerDriver| -> Rc<dyn Handler> {
            Rc::new(PackageManagerCommand::new(driver.invoker(self.invoker.clone())))
        };
        match target {
            NPM => Ok(driver(PackageManagerDriver::npm(
                &self.working_dir,
                self.working_set.clone(),
            ))),
            YARN => Ok(driver(PackageManagerDriver::yarn(
                &self.working_dir,
                self.working_set.clone(),
            ))),
            NULL_TOOLCHAIN => Ok(Rc::new(ToolchainCommand::new(
                Rc::new(NullToolchain),
                &self.working_dir,
            ))),
            _ if MODULES.contains(&target) => {
                Err(PluginLoadError::WrongCapability(target.to_string()))
            }
            _ => Err(PluginLoadError::MissingTarget(target.to_string())),
        }
    }

    /// Built-ins first, then each distribution's commands in discovery order.
    ///
    /// Handlers are built lazily when the command table loads each entry.
    pub fn registry(self: &Rc<Self>) -> StaticRegistry {
        let mut registry = StaticRegistry::new();
        let own_source = format!("{} {}", crate::NAME, crate::VERSION);
        for (name, target) in BUILTINS {
            registry.add(DEFAULT_GROUP, self.entry(name, target, &own_source));
        }
        for dist in self.working_set.distributions() {
            let source = format!("{} {}", dist.name, dist.version.as_deref().unwrap_or("?"));
            for (name, target) in &dist.commands {
                registry.add(DEFAULT_GROUP, self.entry(name, target, &source));
            }
        }
        registry
    }

    fn entry(self: &Rc<Self>, name: &str, target: &str, source: &str) -> CommandEntry {
        let catalogue = Rc::clone(self);
        let resolved = target.to_string();
        CommandEntry::new(name, target, source, move || catalogue.resolve(&resolved))
    }
}
