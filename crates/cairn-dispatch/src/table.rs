//! The command table: entry points resolved into reachable names.
//!
//! Names are first come, first served. When two different targets claim the
//! same name the first keeps it, and both become reachable under their
//! qualified target strings, which can never collide with plain names
//! because plain names may not contain a space, `.` or `:`.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::handler::Handler;
use crate::registry::CommandEntry;

/// Characters a command name may not contain.
pub const RESERVED: [char; 3] = [' ', '.', ':'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// A problem found while building the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, message: String) -> Self {
        Self { severity, message }
    }

    /// Sends the diagnostic to the current tracing subscriber.
    pub fn emit(&self) {
        match self.severity {
            Severity::Debug => debug!("{}", self.message),
            Severity::Info => info!("{}", self.message),
            Severity::Warning => warn!("{}", self.message),
            Severity::Error => error!("{}", self.message),
        }
    }
}

/// A reachable command.
#[derive(Clone)]
pub struct Registered {
    /// The name it is invoked by.
    pub name: String,
    pub entry: CommandEntry,
    pub handler: Rc<dyn Handler>,
    /// Registered under its target string after a name collision.
    pub fallback: bool,
}

impl std::fmt::Debug for Registered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registered")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: IndexMap<String, Registered>,
}

impl CommandTable {
    /// Builds the table for `group` from entries in discovery order.
    pub fn build(group: &str, entries: Vec<CommandEntry>) -> (Self, Vec<Diagnostic>) {
        let mut table = Self::default();
        let mut diagnostics = Vec::new();

        for entry in entries {
            if let Some(reason) = invalid_name(&entry.name) {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    format!(
                        "bad '{}' entry point '{}' from '{}': {}",
                        group, entry, entry.source, reason
                    ),
                ));
                continue;
            }

            let handler = match entry.load() {
                Ok(handler) => handler,
                Err(err) => {
                    diagnostics.push(Diagnostic::new(
                        Severity::Warning,
                        format!(
                            "bad '{}' entry point '{}' from '{}': {}",
                            group, entry, entry.source, err
                        ),
                    ));
                    continue;
                }
            };

            let Some(existing) = table.commands.get(&entry.name).cloned() else {
                debug!("registering '{}' command '{}'", group, entry);
                table.commands.insert(
                    entry.name.clone(),
                    Registered {
                        name: entry.name.clone(),
                        entry,
                        handler,
                        fallback: false,
                    },
                );
                continue;
            };

            if existing.entry.target == entry.target {
                diagnostics.push(Diagnostic::new(
                    Severity::Debug,
                    format!(
                        "duplicated registration of command '{}' via entry point '{}' ignored; \
                         already registered from '{}'",
                        entry.name, entry, existing.entry.source
                    ),
                ));
                continue;
            }

            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                format!(
                    "a {} command named '{}' already registered. \
                     '{}' from '{}' keeps the name; '{}' from '{}' is reachable as '{}' only",
                    group,
                    entry.name,
                    existing.entry,
                    existing.entry.source,
                    entry,
                    entry.source,
                    entry.target
                ),
            ));
            table.register_fallback(existing.entry, existing.handler, &mut diagnostics);
            table.register_fallback(entry, handler, &mut diagnostics);
        }

        (table, diagnostics)
    }

    fn register_fallback(
        &mut self,
        entry: CommandEntry,
        handler: Rc<dyn Handler>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        match self.commands.get(&entry.target) {
            None => {
                debug!("registering fallback command '{}' for '{}'", entry.target, entry);
                self.commands.insert(
                    entry.target.clone(),
                    Registered {
                        name: entry.target.clone(),
                        entry,
                        handler,
                        fallback: true,
                    },
                );
            }
            Some(existing)
                if existing.fallback
                    && existing.entry.name == entry.name
                    && existing.entry.source == entry.source => {}
            Some(_) => diagnostics.push(Diagnostic::new(
                Severity::Error,
                format!("fallback command '{}' is already registered.", entry.target),
            )),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Registered> {
        self.commands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Reachable commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Registered> {
        self.commands.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn invalid_name(name: &str) -> Option<String> {
    if name.is_empty() {
        Some("command name is empty".to_string())
    } else if name.starts_with('-') {
        Some(format!("command name '{}' may not start with '-'", name))
    } else if let Some(c) = name.chars().find(|c| RESERVED.contains(c)) {
        Some(format!("command name '{}' contains reserved character {:?}", name, c))
    } else {
        None
    }
}
