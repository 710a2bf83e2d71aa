//! Stages, the events around them, and the hook groups bound to events.
//!
//! ```text
//! for stage in prepare, compile, assemble, link, finalize:
//!     before_<stage> hooks
//!     <stage> action
//!     after_<stage> hooks
//! cleanup hooks (always, once a run has started)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::Halt;

/// One named phase of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Prepare,
    Compile,
    Assemble,
    Link,
    Finalize,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Prepare,
        Stage::Compile,
        Stage::Assemble,
        Stage::Link,
        Stage::Finalize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Compile => "compile",
            Stage::Assemble => "assemble",
            Stage::Link => "link",
            Stage::Finalize => "finalize",
        }
    }

    /// The state name while the stage's own action runs.
    pub fn progressive(self) -> &'static str {
        match self {
            Stage::Prepare => "preparing",
            Stage::Compile => "compiling",
            Stage::Assemble => "assembling",
            Stage::Link => "linking",
            Stage::Finalize => "finalizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named hook group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Before(Stage),
    After(Stage),
    Cleanup,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Before(stage) => write!(f, "before_{}", stage),
            Event::After(stage) => write!(f, "after_{}", stage),
            Event::Cleanup => f.write_str("cleanup"),
        }
    }
}

/// A hook: reads and writes the run's context, or halts it.
pub type HookFn = Rc<dyn Fn(&mut Context) -> Result<(), Halt>>;

/// Hook groups keyed by event. Hooks in a group run in registration order.
#[derive(Clone, Default)]
pub struct Hooks {
    groups: HashMap<Event, Vec<HookFn>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hook to `event`, builder style.
    pub fn on<F>(mut self, event: Event, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Halt> + 'static,
    {
        self.add(event, Rc::new(f));
        self
    }

    pub fn add(&mut self, event: Event, hook: HookFn) {
        self.groups.entry(event).or_default().push(hook);
    }

    /// Appends every group of `other` after the hooks already registered.
    pub fn extend(&mut self, other: Hooks) {
        for (event, hooks) in other.groups {
            self.groups.entry(event).or_default().extend(hooks);
        }
    }

    pub fn count(&self, event: Event) -> usize {
        self.groups.get(&event).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Runs the group for `event`, stopping at the first hook that halts.
    pub fn run(&self, event: Event, ctx: &mut Context) -> Result<(), Halt> {
        if let Some(group) = self.groups.get(&event) {
            for hook in group {
                hook(ctx)?;
            }
        }
        Ok(())
    }

    /// Runs every hook for `event` regardless of failures, returning the
    /// halts in the order they occurred.
    pub fn run_all(&self, event: Event, ctx: &mut Context) -> Vec<Halt> {
        self.groups
            .get(&event)
            .into_iter()
            .flatten()
            .filter_map(|hook| hook(ctx).err())
            .collect()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(String, usize)> = self
            .groups
            .iter()
            .map(|(event, hooks)| (event.to_string(), hooks.len()))
            .collect();
        counts.sort();
        f.debug_struct("Hooks").field("groups", &counts).finish()
    }
}
