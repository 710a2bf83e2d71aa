//! Command handler types.
//!
//! A [`Handler`] is a pluggable subcommand. It contributes its own arguments
//! to a clap [`Command`], receives the parsed [`ArgMatches`] together with a
//! [`CommandContext`], and returns an [`Output`] or a [`CommandError`].
//!
//! Typed state travels with every call as `app_state`: registered once on
//! the [`Dispatcher`](crate::Dispatcher) and shared by every command it runs.
//!
//! ```rust
//! use cairn_dispatch::{CommandContext, Extensions};
//! use std::rc::Rc;
//!
//! struct Settings { root: String }
//!
//! let mut state = Extensions::new();
//! state.insert(Settings { root: "/srv".into() });
//!
//! let ctx = CommandContext::new(vec!["cairn".into()], Default::default(), Rc::new(state));
//! let settings = ctx.app_state.get_required::<Settings>()?;
//! assert_eq!(settings.root, "/srv");
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use clap::{ArgMatches, Command};
use serde_json::Value;

use crate::flags::GlobalFlags;

/// Type-safe container for injecting state into handlers, one value per type.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert<T: 'static>(&mut self, val: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(val))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Gets a value that must be present.
    pub fn get_required<T: 'static>(&self) -> Result<&T, anyhow::Error> {
        self.get::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "no {} registered",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

/// Context passed to command handlers.
#[derive(Debug)]
pub struct CommandContext {
    /// Program name followed by the command name, e.g. `["cairn", "npm"]`.
    pub command_path: Vec<String>,

    /// Verbosity and debug counts accumulated on both sides of the command name.
    pub flags: GlobalFlags,

    /// State shared by every dispatch of the owning dispatcher.
    pub app_state: Rc<Extensions>,
}

impl CommandContext {
    pub fn new(command_path: Vec<String>, flags: GlobalFlags, app_state: Rc<Extensions>) -> Self {
        Self {
            command_path,
            flags,
            app_state,
        }
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new(Vec::new(), GlobalFlags::default(), Rc::new(Extensions::new()))
    }
}

/// What a handler produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Structured data, printed as JSON.
    Render(Value),
    /// Pre-formatted text, printed as is.
    Text(String),
    /// Nothing to print.
    Silent,
}

impl Output {
    pub fn is_render(&self) -> bool {
        matches!(self, Output::Render(_))
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, Output::Silent)
    }

    /// The structured payload, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Output::Render(v) => Some(v),
            _ => None,
        }
    }
}

/// An unexpected failure carrying a short kind name for the report line,
/// e.g. `RuntimeError: fake error`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: &'static str,
    pub message: String,
}

impl Failure {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// How a command failed.
///
/// The dispatcher reports each variant differently: configuration problems,
/// aborts and cancels are plain messages, while unexpected failures gain a
/// kind prefix and, at higher debug levels, a trace.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Bad input detected before any work started.
    #[error("{0}")]
    Configuration(String),

    /// An expected, unrecoverable condition.
    #[error("{0}")]
    Abort(String),

    /// The user declined to continue.
    #[error("{0}")]
    Cancel(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl CommandError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CommandError::Configuration(message.into())
    }

    pub fn abort(message: impl Into<String>) -> Self {
        CommandError::Abort(message.into())
    }

    pub fn cancel(message: impl Into<String>) -> Self {
        CommandError::Cancel(message.into())
    }

    /// True for failures the dispatcher reports without a trace.
    pub fn is_expected(&self) -> bool {
        !matches!(self, CommandError::Unexpected(_))
    }

    /// Short name printed before the message of an unexpected failure.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::Configuration(_) => "ConfigurationError",
            CommandError::Abort(_) => "Abort",
            CommandError::Cancel(_) => "Cancel",
            CommandError::Unexpected(err) => {
                if let Some(failure) = err.downcast_ref::<Failure>() {
                    failure.kind
                } else if err.downcast_ref::<std::io::Error>().is_some() {
                    "IoError"
                } else {
                    "Error"
                }
            }
        }
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        CommandError::Unexpected(err.into())
    }
}

/// The result type for command handlers.
pub type HandlerResult = Result<Output, CommandError>;

/// Name, version and location of the package providing a command or tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub location: Option<String>,
}

impl PackageInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            location: Some(location.into()),
        }
    }

    pub fn unknown() -> Self {
        Self {
            name: None,
            version: None,
            location: None,
        }
    }

    /// `<name> <version> from <location>`, with `?` for anything unknown.
    pub fn line(&self) -> String {
        let part = |v: &Option<String>| v.clone().unwrap_or_else(|| "?".to_string());
        format!(
            "{} {} from {}",
            part(&self.name),
            part(&self.version),
            part(&self.location)
        )
    }
}

/// A pluggable subcommand.
///
/// ```rust
/// use cairn_dispatch::{CommandContext, Handler, HandlerResult, Output};
/// use clap::{Arg, ArgMatches, Command};
///
/// struct Greet;
///
/// impl Handler for Greet {
///     fn about(&self) -> &str {
///         "say hello"
///     }
///
///     fn configure(&self, cmd: Command) -> Command {
///         cmd.arg(Arg::new("who").default_value("world"))
///     }
///
///     fn handle(&self, matches: &ArgMatches, _ctx: &mut CommandContext) -> HandlerResult {
///         let who = matches.get_one::<String>("who").map(String::as_str).unwrap_or("world");
///         Ok(Output::Text(format!("hello {}", who)))
///     }
/// }
/// ```
pub trait Handler {
    /// One-line description shown in the command listing.
    fn about(&self) -> &str {
        ""
    }

    /// Adds this command's own arguments.
    ///
    /// `-h`, `-V`, `-v`, `-q` and `-d` are reserved by the dispatcher.
    fn configure(&self, cmd: Command) -> Command {
        cmd
    }

    fn handle(&self, matches: &ArgMatches, ctx: &mut CommandContext) -> HandlerResult;

    /// The package providing this command, reported by `-V`.
    fn package(&self) -> Option<PackageInfo> {
        None
    }
}

/// A [`Handler`] built from a closure.
pub struct FnHandler<F> {
    about: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&ArgMatches, &mut CommandContext) -> HandlerResult,
{
    pub fn new(about: impl Into<String>, f: F) -> Self {
        Self {
            about: about.into(),
            f,
        }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&ArgMatches, &mut CommandContext) -> HandlerResult,
{
    fn about(&self) -> &str {
        &self.about
    }

    fn handle(&self, matches: &ArgMatches, ctx: &mut CommandContext) -> HandlerResult {
        (self.f)(matches, ctx)
    }
}
