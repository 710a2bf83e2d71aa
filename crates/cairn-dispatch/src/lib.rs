//! Pluggable subcommand dispatch for clap-based CLIs.
//!
//! Commands are not compiled into the dispatcher. A [`Registry`] advertises
//! [`CommandEntry`] values, each naming a command and a loader for its
//! [`Handler`]; the [`Dispatcher`] turns them into a [`CommandTable`] once
//! and routes every argument list it is given.
//!
//! # Names
//!
//! - first registration of a name wins
//! - the same target registered twice is ignored
//! - different targets under one name keep the first, and both become
//!   reachable under their target strings (`pkg.module:item`)
//! - names containing a space, `.` or `:` are rejected
//!
//! # Parsing
//!
//! Flags before the command name belong to the top level, flags after it to
//! the command. `-v`, `-q` and `-d` are accepted on both sides and add up.
//! Unknown arguments produce `<prog>[ <cmd>]: error: unrecognized arguments:`
//! from the side they were found on, left side first.
//!
//! # Failures
//!
//! | Error | Report |
//! |-------|--------|
//! | [`CommandError::Configuration`] | critical message |
//! | [`CommandError::Abort`] | critical message, then `terminating due to expected unrecoverable condition` |
//! | [`CommandError::Cancel`] | critical message |
//! | [`CommandError::Unexpected`] | `<Kind>: <message>`; with `-d` a trace, with `-dd` or `--debugger` inspection |

mod dispatcher;
mod flags;
mod handler;
mod logging;
mod registry;
mod table;
mod usage;

pub use dispatcher::{Dispatcher, Inspector, RunResult, DEFAULT_GROUP};
pub use flags::{GlobalFlags, Threshold};
pub use handler::{
    CommandContext, CommandError, Extensions, Failure, FnHandler, Handler, HandlerResult, Output,
    PackageInfo,
};
pub use logging::{subscriber, LogSink, CRITICAL};
pub use registry::{CommandEntry, Loader, PluginLoadError, Registry, StaticRegistry};
pub use table::{CommandTable, Diagnostic, Registered, Severity, RESERVED};
pub use usage::UsageError;
