//! Built-in command handlers.

mod package_manager;
mod toolchain;

use std::rc::Rc;

use cairn_dispatch::{CommandContext, CommandError};
use cairn_input::{RealTerminal, TerminalIO};

pub use package_manager::PackageManagerCommand;
pub use toolchain::ToolchainCommand;

/// Application state slot holding the terminal commands prompt through.
#[derive(Clone)]
pub struct Terminal(pub Rc<dyn TerminalIO>);

/// The terminal registered in app state, or the real one.
pub(crate) fn terminal(ctx: &CommandContext) -> Rc<dyn TerminalIO> {
    ctx.app_state
        .get::<Terminal>()
        .map(|t| t.0.clone())
        .unwrap_or_else(|| Rc::new(RealTerminal))
}

pub(crate) fn unexpected(err: impl Into<anyhow::Error>) -> CommandError {
    CommandError::Unexpected(err.into())
}
