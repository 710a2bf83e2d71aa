//! Running external package manager binaries.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// How a finished child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Success,
    /// Exited with a failure code.
    Failed(i32),
    /// Stopped by a signal before exiting.
    Interrupted,
}

/// Locates and runs binaries.
pub trait Invoker {
    fn which(&self, binary: &str) -> Option<PathBuf>;

    fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> io::Result<Invocation>;
}

/// Searches `PATH` and spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl Invoker for ProcessInvoker {
    fn which(&self, binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }

    fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> io::Result<Invocation> {
        debug!(
            "invoking '{}' with {:?} in '{}'",
            program.display(),
            args,
            cwd.display()
        );
        let status = Command::new(program).args(args).current_dir(cwd).status()?;
        Ok(if status.success() {
            Invocation::Success
        } else {
            match status.code() {
                Some(code) => Invocation::Failed(code),
                None => Invocation::Interrupted,
            }
        })
    }
}
