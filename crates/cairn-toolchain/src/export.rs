//! Export target confirmation, run first in the `after_prepare` group, and
//! preparation of the target location before linking.

use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

use cairn_input::{Confirm, InputError, TerminalIO};
use tracing::{debug, error, warn};

use crate::context::{keys, Context};
use crate::error::Halt;

/// Decides whether a run may write to its export target.
///
/// - no target configured: abort
/// - target missing, or overwrite already allowed: proceed
/// - otherwise ask; "no", empty input, closed input, and non-interactive
///   terminals all cancel. "yes" records the overwrite in the context.
#[derive(Clone)]
pub struct ExportTargetCheck {
    terminal: Rc<dyn TerminalIO>,
}

impl ExportTargetCheck {
    pub fn new(terminal: Rc<dyn TerminalIO>) -> Self {
        Self { terminal }
    }

    pub fn check(&self, ctx: &mut Context) -> Result<(), Halt> {
        let Some(target) = ctx.get_path(keys::EXPORT_TARGET) else {
            return Err(Halt::abort("EXPORT_TARGET should be specified by this stage"));
        };

        if !target.exists() {
            debug!("export target '{}' will be created", target.display());
            return Ok(());
        }
        if ctx.flag(keys::EXPORT_TARGET_OVERWRITE) {
            debug!("export target '{}' will be overwritten", target.display());
            return Ok(());
        }

        let prompt = format!("export target '{}' already exists, overwrite?", target.display());
        let decline = || Halt::cancel(format!("not overwriting export target '{}'", target.display()));

        match Confirm::new(prompt).default(false).ask(self.terminal.as_ref()) {
            Ok(answer) => {
                if answer.is_defaulted() {
                    warn!("non-interactive mode; auto-selecting default option [No]");
                }
                if answer.value() {
                    ctx.insert(keys::EXPORT_TARGET_OVERWRITE, true);
                    Ok(())
                } else {
                    Err(decline())
                }
            }
            Err(InputError::PromptCancelled) => Err(decline()),
            Err(err) => Err(Halt::Failure(err.into())),
        }
    }
}

/// Makes `target` writable: creates its parent directory and removes an
/// existing file or directory at `target`.
///
/// Failures are logged and reported as `false`.
pub fn prepare_export_location(target: &Path) -> bool {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if parent.exists() && !parent.is_dir() {
        error!(
            "cannot export to '{}' as its parent does not lead to a directory",
            target.display()
        );
        return false;
    }
    match replace_target(parent, target) {
        Ok(()) => true,
        Err(err) => {
            error!(
                "failed to prepare export location '{}': {}; correct any file permission \
                 issues or remove the location before trying again",
                parent.display(),
                err
            );
            false
        }
    }
}

fn replace_target(parent: &Path, target: &Path) -> io::Result<()> {
    if !parent.exists() {
        fs::create_dir_all(parent)?;
        debug!("created '{}' for '{}'", parent.display(), target.display());
    } else if target.is_dir() {
        debug!("removing existing export target directory at '{}'", target.display());
        fs::remove_dir_all(target)?;
    } else if target.symlink_metadata().is_ok() {
        debug!("removing existing export target at '{}'", target.display());
        fs::remove_file(target)?;
    }
    Ok(())
}
