//! The staged run engine.

use std::fmt;
use std::rc::Rc;

use anyhow::Context as _;
use cairn_input::{RealTerminal, TerminalIO};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::context::{keys, Context};
use crate::error::{Halt, Halted};
use crate::events::{Event, Hooks, Stage};
use crate::export::{prepare_export_location, ExportTargetCheck};

/// A build pipeline participant.
///
/// Every stage action defaults to doing nothing; implementations override the
/// stages they care about and may contribute hooks of their own.
pub trait Toolchain {
    fn name(&self) -> &str;

    fn prepare(&self, _ctx: &mut Context) -> Result<(), Halt> {
        Ok(())
    }

    fn compile(&self, _ctx: &mut Context) -> Result<(), Halt> {
        Ok(())
    }

    fn assemble(&self, _ctx: &mut Context) -> Result<(), Halt> {
        Ok(())
    }

    fn link(&self, _ctx: &mut Context) -> Result<(), Halt> {
        Ok(())
    }

    fn finalize(&self, _ctx: &mut Context) -> Result<(), Halt> {
        Ok(())
    }

    /// Hooks registered for every run of this toolchain.
    fn hooks(&self) -> Hooks {
        Hooks::new()
    }
}

/// Where a run is, or how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Event(Event),
    Stage(Stage),
    Cleanup,
    Done,
    Aborted,
    Cancelled,
    Failed,
}

impl State {
    /// The group name a halt raised in this state is reported under.
    fn group(self) -> String {
        match self {
            State::Event(event) => event.to_string(),
            State::Stage(stage) => stage.name().to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => f.write_str("idle"),
            State::Event(event) => write!(f, "{}", event),
            State::Stage(stage) => f.write_str(stage.progressive()),
            State::Cleanup => f.write_str("cleanup"),
            State::Done => f.write_str("done"),
            State::Aborted => f.write_str("aborted"),
            State::Cancelled => f.write_str("cancelled"),
            State::Failed => f.write_str("failed"),
        }
    }
}

/// The result of a run: the final context, the terminal state, every state
/// passed through, and the halt if the run stopped early.
#[derive(Debug)]
pub struct Outcome {
    pub context: Context,
    pub state: State,
    pub trail: Vec<State>,
    pub halted: Option<Halted>,
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn halt(&self) -> Option<&Halt> {
        self.halted.as_ref().map(|h| &h.halt)
    }
}

/// Runs a [`Toolchain`] through every stage against a [`Context`].
pub struct Pipeline<'t> {
    toolchain: &'t dyn Toolchain,
    hooks: Hooks,
    export_check: Option<ExportTargetCheck>,
}

impl<'t> Pipeline<'t> {
    /// A pipeline that confirms export targets on the real terminal.
    pub fn new(toolchain: &'t dyn Toolchain) -> Self {
        Self {
            toolchain,
            hooks: toolchain.hooks(),
            export_check: Some(ExportTargetCheck::new(Rc::new(RealTerminal))),
        }
    }

    /// Ask export target questions on `terminal` instead.
    pub fn terminal(mut self, terminal: Rc<dyn TerminalIO>) -> Self {
        self.export_check = Some(ExportTargetCheck::new(terminal));
        self
    }

    /// Skip the export target confirmation entirely.
    pub fn without_export_check(mut self) -> Self {
        self.export_check = None;
        self
    }

    pub fn on<F>(mut self, event: Event, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Halt> + 'static,
    {
        self.hooks = self.hooks.on(event, f);
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Executes the run. Cleanup hooks always execute once the run starts.
    pub fn run(&self, mut context: Context) -> Outcome {
        let name = self.toolchain.name();
        let mut trail = vec![State::Idle];
        let mut scratch: Option<TempDir> = None;
        let mut halted: Option<Halted> = None;

        'stages: for stage in Stage::ALL {
            let steps = [
                State::Event(Event::Before(stage)),
                State::Stage(stage),
                State::Event(Event::After(stage)),
            ];
            for step in steps {
                trail.push(step);
                debug!("toolchain '{}' entering '{}'", name, step);
                let result = match step {
                    State::Event(event) => self.run_event(event, &mut context),
                    State::Stage(stage) => self.run_stage(stage, &mut context, &mut scratch),
                    _ => Ok(()),
                };
                if let Err(halt) = result {
                    let stop = Halted {
                        at: step.group(),
                        halt,
                    };
                    match stop.halt {
                        Halt::Cancel(_) => info!("{}", stop),
                        Halt::Abort(_) | Halt::Failure(_) => debug!("{}", stop),
                    }
                    halted = Some(stop);
                    break 'stages;
                }
            }
        }

        trail.push(State::Cleanup);
        self.log_event(Event::Cleanup, &context);
        for halt in self.hooks.run_all(Event::Cleanup, &mut context) {
            error!(
                "{}",
                Halted {
                    at: Event::Cleanup.to_string(),
                    halt,
                }
            );
        }
        if let Some(dir) = scratch.take() {
            let path = dir.path().display().to_string();
            match dir.close() {
                Ok(()) => debug!("removed temporary build_dir '{}'", path),
                Err(err) => warn!("failed to remove temporary build_dir '{}': {}", path, err),
            }
        }

        let state = match halted.as_ref().map(|h| &h.halt) {
            None => State::Done,
            Some(Halt::Abort(_)) => State::Aborted,
            Some(Halt::Cancel(_)) => State::Cancelled,
            Some(Halt::Failure(_)) => State::Failed,
        };
        trail.push(state);
        debug!("toolchain '{}' {}", name, state);

        Outcome {
            context,
            state,
            trail,
            halted,
        }
    }

    fn log_event(&self, event: Event, ctx: &Context) {
        if ctx.get_i64(keys::DEBUG).unwrap_or(0) >= 2 {
            debug!(
                "on_event '{}' invoked for toolchain '{}' with {} hook(s)",
                event,
                self.toolchain.name(),
                self.hooks.count(event)
            );
        }
    }

    fn run_event(&self, event: Event, ctx: &mut Context) -> Result<(), Halt> {
        self.log_event(event, ctx);
        if event == Event::After(Stage::Prepare) {
            if let Some(check) = &self.export_check {
                check.check(ctx)?;
            }
        }
        self.hooks.run(event, ctx)
    }

    fn run_stage(
        &self,
        stage: Stage,
        ctx: &mut Context,
        scratch: &mut Option<TempDir>,
    ) -> Result<(), Halt> {
        match stage {
            Stage::Prepare => {
                prepare_dirs(ctx, scratch)?;
                self.toolchain.prepare(ctx)
            }
            Stage::Compile => self.toolchain.compile(ctx),
            Stage::Assemble => self.toolchain.assemble(ctx),
            Stage::Link => {
                prepare_export(ctx)?;
                self.toolchain.link(ctx)
            }
            Stage::Finalize => self.toolchain.finalize(ctx),
        }
    }
}

/// Readies the export target for linking. An existing target is only
/// replaced once overwriting it has been allowed.
fn prepare_export(ctx: &Context) -> Result<(), Halt> {
    let Some(target) = ctx.get_path(keys::EXPORT_TARGET) else {
        return Ok(());
    };
    if target.exists() && !ctx.flag(keys::EXPORT_TARGET_OVERWRITE) {
        return Ok(());
    }
    if prepare_export_location(&target) {
        Ok(())
    } else {
        Err(Halt::abort(format!(
            "export location for '{}' could not be prepared",
            target.display()
        )))
    }
}

/// Fills in `working_dir` and `build_dir` when absent.
///
/// A generated build directory lives in `scratch` and is removed at cleanup;
/// a supplied one must already exist and is never removed.
fn prepare_dirs(ctx: &mut Context, scratch: &mut Option<TempDir>) -> Result<(), Halt> {
    if ctx.get_path(keys::WORKING_DIR).is_none() {
        let cwd = std::env::current_dir().context("failed to determine the working directory")?;
        ctx.insert(keys::WORKING_DIR, cwd.display().to_string());
    }

    match ctx.get_path(keys::BUILD_DIR) {
        Some(dir) if dir.is_dir() => Ok(()),
        Some(dir) => Err(Halt::abort(format!(
            "build_dir '{}' is not a directory",
            dir.display()
        ))),
        None => {
            let dir = tempfile::Builder::new()
                .prefix("cairn-build-")
                .tempdir()
                .context("failed to create a temporary build_dir")?;
            ctx.insert(keys::BUILD_DIR, dir.path().display().to_string());
            *scratch = Some(dir);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::NullToolchain;
    use std::cell::RefCell;
    use std::path::PathBuf;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, Hooks) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::new();
        for stage in Stage::ALL {
            for event in [Event::Before(stage), Event::After(stage)] {
                let seen = seen.clone();
                hooks = hooks.on(event, move |_| {
                    seen.borrow_mut().push(event.to_string());
                    Ok(())
                });
            }
        }
        let cleanup = seen.clone();
        hooks = hooks.on(Event::Cleanup, move |_| {
            cleanup.borrow_mut().push("cleanup".into());
            Ok(())
        });
        (seen, hooks)
    }

    #[test]
    fn full_run_visits_every_group_in_order() {
        let (seen, hooks) = recorder();
        let outcome = Pipeline::new(&NullToolchain)
            .without_export_check()
            .hooks(hooks)
            .run(Context::new());

        assert!(outcome.is_done());
        assert_eq!(
            *seen.borrow(),
            vec![
                "before_prepare",
                "after_prepare",
                "before_compile",
                "after_compile",
                "before_assemble",
                "after_assemble",
                "before_link",
                "after_link",
                "before_finalize",
                "after_finalize",
                "cleanup",
            ]
        );
        assert_eq!(outcome.trail.first(), Some(&State::Idle));
        assert_eq!(outcome.trail.last(), Some(&State::Done));
        assert!(outcome.trail.contains(&State::Stage(Stage::Link)));
        assert_eq!(outcome.context.get_str("link"), Some("linked"));
    }

    #[test]
    fn abort_skips_remaining_stages_but_cleans_up() {
        let (seen, hooks) = recorder();
        let outcome = Pipeline::new(&NullToolchain)
            .without_export_check()
            .on(Event::Before(Stage::Compile), |_| Err(Halt::abort("missing value")))
            .hooks(hooks)
            .run(Context::new());

        assert_eq!(outcome.state, State::Aborted);
        let seen = seen.borrow();
        assert_eq!(seen.last().map(String::as_str), Some("cleanup"));
        assert!(!seen.contains(&"before_link".to_string()));
        assert!(!outcome.context.contains_key("link"));
        let halted = outcome.halted.as_ref().unwrap();
        assert_eq!(halted.at, "before_compile");
        assert!(matches!(halted.halt, Halt::Abort(_)));
    }

    #[test]
    fn cancel_behaves_like_abort() {
        let outcome = Pipeline::new(&NullToolchain)
            .without_export_check()
            .on(Event::After(Stage::Assemble), |_| Err(Halt::cancel("declined")))
            .run(Context::new());
        assert_eq!(outcome.state, State::Cancelled);
        assert!(outcome.context.contains_key("assemble"));
        assert!(!outcome.context.contains_key("link"));
    }

    #[test]
    fn failure_is_reported_after_cleanup() {
        let cleaned = Rc::new(RefCell::new(false));
        let flag = cleaned.clone();
        let outcome = Pipeline::new(&NullToolchain)
            .without_export_check()
            .on(Event::Before(Stage::Link), |_| {
                Err(Halt::from(anyhow::anyhow!("fake error")))
            })
            .on(Event::Cleanup, move |_| {
                *flag.borrow_mut() = true;
                Ok(())
            })
            .run(Context::new());

        assert!(*cleaned.borrow());
        assert_eq!(outcome.state, State::Failed);
        assert_eq!(outcome.halt().unwrap().to_string(), "fake error");
    }

    #[test]
    fn cleanup_failure_does_not_mask_original_halt() {
        let later = Rc::new(RefCell::new(false));
        let flag = later.clone();
        let outcome = Pipeline::new(&NullToolchain)
            .without_export_check()
            .on(Event::Before(Stage::Compile), |_| Err(Halt::abort("first")))
            .on(Event::Cleanup, |_| Err(Halt::from(anyhow::anyhow!("cleanup broke"))))
            .on(Event::Cleanup, move |_| {
                *flag.borrow_mut() = true;
                Ok(())
            })
            .run(Context::new());

        assert!(*later.borrow(), "every cleanup hook runs");
        assert_eq!(outcome.state, State::Aborted);
        assert!(matches!(outcome.halt(), Some(Halt::Abort(msg)) if msg == "first"));
    }

    #[test]
    fn stage_action_halt_is_reported_under_stage_name() {
        struct Broken;
        impl Toolchain for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn compile(&self, _ctx: &mut Context) -> Result<(), Halt> {
                Err(Halt::abort("nothing to compile"))
            }
        }

        let outcome = Pipeline::new(&Broken).without_export_check().run(Context::new());
        assert_eq!(outcome.halted.unwrap().at, "compile");
    }

    #[test]
    fn temporary_build_dir_is_removed() {
        let outcome = Pipeline::new(&NullToolchain)
            .without_export_check()
            .run(Context::new());
        let build_dir = outcome.context.get_path(keys::BUILD_DIR).unwrap();
        assert!(!build_dir.exists());
        assert!(outcome.context.get_path(keys::WORKING_DIR).is_some());
    }

    #[test]
    fn supplied_build_dir_is_kept() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = Context::new().with(keys::BUILD_DIR, dir.path().display().to_string());
        let outcome = Pipeline::new(&NullToolchain).without_export_check().run(ctx);
        assert!(outcome.is_done());
        assert_eq!(
            outcome.context.get_path(keys::BUILD_DIR),
            Some(dir.path().to_path_buf())
        );
        assert!(dir.path().exists());
    }

    #[test]
    fn missing_build_dir_aborts() {
        let ctx = Context::new().with(keys::BUILD_DIR, "/nonexistent/cairn/build");
        let outcome = Pipeline::new(&NullToolchain).without_export_check().run(ctx);
        assert_eq!(outcome.state, State::Aborted);
        assert_eq!(
            outcome.context.get_path(keys::BUILD_DIR),
            Some(PathBuf::from("/nonexistent/cairn/build"))
        );
    }

    #[test]
    fn state_names() {
        assert_eq!(State::Stage(Stage::Prepare).to_string(), "preparing");
        assert_eq!(State::Event(Event::After(Stage::Prepare)).to_string(), "after_prepare");
        assert_eq!(State::Cancelled.to_string(), "cancelled");
    }
}
