//! Runs a toolchain through its stages from the command line.

use std::path::PathBuf;
use std::rc::Rc;

use cairn_dispatch::{CommandContext, CommandError, Handler, HandlerResult, Output, PackageInfo};
use cairn_toolchain::{keys, Context, Halt, Pipeline, Toolchain};
use clap::{Arg, ArgAction, ArgMatches, Command};

use super::{terminal, unexpected};

pub struct ToolchainCommand {
    toolchain: Rc<dyn Toolchain>,
    working_dir: PathBuf,
    about: String,
}

impl ToolchainCommand {
    pub fn new(toolchain: Rc<dyn Toolchain>, working_dir: impl Into<PathBuf>) -> Self {
        let about = format!("run the '{}' toolchain", toolchain.name());
        Self {
            toolchain,
            working_dir: working_dir.into(),
            about,
        }
    }

    /// Builds the initial context from parsed arguments.
    pub fn context(&self, matches: &ArgMatches, ctx: &CommandContext) -> Context {
        let mut context = Context::new()
            .with(keys::WORKING_DIR, self.working_dir.display().to_string())
            .with(keys::DEBUG, i64::from(ctx.flags.debug))
            .with(keys::VERBOSE, i64::from(ctx.flags.net_verbosity()));
        if let Some(target) = matches.get_one::<String>("export_target") {
            let target = self.working_dir.join(target);
            context.insert(keys::EXPORT_TARGET, target.display().to_string());
        }
        if matches.get_flag("overwrite") {
            context.insert(keys::EXPORT_TARGET_OVERWRITE, true);
        }
        if let Some(dir) = matches.get_one::<String>("build_dir") {
            context.insert(keys::BUILD_DIR, self.working_dir.join(dir).display().to_string());
        }
        context
    }
}

impl Handler for ToolchainCommand {
    fn about(&self) -> &str {
        &self.about
    }

    fn configure(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("export_target")
                .long("export-target")
                .value_name("PATH")
                .help("location of the generated artifact"),
        )
        .arg(
            Arg::new("overwrite")
                .short('w')
                .long("overwrite")
                .action(ArgAction::SetTrue)
                .help("replace an existing export target without asking"),
        )
        .arg(
            Arg::new("build_dir")
                .long("build-dir")
                .value_name("DIR")
                .help("existing directory to build in; a temporary one is used otherwise"),
        )
    }

    fn handle(&self, matches: &ArgMatches, ctx: &mut CommandContext) -> HandlerResult {
        let context = self.context(matches, ctx);
        let outcome = Pipeline::new(self.toolchain.as_ref())
            .terminal(terminal(ctx))
            .run(context);

        match outcome.halted {
            None => Ok(Output::Render(outcome.context.to_value())),
            Some(halted) => match halted.halt {
                Halt::Cancel(_) => Ok(Output::Render(outcome.context.to_value())),
                Halt::Abort(_) => Err(CommandError::abort(halted.to_string())),
                Halt::Failure(err) => Err(unexpected(err)),
            },
        }
    }

    fn package(&self) -> Option<PackageInfo> {
        Some(crate::package_info())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_dispatch::{Extensions, GlobalFlags};
    use cairn_input::MockTerminal;
    use cairn_toolchain::NullToolchain;

    use crate::commands::Terminal;

    fn run(args: &[&str], state: Extensions) -> HandlerResult {
        let dir = tempfile::TempDir::new().unwrap();
        let cmd = ToolchainCommand::new(Rc::new(NullToolchain), dir.path());
        let matches = cmd
            .configure(Command::new("null"))
            .try_get_matches_from(std::iter::once("null").chain(args.iter().copied()))
            .unwrap();
        let flags = GlobalFlags {
            verbose: 1,
            quiet: 0,
            debug: 2,
        };
        let mut ctx = CommandContext::new(vec!["cairn".into(), "null".into()], flags, Rc::new(state));
        cmd.handle(&matches, &mut ctx)
    }

    #[test]
    fn completed_run_renders_context() {
        let output = run(&["--export-target", "out.js"], Extensions::new()).unwrap();
        let value = output.value().unwrap();
        assert_eq!(value[keys::DEBUG], 2);
        assert_eq!(value[keys::VERBOSE], 1);
        assert_eq!(value["finalize"], "finalized");
        assert!(value[keys::BUILD_DIR].is_string());
        assert!(value[keys::EXPORT_TARGET].as_str().unwrap().ends_with("out.js"));
    }

    #[test]
    fn missing_export_target_aborts() {
        let err = run(&[], Extensions::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "an event in group 'after_prepare' triggered an abort: \
             EXPORT_TARGET should be specified by this stage"
        );
    }

    #[test]
    fn missing_build_dir_aborts() {
        let err = run(
            &["--export-target", "out.js", "--build-dir", "nowhere"],
            Extensions::new(),
        ).unwrap_err();
        assert!(matches!(err, CommandError::Abort(_)));
        assert!(err.to_string().contains("an event in group 'prepare' triggered an abort"));
    }

    #[test]
    fn declined_overwrite_is_not_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("out.js");
        std::fs::write(&target, "old").unwrap();
        let mut state = Extensions::new();
        state.insert(Terminal(Rc::new(MockTerminal::with_response("n"))));

        let output = run(&["--export-target", target.to_str().unwrap()], state).unwrap();
        assert!(output.is_render());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
    }
}
