//! Two-phase command line dispatch.
//!
//! The argument list is split at the first token not starting with `-`.
//! Everything before it is parsed against the top-level flags, that token
//! names the command, and everything after it is parsed against the
//! command's own arguments plus the global flags. A problem on the left
//! side is reported before anything on the right side is looked at.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::io::{BufRead, IsTerminal};
use std::rc::Rc;

use clap::Command;
use tracing::{debug, error, info};

use crate::flags::{self, GlobalFlags};
use crate::handler::{CommandContext, CommandError, Extensions, Handler, Output, PackageInfo};
use crate::logging::{self, LogSink, CRITICAL};
use crate::registry::Registry;
use crate::table::{CommandTable, Diagnostic};
use crate::usage::UsageError;

/// Called with an unexpected failure when post-mortem inspection is requested.
pub type Inspector = Rc<dyn Fn(&CommandError)>;

/// Group searched when none is configured.
pub const DEFAULT_GROUP: &str = "cairn.commands";

const DEBUGGER: &str = "debugger";

/// What a dispatch produced.
#[derive(Debug)]
pub enum RunResult {
    /// The command ran to completion.
    Handled(Output),
    /// Help was requested, or no command was given.
    Help(String),
    /// Version lines were requested.
    Version(Vec<String>),
    /// The command line could not be parsed.
    Usage(UsageError),
    /// The command failed; the failure has already been logged.
    Failed(CommandError),
}

impl RunResult {
    /// 0 for success, help and version; 2 for usage errors; 1 for failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunResult::Handled(_) | RunResult::Help(_) | RunResult::Version(_) => 0,
            RunResult::Usage(_) => 2,
            RunResult::Failed(_) => 1,
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, RunResult::Handled(_))
    }

    pub fn output(&self) -> Option<&Output> {
        match self {
            RunResult::Handled(output) => Some(output),
            _ => None,
        }
    }

    pub fn help(&self) -> Option<&str> {
        match self {
            RunResult::Help(text) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CommandError> {
        match self {
            RunResult::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Routes an argument list to one of the commands advertised in a registry.
///
/// ```rust
/// use cairn_dispatch::{CommandEntry, Dispatcher, FnHandler, Output, StaticRegistry};
/// use std::rc::Rc;
///
/// let registry = StaticRegistry::new().with(
///     "cairn.commands",
///     CommandEntry::from_handler(
///         "hello",
///         "demo:hello",
///         "demo 1.0",
///         Rc::new(FnHandler::new("say hello", |_, _| Ok(Output::Text("hi".into())))),
///     ),
/// );
///
/// let mut dispatcher = Dispatcher::new("cairn", Rc::new(registry));
/// let result = dispatcher.dispatch(["hello"]);
/// assert_eq!(result.output(), Some(&Output::Text("hi".into())));
/// assert_eq!(dispatcher.dispatch(["nope"]).exit_code(), 2);
/// ```
pub struct Dispatcher {
    prog: String,
    about: Option<String>,
    group: String,
    package: Option<PackageInfo>,
    registry: Rc<dyn Registry>,
    table: Option<CommandTable>,
    diagnostics: Vec<Diagnostic>,
    app_state: Rc<Extensions>,
    sink: LogSink,
    log_directive: Option<String>,
    inspector: Inspector,
}

impl Dispatcher {
    pub fn new(prog: impl Into<String>, registry: Rc<dyn Registry>) -> Self {
        Self {
            prog: prog.into(),
            about: None,
            group: DEFAULT_GROUP.to_string(),
            package: None,
            registry,
            table: None,
            diagnostics: Vec::new(),
            app_state: Rc::new(Extensions::new()),
            sink: LogSink::Stderr,
            log_directive: None,
            inspector: Rc::new(default_inspector),
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// The entry point group commands are read from.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// The package reported first by `-V`.
    pub fn package(mut self, package: PackageInfo) -> Self {
        self.package = Some(package);
        self
    }

    /// State handed to every command through [`CommandContext::app_state`].
    pub fn app_state(mut self, state: Extensions) -> Self {
        self.app_state = Rc::new(state);
        self
    }

    pub fn log_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    /// A filter directive that replaces the `-v`/`-q` threshold.
    pub fn log_directive(mut self, directive: Option<String>) -> Self {
        self.log_directive = directive;
        self
    }

    pub fn inspector<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandError) + 'static,
    {
        self.inspector = Rc::new(f);
        self
    }

    pub fn prog(&self) -> &str {
        &self.prog
    }

    pub fn is_initialized(&self) -> bool {
        self.table.is_some()
    }

    /// Problems found while building the command table.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The command table, once initialized.
    pub fn table(&self) -> Option<&CommandTable> {
        self.table.as_ref()
    }

    /// Builds the command table and logs its diagnostics.
    ///
    /// # Panics
    ///
    /// If the dispatcher is already initialized.
    pub fn init(&mut self) {
        if self.is_initialized() {
            panic!("dispatcher '{}' has already been initialized", self.prog);
        }
        let (table, diagnostics) =
            CommandTable::build(&self.group, self.registry.entries(&self.group));
        for diagnostic in &diagnostics {
            diagnostic.emit();
        }
        debug!(
            "dispatcher '{}' initialized with {} command(s) from '{}'",
            self.prog,
            table.len(),
            self.group
        );
        self.table = Some(table);
        self.diagnostics = diagnostics;
    }

    /// Initializes and nests this dispatcher's command tree under `parent`.
    ///
    /// # Panics
    ///
    /// If the dispatcher is already initialized.
    pub fn attach_to(&mut self, parent: Command) -> Command {
        if self.is_initialized() {
            panic!(
                "dispatcher '{}' is already initialized and cannot be attached to '{}'",
                self.prog,
                parent.get_name()
            );
        }
        self.init();
        parent.subcommand(self.root_command())
    }

    /// Parses `args` (without the program name) and runs the selected command.
    ///
    /// Initializes on first use; may be called any number of times.
    pub fn dispatch<I, T>(&mut self, args: I) -> RunResult
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        if !self.is_initialized() {
            self.init();
        }
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.run(&args)
    }

    fn run(&self, args: &[String]) -> RunResult {
        let split = args.iter().position(|a| !a.starts_with('-'));
        let (before, name, after) = match split {
            Some(i) => (&args[..i], Some(args[i].as_str()), &args[i + 1..]),
            None => (args, None, &args[args.len()..]),
        };

        let mut root = self.root_command();
        let root_argv = std::iter::once(self.prog.as_str())
            .chain(before.iter().map(String::as_str))
            .chain(name);
        let root_matches = match root.try_get_matches_from_mut(root_argv) {
            Ok(matches) => matches,
            Err(err) => return parse_failure(&self.prog, &mut root, err),
        };
        let global = GlobalFlags::from_matches(&root_matches);

        if root_matches.get_flag(flags::VERSION) {
            return RunResult::Version(self.version_lines(None));
        }
        let Some(name) = name else {
            return RunResult::Help(root.render_help().to_string());
        };
        let Some(registered) = self.table.as_ref().and_then(|t| t.get(name)) else {
            let usage = root.render_usage().to_string();
            return RunResult::Usage(UsageError {
                scope: self.prog.clone(),
                message: format!("invalid choice: '{}'", name),
                usage,
            });
        };
        let handler = registered.handler.as_ref();

        let scope = format!("{} {}", self.prog, name);
        let mut cmd = self.command_parser(name, handler);
        let cmd_argv = std::iter::once(name).chain(after.iter().map(String::as_str));
        let matches = match cmd.try_get_matches_from_mut(cmd_argv) {
            Ok(matches) => matches,
            Err(err) => return parse_failure(&scope, &mut cmd, err),
        };
        let flags = global.merge(GlobalFlags::from_matches(&matches));

        if matches.get_flag(flags::VERSION) {
            return RunResult::Version(self.version_lines(Some(handler)));
        }
        let inspect = matches.get_flag(DEBUGGER);

        let subscriber = logging::subscriber(
            flags.threshold(),
            self.log_directive.as_deref(),
            self.sink.clone(),
        );
        tracing::subscriber::with_default(subscriber, || {
            debug!("dispatching '{}' with {:?}", scope, flags);
            let mut ctx = CommandContext::new(
                vec![self.prog.clone(), name.to_string()],
                flags,
                self.app_state.clone(),
            );
            match handler.handle(&matches, &mut ctx) {
                Ok(output) => RunResult::Handled(output),
                Err(err) => {
                    self.report(&err, flags, inspect);
                    RunResult::Failed(err)
                }
            }
        })
    }

    fn report(&self, err: &CommandError, flags: GlobalFlags, inspect: bool) {
        match err {
            CommandError::Configuration(msg) | CommandError::Cancel(msg) => {
                error!(target: CRITICAL, "{}", msg);
            }
            CommandError::Abort(msg) => {
                error!(target: CRITICAL, "{}", msg);
                error!(target: CRITICAL, "terminating due to expected unrecoverable condition");
            }
            CommandError::Unexpected(inner) => {
                error!(target: CRITICAL, "{}: {}", err.kind(), inner);
                if flags.debug > 0 {
                    error!(target: CRITICAL, "terminating due to unexpected exception");
                    error!(target: CRITICAL, "{:?}", inner);
                    if inner.backtrace().status() != BacktraceStatus::Captured {
                        error!(
                            target: CRITICAL,
                            "Stack backtrace:\n{}",
                            Backtrace::force_capture()
                        );
                    }
                }
                if inspect || flags.debug > 1 {
                    info!("entering post-mortem inspection");
                    (self.inspector)(err);
                }
            }
        }
    }

    fn version_lines(&self, handler: Option<&dyn Handler>) -> Vec<String> {
        let own = self.package.clone().unwrap_or_else(PackageInfo::unknown);
        let mut lines = vec![own.line()];
        if let Some(handler) = handler {
            lines.push(handler.package().unwrap_or_else(PackageInfo::unknown).line());
        }
        lines
    }

    /// The top-level parser. Commands are attached bare, for listing and
    /// name validation only.
    fn root_command(&self) -> Command {
        let mut root = Command::new(self.prog.clone())
            .disable_version_flag(true)
            .disable_help_subcommand(true)
            .subcommand_value_name("COMMAND")
            .args(flags::global_args())
            .arg(flags::version_arg());
        if let Some(about) = &self.about {
            root = root.about(about.clone());
        }
        if let Some(table) = &self.table {
            for registered in table.iter() {
                root = root.subcommand(
                    Command::new(registered.name.clone())
                        .about(registered.handler.about().to_string()),
                );
            }
        }
        root
    }

    fn command_parser(&self, name: &str, handler: &dyn Handler) -> Command {
        let cmd = Command::new(name.to_string())
            .bin_name(format!("{} {}", self.prog, name))
            .about(handler.about().to_string())
            .disable_version_flag(true)
            .disable_help_subcommand(true)
            .args(flags::global_args())
            .arg(flags::version_arg())
            .arg(
                clap::Arg::new(DEBUGGER)
                    .long("debugger")
                    .action(clap::ArgAction::SetTrue)
                    .help("enter post-mortem inspection on an unexpected failure"),
            );
        handler.configure(cmd)
    }
}

fn parse_failure(scope: &str, cmd: &mut Command, err: clap::Error) -> RunResult {
    use clap::error::ErrorKind;
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            RunResult::Help(err.to_string())
        }
        _ => {
            let usage = cmd.render_usage().to_string();
            RunResult::Usage(UsageError::from_clap(scope, usage, &err))
        }
    }
}

/// Prints the failure chain and waits for the user when attached to a terminal.
fn default_inspector(err: &CommandError) {
    eprintln!("post-mortem: {:#?}", err);
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprintln!("press enter to continue");
        let mut line = String::new();
        if let Err(read_err) = stdin.lock().read_line(&mut line) {
            eprintln!("inspection input failed: {}", read_err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::FnHandler;
    use crate::registry::{CommandEntry, StaticRegistry};

    fn dispatcher() -> Dispatcher {
        let registry = StaticRegistry::new().with(
            DEFAULT_GROUP,
            CommandEntry::from_handler(
                "echo",
                "demo:echo",
                "demo",
                Rc::new(FnHandler::new("echo flags", |_, ctx| {
                    Ok(Output::Text(format!("{:?}", ctx.flags)))
                })),
            ),
        );
        Dispatcher::new("cairn", Rc::new(registry)).log_sink(LogSink::buffer())
    }

    #[test]
    fn dispatch_initializes_lazily_and_repeats() {
        let mut d = dispatcher();
        assert!(!d.is_initialized());
        assert!(d.dispatch(["echo"]).is_handled());
        assert!(d.is_initialized());
        assert!(d.dispatch(["echo"]).is_handled());
    }

    #[test]
    #[should_panic(expected = "already been initialized")]
    fn double_init_panics() {
        let mut d = dispatcher();
        d.init();
        d.init();
    }

    #[test]
    #[should_panic(expected = "cannot be attached")]
    fn attach_after_init_panics() {
        let mut d = dispatcher();
        d.dispatch(["echo"]);
        d.attach_to(Command::new("parent"));
    }

    #[test]
    fn attach_nests_commands() {
        let mut d = dispatcher();
        let parent = d.attach_to(Command::new("parent"));
        let nested = parent.find_subcommand("cairn").unwrap();
        assert!(nested.find_subcommand("echo").is_some());
        assert!(d.is_initialized());
    }

    #[test]
    fn empty_args_show_help() {
        let result = dispatcher().dispatch(Vec::<String>::new());
        assert_eq!(result.exit_code(), 0);
        assert!(result.help().unwrap().contains("echo"));
    }

    #[test]
    fn runtime_program_name_scopes_help_and_usage() {
        let prog = format!("{}-{}", "cairn", 2);
        let mut d = dispatcher();
        d.prog = prog.clone();
        let help = d.dispatch(["-h"]);
        assert!(help.help().unwrap().contains(&prog));
        match d.dispatch(["echo", "-u"]) {
            RunResult::Usage(err) => assert!(err.to_string().contains("cairn-2 echo")),
            other => panic!("expected usage error, got exit {}", other.exit_code()),
        }
    }

    #[test]
    fn exit_codes() {
        let mut d = dispatcher();
        assert_eq!(d.dispatch(["-h"]).exit_code(), 0);
        assert_eq!(d.dispatch(["-V"]).exit_code(), 0);
        assert_eq!(d.dispatch(["-u"]).exit_code(), 2);
        assert_eq!(d.dispatch(["echo", "-u"]).exit_code(), 2);
    }
}
