//! Assembling the dispatcher and printing what it returns.

use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use cairn_dispatch::{Dispatcher, Extensions, LogSink, Output, RunResult};
use cairn_dist::{to_stable_string, DistributionSet, WorkingSet};
use cairn_input::{RealTerminal, TerminalIO};

use crate::catalogue::Catalogue;
use crate::commands::Terminal;
use crate::invoke::{Invoker, ProcessInvoker};
use crate::settings::Settings;

/// Builder for the `cairn` dispatcher.
///
/// Everything that touches the outside world can be replaced, so tests run
/// the full command line against in-memory distributions.
pub struct Cairn {
    settings: Settings,
    working_dir: PathBuf,
    working_set: Option<Rc<dyn WorkingSet>>,
    terminal: Rc<dyn TerminalIO>,
    invoker: Rc<dyn Invoker>,
    sink: LogSink,
}

impl Cairn {
    pub fn new(settings: Settings, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            working_dir: working_dir.into(),
            working_set: None,
            terminal: Rc::new(RealTerminal),
            invoker: Rc::new(ProcessInvoker),
            sink: LogSink::Stderr,
        }
    }

    /// Use these distributions instead of scanning the settings' paths.
    pub fn working_set(mut self, working_set: Rc<dyn WorkingSet>) -> Self {
        self.working_set = Some(working_set);
        self
    }

    pub fn terminal(mut self, terminal: Rc<dyn TerminalIO>) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn invoker(mut self, invoker: Rc<dyn Invoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn log_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Dispatcher {
        let working_set = self
            .working_set
            .unwrap_or_else(|| Rc::new(DistributionSet::scan(&self.settings.dist_paths)));
        let catalogue =
            Rc::new(Catalogue::new(self.working_dir, working_set).invoker(self.invoker));

        let mut state = Extensions::new();
        state.insert(Terminal(self.terminal));

        Dispatcher::new(crate::NAME, Rc::new(catalogue.registry()))
            .about("flatten package metadata and run build toolchains")
            .package(crate::package_info())
            .app_state(state)
            .log_sink(self.sink)
            .log_directive(self.settings.log_directive)
    }
}

/// Prints a dispatch result and returns the process exit code.
///
/// Failures were already logged by the dispatcher; usage errors go to `err`,
/// everything else to `out`.
pub fn emit(result: &RunResult, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<i32> {
    match result {
        RunResult::Handled(Output::Render(value)) => {
            let text = to_stable_string(value).map_err(io::Error::other)?;
            writeln!(out, "{}", text)?;
        }
        RunResult::Handled(Output::Text(text)) => {
            write!(out, "{}", text)?;
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
        }
        RunResult::Handled(Output::Silent) | RunResult::Failed(_) => {}
        RunResult::Help(text) => write!(out, "{}", text)?,
        RunResult::Version(lines) => {
            for line in lines {
                writeln!(out, "{}", line)?;
            }
        }
        RunResult::Usage(usage) => writeln!(err, "{}", usage)?,
    }
    out.flush()?;
    Ok(result.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_dispatch::{CommandError, UsageError};
    use serde_json::json;

    fn emitted(result: RunResult) -> (String, String, i32) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = emit(&result, &mut out, &mut err).unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
            code,
        )
    }

    #[test]
    fn rendered_values_are_stable_json() {
        let (out, _, code) = emitted(RunResult::Handled(Output::Render(json!({"b": 1, "a": 2}))));
        assert_eq!(out, "{\n    \"a\": 2,\n    \"b\": 1\n}\n");
        assert_eq!(code, 0);
    }

    #[test]
    fn text_gets_one_trailing_newline() {
        let (out, _, _) = emitted(RunResult::Handled(Output::Text("done".into())));
        assert_eq!(out, "done\n");
        let (out, _, _) = emitted(RunResult::Handled(Output::Text("done\n".into())));
        assert_eq!(out, "done\n");
    }

    #[test]
    fn usage_goes_to_stderr() {
        let usage = UsageError {
            scope: "cairn".into(),
            message: "invalid choice: 'x'".into(),
            usage: "Usage: cairn [OPTIONS] [COMMAND]".into(),
        };
        let (out, err, code) = emitted(RunResult::Usage(usage));
        assert!(out.is_empty());
        assert!(err.ends_with("cairn: error: invalid choice: 'x'\n"));
        assert_eq!(code, 2);
    }

    #[test]
    fn failures_print_nothing() {
        let (out, err, code) = emitted(RunResult::Failed(CommandError::cancel("no")));
        assert!(out.is_empty() && err.is_empty());
        assert_eq!(code, 1);
    }
}
