use std::fmt;

use clap::error::{ContextKind, ContextValue, ErrorKind};

/// A command line that could not be parsed.
///
/// Renders as the usage line followed by `<scope>: error: <message>`, where
/// the scope is the program name, plus the command name when the problem was
/// found after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    pub scope: String,
    pub message: String,
    pub usage: String,
}

impl UsageError {
    pub(crate) fn from_clap(scope: &str, usage: String, err: &clap::Error) -> Self {
        let context = |kind| match err.get(kind) {
            Some(ContextValue::String(s)) => Some(s.clone()),
            Some(ContextValue::Strings(v)) => Some(v.join(" ")),
            _ => None,
        };
        let message = match err.kind() {
            ErrorKind::UnknownArgument => context(ContextKind::InvalidArg)
                .map(|arg| format!("unrecognized arguments: {}", arg)),
            ErrorKind::InvalidSubcommand => context(ContextKind::InvalidSubcommand)
                .map(|cmd| format!("invalid choice: '{}'", cmd)),
            ErrorKind::NoEquals | ErrorKind::InvalidValue | ErrorKind::ValueValidation => {
                match (context(ContextKind::InvalidArg), context(ContextKind::InvalidValue)) {
                    (Some(arg), Some(value)) => {
                        Some(format!("argument {}: invalid value '{}'", arg, value))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
        .unwrap_or_else(|| first_line(err));

        Self {
            scope: scope.to_string(),
            message,
            usage,
        }
    }
}

fn first_line(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let usage = self.usage.trim_end();
        if !usage.is_empty() {
            writeln!(f, "{}", usage)?;
        }
        write!(f, "{}: error: {}", self.scope, self.message)
    }
}

impl std::error::Error for UsageError {}
