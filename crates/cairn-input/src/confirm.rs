//! Yes/no confirmation prompt.

use crate::{InputError, TerminalIO};

/// How a confirmation was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The user typed an answer (or pressed Enter to take the default).
    Answered(bool),
    /// Nobody could answer; the default was taken without prompting.
    Defaulted(bool),
}

impl Confirmation {
    /// The boolean outcome regardless of how it was reached.
    pub fn value(self) -> bool {
        match self {
            Confirmation::Answered(v) | Confirmation::Defaulted(v) => v,
        }
    }

    /// Whether the default was taken because the terminal is not interactive.
    pub fn is_defaulted(self) -> bool {
        matches!(self, Confirmation::Defaulted(_))
    }
}

/// Simple yes/no confirmation prompt.
///
/// Accepts y/yes/n/no (case-insensitive). Invalid answers re-prompt until
/// the user gives a valid one or closes input; closed input is
/// [`InputError::PromptCancelled`].
///
/// # Example
///
/// ```rust
/// use cairn_input::{Confirm, MockTerminal};
///
/// let term = MockTerminal::with_response("yes");
/// let answer = Confirm::new("Overwrite 'package.json'?")
///     .default(false)
///     .ask(&term)
///     .unwrap();
/// assert!(answer.value());
/// ```
#[derive(Debug, Clone)]
pub struct Confirm {
    prompt: String,
    default: Option<bool>,
}

impl Confirm {
    /// Create a new confirmation prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            default: None,
        }
    }

    /// Set the answer used for empty input and for non-interactive terminals.
    ///
    /// The prompt suffix changes to indicate the default:
    /// - `None`: `[y/n]`
    /// - `Some(true)`: `[Y/n]`
    /// - `Some(false)`: `[y/N]`
    pub fn default(mut self, default: bool) -> Self {
        self.default = Some(default);
        self
    }

    fn suffix(&self) -> &'static str {
        match self.default {
            None => "[y/n]",
            Some(true) => "[Y/n]",
            Some(false) => "[y/N]",
        }
    }

    /// Ask the question on `terminal`.
    pub fn ask(&self, terminal: &dyn TerminalIO) -> Result<Confirmation, InputError> {
        if !terminal.is_interactive() {
            return self.default.map(Confirmation::Defaulted).ok_or(InputError::NoInput);
        }

        let full_prompt = format!("{} {} ", self.prompt, self.suffix());
        loop {
            terminal
                .write(&full_prompt)
                .map_err(|e| InputError::PromptFailed(e.to_string()))?;

            let line = terminal
                .read_line()
                .map_err(|e| InputError::PromptFailed(e.to_string()))?;

            if line.is_empty() {
                return Err(InputError::PromptCancelled);
            }

            match parse_answer(&line) {
                Ok(Some(value)) => return Ok(Confirmation::Answered(value)),
                Ok(None) => {
                    if let Some(value) = self.default {
                        return Ok(Confirmation::Answered(value));
                    }
                }
                Err(err) => {
                    terminal
                        .write(&format!("{}\n", err))
                        .map_err(|e| InputError::PromptFailed(e.to_string()))?;
                }
            }
        }
    }
}

/// Interpret a typed answer. Blank input is `Ok(None)`.
pub fn parse_answer(line: &str) -> Result<Option<bool>, InputError> {
    match line.trim().to_lowercase().as_str() {
        "" => Ok(None),
        "y" | "yes" => Ok(Some(true)),
        "n" | "no" => Ok(Some(false)),
        _ => Err(InputError::validation("Please enter 'y' or 'n'")),
    }
}
