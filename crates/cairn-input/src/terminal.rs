//! Terminal I/O abstraction.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Abstraction over terminal I/O for testability.
pub trait TerminalIO {
    /// Whether a person can answer prompts (stdin and stdout are terminals).
    fn is_interactive(&self) -> bool;

    /// Write text to the user without a trailing newline.
    fn write(&self, text: &str) -> io::Result<()>;

    /// Read a line from the user. An empty string means end of input.
    fn read_line(&self) -> io::Result<String>;
}

/// Real terminal I/O.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTerminal;

impl TerminalIO for RealTerminal {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal() && io::stdout().is_terminal()
    }

    fn write(&self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    }

    fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Mock terminal for testing prompts.
///
/// Replays canned responses in order and then reports end of input.
/// Everything written to it is kept and available through [`MockTerminal::written`].
#[derive(Debug)]
pub struct MockTerminal {
    interactive: bool,
    responses: Vec<String>,
    response_index: AtomicUsize,
    written: Mutex<String>,
}

impl MockTerminal {
    fn build(interactive: bool, responses: Vec<String>) -> Self {
        Self {
            interactive,
            responses,
            response_index: AtomicUsize::new(0),
            written: Mutex::new(String::new()),
        }
    }

    /// A terminal nobody is sitting at.
    pub fn non_interactive() -> Self {
        Self::build(false, vec![])
    }

    /// An interactive terminal that answers once.
    pub fn with_response(response: impl Into<String>) -> Self {
        Self::build(true, vec![response.into()])
    }

    /// An interactive terminal that answers several prompts in sequence.
    pub fn with_responses(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::build(true, responses.into_iter().map(Into::into).collect())
    }

    /// An interactive terminal whose input is already closed (Ctrl+D).
    pub fn eof() -> Self {
        Self::build(true, vec![])
    }

    /// Everything written to the terminal so far.
    pub fn written(&self) -> String {
        self.written
            .lock()
            .map(|text| text.clone())
            .unwrap_or_default()
    }

    /// How many lines have been read.
    pub fn reads(&self) -> usize {
        self.response_index.load(Ordering::SeqCst)
    }
}

impl TerminalIO for MockTerminal {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn write(&self, text: &str) -> io::Result<()> {
        if let Ok(mut written) = self.written.lock() {
            written.push_str(text);
        }
        Ok(())
    }

    fn read_line(&self) -> io::Result<String> {
        let idx = self.response_index.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(idx) {
            Some(response) => Ok(format!("{}\n", response)),
            None => Ok(String::new()),
        }
    }
}
