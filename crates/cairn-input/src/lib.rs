//! Interactive input for cairn commands.
//!
//! Commands never talk to stdin directly. They ask through a [`TerminalIO`],
//! which is [`RealTerminal`] in the binary and [`MockTerminal`] in tests, so
//! a prompt can always be answered, defaulted, or cancelled without blocking.
//!
//! - [`Confirm`]: yes/no question with an optional default
//! - [`EnvReader`]: environment variables behind a mockable trait

mod confirm;
mod env;
mod error;
mod terminal;

pub use confirm::{parse_answer, Confirm, Confirmation};
pub use env::{EnvReader, MockEnv, RealEnv};
pub use error::InputError;
pub use terminal::{MockTerminal, RealTerminal, TerminalIO};
