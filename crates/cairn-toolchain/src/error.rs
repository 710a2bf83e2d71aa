//! Ways a pipeline run stops early.

use std::fmt;

/// Why forward progress stopped.
///
/// `Abort` and `Cancel` are expected outcomes: a precondition was not met or
/// the user declined. `Failure` is anything else and carries the error.
#[derive(Debug, thiserror::Error)]
pub enum Halt {
    #[error("{0}")]
    Abort(String),

    #[error("{0}")]
    Cancel(String),

    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

impl Halt {
    pub fn abort(message: impl Into<String>) -> Self {
        Self::Abort(message.into())
    }

    pub fn cancel(message: impl Into<String>) -> Self {
        Self::Cancel(message.into())
    }

    /// Abort and Cancel are expected; failures are not.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Halt::Failure(_))
    }
}

/// Where in a run a [`Halt`] was raised, e.g. `after_prepare` or `compile`.
#[derive(Debug)]
pub struct Halted {
    pub at: String,
    pub halt: Halt,
}

impl fmt::Display for Halted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.halt {
            Halt::Abort(msg) => write!(f, "an event in group '{}' triggered an abort: {}", self.at, msg),
            Halt::Cancel(msg) => write!(f, "an event in group '{}' triggered a cancel: {}", self.at, msg),
            Halt::Failure(err) => write!(f, "an event in group '{}' raised an error: {}", self.at, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_halts() {
        assert!(Halt::abort("missing").is_expected());
        assert!(Halt::cancel("declined").is_expected());
        assert!(!Halt::from(anyhow::anyhow!("boom")).is_expected());
    }

    #[test]
    fn halted_messages_name_the_group() {
        let halted = Halted {
            at: "after_prepare".into(),
            halt: Halt::abort("EXPORT_TARGET should be specified by this stage"),
        };
        assert_eq!(
            halted.to_string(),
            "an event in group 'after_prepare' triggered an abort: EXPORT_TARGET should be specified by this stage"
        );
    }
}
