//! Global verbosity and debug flags.
//!
//! `-v`, `-q` and `-d` may be repeated and may appear both before and after
//! the command name; counts from both sides add up.

use clap::{Arg, ArgAction, ArgMatches};

pub(crate) const VERBOSE: &str = "verbose";
pub(crate) const QUIET: &str = "quiet";
pub(crate) const DEBUG: &str = "debug";
pub(crate) const VERSION: &str = "version";

/// Accumulated global flag counts for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalFlags {
    pub verbose: u8,
    pub quiet: u8,
    pub debug: u8,
}

impl GlobalFlags {
    /// Reads counts from matches built with [`global_args`].
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let count = |id: &str| {
            matches
                .try_get_one::<u8>(id)
                .ok()
                .flatten()
                .copied()
                .unwrap_or(0)
        };
        Self {
            verbose: count(VERBOSE),
            quiet: count(QUIET),
            debug: count(DEBUG),
        }
    }

    pub fn merge(self, other: GlobalFlags) -> Self {
        Self {
            verbose: self.verbose.saturating_add(other.verbose),
            quiet: self.quiet.saturating_add(other.quiet),
            debug: self.debug.saturating_add(other.debug),
        }
    }

    /// Verbose count minus quiet count.
    pub fn net_verbosity(&self) -> i16 {
        i16::from(self.verbose) - i16::from(self.quiet)
    }

    pub fn threshold(&self) -> Threshold {
        Threshold::from_net(self.net_verbosity())
    }
}

/// Minimum severity emitted for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Threshold {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl Threshold {
    /// `<= -2` critical, `-1` error, `0` warning, `1` info, `>= 2` debug.
    pub fn from_net(net: i16) -> Self {
        match net {
            i16::MIN..=-2 => Threshold::Critical,
            -1 => Threshold::Error,
            0 => Threshold::Warning,
            1 => Threshold::Info,
            _ => Threshold::Debug,
        }
    }

    /// The filter directive selecting this threshold.
    pub fn directive(self) -> &'static str {
        match self {
            Threshold::Critical => "off,critical=error",
            Threshold::Error => "error",
            Threshold::Warning => "warn",
            Threshold::Info => "info",
            Threshold::Debug => "debug",
        }
    }
}

/// The `-v`/`-q`/`-d` arguments shared by the top level and every command.
pub(crate) fn global_args() -> [Arg; 3] {
    [
        Arg::new(VERBOSE)
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("be more verbose"),
        Arg::new(QUIET)
            .short('q')
            .long("quiet")
            .action(ArgAction::Count)
            .help("be more quiet"),
        Arg::new(DEBUG)
            .short('d')
            .long("debug")
            .action(ArgAction::Count)
            .help("show traceback on error; twice for post-mortem inspection"),
    ]
}

pub(crate) fn version_arg() -> Arg {
    Arg::new(VERSION)
        .short('V')
        .long("version")
        .action(ArgAction::SetTrue)
        .help("print version information")
}
