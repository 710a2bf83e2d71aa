//! `npm`/`yarn`: flatten package definitions across the requirement graph.

use cairn_dispatch::{CommandContext, CommandError, Failure, Handler, HandlerResult, Output, PackageInfo};
use cairn_dist::{parse_requirements, to_stable_string};
use clap::{Arg, ArgAction, ArgMatches, Command};

use super::{terminal, unexpected};
use crate::driver::{DriverError, InitOptions, InitOutcome, PackageManagerDriver};

pub struct PackageManagerCommand {
    driver: PackageManagerDriver,
    about: String,
}

impl PackageManagerCommand {
    pub fn new(driver: PackageManagerDriver) -> Self {
        let about = format!(
            "{} support for the cairn command line",
            driver.binary()
        );
        Self { driver, about }
    }

    pub fn driver(&self) -> &PackageManagerDriver {
        &self.driver
    }
}

fn flag(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(long).action(ArgAction::SetTrue).help(help)
}

impl Handler for PackageManagerCommand {
    fn about(&self) -> &str {
        &self.about
    }

    fn configure(&self, cmd: Command) -> Command {
        let file = self.driver.pkgdef_filename();
        let binary = self.driver.binary();
        cmd.arg(
            Arg::new("packages")
                .value_name("PACKAGE")
                .num_args(0..)
                .action(ArgAction::Append)
                .help("names of the packages to flatten"),
        )
        .arg(flag("view", "view", "print the flattened definition (default action)"))
        .arg(
            flag("init", "init", "write the flattened definition to the working directory")
                .long_help(format!("write a flattened '{}' into the working directory", file)),
        )
        .arg(
            flag("install", "install", "write the definition, then install")
                .long_help(format!("write '{}', then run '{} install'", file, binary)),
        )
        .arg(
            flag("interactive", "interactive", "show a diff and ask before overwriting")
                .short('i'),
        )
        .arg(flag("merge", "merge", "keep dependencies already declared in the existing file").short('m'))
        .arg(flag("explicit", "explicit", "only the named packages, not their requirements").short('E'))
        .arg(flag("overwrite", "overwrite", "overwrite an existing file without asking").short('w'))
    }

    fn handle(&self, matches: &ArgMatches, ctx: &mut CommandContext) -> HandlerResult {
        let names: Vec<String> = matches
            .get_many::<String>("packages")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let requirements =
            parse_requirements(&names).map_err(|err| CommandError::configuration(err.to_string()))?;

        let init = matches.get_flag("init");
        let install = matches.get_flag("install");
        let view = matches.get_flag("view") || (!init && !install);
        if requirements.is_empty() && (view || init) {
            return Err(CommandError::configuration(format!(
                "at least one package name is required to {} a '{}'",
                if init { "generate" } else { "view" },
                self.driver.pkgdef_filename()
            )));
        }

        let opts = InitOptions {
            explicit: matches.get_flag("explicit"),
            overwrite: matches.get_flag("overwrite"),
            merge: matches.get_flag("merge"),
            interactive: matches.get_flag("interactive"),
        };

        let rendered = if view {
            let document = self.driver.view(&requirements, opts.explicit);
            Some(to_stable_string(&document).map_err(unexpected)?)
        } else {
            None
        };

        let terminal = terminal(ctx);
        let outcome = if install {
            self.driver
                .install(&requirements, opts, terminal.as_ref())
                .map_err(driver_error)?
        } else if init {
            Some(
                self.driver
                    .init(&requirements, opts, terminal.as_ref())
                    .map_err(driver_error)?,
            )
        } else {
            None
        };
        if let Some(InitOutcome::Kept(path)) = outcome {
            return Err(CommandError::cancel(format!(
                "not overwriting existing '{}'",
                path.display()
            )));
        }

        Ok(rendered.map_or(Output::Silent, Output::Text))
    }

    fn package(&self) -> Option<PackageInfo> {
        Some(crate::package_info())
    }
}

fn driver_error(err: DriverError) -> CommandError {
    match err {
        DriverError::Interrupted => CommandError::abort(err.to_string()),
        DriverError::Invocation { .. } => unexpected(Failure::new("InvocationError", err.to_string())),
        other => unexpected(other),
    }
}
