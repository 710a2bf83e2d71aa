//! Package manager driver.
//!
//! Generates a package definition file (e.g. `package.json`) from the
//! flattened metadata of the requested distributions, and runs
//! `<binary> install` against it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cairn_dist::{to_stable_string, write_stable, Flattener, Requirement, WorkingSet, DEFAULT_DEP_KEYS};
use cairn_input::{Confirm, InputError, TerminalIO};
use serde_json::{Map, Value};
use similar::TextDiff;
use tracing::{debug, error, info, warn};

use crate::invoke::{Invocation, Invoker, ProcessInvoker};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("invocation of the '{binary}' binary failed; {reason}")]
    Invocation { binary: String, reason: String },

    #[error("termination requested; aborted.")]
    Interrupted,

    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Prompt(#[from] InputError),
}

/// How an existing package definition file is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Merge only the named packages, without their requirements.
    pub explicit: bool,
    /// Replace an existing file without asking.
    pub overwrite: bool,
    /// Keep dependencies already declared in an existing file.
    pub merge: bool,
    /// Show a diff and ask before replacing an existing file.
    pub interactive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Written(PathBuf),
    UpToDate(PathBuf),
    /// An existing, different file was left alone.
    Kept(PathBuf),
}

impl InitOutcome {
    pub fn path(&self) -> &Path {
        match self {
            InitOutcome::Written(p) | InitOutcome::UpToDate(p) | InitOutcome::Kept(p) => p,
        }
    }
}

pub struct PackageManagerDriver {
    binary: String,
    pkgdef_filename: String,
    dep_keys: Vec<String>,
    working_dir: PathBuf,
    working_set: Rc<dyn WorkingSet>,
    invoker: Rc<dyn Invoker>,
}

impl PackageManagerDriver {
    pub fn new(
        binary: impl Into<String>,
        pkgdef_filename: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        working_set: Rc<dyn WorkingSet>,
    ) -> Self {
        Self {
            binary: binary.into(),
            pkgdef_filename: pkgdef_filename.into(),
            dep_keys: DEFAULT_DEP_KEYS.iter().map(|k| k.to_string()).collect(),
            working_dir: working_dir.into(),
            working_set,
            invoker: Rc::new(ProcessInvoker),
        }
    }

    pub fn npm(working_dir: impl Into<PathBuf>, working_set: Rc<dyn WorkingSet>) -> Self {
        Self::new("npm", "package.json", working_dir, working_set)
    }

    pub fn yarn(working_dir: impl Into<PathBuf>, working_set: Rc<dyn WorkingSet>) -> Self {
        Self::new("yarn", "package.json", working_dir, working_set)
    }

    pub fn dep_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dep_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn invoker(mut self, invoker: Rc<dyn Invoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn pkgdef_filename(&self) -> &str {
        &self.pkgdef_filename
    }

    pub fn pkgdef_path(&self) -> PathBuf {
        self.working_dir.join(&self.pkgdef_filename)
    }

    /// The flattened package definition for `requirements`.
    pub fn view(&self, requirements: &[Requirement], explicit: bool) -> Value {
        Flattener::new(self.working_set.as_ref(), self.pkgdef_filename.as_str())
            .dep_keys(self.dep_keys.iter().cloned())
            .flatten_packages(requirements, explicit)
    }

    /// Writes the flattened package definition into the working directory.
    pub fn init(
        &self,
        requirements: &[Requirement],
        opts: InitOptions,
        terminal: &dyn TerminalIO,
    ) -> Result<InitOutcome, DriverError> {
        info!(
            "generating a flattened '{}' for '{}'",
            self.pkgdef_filename,
            requested(requirements)
        );
        let mut document = self.view(requirements, opts.explicit);
        let path = self.pkgdef_path();

        if let Some(existing) = read_existing(&path)? {
            if opts.merge {
                document = merge_existing(&existing, document, &self.dep_keys);
            }
            if existing == document {
                info!("'{}' is up to date", path.display());
                return Ok(InitOutcome::UpToDate(path));
            }
            if !opts.overwrite {
                if opts.interactive {
                    if !confirm_overwrite(&path, &existing, &document, terminal)? {
                        return Ok(InitOutcome::Kept(path));
                    }
                } else if !opts.merge {
                    return Ok(InitOutcome::Kept(path));
                }
            }
        }

        write_stable(&path, &document).map_err(|source| DriverError::Write {
            path: path.clone(),
            source,
        })?;
        info!("wrote '{}'", path.display());
        Ok(InitOutcome::Written(path))
    }

    /// Runs `init` when packages are named, then `<binary> install`.
    ///
    /// A file left alone by `init` stops the install; its outcome is returned
    /// without invoking anything.
    pub fn install(
        &self,
        requirements: &[Requirement],
        opts: InitOptions,
        terminal: &dyn TerminalIO,
    ) -> Result<Option<InitOutcome>, DriverError> {
        let outcome = if requirements.is_empty() {
            None
        } else {
            let outcome = self.init(requirements, opts, terminal)?;
            if matches!(outcome, InitOutcome::Kept(_)) {
                return Ok(Some(outcome));
            }
            Some(outcome)
        };
        self.run_install()?;
        Ok(outcome)
    }

    fn run_install(&self) -> Result<(), DriverError> {
        let failed = |reason: String| {
            error!("invocation of the '{}' binary failed; {}", self.binary, reason);
            DriverError::Invocation {
                binary: self.binary.clone(),
                reason,
            }
        };

        let Some(program) = self.invoker.which(&self.binary) else {
            return Err(failed(format!("'{}' was not found", self.binary)));
        };
        info!(
            "running '{} install' in '{}'",
            self.binary,
            self.working_dir.display()
        );
        match self.invoker.run(&program, &["install"], &self.working_dir) {
            Ok(Invocation::Success) => Ok(()),
            Ok(Invocation::Failed(code)) => Err(failed(format!("exit status {}", code))),
            Ok(Invocation::Interrupted) => Err(DriverError::Interrupted),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Err(DriverError::Interrupted),
            Err(err) => Err(failed(err.to_string())),
        }
    }
}

fn requested(requirements: &[Requirement]) -> String {
    requirements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The existing file as a JSON object, if there is a usable one.
fn read_existing(path: &Path) -> Result<Option<Value>, DriverError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(DriverError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(value @ Value::Object(_)) => Ok(Some(value)),
        _ => {
            warn!("ignoring existing malformed '{}'", path.display());
            Ok(None)
        }
    }
}

/// `generated` over `existing`, with dependency maps combined key by key.
fn merge_existing(existing: &Value, generated: Value, dep_keys: &[String]) -> Value {
    let (Value::Object(old), Value::Object(new)) = (existing, generated.clone()) else {
        return generated;
    };
    let mut merged: Map<String, Value> = old.clone();
    for (key, value) in new {
        let combined = match (merged.get(&key), &value) {
            (Some(Value::Object(kept)), Value::Object(fresh)) if dep_keys.contains(&key) => {
                let mut deps = kept.clone();
                deps.extend(fresh.clone());
                Some(Value::Object(deps))
            }
            _ => None,
        };
        merged.insert(key, combined.unwrap_or(value));
    }
    Value::Object(merged)
}

fn confirm_overwrite(
    path: &Path,
    existing: &Value,
    document: &Value,
    terminal: &dyn TerminalIO,
) -> Result<bool, DriverError> {
    if terminal.is_interactive() {
        let old = to_stable_string(existing).unwrap_or_default();
        let new = to_stable_string(document).unwrap_or_default();
        let diff = TextDiff::from_lines(&old, &new);
        terminal
            .write(&format!(
                "generated content differs with '{}':\n{}\n",
                path.display(),
                diff.unified_diff().header("existing", "generated")
            ))
            .map_err(|e| InputError::PromptFailed(e.to_string()))?;
    }

    let prompt = format!("Overwrite '{}'?", path.display());
    match Confirm::new(prompt).default(false).ask(terminal) {
        Ok(answer) => {
            if answer.is_defaulted() {
                warn!("non-interactive mode; auto-selecting default option [No]");
            }
            debug!("overwrite of '{}' answered {}", path.display(), answer.value());
            Ok(answer.value())
        }
        Err(InputError::PromptCancelled) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_dist::{parse_requirements, Distribution, DistributionSet};
    use cairn_input::MockTerminal;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recording {
        found: bool,
        result: Option<Invocation>,
        calls: RefCell<Vec<(PathBuf, Vec<String>)>>,
    }

    impl Invoker for Recording {
        fn which(&self, binary: &str) -> Option<PathBuf> {
            self.found.then(|| PathBuf::from("/usr/bin").join(binary))
        }

        fn run(&self, program: &Path, args: &[&str], _cwd: &Path) -> io::Result<Invocation> {
            self.calls.borrow_mut().push((
                program.to_path_buf(),
                args.iter().map(|a| a.to_string()).collect(),
            ));
            Ok(self.result.unwrap_or(Invocation::Success))
        }
    }

    fn working_set() -> Rc<dyn WorkingSet> {
        Rc::new(
            DistributionSet::new()
                .with(Distribution::new("calmpy.pip", "2.0").with_metadata(
                    "requirements.json",
                    json!({"name": "calmpy.pip", "require": {"setuptools": "25.1.6"}}).to_string(),
                ))
                .with(Distribution::new("site", "1.0").with_extra("dev", ["calmpy.pip"])),
        )
    }

    fn driver(dir: &TempDir, invoker: Rc<Recording>) -> PackageManagerDriver {
        PackageManagerDriver::new("mgr", "requirements.json", dir.path(), working_set())
            .dep_keys(["require"])
            .invoker(invoker)
    }

    fn reqs(tokens: &[&str]) -> Vec<Requirement> {
        parse_requirements(tokens).unwrap()
    }

    fn read(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    const EXPECTED: &str = r#"{"name": "calmpy.pip", "require": {"setuptools": "25.1.6"}}"#;

    fn expected() -> Value {
        serde_json::from_str(EXPECTED).unwrap()
    }

    #[test]
    fn view_single_and_extras() {
        let dir = TempDir::new().unwrap();
        let d = driver(&dir, Rc::default());
        assert_eq!(d.view(&reqs(&["calmpy.pip"]), false), expected());
        assert_eq!(
            d.view(&reqs(&["site"]), false),
            json!({"name": "site", "require": {}})
        );
        assert_eq!(
            d.view(&reqs(&["site[dev]"]), false),
            json!({"name": "site[dev]", "require": {"setuptools": "25.1.6"}})
        );
    }

    #[test]
    fn init_writes_then_reports_up_to_date() {
        let dir = TempDir::new().unwrap();
        let d = driver(&dir, Rc::default());
        let term = MockTerminal::non_interactive();
        let first = d.init(&reqs(&["calmpy.pip"]), InitOptions::default(), &term).unwrap();
        assert_eq!(first, InitOutcome::Written(d.pkgdef_path()));
        assert_eq!(read(&d.pkgdef_path()), expected());
        let bytes = fs::read(d.pkgdef_path()).unwrap();

        let second = d.init(&reqs(&["calmpy.pip"]), InitOptions::default(), &term).unwrap();
        assert_eq!(second, InitOutcome::UpToDate(d.pkgdef_path()));
        assert_eq!(fs::read(d.pkgdef_path()).unwrap(), bytes);
    }

    #[test]
    fn existing_different_file_is_kept_unless_overwritten() {
        let dir = TempDir::new().unwrap();
        let d = driver(&dir, Rc::default());
        let term = MockTerminal::non_interactive();
        fs::write(d.pkgdef_path(), r#"{"require": {"unrelated": "1.2.3"}}"#).unwrap();

        let kept = d.init(&reqs(&["calmpy.pip"]), InitOptions::default(), &term).unwrap();
        assert!(matches!(kept, InitOutcome::Kept(_)));
        assert_eq!(read(&d.pkgdef_path()), json!({"require": {"unrelated": "1.2.3"}}));

        let opts = InitOptions {
            overwrite: true,
            ..Default::default()
        };
        d.init(&reqs(&["calmpy.pip"]), opts, &term).unwrap();
        assert_eq!(read(&d.pkgdef_path()), expected());
    }

    #[test]
    fn malformed_existing_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let d = driver(&dir, Rc::default());
        fs::write(d.pkgdef_path(), "not a json").unwrap();
        let outcome = d
            .init(&reqs(&["calmpy.pip"]), InitOptions::default(), &MockTerminal::eof())
            .unwrap();
        assert!(matches!(outcome, InitOutcome::Written(_)));
        assert_eq!(read(&d.pkgdef_path()), expected());
    }

    #[test]
    fn interactive_shows_diff_and_respects_answer() {
        let dir = TempDir::new().unwrap();
        let d = driver(&dir, Rc::default());
        fs::write(d.pkgdef_path(), r#"{"require": {"unrelated": "1.2.3"}}"#).unwrap();
        let opts = InitOptions {
            interactive: true,
            ..Default::default()
        };

        let term = MockTerminal::with_response("n");
        let outcome = d.init(&reqs(&["calmpy.pip"]), opts, &term).unwrap();
        assert!(matches!(outcome, InitOutcome::Kept(_)));
        let written = term.written();
        assert!(written.contains("differs with "));
        assert!(written.contains("Overwrite"));
        assert!(written.contains("requirements.json'?"));
        assert!(written.contains("+    \"name\": \"calmpy.pip\","));

        let term = MockTerminal::with_response("y");
        d.init(&reqs(&["calmpy.pip"]), opts, &term).unwrap();
        assert_eq!(read(&d.pkgdef_path()), expected());
    }

    #[test]
    fn interactive_merge_keeps_existing_dependencies() {
        let dir = TempDir::new().unwrap();
        let d = driver(&dir, Rc::default());
        fs::write(d.pkgdef_path(), r#"{"require": {"unrelated": "1.2.3"}}"#).unwrap();
        let opts = InitOptions {
            interactive: true,
            merge: true,
            ..Default::default()
        };
        d.init(&reqs(&["calmpy.pip"]), opts, &MockTerminal::with_response("y"))
            .unwrap();
        assert_eq!(
            read(&d.pkgdef_path()),
            json!({"name": "calmpy.pip", "require": {"setuptools": "25.1.6", "unrelated": "1.2.3"}})
        );
    }

    #[test]
    fn non_interactive_terminal_declines_quietly() {
        let dir = TempDir::new().unwrap();
        let d = driver(&dir, Rc::default());
        fs::write(d.pkgdef_path(), "{}").unwrap();
        let term = MockTerminal::non_interactive();
        let opts = InitOptions {
            interactive: true,
            ..Default::default()
        };
        let outcome = d.init(&reqs(&["calmpy.pip"]), opts, &term).unwrap();
        assert!(matches!(outcome, InitOutcome::Kept(_)));
        assert_eq!(term.written(), "");
    }

    #[test]
    fn install_runs_binary_after_init() {
        let dir = TempDir::new().unwrap();
        let invoker = Rc::new(Recording {
            found: true,
            ..Default::default()
        });
        let d = driver(&dir, invoker.clone());
        let outcome = d
            .install(&reqs(&["calmpy.pip"]), InitOptions::default(), &MockTerminal::eof())
            .unwrap();
        assert!(matches!(outcome, Some(InitOutcome::Written(_))));
        assert_eq!(
            invoker.calls.borrow().as_slice(),
            [(PathBuf::from("/usr/bin/mgr"), vec!["install".to_string()])]
        );
    }

    #[test]
    fn install_stops_when_init_keeps_file() {
        let dir = TempDir::new().unwrap();
        let invoker = Rc::new(Recording {
            found: true,
            ..Default::default()
        });
        let d = driver(&dir, invoker.clone());
        fs::write(d.pkgdef_path(), "{}").unwrap();
        let outcome = d
            .install(&reqs(&["calmpy.pip"]), InitOptions::default(), &MockTerminal::eof())
            .unwrap();
        assert!(matches!(outcome, Some(InitOutcome::Kept(_))));
        assert!(invoker.calls.borrow().is_empty());
    }

    #[test]
    fn install_failures() {
        let dir = TempDir::new().unwrap();
        let term = MockTerminal::eof();

        let missing = driver(&dir, Rc::default());
        let err = missing.install(&[], InitOptions::default(), &term).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("invocation of the 'mgr' binary failed;"));

        let failing = driver(
            &dir,
            Rc::new(Recording {
                found: true,
                result: Some(Invocation::Failed(1)),
                ..Default::default()
            }),
        );
        let err = failing.install(&[], InitOptions::default(), &term).unwrap_err();
        assert!(matches!(err, DriverError::Invocation { .. }));

        let interrupted = driver(
            &dir,
            Rc::new(Recording {
                found: true,
                result: Some(Invocation::Interrupted),
                ..Default::default()
            }),
        );
        let err = interrupted.install(&[], InitOptions::default(), &term).unwrap_err();
        assert_eq!(err.to_string(), "termination requested; aborted.");
    }
}
