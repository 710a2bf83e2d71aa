//! Prebuilt artifacts declared by distributions.
//!
//! A distribution lists its artifacts as `file name -> builder target`. A
//! builder never writes the artifact itself: given the package names and the
//! export target it returns a toolchain and the context to run it with, and
//! [`ArtifactRegistry::build_artifacts`] runs that pair through a
//! [`Pipeline`]. Artifacts land in `<location>/cairn_artifacts/`, and what
//! built them is recorded in `<location>/cairn_artifacts.json`.
//!
//! Builders sharing an item name (`bundle` in both `a.build:bundle` and
//! `b.build:bundle`) are treated as compatible, so artifacts can be looked up
//! by builder across packages.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cairn_dist::{normalize, resolve, write_stable, Requirement, WorkingSet};
use cairn_toolchain::{keys, prepare_export_location, Context, Pipeline, Toolchain};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

pub const ARTIFACT_DIR: &str = "cairn_artifacts";
pub const ARTIFACT_METADATA: &str = "cairn_artifacts.json";

/// Produces the toolchain and context for one artifact, or `None` when it
/// cannot.
pub type BuilderFn = Rc<dyn Fn(&[String], &Path) -> Option<(Rc<dyn Toolchain>, Context)>>;

/// One declared artifact and where it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub package: String,
    pub name: String,
    pub builder: String,
    pub path: PathBuf,
}

impl ArtifactEntry {
    /// The item part of the builder target, shared by compatible builders.
    pub fn compat_name(&self) -> &str {
        self.builder
            .rsplit_once(':')
            .map_or(self.builder.as_str(), |(_, item)| item)
    }

    fn is_for(&self, package: &str) -> bool {
        normalize(&self.package) == normalize(package)
    }
}

pub struct ArtifactRegistry<'w> {
    working_set: &'w dyn WorkingSet,
    builders: HashMap<String, BuilderFn>,
    entries: Vec<ArtifactEntry>,
    reverse: HashMap<PathBuf, usize>,
    metadata: HashMap<String, PathBuf>,
}

impl<'w> ArtifactRegistry<'w> {
    /// Registers every artifact declared in `working_set`.
    ///
    /// Distributions without a location have nowhere to build and are
    /// skipped. A second declaration for an already claimed path is ignored.
    pub fn new(working_set: &'w dyn WorkingSet) -> Self {
        let mut registry = Self {
            working_set,
            builders: HashMap::new(),
            entries: Vec::new(),
            reverse: HashMap::new(),
            metadata: HashMap::new(),
        };
        for dist in working_set.distributions() {
            if dist.artifacts.is_empty() {
                continue;
            }
            let Some(location) = &dist.location else {
                warn!("'{}' declares artifacts but has no location to build them in", dist.name);
                continue;
            };
            for (name, builder) in &dist.artifacts {
                registry.register(ArtifactEntry {
                    package: dist.name.clone(),
                    name: name.clone(),
                    builder: builder.clone(),
                    path: location.join(ARTIFACT_DIR).join(name),
                });
            }
            registry
                .metadata
                .insert(dist.key(), location.join(ARTIFACT_METADATA));
        }
        registry
    }

    /// Makes `f` available for artifacts naming `target`.
    pub fn builder<F>(mut self, target: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[String], &Path) -> Option<(Rc<dyn Toolchain>, Context)> + 'static,
    {
        self.builders.insert(target.into(), Rc::new(f));
        self
    }

    fn register(&mut self, entry: ArtifactEntry) {
        if let Some(&existing) = self.reverse.get(&entry.path) {
            let claimed = &self.entries[existing];
            error!(
                "artifact '{}' from '{}' would be generated at '{}' which is already \
                 registered to '{}' from '{}'; ignoring the conflicting declaration",
                entry.name,
                entry.package,
                entry.path.display(),
                claimed.name,
                claimed.package
            );
            return;
        }
        self.reverse.insert(entry.path.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ArtifactEntry] {
        &self.entries
    }

    /// The declaration that generates `path`.
    pub fn belongs_to(&self, path: &Path) -> Option<&ArtifactEntry> {
        self.reverse.get(path).map(|&i| &self.entries[i])
    }

    /// Where `artifact` of `package` is built, if declared.
    pub fn get_artifact_filename(&self, package: &str, artifact: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|e| e.is_for(package) && e.name == artifact)
            .map(|e| e.path.as_path())
    }

    /// Artifact paths built by builders compatible with `builder_name`, in
    /// the order of `packages`, or of their resolved requirement graph when
    /// `dependencies` is set.
    pub fn resolve_artifacts_by_builder_compat(
        &self,
        packages: &[String],
        builder_name: &str,
        dependencies: bool,
    ) -> Vec<PathBuf> {
        let dists = if dependencies {
            let reqs: Vec<Requirement> = packages.iter().map(Requirement::new).collect();
            resolve(self.working_set, &reqs)
        } else {
            packages
                .iter()
                .filter_map(|name| self.working_set.find(name))
                .collect()
        };
        dists
            .into_iter()
            .filter_map(|dist| {
                self.entries
                    .iter()
                    .find(|e| e.is_for(&dist.name) && e.compat_name() == builder_name)
                    .map(|e| e.path.clone())
            })
            .collect()
    }

    /// What built each artifact of `package`; empty when nothing was
    /// recorded or the record is unreadable.
    pub fn get_artifact_metadata(&self, package: &str) -> Map<String, Value> {
        let Some(path) = self.metadata.get(&normalize(package)) else {
            return Map::new();
        };
        let Ok(text) = fs::read_to_string(path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => {
                info!("artifact metadata file '{}' is invalid", path.display());
                Map::new()
            }
        }
    }

    /// Builds every artifact declared by `package`, returning the paths that
    /// were produced.
    pub fn build_artifacts(&self, package: &str) -> Vec<PathBuf> {
        let declared: Vec<&ArtifactEntry> =
            self.entries.iter().filter(|e| e.is_for(package)).collect();
        if declared.is_empty() {
            debug!("package '{}' has not declared any artifacts", package);
            return Vec::new();
        }
        debug!(
            "package '{}' has declared {} artifact(s) for construction",
            package,
            declared.len()
        );
        declared
            .into_iter()
            .filter_map(|entry| self.build_artifact(entry))
            .collect()
    }

    fn build_artifact(&self, entry: &ArtifactEntry) -> Option<PathBuf> {
        let Some(builder) = self.builders.get(&entry.builder) else {
            error!(
                "unable to resolve the builder '{}' for artifact '{}' from '{}'",
                entry.builder, entry.name, entry.package
            );
            return None;
        };
        if !prepare_export_location(&entry.path) {
            return None;
        }
        let Some((toolchain, mut context)) = builder(&[entry.package.clone()], &entry.path) else {
            error!(
                "the builder '{}' for artifact '{}' from '{}' failed to produce a \
                 toolchain and context",
                entry.builder, entry.name, entry.package
            );
            return None;
        };
        if !context.contains_key(keys::EXPORT_TARGET) {
            context.insert(keys::EXPORT_TARGET, entry.path.display().to_string());
        }

        info!("building artifact '{}' for '{}'", entry.name, entry.package);
        let outcome = Pipeline::new(toolchain.as_ref())
            .without_export_check()
            .run(context);
        if let Some(halted) = &outcome.halted {
            error!("building artifact '{}' stopped: {}", entry.name, halted);
        }

        self.record(entry, toolchain.name());
        if !entry.path.exists() {
            error!(
                "the builder '{}' from '{}' failed to generate an artifact at '{}'",
                entry.builder,
                entry.package,
                entry.path.display()
            );
            return None;
        }
        Some(entry.path.clone())
    }

    fn record(&self, entry: &ArtifactEntry, toolchain: &str) {
        let Some(path) = self.metadata.get(&normalize(&entry.package)) else {
            return;
        };
        let mut metadata = self.get_artifact_metadata(&entry.package);
        metadata.insert(
            entry.name.clone(),
            json!({"builder": entry.builder, "toolchain": toolchain}),
        );
        if let Err(err) = write_stable(path, &Value::Object(metadata)) {
            error!("failed to write artifact metadata '{}': {}", path.display(), err);
        }
    }
}
