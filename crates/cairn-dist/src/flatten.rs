//! Dependency flattening across a resolved requirement graph.
//!
//! Every distribution may ship a metadata file (e.g. `package.json`) that
//! declares per-key dependency maps. Flattening overlays those maps from the
//! most distant ancestor to the root, so closer declarations override
//! farther ones, and finally drops entries whose value is `null`.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::distribution::Distribution;
use crate::requirement::Requirement;
use crate::working_set::{resolve, WorkingSet};

/// Dependency keys merged when none are configured.
pub const DEFAULT_DEP_KEYS: &[&str] = &["dependencies", "devDependencies"];

/// Metadata file holding extra, non-dependency declarations such as
/// `node_modules` path mappings.
pub const EXTRAS_FILE: &str = "extras_cairn.json";

/// Every key registered for extras flattening by any distribution, sorted.
pub fn extras_keys(working_set: &dyn WorkingSet) -> Vec<String> {
    working_set
        .distributions()
        .into_iter()
        .flat_map(|dist| dist.extras_keys.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Flattens [`EXTRAS_FILE`] for the distribution `name` over the keys
/// registered in `working_set`.
///
/// The root's own extras document is kept, with each registered key replaced
/// by its merged value. An unknown `name` yields only the empty keys.
pub fn flatten_extras(working_set: &dyn WorkingSet, name: &str) -> Map<String, Value> {
    let root = working_set.find(name);
    if root.is_none() {
        debug!("no distribution named '{}' for extras", name);
    }
    let mut document = root
        .and_then(|dist| dist.metadata_json(EXTRAS_FILE))
        .unwrap_or_default();
    let merged = Flattener::new(working_set, EXTRAS_FILE)
        .dep_keys(extras_keys(working_set))
        .flatten_dist(root);
    document.extend(merged);
    document
}

/// Overlays the dependency maps of `layers`, in order, for each key.
///
/// Returns one object per key in `dep_keys`, always present, with null
/// entries removed. A key whose declared value is not an object is ignored
/// for that layer.
pub fn merge_layers<'m, I>(layers: I, dep_keys: &[String]) -> Map<String, Value>
where
    I: IntoIterator<Item = &'m Map<String, Value>>,
{
    let mut merged: Vec<Map<String, Value>> = vec![Map::new(); dep_keys.len()];
    for layer in layers {
        for (key, acc) in dep_keys.iter().zip(merged.iter_mut()) {
            match layer.get(key) {
                Some(Value::Object(deps)) => {
                    for (name, version) in deps {
                        acc.insert(name.clone(), version.clone());
                    }
                }
                Some(Value::Null) | None => {}
                Some(other) => warn!("ignoring non-mapping '{}' value: {}", key, other),
            }
        }
    }

    dep_keys
        .iter()
        .cloned()
        .zip(merged)
        .map(|(key, mut deps)| {
            deps.retain(|_, v| !v.is_null());
            (key, Value::Object(deps))
        })
        .collect()
}

/// Flattens metadata files of a given name over a [`WorkingSet`].
pub struct Flattener<'a> {
    working_set: &'a dyn WorkingSet,
    filename: String,
    dep_keys: Vec<String>,
}

impl<'a> Flattener<'a> {
    pub fn new(working_set: &'a dyn WorkingSet, filename: impl Into<String>) -> Self {
        Self {
            working_set,
            filename: filename.into(),
            dep_keys: DEFAULT_DEP_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn dep_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dep_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Merged dependency maps for `root` and everything it requires.
    ///
    /// With no root, every key maps to an empty object.
    pub fn flatten_dist(&self, root: Option<&Distribution>) -> Map<String, Value> {
        let Some(root) = root else {
            return merge_layers(std::iter::empty(), &self.dep_keys);
        };
        let mut chain = resolve(self.working_set, &root.requirements(&[]));
        chain.retain(|dist| dist.key() != root.key());
        chain.push(root);

        let metadata = self.collect_metadata(&chain, &root.name);
        merge_layers(metadata.iter().map(|(_, m)| m), &self.dep_keys)
    }

    /// The complete document for the requested packages.
    ///
    /// A single package contributes its own metadata as the base document;
    /// several packages behave like a nameless root requiring all of them.
    /// With `explicit`, requirements are not followed and only the named
    /// packages are merged, in the order given. A document without a `name`
    /// is named after the requested tokens.
    pub fn flatten_packages(&self, requirements: &[Requirement], explicit: bool) -> Value {
        let requested = requirements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");

        let chain: Vec<&Distribution> = if explicit {
            requirements
                .iter()
                .filter_map(|req| {
                    let found = self.working_set.find(&req.name);
                    if found.is_none() {
                        warn!("required distribution '{}' not found", req);
                    }
                    found
                })
                .collect()
        } else {
            resolve(self.working_set, requirements)
        };

        let metadata = self.collect_metadata(&chain, &requested);

        let mut document = match requirements {
            [single] => metadata
                .iter()
                .find(|(dist, _)| dist.key() == single.key())
                .map(|(_, m)| m.clone())
                .unwrap_or_default(),
            _ => Map::new(),
        };

        let merged = merge_layers(metadata.iter().map(|(_, m)| m), &self.dep_keys);
        document.extend(merged);

        if !document.contains_key("name") {
            document.insert("name".to_string(), Value::String(requested));
        }
        Value::Object(document)
    }

    fn collect_metadata<'d>(
        &self,
        chain: &[&'d Distribution],
        target: &str,
    ) -> Vec<(&'d Distribution, Map<String, Value>)> {
        chain
            .iter()
            .filter_map(|dist| {
                let metadata = dist.metadata_json(&self.filename)?;
                debug!(
                    "merging '{}' of '{}' for '{}'",
                    self.filename, dist.name, target
                );
                Some((*dist, metadata))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::working_set::DistributionSet;
    use serde_json::json;

    fn pkg(name: &str, requires: &[&str], package_json: Value) -> Distribution {
        Distribution::new(name, "1.0")
            .with_requires(requires.iter().copied())
            .with_metadata("package.json", package_json.to_string())
    }

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merge_later_layers_win_and_nulls_drop() {
        let far = json!({"dependencies": {"a": "1", "b": "1"}});
        let near = json!({"dependencies": {"a": "2", "b": null}});
        let merged = merge_layers(
            [far.as_object().unwrap(), near.as_object().unwrap()],
            &keys(&["dependencies", "devDependencies"]),
        );
        assert_eq!(
            Value::Object(merged),
            json!({"dependencies": {"a": "2"}, "devDependencies": {}})
        );
    }

    #[test]
    fn merge_ignores_non_mapping_values() {
        let layer = json!({"dependencies": ["not", "a", "map"]});
        let merged = merge_layers([layer.as_object().unwrap()], &keys(&["dependencies"]));
        assert_eq!(Value::Object(merged), json!({"dependencies": {}}));
    }

    #[test]
    fn flatten_example_scenario() {
        let ws = DistributionSet::new()
            .with(pkg("a", &[], json!({"dependencies": {"jquery": "~3.1.0"}})))
            .with(pkg("b", &[], json!({"dependencies": {"underscore": "~1.8.3"}})))
            .with(pkg(
                "c",
                &["a", "b"],
                json!({"dependencies": {"backbone": "~1.3.2"}}),
            ));
        let flattener = Flattener::new(&ws, "package.json").dep_keys(["dependencies"]);
        let result = flattener.flatten_dist(ws.find("c"));
        assert_eq!(
            Value::Object(result),
            json!({"dependencies": {
                "jquery": "~3.1.0",
                "underscore": "~1.8.3",
                "backbone": "~1.3.2",
            }})
        );
    }

    #[test]
    fn flatten_without_root_is_empty() {
        let ws = DistributionSet::new();
        let result = Flattener::new(&ws, "package.json").flatten_dist(None);
        assert_eq!(
            Value::Object(result),
            json!({"dependencies": {}, "devDependencies": {}})
        );
    }

    #[test]
    fn root_declarations_take_priority() {
        let ws = DistributionSet::new()
            .with(pkg("lib", &[], json!({"dependencies": {"jquery": "~1.11.0"}})))
            .with(pkg("app", &["lib"], json!({"dependencies": {"jquery": "~3.1.0"}})));
        let result = Flattener::new(&ws, "package.json").flatten_dist(ws.find("app"));
        assert_eq!(result["dependencies"], json!({"jquery": "~3.1.0"}));
    }

    #[test]
    fn package_document_keeps_root_fields() {
        let ws = DistributionSet::new()
            .with(pkg("lib", &[], json!({"dependencies": {"jquery": "~3.1.0"}})))
            .with(pkg(
                "app",
                &["lib"],
                json!({"name": "app", "description": "demo", "dependencies": {}}),
            ));
        let doc = Flattener::new(&ws, "package.json")
            .flatten_packages(&[Requirement::new("app")], false);
        assert_eq!(
            doc,
            json!({
                "name": "app",
                "description": "demo",
                "dependencies": {"jquery": "~3.1.0"},
                "devDependencies": {},
            })
        );
    }

    #[test]
    fn package_without_metadata_is_named_after_token() {
        let ws = DistributionSet::new().with(
            Distribution::new("site", "1.0")
                .with_extra("dev", ["devtools"]),
        )
        .with(pkg("devtools", &[], json!({"devDependencies": {"mocha": "~3.0.0"}})));
        let req: Requirement = "site[dev]".parse().unwrap();
        let doc = Flattener::new(&ws, "package.json").flatten_packages(&[req], false);
        assert_eq!(
            doc,
            json!({
                "name": "site[dev]",
                "dependencies": {},
                "devDependencies": {"mocha": "~3.0.0"},
            })
        );
    }

    #[test]
    fn explicit_uses_only_named_packages() {
        let ws = DistributionSet::new()
            .with(pkg("base", &[], json!({"dependencies": {"jquery": "~3.1.0"}})))
            .with(pkg("p2", &["base"], json!({"dependencies": {"underscore": "~1.8.3"}})))
            .with(pkg("p3", &["p2"], json!({"dependencies": {"backbone": "~1.3.2"}})));
        let flattener = Flattener::new(&ws, "package.json").dep_keys(["dependencies"]);

        let doc = flattener.flatten_packages(&[Requirement::new("p3")], true);
        assert_eq!(doc["dependencies"], json!({"backbone": "~1.3.2"}));

        let doc = flattener.flatten_packages(
            &[Requirement::new("p3"), Requirement::new("p2")],
            true,
        );
        assert_eq!(
            doc,
            json!({
                "name": "p3 p2",
                "dependencies": {"backbone": "~1.3.2", "underscore": "~1.8.3"},
            })
        );

        let doc = flattener.flatten_packages(&[Requirement::new("p3")], false);
        assert_eq!(
            doc["dependencies"],
            json!({"jquery": "~3.1.0", "underscore": "~1.8.3", "backbone": "~1.3.2"})
        );
    }

    fn extras(name: &str, requires: &[&str], extras: Value) -> Distribution {
        Distribution::new(name, "1.0")
            .with_requires(requires.iter().copied())
            .with_metadata(EXTRAS_FILE, extras.to_string())
    }

    #[test]
    fn extras_keys_come_from_every_distribution() {
        let ws = DistributionSet::new()
            .with(Distribution::new("bundler", "1.0").with_extras_key("node_modules"))
            .with(
                Distribution::new("styles", "1.0")
                    .with_extras_key("stylesheets")
                    .with_extras_key("node_modules"),
            );
        assert_eq!(extras_keys(&ws), ["node_modules", "stylesheets"]);
    }

    #[test]
    fn flatten_extras_merges_registered_keys_only() {
        let ws = DistributionSet::new()
            .with(Distribution::new("bundler", "1.0").with_extras_key("node_modules"))
            .with(extras(
                "lib",
                &[],
                json!({"node_modules": {"jquery": "jquery/dist/jquery.js", "old": "old.js"}}),
            ))
            .with(extras(
                "app",
                &["lib"],
                json!({
                    "node_modules": {"underscore": "underscore/underscore.js", "old": null},
                    "unregistered": {"kept": "as declared"},
                }),
            ));

        let doc = flatten_extras(&ws, "app");
        assert_eq!(
            Value::Object(doc),
            json!({
                "node_modules": {
                    "jquery": "jquery/dist/jquery.js",
                    "underscore": "underscore/underscore.js",
                },
                "unregistered": {"kept": "as declared"},
            })
        );
    }

    #[test]
    fn flatten_extras_for_unknown_package_has_empty_keys() {
        let ws = DistributionSet::new()
            .with(Distribution::new("bundler", "1.0").with_extras_key("node_modules"));
        assert_eq!(
            Value::Object(flatten_extras(&ws, "missing")),
            json!({"node_modules": {}})
        );
    }

    #[test]
    fn malformed_metadata_is_skipped() {
        let ws = DistributionSet::new()
            .with(Distribution::new("bad", "1.0").with_metadata("package.json", "{"))
            .with(pkg("app", &["bad"], json!({"dependencies": {"x": "1"}})));
        let result = Flattener::new(&ws, "package.json").flatten_dist(ws.find("app"));
        assert_eq!(result["dependencies"], json!({"x": "1"}));
    }
}
