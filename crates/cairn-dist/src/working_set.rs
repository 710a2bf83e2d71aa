//! The set of known distributions and requirement resolution over it.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::distribution::{Distribution, DIST_FILE};
use crate::requirement::{normalize, Requirement};

/// Lookup of installed distributions by name.
pub trait WorkingSet {
    fn find(&self, name: &str) -> Option<&Distribution>;

    /// Every distribution, in discovery order.
    fn distributions(&self) -> Vec<&Distribution>;
}

/// A [`WorkingSet`] held in memory.
///
/// The first distribution added under a name wins; later ones with the same
/// normalized name are shadowed, as with entries later on a search path.
#[derive(Debug, Clone, Default)]
pub struct DistributionSet {
    dists: IndexMap<String, Distribution>,
}

impl DistributionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dist: Distribution) -> Self {
        self.add(dist);
        self
    }

    /// Adds `dist` unless the name is already taken. Returns whether it was added.
    pub fn add(&mut self, dist: Distribution) -> bool {
        let key = dist.key();
        if let Some(existing) = self.dists.get(&key) {
            debug!(
                "'{}' at '{}' is shadowed by '{}' at '{}'",
                dist.name,
                dist.location_display(),
                existing.name,
                existing.location_display()
            );
            return false;
        }
        self.dists.insert(key, dist);
        true
    }

    /// Scans each directory in `roots` for subdirectories holding a
    /// `dist.json` descriptor. Directories are visited in name order;
    /// unreadable roots and bad descriptors are logged and skipped.
    pub fn scan(roots: &[PathBuf]) -> Self {
        let mut set = Self::new();
        for root in roots {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(err) => {
                    debug!("skipping distribution path '{}': {}", root.display(), err);
                    continue;
                }
            };
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.join(DIST_FILE).is_file())
                .collect();
            dirs.sort();

            for dir in dirs {
                match Distribution::from_dir(&dir) {
                    Ok(dist) => {
                        debug!("found distribution '{}' at '{}'", dist.name, dir.display());
                        set.add(dist);
                    }
                    Err(err) => warn!("{}", err),
                }
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.dists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dists.is_empty()
    }
}

impl WorkingSet for DistributionSet {
    fn find(&self, name: &str) -> Option<&Distribution> {
        self.dists.get(&normalize(name))
    }

    fn distributions(&self) -> Vec<&Distribution> {
        self.dists.values().collect()
    }
}

/// Resolves `requirements` into a dependency-first ordering.
///
/// Each distribution appears once, after everything it requires, so the
/// order runs from the most distant ancestor to the requested packages.
/// Siblings keep their declared order. Missing distributions are logged and
/// skipped; cycles are cut at the first revisit.
pub fn resolve<'a>(
    working_set: &'a dyn WorkingSet,
    requirements: &[Requirement],
) -> Vec<&'a Distribution> {
    let mut resolver = Resolver {
        working_set,
        visited: HashMap::new(),
        order: Vec::new(),
    };
    for req in requirements {
        resolver.visit(req);
    }
    resolver.order
}

struct Resolver<'a> {
    working_set: &'a dyn WorkingSet,
    visited: HashMap<String, BTreeSet<String>>,
    order: Vec<&'a Distribution>,
}

impl<'a> Resolver<'a> {
    fn visit(&mut self, req: &Requirement) {
        let Some(dist) = self.working_set.find(&req.name) else {
            warn!("required distribution '{}' not found", req);
            return;
        };
        let key = dist.key();

        // A repeat visit only has work left if it asks for extras not seen yet.
        let fresh_extras = self.visited.get_mut(&key).map(|seen| {
            let fresh: Vec<String> = req
                .extras
                .iter()
                .filter(|extra| !seen.contains(*extra))
                .cloned()
                .collect();
            seen.extend(fresh.iter().cloned());
            fresh
        });

        match fresh_extras {
            Some(fresh) => {
                for child in dist.extra_requirements(&fresh) {
                    self.visit(&child);
                }
            }
            None => {
                self.visited
                    .insert(key, req.extras.iter().cloned().collect());
                for child in dist.requirements(&req.extras) {
                    self.visit(&child);
                }
                self.order.push(dist);
            }
        }
    }
}
