//! Distribution metadata and dependency flattening.
//!
//! A distribution is an installed component described by a `dist.json`
//! descriptor: its name, version, requirements, extras, and the commands it
//! advertises. Alongside the descriptor it may ship metadata files such as
//! `package.json` whose dependency maps get merged across the requirement
//! graph by [`Flattener`].
//!
//! ```rust
//! use cairn_dist::{Distribution, DistributionSet, Flattener, WorkingSet};
//!
//! let ws = DistributionSet::new()
//!     .with(Distribution::new("lib", "1.0")
//!         .with_metadata("package.json", r#"{"dependencies": {"jquery": "~3.1.0"}}"#))
//!     .with(Distribution::new("app", "1.0").with_requires(["lib"]));
//!
//! let deps = Flattener::new(&ws, "package.json").flatten_dist(ws.find("app"));
//! assert_eq!(deps["dependencies"]["jquery"], "~3.1.0");
//! ```

mod distribution;
mod flatten;
mod json;
mod requirement;
mod working_set;

pub use distribution::{DistError, Distribution, DIST_FILE};
pub use flatten::{extras_keys, flatten_extras, merge_layers, Flattener, DEFAULT_DEP_KEYS, EXTRAS_FILE};
pub use json::{canonicalize, to_stable_string, write_stable};
pub use requirement::{normalize, parse_requirements, MalformedNames, MalformedRequirement, Requirement};
pub use working_set::{resolve, DistributionSet, WorkingSet};
