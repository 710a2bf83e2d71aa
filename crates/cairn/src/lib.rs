//! The `cairn` command line.
//!
//! Wires the pluggable dispatcher to the commands this binary ships and to
//! whatever distributions advertise under `CAIRN_PATH`:
//!
//! - `npm`, `yarn`: flatten `package.json` across a requirement graph, view
//!   it, write it, and install from it
//! - `null`: run the do-nothing toolchain through every stage
//!
//! Distributions found on the path may add commands of their own; only
//! targets listed in [`catalogue`] can be built by this binary. Artifacts
//! they declare are built through [`artifact::ArtifactRegistry`].

pub mod app;
pub mod artifact;
pub mod catalogue;
pub mod commands;
pub mod driver;
pub mod invoke;
pub mod settings;

use cairn_dispatch::PackageInfo;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{emit, Cairn};
pub use settings::Settings;

/// This binary as reported by `-V`.
pub fn package_info() -> PackageInfo {
    let location = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.display().to_string()));
    PackageInfo {
        name: Some(NAME.to_string()),
        version: Some(VERSION.to_string()),
        location,
    }
}
