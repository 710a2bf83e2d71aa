//! Staged build pipeline.
//!
//! A [`Toolchain`] supplies stage actions; a [`Pipeline`] runs them in order,
//! surrounding each stage with `before_<stage>` and `after_<stage>` hook
//! groups and finishing with the `cleanup` group, which always runs once a
//! run has started.
//!
//! Any action or hook may stop the run with a [`Halt`]:
//!
//! - [`Halt::Abort`]: a precondition was not met
//! - [`Halt::Cancel`]: the user declined
//! - [`Halt::Failure`]: anything unexpected
//!
//! ```rust
//! use cairn_toolchain::{Context, Event, NullToolchain, Pipeline, Stage, keys};
//!
//! let outcome = Pipeline::new(&NullToolchain)
//!     .without_export_check()
//!     .on(Event::After(Stage::Link), |ctx| {
//!         ctx.insert("checked", true);
//!         Ok(())
//!     })
//!     .run(Context::new().with(keys::DEBUG, 0));
//!
//! assert!(outcome.is_done());
//! assert_eq!(outcome.context.get_str("link"), Some("linked"));
//! ```

mod context;
mod error;
mod events;
mod export;
mod null;
mod pipeline;

pub use context::{keys, Context};
pub use error::{Halt, Halted};
pub use events::{Event, HookFn, Hooks, Stage};
pub use export::{prepare_export_location, ExportTargetCheck};
pub use null::NullToolchain;
pub use pipeline::{Outcome, Pipeline, State, Toolchain};
