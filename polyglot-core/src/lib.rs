//! Polyglot core library: attributes the lines an author added in commit
//! history to programming languages.
//!
//! A [`classify::Classifier`] maps the files of a working tree to languages,
//! and the [`attribution::AttributionEngine`] walks the tree's history page by
//! page, counting the bytes of every added line. The [`flows`] module feeds
//! the engine with local checkouts, fresh clones, or synthetic repositories
//! rebuilt by [`reconstruct::Reconstructor`] from recent activity.

pub mod attribution;
pub mod classify;
pub mod config;
pub mod error;
pub mod flows;
pub mod forge;
pub mod git;
pub mod history;
pub mod materialize;
pub mod progress;
pub mod reconstruct;
pub mod skip;
pub mod types;
