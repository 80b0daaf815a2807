#![warn(clippy::pedantic)]
// Binary crate with internal library; all callers are us.
// These doc lints are for public API documentation, not applicable here.
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod ancestors;
pub mod cache;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod host;
pub mod lint;
pub mod package;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod search_paths;
pub mod snapshot;
pub mod vfs;
pub mod walker;
