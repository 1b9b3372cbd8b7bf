// src/lib.rs

//! ppkg - a minimalist source-to-binary package manager.
//!
//! Given a declarative recipe, the engine drives a reproducible pipeline
//! (fetch → verify → extract → patch → prepare → build → check → package)
//! producing a single compressed `.ppkg` archive, and can install such
//! archives into, or remove them from, a target root while maintaining a
//! registry of installed packages.
//!
//! # Architecture
//!
//! - Explicit context: configuration, recipe, and log sink are values
//!   passed down, never process globals
//! - Single-threaded, synchronous engine; parallelism lives inside build
//!   subprocesses (`make -j`)
//! - Directory-per-package registry, human-readable, crash-safe at
//!   whole-file granularity

pub mod archive;
pub mod compression;
pub mod config;
mod error;
pub mod fetch;
pub mod hash;
pub mod install;
pub mod package;
pub mod phase;
pub mod pipeline;
pub mod recipe;
pub mod registry;
pub mod remove;
pub mod report;
pub mod strip;

pub use compression::Compression;
pub use config::{Config, ToolchainProfile};
pub use error::{Error, Result};
pub use package::Meta;
pub use phase::{PhaseAction, PhaseKind};
pub use pipeline::BuildRun;
pub use recipe::Recipe;
pub use registry::Registry;
pub use report::{LogReporter, Reporter, SilentReporter};
