//! `mdpipe_core` is the engine behind [mdpipe](https://github.com/mdpipe/mdpipe), a preprocessor which keeps markdown documentation up to date. It provides a line oriented text editor, a markdown document layer with pure mutations, and a processor which runs tasks over a tree of files in dependency order.
//!
//! ## Layers
//!
//! ```text
//! Editor     (rewrites lines by coordinates)
//!   <- Document + Mutation (markdown aware rewrites: move, relink, unlink, inline references)
//!   <- Processor (files, dependencies, tasks, transactions)
//!   <- Preprocess (instructions such as `[include:file]: ./file.md`)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: configuration loading from `mdpipe.toml`.
//! - [`links`]: link syntax helpers and url predicates.
//! - [`paths`]: lexical path helpers.
//! - [`preprocess`]: the preprocess task and its instructions.
//!
//! ## Key Types
//!
//! - [`Editor`]: immutable text rewritten through [`Change`]s.
//! - [`Document`]: a parsed markdown document.
//! - [`Mutation`]: a transformation of a [`Document`].
//! - [`Processor`]: the entry point which runs [`Task`]s over files.
//! - [`Resolver`]: gives tasks access to other files, processing them first.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use mdpipe_core::MdpipeConfig;
//!
//! let root = Path::new(".");
//! let config = MdpipeConfig::load(root).unwrap().unwrap_or_default();
//! let changes = config
//! 	.processor()
//! 	.run(root, config.output(root).as_deref())
//! 	.unwrap();
//!
//! for change in changes {
//! 	println!("updated {}", change.path.display());
//! }
//! ```

pub use config::*;
pub use coordinate::*;
pub use dependency::*;
pub use document::*;
pub use editor::*;
pub use error::*;
pub use events::*;
pub use executor::*;
pub use filesystem::*;
pub use location::*;
pub use metadata::*;
pub use mutation::*;
pub use processor::*;
pub use resolver::*;
pub use task::*;

pub mod config;
mod coordinate;
mod dependency;
mod document;
mod editor;
#[allow(unused_assignments)]
mod error;
mod events;
mod executor;
mod filesystem;
pub mod links;
mod location;
mod metadata;
mod mutation;
pub(crate) mod mutations;
pub mod paths;
pub mod preprocess;
mod processor;
mod resolver;
mod task;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
