// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-modules
//!
//! Module resolution, linking and evaluation for the Spacey runtime.
//!
//! Two module disciplines live side by side in one graph:
//!
//! - **Legacy** modules (`require` / `module.exports`) export a single value
//!   that exists from the moment the module is created. A `require` cycle
//!   sees that value as it is at that point.
//! - **Modern** modules (`import` / `export`) export live bindings. Importers
//!   hold the exporter's binding cell, so later writes are visible, and a
//!   read before initialization fails.
//!
//! Dynamic `import()` goes through an async gateway that shares in-flight
//! work and never completes synchronously.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_modules::{MemoryHost, ModuleEngine, ModuleSource, Value};
//!
//! let host = MemoryHost::new()
//!     .with_module(
//!         "/app/counter.mjs",
//!         ModuleSource::modern()
//!             .export_local("count")
//!             .with_body_fn(|scope| scope.set("count", 1)),
//!     )
//!     .with_module(
//!         "/app/main.mjs",
//!         ModuleSource::modern().import_named("./counter.mjs", "count", "count"),
//!     );
//!
//! let engine = ModuleEngine::new(host);
//! let main = engine.resolve_and_evaluate("/app/main.mjs")?;
//! ```

#![warn(missing_docs)]

pub mod binding;
pub mod body;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod host;
pub mod namespace;
pub mod record;
pub mod resolver;
pub mod scope;
pub mod source;
pub mod specifier;
pub mod store;
pub mod value;

mod dynamic;
mod linker;

pub use binding::{BindingCell, LegacyExports, LiveBinding};
pub use body::{ModuleBody, Script, Statement};
pub use config::EngineConfig;
pub use engine::ModuleEngine;
pub use error::{ModuleError, Result};
pub use graph::ModuleGraph;
pub use host::{FsHost, Manifest, MemoryHost, ModuleHost};
pub use namespace::Namespace;
pub use record::{ExportEntry, ImportEntry, ImportName, ModuleRecord, ModuleStatus};
pub use resolver::{ResolvedModule, Resolver};
pub use scope::ModuleScope;
pub use source::{
    ExportDeclaration, ExportSpecifier, ImportDeclaration, ImportSpecifier, ModuleDescriptor,
    ModuleSource,
};
pub use specifier::{ModuleFormat, ModuleId};
pub use store::ModuleStore;
pub use value::{ObjectRef, Value};

/// Version of spacey-modules
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
