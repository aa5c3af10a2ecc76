// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The module engine
//!
//! Owns the host, the resolver, the module store and the agent lock that
//! serializes linking and evaluation. Cloning an engine is cheap; clones
//! share all state.

use crate::config::EngineConfig;
use crate::dynamic::DynamicImports;
use crate::error::Result;
use crate::graph::{GraphBuilder, ModuleGraph};
use crate::host::ModuleHost;
use crate::linker::Linker;
use crate::namespace::Namespace;
use crate::record::{ModuleRecord, ModuleStatus};
use crate::resolver::{ResolvedModule, Resolver};
use crate::specifier::ModuleId;
use crate::store::ModuleStore;
use crate::value::Value;
use parking_lot::ReentrantMutex;
use std::sync::Arc;

/// Module resolution, linking and evaluation engine
#[derive(Clone)]
pub struct ModuleEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    host: Arc<dyn ModuleHost>,
    resolver: Resolver,
    store: ModuleStore,
    agent: ReentrantMutex<()>,
    dynamic: DynamicImports,
}

impl ModuleEngine {
    /// Create an engine with the default configuration
    pub fn new(host: impl ModuleHost + 'static) -> Self {
        Self::with_config(host, EngineConfig::default())
    }

    /// Create an engine with a configuration
    pub fn with_config(host: impl ModuleHost + 'static, config: EngineConfig) -> Self {
        Self::with_shared_host(Arc::new(host), config)
    }

    /// Create an engine over a host shared with other owners
    pub fn with_shared_host(host: Arc<dyn ModuleHost>, config: EngineConfig) -> Self {
        tracing::debug!("Creating module engine (base: {})", config.base_dir);
        Self {
            inner: Arc::new(EngineInner {
                resolver: Resolver::new(&config),
                config,
                host,
                store: ModuleStore::new(),
                agent: ReentrantMutex::new(()),
                dynamic: DynamicImports::default(),
            }),
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The host modules are loaded from
    pub fn host(&self) -> &Arc<dyn ModuleHost> {
        &self.inner.host
    }

    /// The module store
    pub fn store(&self) -> &ModuleStore {
        &self.inner.store
    }

    pub(crate) fn agent(&self) -> &ReentrantMutex<()> {
        &self.inner.agent
    }

    pub(crate) fn dynamic(&self) -> &DynamicImports {
        &self.inner.dynamic
    }

    /// Resolve a specifier without loading it
    pub fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<ResolvedModule> {
        self.inner
            .resolver
            .resolve(specifier, referrer, self.inner.host.as_ref())
    }

    /// Load, link and evaluate an entry module and return its namespace
    ///
    /// The entry resolves against the configured base directory.
    pub fn resolve_and_evaluate(&self, entry: &str) -> Result<Namespace> {
        self.resolve_and_evaluate_from(entry, None)
    }

    /// Like [`resolve_and_evaluate`](Self::resolve_and_evaluate), on behalf
    /// of `referrer`
    pub fn resolve_and_evaluate_from(
        &self,
        specifier: &str,
        referrer: Option<&ModuleId>,
    ) -> Result<Namespace> {
        let resolved = self.resolve(specifier, referrer)?;
        self.store().get_or_create(&resolved.id, resolved.format);

        Linker::new(self).run(&resolved.id)?;
        self.store().namespace(&resolved.id, referrer)
    }

    /// Synchronously load a module the way `require` does
    ///
    /// Legacy modules yield their exports value; modern modules yield their
    /// namespace.
    pub fn require_legacy(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<Value> {
        Linker::new(self).require(specifier, referrer)
    }

    /// Build the dependency graph of an entry without evaluating it
    pub fn graph(&self, entry: &str) -> Result<ModuleGraph> {
        let resolved = self.resolve(entry, None)?;
        self.store().get_or_create(&resolved.id, resolved.format);

        let _agent = self.agent().lock();
        GraphBuilder::new(self).build(&resolved.id)
    }

    /// Record of a module, if the engine has seen it
    pub fn record(&self, id: &ModuleId) -> Option<Arc<ModuleRecord>> {
        self.store().get(id)
    }

    /// Status of a module, if the engine has seen it
    pub fn status(&self, id: &ModuleId) -> Option<ModuleStatus> {
        self.record(id).map(|record| record.status())
    }

    /// Forget every module and memoized resolution
    ///
    /// Namespaces handed out earlier become detached.
    pub fn reset(&self) {
        let _agent = self.agent().lock();
        self.inner.store.clear();
        self.inner.resolver.clear();
        tracing::debug!("Engine reset");
    }
}

impl std::fmt::Debug for ModuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEngine")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}
