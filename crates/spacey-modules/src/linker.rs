// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Linking and evaluation
//!
//! Linking runs in two passes over a graph: every pending modern module
//! first declares a cell for each local export, then imports are bound to
//! the cells they resolve to. A failure rolls every module of the pass back
//! to `Unlinked`. Evaluation walks the same post-order; a module whose body
//! fails is marked `Errored` and its error is cached, while the modules that
//! import it still run and only fail if they read through to it.

use crate::binding::Binding;
use crate::engine::ModuleEngine;
use crate::error::{ModuleError, Result};
use crate::graph::{GraphBuilder, ModuleGraph};
use crate::namespace::{ExportResolution, resolve_export};
use crate::record::{ExportEntry, ImportName, ModuleRecord, ModuleStatus};
use crate::scope::ModuleScope;
use crate::specifier::{ModuleFormat, ModuleId};
use crate::value::Value;
use std::sync::Arc;

/// Drives modules through linking and evaluation
pub(crate) struct Linker<'e> {
    engine: &'e ModuleEngine,
}

impl<'e> Linker<'e> {
    pub(crate) fn new(engine: &'e ModuleEngine) -> Self {
        Self { engine }
    }

    /// Build, link and evaluate the graph rooted at `root`
    ///
    /// Returns the root's cached error if its body failed.
    pub(crate) fn run(&self, root: &ModuleId) -> Result<()> {
        let _agent = self.engine.agent().lock();

        let graph = GraphBuilder::new(self.engine).build(root)?;
        self.link(&graph)?;
        self.evaluate(&graph);

        match self.engine.store().get(root).and_then(|r| r.error()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Bind every import of the pending modules in `graph`
    pub(crate) fn link(&self, graph: &ModuleGraph) -> Result<()> {
        let store = self.engine.store();
        let pending: Vec<Arc<ModuleRecord>> = graph
            .order
            .iter()
            .filter_map(|id| store.get(id))
            .filter(|r| r.format() == ModuleFormat::Modern && r.status() == ModuleStatus::Unlinked)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        for record in &pending {
            record.set_status(ModuleStatus::Linking);
            record.reset_environment();
            for entry in record.exports() {
                if let ExportEntry::Local { local_name, .. } = entry {
                    if record.cell(&local_name).is_none() {
                        record.declare(&local_name);
                    }
                }
            }
        }

        match pending.iter().try_for_each(|record| self.bind_imports(record)) {
            Ok(()) => {
                for record in &pending {
                    record.set_status(ModuleStatus::Linked);
                }
                tracing::debug!("Linked {} modules from {}", pending.len(), graph.root);
                Ok(())
            }
            Err(err) => {
                tracing::debug!("Linking {} failed: {}", graph.root, err);
                for record in &pending {
                    record.reset_environment();
                    record.set_status(ModuleStatus::Unlinked);
                }
                Err(err)
            }
        }
    }

    fn bind_imports(&self, record: &ModuleRecord) -> Result<()> {
        let Some(analysis) = record.analysis() else {
            return Ok(());
        };

        for import in &analysis.imports {
            let binding = match &import.import_name {
                ImportName::Namespace => Binding::Namespace(import.module.clone()),
                ImportName::Name(name) => self.resolve_import(&import.module, name)?,
            };
            record.bind(&import.local_name, binding);
        }

        // re-exports must resolve too, even if nothing imports them yet
        for entry in &analysis.exports {
            if let ExportEntry::Indirect {
                module,
                import_name: ImportName::Name(name),
                ..
            } = entry
            {
                self.resolve_import(module, name)?;
            }
        }

        Ok(())
    }

    fn resolve_import(&self, module: &ModuleId, name: &str) -> Result<Binding> {
        match resolve_export(self.engine.store(), module, name) {
            ExportResolution::Resolved(binding) => Ok(binding),
            ExportResolution::NotFound => Err(ModuleError::MissingExport {
                module: module.clone(),
                name: name.to_string(),
            }),
            ExportResolution::Ambiguous => Err(ModuleError::DuplicateExport {
                module: module.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Evaluate every module of `graph` that is ready, in post-order
    pub(crate) fn evaluate(&self, graph: &ModuleGraph) {
        let store = self.engine.store();
        for id in &graph.order {
            let Some(record) = store.get(id) else {
                continue;
            };
            match (record.format(), record.status()) {
                (ModuleFormat::Modern, ModuleStatus::Linked) => self.evaluate_modern(&record),
                (ModuleFormat::Legacy, ModuleStatus::Unlinked) => {
                    if let Err(err) = self.evaluate_legacy(&record) {
                        tracing::warn!("Failed to load {}: {}", id, err);
                    }
                }
                _ => {}
            }
        }
    }

    fn evaluate_modern(&self, record: &Arc<ModuleRecord>) {
        let Some(source) = record.source() else {
            return;
        };

        record.set_status(ModuleStatus::Evaluating);
        tracing::trace!("Evaluating {}", record.id());

        let mut scope = ModuleScope::new(self.engine, Arc::clone(record));
        match source.body.evaluate(&mut scope) {
            Ok(()) => record.set_status(ModuleStatus::Evaluated),
            Err(err) => {
                tracing::debug!("{} failed: {}", record.id(), err);
                record.fail(ModuleError::evaluation(record.id(), err));
            }
        }
    }

    /// Run a legacy module's body; failures are cached on the record
    fn evaluate_legacy(&self, record: &Arc<ModuleRecord>) -> Result<()> {
        let graph = GraphBuilder::new(self.engine);
        graph.analyze(record)?;
        let source = graph.ensure_source(record)?;

        let Some(exports) = record.legacy_exports() else {
            return Err(ModuleError::NotLegacy(record.id().clone()));
        };

        record.set_status(ModuleStatus::Evaluating);
        exports.begin();
        tracing::trace!("Evaluating {}", record.id());

        let mut scope = ModuleScope::new(self.engine, Arc::clone(record));
        match source.body.evaluate(&mut scope) {
            Ok(()) => record.set_status(ModuleStatus::Evaluated),
            Err(err) => {
                tracing::debug!("{} failed: {}", record.id(), err);
                record.fail(ModuleError::evaluation(record.id(), err));
            }
        }
        Ok(())
    }

    /// Synchronous load on behalf of `referrer`
    ///
    /// A legacy module that is still running (a `require` cycle) yields its
    /// exports as they are right now.
    pub(crate) fn require(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<Value> {
        let resolved = self.engine.resolve(specifier, referrer)?;
        let _agent = self.engine.agent().lock();

        let store = self.engine.store();
        let record = store.get_or_create(&resolved.id, resolved.format);

        let Some(exports) = record.legacy_exports() else {
            self.run(record.id())?;
            return store.namespace(record.id(), referrer).map(Value::Namespace);
        };

        match record.status() {
            ModuleStatus::Evaluating | ModuleStatus::Evaluated => Ok(exports.get()),
            ModuleStatus::Errored => Err(record
                .error()
                .unwrap_or_else(|| ModuleError::Detached(record.id().clone()))),
            _ => {
                self.evaluate_legacy(&record)?;
                match record.error() {
                    Some(err) => Err(err),
                    None => Ok(exports.get()),
                }
            }
        }
    }
}
