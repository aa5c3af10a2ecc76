// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module graph construction
//!
//! Walks static imports depth-first from a root, loading and analyzing each
//! module once, and produces the post-order that linking and evaluation
//! follow. The walk keeps an explicit stack, so deep graphs never grow the
//! call stack. Legacy modules are leaves: their dependencies are only known
//! when their body calls `require`.

use crate::engine::ModuleEngine;
use crate::error::{ModuleError, Result};
use crate::record::{Analysis, ExportEntry, ImportEntry, ImportName, ModuleRecord};
use crate::source::{DEFAULT_LOCAL, ExportSpecifier, ImportSpecifier, ModuleSource};
use crate::specifier::{ModuleFormat, ModuleId};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Dependency graph rooted at one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleGraph {
    /// Root module
    pub root: ModuleId,
    /// Modules in post-order: dependencies before dependents
    pub order: Vec<ModuleId>,
    /// Direct dependencies of each module, in request order
    pub edges: BTreeMap<ModuleId, Vec<ModuleId>>,
    /// Edges that close a cycle, as `(importer, imported)`
    pub back_edges: Vec<(ModuleId, ModuleId)>,
}

impl ModuleGraph {
    fn new(root: ModuleId) -> Self {
        Self {
            root,
            order: Vec::new(),
            edges: BTreeMap::new(),
            back_edges: Vec::new(),
        }
    }

    /// Number of modules in the graph
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Check if a module is part of the graph
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.edges.contains_key(id)
    }

    /// Direct dependencies of a module
    pub fn dependencies(&self, id: &ModuleId) -> &[ModuleId] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any import cycle was found
    pub fn is_cyclic(&self) -> bool {
        !self.back_edges.is_empty()
    }

    /// Position of a module in evaluation order
    pub fn position(&self, id: &ModuleId) -> Option<usize> {
        self.order.iter().position(|m| m == id)
    }
}

struct Frame {
    id: ModuleId,
    deps: Vec<ModuleId>,
    next: usize,
}

/// Builds graphs against an engine's store
pub(crate) struct GraphBuilder<'e> {
    engine: &'e ModuleEngine,
}

impl<'e> GraphBuilder<'e> {
    pub(crate) fn new(engine: &'e ModuleEngine) -> Self {
        Self { engine }
    }

    /// Build the graph reachable from `root`
    pub(crate) fn build(&self, root: &ModuleId) -> Result<ModuleGraph> {
        let mut graph = ModuleGraph::new(root.clone());
        let mut in_progress: HashSet<ModuleId> = HashSet::new();
        let mut done: HashSet<ModuleId> = HashSet::new();
        let mut stack: Vec<Frame> = Vec::new();

        let deps = self.analyze(&self.record(root)?)?;
        in_progress.insert(root.clone());
        stack.push(Frame {
            id: root.clone(),
            deps,
            next: 0,
        });

        while let Some(frame) = stack.last_mut() {
            if let Some(dep) = frame.deps.get(frame.next).cloned() {
                frame.next += 1;

                if in_progress.contains(&dep) {
                    tracing::trace!("Cycle: {} -> {}", frame.id, dep);
                    graph.back_edges.push((frame.id.clone(), dep));
                    continue;
                }
                if done.contains(&dep) {
                    continue;
                }

                let record = self.record(&dep)?;
                // settled modules are leaves
                if record.status().is_settled() {
                    done.insert(dep.clone());
                    graph.edges.insert(dep.clone(), record.requested());
                    graph.order.push(dep);
                    continue;
                }

                let deps = self.analyze(&record)?;
                in_progress.insert(dep.clone());
                stack.push(Frame {
                    id: dep,
                    deps,
                    next: 0,
                });
            } else if let Some(frame) = stack.pop() {
                in_progress.remove(&frame.id);
                done.insert(frame.id.clone());
                graph.edges.insert(frame.id.clone(), frame.deps);
                graph.order.push(frame.id);
            }
        }

        tracing::debug!(
            "Built graph for {}: {} modules, {} cycles",
            root,
            graph.len(),
            graph.back_edges.len()
        );
        Ok(graph)
    }

    fn record(&self, id: &ModuleId) -> Result<Arc<ModuleRecord>> {
        self.engine
            .store()
            .get(id)
            .ok_or_else(|| ModuleError::Detached(id.clone()))
    }

    /// Load and analyze a module once; returns its static dependencies
    pub(crate) fn analyze(&self, record: &Arc<ModuleRecord>) -> Result<Vec<ModuleId>> {
        if let Some(analysis) = record.analysis() {
            return Ok(match record.format() {
                ModuleFormat::Modern => analysis.requested.clone(),
                ModuleFormat::Legacy => Vec::new(),
            });
        }

        let source = self.ensure_source(record)?;
        let analysis = match record.format() {
            ModuleFormat::Legacy => Self::legacy_hints(&source),
            ModuleFormat::Modern => self.analyze_modern(record.id(), &source)?,
        };

        let requested = match record.format() {
            ModuleFormat::Modern => analysis.requested.clone(),
            ModuleFormat::Legacy => Vec::new(),
        };
        record.set_analysis(Arc::new(analysis));
        Ok(requested)
    }

    pub(crate) fn ensure_source(&self, record: &ModuleRecord) -> Result<Arc<ModuleSource>> {
        if let Some(source) = record.source() {
            return Ok(source);
        }

        let source = self.engine.host().load_source(record.id())?;
        tracing::debug!("Loaded {}", record.id());
        record.set_source(Arc::clone(&source));
        Ok(source)
    }

    fn legacy_hints(source: &ModuleSource) -> Analysis {
        let exports = source
            .exports
            .iter()
            .filter(|decl| decl.from.is_none())
            .flat_map(|decl| decl.exports.iter())
            .filter_map(|spec| match spec {
                ExportSpecifier::Named { local, exported } => {
                    let name = exported.clone().unwrap_or_else(|| local.clone());
                    Some(ExportEntry::Local {
                        export_name: name.clone(),
                        local_name: name,
                    })
                }
                _ => None,
            })
            .collect();

        Analysis {
            exports,
            ..Analysis::default()
        }
    }

    fn request(
        &self,
        specifier: &str,
        referrer: &ModuleId,
        requested: &mut Vec<ModuleId>,
    ) -> Result<ModuleId> {
        let resolved = self.engine.resolve(specifier, Some(referrer))?;
        self.engine
            .store()
            .get_or_create(&resolved.id, resolved.format);
        if !requested.contains(&resolved.id) {
            requested.push(resolved.id.clone());
        }
        Ok(resolved.id)
    }

    fn analyze_modern(&self, id: &ModuleId, source: &ModuleSource) -> Result<Analysis> {
        let mut analysis = Analysis::default();

        for decl in &source.imports {
            let module = self.request(&decl.specifier, id, &mut analysis.requested)?;
            for spec in &decl.imports {
                let import_name = match spec {
                    ImportSpecifier::Default { .. } => ImportName::Name("default".to_string()),
                    ImportSpecifier::Named { imported, .. } => ImportName::Name(imported.clone()),
                    ImportSpecifier::Namespace { .. } => ImportName::Namespace,
                };
                analysis.imports.push(ImportEntry {
                    module: module.clone(),
                    import_name,
                    local_name: spec.local_name().to_string(),
                });
            }
        }

        for decl in &source.exports {
            let from = match &decl.from {
                Some(specifier) => Some(self.request(specifier, id, &mut analysis.requested)?),
                None => None,
            };

            for spec in &decl.exports {
                let entry = match (spec, &from) {
                    (ExportSpecifier::Default, None) => ExportEntry::Local {
                        export_name: "default".to_string(),
                        local_name: DEFAULT_LOCAL.to_string(),
                    },
                    (ExportSpecifier::Default, Some(module)) => ExportEntry::Indirect {
                        export_name: "default".to_string(),
                        module: module.clone(),
                        import_name: ImportName::Name("default".to_string()),
                    },
                    (ExportSpecifier::Named { local, exported }, None) => {
                        let export_name = exported.clone().unwrap_or_else(|| local.clone());
                        // exporting an imported name re-exports the original binding
                        match analysis.imports.iter().find(|i| &i.local_name == local) {
                            Some(import) => ExportEntry::Indirect {
                                export_name,
                                module: import.module.clone(),
                                import_name: import.import_name.clone(),
                            },
                            None => ExportEntry::Local {
                                export_name,
                                local_name: local.clone(),
                            },
                        }
                    }
                    (ExportSpecifier::Named { local, exported }, Some(module)) => {
                        ExportEntry::Indirect {
                            export_name: exported.clone().unwrap_or_else(|| local.clone()),
                            module: module.clone(),
                            import_name: ImportName::Name(local.clone()),
                        }
                    }
                    (ExportSpecifier::All, Some(module)) => ExportEntry::Star {
                        module: module.clone(),
                    },
                    (ExportSpecifier::AllAs { exported }, Some(module)) => ExportEntry::Indirect {
                        export_name: exported.clone(),
                        module: module.clone(),
                        import_name: ImportName::Namespace,
                    },
                    (ExportSpecifier::All | ExportSpecifier::AllAs { .. }, None) => {
                        return Err(ModuleError::Malformed {
                            module: id.clone(),
                            reason: "`export *` without a source module".to_string(),
                        });
                    }
                };

                if let Some(name) = entry.export_name() {
                    if analysis.exports.iter().any(|e| e.export_name() == Some(name)) {
                        return Err(ModuleError::DuplicateExport {
                            module: id.clone(),
                            name: name.to_string(),
                        });
                    }
                }
                analysis.exports.push(entry);
            }
        }

        Ok(analysis)
    }

    /// Fetch the sources of every module reachable from `root` through the
    /// host's async path, one breadth-first level at a time
    pub(crate) async fn prefetch(&self, root: &ModuleId) -> Result<()> {
        let store = self.engine.store();
        let mut seen: HashSet<ModuleId> = HashSet::from([root.clone()]);
        let mut frontier = vec![root.clone()];

        while !frontier.is_empty() {
            let records: Vec<Arc<ModuleRecord>> = frontier
                .drain(..)
                .filter_map(|id| store.get(&id))
                .filter(|record| !record.status().is_settled())
                .collect();

            let fetches = records.iter().map(|record| async move {
                if record.source().is_none() {
                    let source = self.engine.host().fetch_source(record.id()).await?;
                    record.set_source(source);
                }
                Ok::<_, ModuleError>(())
            });
            futures::future::try_join_all(fetches).await?;

            for record in records {
                if record.format() == ModuleFormat::Legacy {
                    continue;
                }
                let Some(source) = record.source() else {
                    continue;
                };
                for specifier in source.specifiers() {
                    let resolved = self.engine.resolve(specifier, Some(record.id()))?;
                    store.get_or_create(&resolved.id, resolved.format);
                    if seen.insert(resolved.id.clone()) {
                        frontier.push(resolved.id);
                    }
                }
            }
        }

        Ok(())
    }
}
