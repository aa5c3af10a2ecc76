// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module namespace objects and export resolution
//!
//! A namespace is a read-only view of a module's public names. It holds no
//! values: every property access resolves the name again and reads through
//! to the exporting binding, so values stay live.

use crate::binding::Binding;
use crate::error::{ModuleError, Result};
use crate::record::{ExportEntry, ImportName, ModuleRecord};
use crate::specifier::{ModuleFormat, ModuleId};
use crate::store::{ModuleStore, WeakStore};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Outcome of resolving an exported name
#[derive(Debug, Clone)]
pub(crate) enum ExportResolution {
    /// The name maps to exactly one binding
    Resolved(Binding),
    /// No export provides the name
    NotFound,
    /// Two `export *` sources provide different bindings for the name
    Ambiguous,
}

/// Resolve `name` exported by `module` to the binding that backs it
pub(crate) fn resolve_export(store: &ModuleStore, module: &ModuleId, name: &str) -> ExportResolution {
    let mut resolve_set = Vec::new();
    resolve_export_inner(store, module, name, &mut resolve_set)
}

fn resolve_export_inner(
    store: &ModuleStore,
    module: &ModuleId,
    name: &str,
    resolve_set: &mut Vec<(ModuleId, String)>,
) -> ExportResolution {
    let Some(record) = store.get(module) else {
        return ExportResolution::NotFound;
    };

    // circular re-export request
    if resolve_set.iter().any(|(m, n)| m == module && n == name) {
        return ExportResolution::NotFound;
    }
    resolve_set.push((module.clone(), name.to_string()));

    if record.format() == ModuleFormat::Legacy {
        return resolve_legacy_export(&record, name);
    }

    let Some(analysis) = record.analysis() else {
        return ExportResolution::NotFound;
    };

    for entry in &analysis.exports {
        match entry {
            ExportEntry::Local {
                export_name,
                local_name,
            } if export_name == name => {
                return match record.cell(local_name) {
                    Some(cell) => ExportResolution::Resolved(Binding::Cell(cell)),
                    None => ExportResolution::NotFound,
                };
            }
            ExportEntry::Indirect {
                export_name,
                module: source,
                import_name,
            } if export_name == name => {
                return match import_name {
                    ImportName::Namespace => {
                        ExportResolution::Resolved(Binding::Namespace(source.clone()))
                    }
                    ImportName::Name(imported) => {
                        resolve_export_inner(store, source, imported, resolve_set)
                    }
                };
            }
            _ => {}
        }
    }

    // `export *` never forwards a default export
    if name == "default" {
        return ExportResolution::NotFound;
    }

    let mut star_resolution: Option<Binding> = None;
    for entry in &analysis.exports {
        let ExportEntry::Star { module: source } = entry else {
            continue;
        };
        match resolve_export_inner(store, source, name, resolve_set) {
            ExportResolution::Ambiguous => return ExportResolution::Ambiguous,
            ExportResolution::NotFound => {}
            ExportResolution::Resolved(binding) => match &star_resolution {
                None => star_resolution = Some(binding),
                Some(existing) if !existing.same_as(&binding) => {
                    return ExportResolution::Ambiguous;
                }
                Some(_) => {}
            },
        }
    }

    star_resolution
        .map(ExportResolution::Resolved)
        .unwrap_or(ExportResolution::NotFound)
}

fn resolve_legacy_export(record: &ModuleRecord, name: &str) -> ExportResolution {
    let Some(exports) = record.legacy_exports() else {
        return ExportResolution::NotFound;
    };

    if name == "default" {
        return ExportResolution::Resolved(Binding::Legacy {
            exports: exports.clone(),
            property: None,
        });
    }

    let hinted = record
        .analysis()
        .is_some_and(|a| a.exports.iter().any(|e| e.export_name() == Some(name)));
    if hinted {
        ExportResolution::Resolved(Binding::Legacy {
            exports: exports.clone(),
            property: Some(name.to_string()),
        })
    } else {
        ExportResolution::NotFound
    }
}

/// Every public name of `module`, including names that `export *` makes
/// ambiguous
pub(crate) fn exported_names(store: &ModuleStore, module: &ModuleId) -> Vec<String> {
    let mut visited = Vec::new();
    let mut names = exported_names_inner(store, module, &mut visited);
    names.sort();
    names.dedup();
    names
}

fn exported_names_inner(
    store: &ModuleStore,
    module: &ModuleId,
    visited: &mut Vec<ModuleId>,
) -> Vec<String> {
    if visited.contains(module) {
        return Vec::new();
    }
    visited.push(module.clone());

    let Some(record) = store.get(module) else {
        return Vec::new();
    };

    let mut names = Vec::new();
    if record.format() == ModuleFormat::Legacy {
        names.push("default".to_string());
    }

    let exports = record.exports();
    for entry in &exports {
        if let Some(name) = entry.export_name() {
            names.push(name.to_string());
        }
    }

    if record.format() == ModuleFormat::Modern {
        for entry in &exports {
            if let ExportEntry::Star { module: source } = entry {
                for name in exported_names_inner(store, source, visited) {
                    if name != "default" && !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
    }

    names
}

/// Module namespace object
#[derive(Clone)]
pub struct Namespace {
    inner: Arc<NamespaceInner>,
}

struct NamespaceInner {
    record: Arc<ModuleRecord>,
    requester: Option<ModuleId>,
    store: WeakStore,
}

impl Namespace {
    pub(crate) fn new(
        record: Arc<ModuleRecord>,
        requester: Option<ModuleId>,
        store: WeakStore,
    ) -> Self {
        Self {
            inner: Arc::new(NamespaceInner {
                record,
                requester,
                store,
            }),
        }
    }

    /// Identifier of the module this namespace exposes
    pub fn id(&self) -> &ModuleId {
        self.inner.record.id()
    }

    /// Format of the module this namespace exposes
    pub fn format(&self) -> ModuleFormat {
        self.inner.record.format()
    }

    /// Module that asked for this namespace, if any
    pub fn requester(&self) -> Option<&ModuleId> {
        self.inner.requester.as_ref()
    }

    /// The store this namespace was built from, as long as it still holds
    /// the same record
    fn store(&self) -> Result<ModuleStore> {
        self.inner
            .store
            .upgrade()
            .filter(|store| {
                store
                    .get(self.id())
                    .is_some_and(|record| Arc::ptr_eq(&record, &self.inner.record))
            })
            .ok_or_else(|| ModuleError::Detached(self.id().clone()))
    }

    /// Read an exported name
    ///
    /// Unknown names read as `undefined`. A name provided by two different
    /// `export *` sources fails with `DuplicateExport`.
    pub fn get(&self, name: &str) -> Result<Value> {
        let store = self.store()?;
        match resolve_export(&store, self.id(), name) {
            ExportResolution::Resolved(binding) => binding.read(&store, self.requester()),
            ExportResolution::NotFound => Ok(Value::Undefined),
            ExportResolution::Ambiguous => Err(ModuleError::DuplicateExport {
                module: self.id().clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Check if `name` is one of the public names
    pub fn contains(&self, name: &str) -> bool {
        self.keys().is_ok_and(|keys| keys.iter().any(|k| k == name))
    }

    /// Public names in sorted order
    pub fn keys(&self) -> Result<Vec<String>> {
        let store = self.store()?;
        Ok(exported_names(&store, self.id()))
    }

    /// Read every public name; failed reads are returned per entry
    pub fn entries(&self) -> Result<Vec<(String, Result<Value>)>> {
        Ok(self
            .keys()?
            .into_iter()
            .map(|key| {
                let value = self.get(&key);
                (key, value)
            })
            .collect())
    }

    /// Snapshot as JSON; unreadable names render as error strings
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (key, value) in self.entries()? {
            let json = match value {
                Ok(value) => value.to_json(),
                Err(err) => serde_json::Value::String(format!("<{}>", err)),
            };
            map.insert(key, json);
        }
        Ok(serde_json::Value::Object(map))
    }

    /// Whether two handles are the same namespace object
    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("module", self.id())
            .field("requester", &self.inner.requester)
            .finish()
    }
}
