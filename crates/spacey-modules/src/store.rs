// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module store
//!
//! Maps canonical identifiers to records, and caches namespace objects so a
//! requester always sees the same namespace for the same module.

use crate::error::{ModuleError, Result};
use crate::namespace::Namespace;
use crate::record::ModuleRecord;
use crate::specifier::{ModuleFormat, ModuleId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

type NamespaceKey = (ModuleId, Option<ModuleId>);

/// Shared store of module records
#[derive(Clone, Default)]
pub struct ModuleStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    maps: RwLock<StoreMaps>,
}

#[derive(Default)]
struct StoreMaps {
    records: HashMap<ModuleId, Arc<ModuleRecord>>,
    namespaces: HashMap<NamespaceKey, Namespace>,
}

impl ModuleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record by identifier
    pub fn get(&self, id: &ModuleId) -> Option<Arc<ModuleRecord>> {
        self.inner.maps.read().records.get(id).cloned()
    }

    /// Get the record for `id`, creating it with `format` if absent
    ///
    /// The format of an existing record never changes.
    pub fn get_or_create(&self, id: &ModuleId, format: ModuleFormat) -> Arc<ModuleRecord> {
        if let Some(record) = self.get(id) {
            return record;
        }

        let mut maps = self.inner.maps.write();
        Arc::clone(maps.records.entry(id.clone()).or_insert_with(|| {
            tracing::trace!("Creating {} record for {}", format, id);
            Arc::new(ModuleRecord::new(id.clone(), format))
        }))
    }

    /// Check if a record exists
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.inner.maps.read().records.contains_key(id)
    }

    /// All known identifiers, sorted
    pub fn ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.inner.maps.read().records.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.inner.maps.read().records.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.inner.maps.read().records.is_empty()
    }

    /// Drop every record and namespace
    pub fn clear(&self) {
        let mut maps = self.inner.maps.write();
        maps.records.clear();
        maps.namespaces.clear();
    }

    /// The namespace of `id` as seen by `requester`
    ///
    /// Repeated calls with the same pair return the same object.
    pub fn namespace(&self, id: &ModuleId, requester: Option<&ModuleId>) -> Result<Namespace> {
        let key = (id.clone(), requester.cloned());
        if let Some(ns) = self.inner.maps.read().namespaces.get(&key) {
            return Ok(ns.clone());
        }

        let mut maps = self.inner.maps.write();
        let record = maps
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| ModuleError::Detached(id.clone()))?;
        let ns = maps
            .namespaces
            .entry(key)
            .or_insert_with(|| Namespace::new(record, requester.cloned(), self.downgrade()));
        Ok(ns.clone())
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }
}

impl std::fmt::Debug for ModuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleStore")
            .field("modules", &self.ids())
            .finish()
    }
}

/// Non-owning handle to a store, held by namespaces
#[derive(Clone)]
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<ModuleStore> {
        self.0.upgrade().map(|inner| ModuleStore { inner })
    }
}
