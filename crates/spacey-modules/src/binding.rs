// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Binding cells and environments
//!
//! Modern exports are live: an importer holds the exporter's cell, never a
//! copy of its value. A cell starts uninitialized and reading it before the
//! owner's body writes it fails with `BindingNotInitialized`. Once the owner
//! fails evaluation its cells are poisoned and every read returns the cached
//! error.

use crate::error::{ModuleError, Result};
use crate::specifier::ModuleId;
use crate::store::ModuleStore;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Evaluation failure shared by every binding of one module
#[derive(Debug, Clone, Default)]
pub(crate) struct Poison(Arc<OnceLock<ModuleError>>);

impl Poison {
    pub(crate) fn set(&self, err: ModuleError) {
        let _ = self.0.set(err);
    }

    pub(crate) fn get(&self) -> Option<&ModuleError> {
        self.0.get()
    }
}

/// A mutable slot owned by exactly one module
#[derive(Clone)]
pub struct BindingCell {
    inner: Arc<CellInner>,
}

struct CellInner {
    owner: ModuleId,
    name: String,
    slot: RwLock<Option<Value>>,
    poison: Poison,
}

impl BindingCell {
    pub(crate) fn new(owner: ModuleId, name: impl Into<String>, poison: Poison) -> Self {
        Self {
            inner: Arc::new(CellInner {
                owner,
                name: name.into(),
                slot: RwLock::new(None),
                poison,
            }),
        }
    }

    /// Module that declared this binding
    pub fn owner(&self) -> &ModuleId {
        &self.inner.owner
    }

    /// Local name in the owning module
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the owner has written this binding yet
    pub fn is_initialized(&self) -> bool {
        self.inner.slot.read().is_some()
    }

    /// Read the current value
    pub fn read(&self) -> Result<Value> {
        if let Some(err) = self.inner.poison.get() {
            return Err(err.clone());
        }
        self.inner
            .slot
            .read()
            .clone()
            .ok_or_else(|| ModuleError::BindingNotInitialized {
                module: self.inner.owner.clone(),
                name: self.inner.name.clone(),
            })
    }

    pub(crate) fn write(&self, value: Value) {
        *self.inner.slot.write() = Some(value);
    }

    /// Whether two handles refer to the same cell
    pub fn ptr_eq(&self, other: &BindingCell) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for BindingCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingCell")
            .field("owner", &self.inner.owner)
            .field("name", &self.inner.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// The single exports value of a legacy module
///
/// Created as an empty object when the record is created, so a circular
/// `require` can observe it before the body finishes.
#[derive(Clone)]
pub struct LegacyExports {
    inner: Arc<LegacyInner>,
}

struct LegacyInner {
    owner: ModuleId,
    value: RwLock<Value>,
    started: AtomicBool,
    poison: Poison,
}

impl LegacyExports {
    pub(crate) fn new(owner: ModuleId, poison: Poison) -> Self {
        Self {
            inner: Arc::new(LegacyInner {
                owner,
                value: RwLock::new(Value::object()),
                started: AtomicBool::new(false),
                poison,
            }),
        }
    }

    /// Current exports value, whatever state the body is in
    pub fn get(&self) -> Value {
        self.inner.value.read().clone()
    }

    pub(crate) fn set(&self, value: Value) {
        *self.inner.value.write() = value;
    }

    pub(crate) fn begin(&self) {
        self.inner.started.store(true, Ordering::Release);
    }

    /// Whether the body has started running
    pub fn has_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Read the exports value as seen through an import binding
    pub fn read(&self) -> Result<Value> {
        self.read_property(None)
    }

    /// Read the exports value, or one of its properties
    pub fn read_property(&self, property: Option<&str>) -> Result<Value> {
        if let Some(err) = self.inner.poison.get() {
            return Err(err.clone());
        }
        if !self.has_started() {
            return Err(ModuleError::BindingNotInitialized {
                module: self.inner.owner.clone(),
                name: property.unwrap_or("default").to_string(),
            });
        }

        let value = self.get();
        match property {
            None => Ok(value),
            Some(name) => Ok(value
                .as_object()
                .and_then(|obj| obj.get(name))
                .unwrap_or_default()),
        }
    }

    fn ptr_eq(&self, other: &LegacyExports) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// What an environment name refers to
#[derive(Clone)]
pub enum Binding {
    /// A cell declared by some module
    Cell(BindingCell),
    /// The namespace object of a module (`import * as ns`)
    Namespace(ModuleId),
    /// A legacy module's exports value, or one property of it
    Legacy {
        /// The exporting module's exports handle
        exports: LegacyExports,
        /// Property read through, or `None` for the whole value
        property: Option<String>,
    },
}

impl Binding {
    /// Read through the binding on behalf of `requester`
    pub(crate) fn read(&self, store: &ModuleStore, requester: Option<&ModuleId>) -> Result<Value> {
        match self {
            Binding::Cell(cell) => cell.read(),
            Binding::Namespace(module) => store.namespace(module, requester).map(Value::Namespace),
            Binding::Legacy { exports, property } => exports.read_property(property.as_deref()),
        }
    }

    /// Whether two bindings resolve to the same slot
    pub(crate) fn same_as(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Cell(a), Binding::Cell(b)) => a.ptr_eq(b),
            (Binding::Namespace(a), Binding::Namespace(b)) => a == b,
            (
                Binding::Legacy {
                    exports: a,
                    property: pa,
                },
                Binding::Legacy {
                    exports: b,
                    property: pb,
                },
            ) => a.ptr_eq(b) && pa == pb,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Cell(cell) => write!(f, "Cell({}:{})", cell.owner(), cell.name()),
            Binding::Namespace(module) => write!(f, "Namespace({})", module),
            Binding::Legacy { exports, property } => match property {
                Some(p) => write!(f, "Legacy({}.{})", exports.inner.owner, p),
                None => write!(f, "Legacy({})", exports.inner.owner),
            },
        }
    }
}

/// Per-module map from local name to binding
#[derive(Debug, Default)]
pub(crate) struct BindingEnvironment {
    bindings: HashMap<String, Binding>,
}

impl BindingEnvironment {
    pub(crate) fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn clear(&mut self) {
        self.bindings.clear();
    }
}

/// A binding detached from the module body that obtained it
///
/// Reading it later observes the current value of the underlying slot.
#[derive(Clone)]
pub struct LiveBinding {
    binding: Binding,
    store: ModuleStore,
    requester: ModuleId,
}

impl LiveBinding {
    pub(crate) fn new(binding: Binding, store: ModuleStore, requester: ModuleId) -> Self {
        Self {
            binding,
            store,
            requester,
        }
    }

    /// Read the current value
    pub fn read(&self) -> Result<Value> {
        self.binding.read(&self.store, Some(&self.requester))
    }

    /// Write the binding; only the declaring module may do so
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        match &self.binding {
            Binding::Cell(cell) if cell.owner() == &self.requester => {
                cell.write(value.into());
                Ok(())
            }
            _ => Err(ModuleError::ImmutableBinding {
                module: self.requester.clone(),
                name: self.name(),
            }),
        }
    }

    fn name(&self) -> String {
        match &self.binding {
            Binding::Cell(cell) => cell.name().to_string(),
            Binding::Namespace(module) => module.to_string(),
            Binding::Legacy { property, .. } => {
                property.clone().unwrap_or_else(|| "default".to_string())
            }
        }
    }
}

impl std::fmt::Debug for LiveBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveBinding")
            .field("binding", &self.binding)
            .field("requester", &self.requester)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(name: &str) -> (BindingCell, Poison) {
        let poison = Poison::default();
        (BindingCell::new(ModuleId::new("/a.mjs"), name, poison.clone()), poison)
    }

    #[test]
    fn test_uninitialized_read_fails() {
        let (cell, _) = cell("x");
        let err = cell.read().unwrap_err();
        assert!(matches!(err, ModuleError::BindingNotInitialized { ref name, .. } if name == "x"));

        cell.write(Value::from(1));
        assert_eq!(cell.read().unwrap(), Value::from(1));
    }

    #[test]
    fn test_poisoned_cell_returns_cached_error() {
        let (cell, poison) = cell("x");
        cell.write(Value::from(1));
        poison.set(ModuleError::thrown("boom"));

        assert_eq!(cell.read().unwrap_err().to_string(), "boom");
    }

    #[test]
    fn test_poison_wins_over_unwritten_cell() {
        let (cell, poison) = cell("x");
        poison.set(ModuleError::thrown("boom"));

        let err = cell.read().unwrap_err();
        assert!(!err.is_not_initialized());
        assert_eq!(err.to_string(), "boom");

        let exports = LegacyExports::new(ModuleId::new("/a.cjs"), poison);
        assert_eq!(exports.read().unwrap_err().to_string(), "boom");
    }

    #[test]
    fn test_legacy_exports_readable_after_start() {
        let exports = LegacyExports::new(ModuleId::new("/a.cjs"), Poison::default());
        assert!(exports.read().unwrap_err().is_not_initialized());

        exports.begin();
        let obj = exports.get();
        obj.as_object().unwrap().set("x", Value::from(2));

        assert_eq!(exports.read_property(Some("x")).unwrap(), Value::from(2));
        assert_eq!(exports.read_property(Some("y")).unwrap(), Value::Undefined);
        assert_eq!(exports.read().unwrap(), obj);
    }

    #[test]
    fn test_same_as_compares_slots() {
        let (a, _) = cell("x");
        let (b, _) = cell("x");
        assert!(Binding::Cell(a.clone()).same_as(&Binding::Cell(a.clone())));
        assert!(!Binding::Cell(a).same_as(&Binding::Cell(b)));
    }
}
