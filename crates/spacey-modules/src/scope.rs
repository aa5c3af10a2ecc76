// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The view a running module body has of its own module

use crate::binding::{Binding, LiveBinding};
use crate::engine::ModuleEngine;
use crate::error::{ModuleError, Result};
use crate::namespace::Namespace;
use crate::record::ModuleRecord;
use crate::source::DEFAULT_LOCAL;
use crate::specifier::{ModuleFormat, ModuleId};
use crate::value::Value;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Scope handed to a module body while it runs
pub struct ModuleScope<'e> {
    engine: &'e ModuleEngine,
    record: Arc<ModuleRecord>,
}

impl<'e> ModuleScope<'e> {
    pub(crate) fn new(engine: &'e ModuleEngine, record: Arc<ModuleRecord>) -> Self {
        Self { engine, record }
    }

    /// Identifier of the running module
    pub fn id(&self) -> &ModuleId {
        self.record.id()
    }

    /// Format of the running module
    pub fn format(&self) -> ModuleFormat {
        self.record.format()
    }

    /// Engine running this module
    pub fn engine(&self) -> &'e ModuleEngine {
        self.engine
    }

    /// Read a local or imported binding
    pub fn get(&self, name: &str) -> Result<Value> {
        let binding = self
            .record
            .binding(name)
            .ok_or_else(|| ModuleError::UnresolvedName {
                module: self.id().clone(),
                name: name.to_string(),
            })?;
        binding.read(self.engine.store(), Some(self.id()))
    }

    /// Write a local binding, declaring it if it does not exist yet
    ///
    /// Imported bindings cannot be assigned.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        match self.record.binding(name) {
            Some(Binding::Cell(cell)) if cell.owner() == self.id() => {
                cell.write(value.into());
                Ok(())
            }
            Some(_) => Err(ModuleError::ImmutableBinding {
                module: self.id().clone(),
                name: name.to_string(),
            }),
            None => {
                self.record.declare(name).write(value.into());
                Ok(())
            }
        }
    }

    /// `export default value`
    pub fn set_default(&mut self, value: impl Into<Value>) -> Result<()> {
        self.set(DEFAULT_LOCAL, value)
    }

    /// A handle to a binding that stays live after the body returns
    pub fn binding(&self, name: &str) -> Result<LiveBinding> {
        let binding = self
            .record
            .binding(name)
            .ok_or_else(|| ModuleError::UnresolvedName {
                module: self.id().clone(),
                name: name.to_string(),
            })?;
        Ok(LiveBinding::new(
            binding,
            self.engine.store().clone(),
            self.id().clone(),
        ))
    }

    /// Synchronously load a module (`require`)
    pub fn require(&mut self, specifier: &str) -> Result<Value> {
        self.engine.require_legacy(specifier, Some(self.id()))
    }

    /// Start a dynamic import; the returned future must be driven on a
    /// tokio runtime
    pub fn import(&self, specifier: &str) -> BoxFuture<'static, Result<Namespace>> {
        let engine = self.engine.clone();
        let specifier = specifier.to_string();
        let referrer = self.id().clone();
        Box::pin(async move { engine.import_dynamic(&specifier, Some(&referrer)).await })
    }

    fn legacy(&self) -> Result<&crate::binding::LegacyExports> {
        self.record
            .legacy_exports()
            .ok_or_else(|| ModuleError::NotLegacy(self.id().clone()))
    }

    /// Current exports value (`module.exports`)
    pub fn exports(&self) -> Result<Value> {
        Ok(self.legacy()?.get())
    }

    /// Replace the exports value (`module.exports = value`)
    pub fn set_exports(&mut self, value: impl Into<Value>) -> Result<()> {
        self.legacy()?.set(value.into());
        Ok(())
    }

    /// Set one property on the exports value (`exports.name = value`)
    pub fn export(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let exports = self.legacy()?.get();
        let obj = exports
            .as_object()
            .ok_or_else(|| ModuleError::InvalidExports {
                module: self.id().clone(),
                name: name.to_string(),
            })?;
        obj.set(name, value.into());
        Ok(())
    }
}
