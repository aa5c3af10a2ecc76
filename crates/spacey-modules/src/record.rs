// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records
//!
//! A record is created the first time a canonical identifier is seen and
//! lives until the store is cleared. Everything mutable sits behind one
//! mutex that is never held while a module body runs.

use crate::binding::{Binding, BindingCell, BindingEnvironment, LegacyExports, Poison};
use crate::error::ModuleError;
use crate::source::ModuleSource;
use crate::specifier::{ModuleFormat, ModuleId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a module record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModuleStatus {
    /// Created, not yet linked (or linking was rolled back)
    #[default]
    Unlinked,
    /// Linking is in progress
    Linking,
    /// All imports are bound
    Linked,
    /// The body is running
    Evaluating,
    /// The body completed
    Evaluated,
    /// The body failed; the error is cached
    Errored,
}

impl ModuleStatus {
    /// Whether evaluation has finished, successfully or not
    pub fn is_settled(self) -> bool {
        matches!(self, ModuleStatus::Evaluated | ModuleStatus::Errored)
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleStatus::Unlinked => "unlinked",
            ModuleStatus::Linking => "linking",
            ModuleStatus::Linked => "linked",
            ModuleStatus::Evaluating => "evaluating",
            ModuleStatus::Evaluated => "evaluated",
            ModuleStatus::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Name requested by an import entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportName {
    /// A single exported name (`default` included)
    Name(String),
    /// The whole namespace
    Namespace,
}

/// One imported binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// Exporting module
    pub module: ModuleId,
    /// What is imported
    pub import_name: ImportName,
    /// Local binding name
    pub local_name: String,
}

/// One public name (or star re-export) of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEntry {
    /// Exports a local binding
    Local {
        /// Public name
        export_name: String,
        /// Local binding
        local_name: String,
    },
    /// Re-exports a binding of another module
    Indirect {
        /// Public name
        export_name: String,
        /// Module the binding comes from
        module: ModuleId,
        /// Name in that module
        import_name: ImportName,
    },
    /// `export * from`
    Star {
        /// Module whose names are merged in
        module: ModuleId,
    },
}

impl ExportEntry {
    /// The public name, if this entry has one
    pub fn export_name(&self) -> Option<&str> {
        match self {
            ExportEntry::Local { export_name, .. } | ExportEntry::Indirect { export_name, .. } => {
                Some(export_name)
            }
            ExportEntry::Star { .. } => None,
        }
    }

    /// Whether this entry exports `default`
    pub fn is_default(&self) -> bool {
        self.export_name() == Some("default")
    }
}

/// Result of analyzing a module's declarations
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Dependencies in first-request order
    pub requested: Vec<ModuleId>,
    /// Import entries
    pub imports: Vec<ImportEntry>,
    /// Export entries (for legacy modules, the named-export hints)
    pub exports: Vec<ExportEntry>,
}

/// One module known to the engine
pub struct ModuleRecord {
    id: ModuleId,
    format: ModuleFormat,
    legacy: Option<LegacyExports>,
    poison: Poison,
    state: Mutex<RecordState>,
}

#[derive(Default)]
struct RecordState {
    status: ModuleStatus,
    source: Option<Arc<ModuleSource>>,
    analysis: Option<Arc<Analysis>>,
    environment: BindingEnvironment,
    error: Option<ModuleError>,
}

impl ModuleRecord {
    pub(crate) fn new(id: ModuleId, format: ModuleFormat) -> Self {
        let poison = Poison::default();
        let legacy = match format {
            ModuleFormat::Legacy => Some(LegacyExports::new(id.clone(), poison.clone())),
            ModuleFormat::Modern => None,
        };

        Self {
            id,
            format,
            legacy,
            poison,
            state: Mutex::new(RecordState::default()),
        }
    }

    /// Canonical identifier
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Module format, fixed at creation
    pub fn format(&self) -> ModuleFormat {
        self.format
    }

    /// Current lifecycle status
    pub fn status(&self) -> ModuleStatus {
        self.state.lock().status
    }

    /// Cached evaluation error
    pub fn error(&self) -> Option<ModuleError> {
        self.state.lock().error.clone()
    }

    /// Exports handle of a legacy module
    pub fn legacy_exports(&self) -> Option<&LegacyExports> {
        self.legacy.as_ref()
    }

    /// Loaded source, if any
    pub fn source(&self) -> Option<Arc<ModuleSource>> {
        self.state.lock().source.clone()
    }

    /// Analyzed declarations, if any
    pub fn analysis(&self) -> Option<Arc<Analysis>> {
        self.state.lock().analysis.clone()
    }

    /// Dependencies of this module in request order
    pub fn requested(&self) -> Vec<ModuleId> {
        self.analysis()
            .map(|a| a.requested.clone())
            .unwrap_or_default()
    }

    /// Import entries
    pub fn imports(&self) -> Vec<ImportEntry> {
        self.analysis().map(|a| a.imports.clone()).unwrap_or_default()
    }

    /// Export entries
    pub fn exports(&self) -> Vec<ExportEntry> {
        self.analysis().map(|a| a.exports.clone()).unwrap_or_default()
    }

    /// Names bound in this module's environment
    pub fn binding_names(&self) -> Vec<String> {
        self.state.lock().environment.names()
    }

    pub(crate) fn set_source(&self, source: Arc<ModuleSource>) {
        self.state.lock().source = Some(source);
    }

    pub(crate) fn set_analysis(&self, analysis: Arc<Analysis>) {
        self.state.lock().analysis = Some(analysis);
    }

    pub(crate) fn set_status(&self, status: ModuleStatus) {
        let mut state = self.state.lock();
        debug_assert!(
            !state.status.is_settled(),
            "{} is already {}",
            self.id,
            state.status
        );
        state.status = status;
    }

    /// Record an evaluation failure; the module stays failed until reset
    pub(crate) fn fail(&self, err: ModuleError) {
        self.poison.set(err.clone());
        let mut state = self.state.lock();
        state.status = ModuleStatus::Errored;
        state.error = Some(err);
    }

    pub(crate) fn binding(&self, name: &str) -> Option<Binding> {
        self.state.lock().environment.get(name).cloned()
    }

    pub(crate) fn bind(&self, name: &str, binding: Binding) {
        self.state.lock().environment.insert(name, binding);
    }

    /// The cell declared for `name`, if this module owns one
    pub(crate) fn cell(&self, name: &str) -> Option<BindingCell> {
        match self.state.lock().environment.get(name) {
            Some(Binding::Cell(cell)) if cell.owner() == &self.id => Some(cell.clone()),
            _ => None,
        }
    }

    /// Declare a fresh uninitialized cell for `name`
    pub(crate) fn declare(&self, name: &str) -> BindingCell {
        let cell = BindingCell::new(self.id.clone(), name, self.poison.clone());
        self.bind(name, Binding::Cell(cell.clone()));
        cell
    }

    pub(crate) fn reset_environment(&self) {
        self.state.lock().environment.clear();
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_legacy_record_starts_with_empty_exports() {
        let record = ModuleRecord::new(ModuleId::new("/a.cjs"), ModuleFormat::Legacy);
        let exports = record.legacy_exports().unwrap().get();
        assert!(exports.as_object().is_some_and(|o| o.is_empty()));
        assert_eq!(record.status(), ModuleStatus::Unlinked);

        let modern = ModuleRecord::new(ModuleId::new("/a.mjs"), ModuleFormat::Modern);
        assert!(modern.legacy_exports().is_none());
    }

    #[test]
    fn test_fail_poisons_cells() {
        let record = ModuleRecord::new(ModuleId::new("/a.mjs"), ModuleFormat::Modern);
        let cell = record.declare("x");
        cell.write(Value::from(1));

        record.fail(ModuleError::thrown("boom"));

        assert_eq!(record.status(), ModuleStatus::Errored);
        assert!(record.error().is_some());
        assert!(cell.read().is_err());
    }

    #[test]
    fn test_cell_only_returns_owned_bindings() {
        let a = ModuleRecord::new(ModuleId::new("/a.mjs"), ModuleFormat::Modern);
        let b = ModuleRecord::new(ModuleId::new("/b.mjs"), ModuleFormat::Modern);
        let cell = b.declare("y");
        a.bind("y", Binding::Cell(cell));

        assert!(a.cell("y").is_none());
        assert!(b.cell("y").is_some());
        assert_eq!(a.binding_names(), vec!["y".to_string()]);
    }

    #[test]
    fn test_export_entry_names() {
        let local = ExportEntry::Local {
            export_name: "default".to_string(),
            local_name: "*default*".to_string(),
        };
        let star = ExportEntry::Star {
            module: ModuleId::new("/b.mjs"),
        };
        assert!(local.is_default());
        assert_eq!(star.export_name(), None);
    }
}
