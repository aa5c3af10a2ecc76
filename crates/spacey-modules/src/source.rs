// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Parsed module artifacts
//!
//! The engine never parses source text. A host hands it a [`ModuleSource`]:
//! the module's import and export declarations, already extracted, plus the
//! body to run. The declaration shapes cover:
//! - `import foo from 'm'`, `import { a, b as c } from 'm'`, `import * as ns from 'm'`
//! - `import 'm'` (side effect only)
//! - `export default ...`, `export { a, b as c }`
//! - `export { a as b } from 'm'`, `export * from 'm'`, `export * as ns from 'm'`
//!
//! For legacy modules, export declarations are hints naming the properties a
//! modern importer may ask for by name.

use crate::body::{ModuleBody, Script, Statement};
use crate::error::Result;
use crate::scope::ModuleScope;
use crate::specifier::ModuleFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Local binding name that holds an anonymous `export default` value
pub const DEFAULT_LOCAL: &str = "*default*";

/// Import specifier types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportSpecifier {
    /// `import foo from 'module'`
    Default {
        /// Local binding name
        local: String,
    },
    /// `import { foo } from 'module'` or `import { foo as bar } from 'module'`
    Named {
        /// Name exported by the source module
        imported: String,
        /// Local alias, if different
        #[serde(default)]
        local: Option<String>,
    },
    /// `import * as foo from 'module'`
    Namespace {
        /// Local binding name
        local: String,
    },
}

impl ImportSpecifier {
    /// The local binding this specifier introduces
    pub fn local_name(&self) -> &str {
        match self {
            ImportSpecifier::Default { local } | ImportSpecifier::Namespace { local } => local,
            ImportSpecifier::Named { imported, local } => local.as_deref().unwrap_or(imported),
        }
    }
}

/// Export specifier types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportSpecifier {
    /// `export default value`; the value lives in [`DEFAULT_LOCAL`]
    Default,
    /// `export { foo }` or `export { foo as bar }`; with a source module the
    /// local name is the name imported from it
    Named {
        /// Local (or imported) name
        local: String,
        /// Exported alias, if different
        #[serde(default)]
        exported: Option<String>,
    },
    /// `export * from 'module'`
    All,
    /// `export * as name from 'module'`
    AllAs {
        /// Exported name of the namespace
        exported: String,
    },
}

/// Parsed import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDeclaration {
    /// The module specifier (e.g., './foo.mjs', 'lodash')
    pub specifier: String,
    /// Import specifiers; empty for `import 'module'`
    #[serde(default)]
    pub imports: Vec<ImportSpecifier>,
}

impl ImportDeclaration {
    /// Whether this is a side-effect only import
    pub fn is_side_effect_only(&self) -> bool {
        self.imports.is_empty()
    }
}

/// Parsed export statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDeclaration {
    /// Export specifiers
    pub exports: Vec<ExportSpecifier>,
    /// Source module for re-exports
    #[serde(default)]
    pub from: Option<String>,
}

/// A module as handed to the engine by the host
#[derive(Clone)]
pub struct ModuleSource {
    /// Format declared by the module itself, if any
    pub format: Option<ModuleFormat>,
    /// Import declarations in source order
    pub imports: Vec<ImportDeclaration>,
    /// Export declarations in source order
    pub exports: Vec<ExportDeclaration>,
    /// Code run when the module is evaluated
    pub body: Arc<dyn ModuleBody>,
}

impl ModuleSource {
    /// Create a module with no declarations and an empty body
    pub fn new() -> Self {
        Self {
            format: None,
            imports: Vec::new(),
            exports: Vec::new(),
            body: Arc::new(Script::default()),
        }
    }

    /// Create a module declared as modern format
    pub fn modern() -> Self {
        Self::new().with_format(ModuleFormat::Modern)
    }

    /// Create a module declared as legacy format
    pub fn legacy() -> Self {
        Self::new().with_format(ModuleFormat::Legacy)
    }

    /// Create a JSON data module whose exports are `value`
    pub fn json(value: serde_json::Value) -> Self {
        Self::legacy().with_body(Script::new(vec![Statement::SetExports { value }]))
    }

    /// Set the declared format
    pub fn with_format(mut self, format: ModuleFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the module body
    pub fn with_body(mut self, body: impl ModuleBody + 'static) -> Self {
        self.body = Arc::new(body);
        self
    }

    /// Set the module body from a closure
    pub fn with_body_fn<F>(self, body: F) -> Self
    where
        F: Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.with_body(body)
    }

    /// Add an import declaration
    pub fn import(mut self, declaration: ImportDeclaration) -> Self {
        self.imports.push(declaration);
        self
    }

    /// `import local from 'specifier'`
    pub fn import_default(self, specifier: &str, local: &str) -> Self {
        self.import(ImportDeclaration {
            specifier: specifier.to_string(),
            imports: vec![ImportSpecifier::Default {
                local: local.to_string(),
            }],
        })
    }

    /// `import { imported as local } from 'specifier'`
    pub fn import_named(self, specifier: &str, imported: &str, local: &str) -> Self {
        self.import(ImportDeclaration {
            specifier: specifier.to_string(),
            imports: vec![ImportSpecifier::Named {
                imported: imported.to_string(),
                local: (imported != local).then(|| local.to_string()),
            }],
        })
    }

    /// `import * as local from 'specifier'`
    pub fn import_namespace(self, specifier: &str, local: &str) -> Self {
        self.import(ImportDeclaration {
            specifier: specifier.to_string(),
            imports: vec![ImportSpecifier::Namespace {
                local: local.to_string(),
            }],
        })
    }

    /// `import 'specifier'`
    pub fn import_side_effect(self, specifier: &str) -> Self {
        self.import(ImportDeclaration {
            specifier: specifier.to_string(),
            imports: Vec::new(),
        })
    }

    /// Add an export declaration
    pub fn export(mut self, declaration: ExportDeclaration) -> Self {
        self.exports.push(declaration);
        self
    }

    /// `export { name }`
    pub fn export_local(self, name: &str) -> Self {
        self.export_as(name, name)
    }

    /// `export { local as exported }`
    pub fn export_as(self, local: &str, exported: &str) -> Self {
        self.export(ExportDeclaration {
            exports: vec![ExportSpecifier::Named {
                local: local.to_string(),
                exported: (local != exported).then(|| exported.to_string()),
            }],
            from: None,
        })
    }

    /// `export default ...`
    pub fn export_default(self) -> Self {
        self.export(ExportDeclaration {
            exports: vec![ExportSpecifier::Default],
            from: None,
        })
    }

    /// `export { imported as exported } from 'specifier'`
    pub fn export_from(self, specifier: &str, imported: &str, exported: &str) -> Self {
        self.export(ExportDeclaration {
            exports: vec![ExportSpecifier::Named {
                local: imported.to_string(),
                exported: (imported != exported).then(|| exported.to_string()),
            }],
            from: Some(specifier.to_string()),
        })
    }

    /// `export * from 'specifier'`
    pub fn export_all_from(self, specifier: &str) -> Self {
        self.export(ExportDeclaration {
            exports: vec![ExportSpecifier::All],
            from: Some(specifier.to_string()),
        })
    }

    /// `export * as exported from 'specifier'`
    pub fn export_all_as(self, specifier: &str, exported: &str) -> Self {
        self.export(ExportDeclaration {
            exports: vec![ExportSpecifier::AllAs {
                exported: exported.to_string(),
            }],
            from: Some(specifier.to_string()),
        })
    }

    /// Every specifier this module names statically, in source order
    pub fn specifiers(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .map(|decl| decl.specifier.as_str())
            .chain(self.exports.iter().filter_map(|decl| decl.from.as_deref()))
    }
}

impl Default for ModuleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSource")
            .field("format", &self.format)
            .field("imports", &self.imports)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}

/// Serialized form of a [`ModuleSource`] whose body is a statement list
///
/// This is what [`crate::FsHost`] reads from disk and what manifests embed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleDescriptor {
    /// Declared format
    pub format: Option<ModuleFormat>,
    /// Import declarations
    pub imports: Vec<ImportDeclaration>,
    /// Export declarations
    pub exports: Vec<ExportDeclaration>,
    /// Body statements
    pub body: Vec<Statement>,
}

impl From<ModuleDescriptor> for ModuleSource {
    fn from(descriptor: ModuleDescriptor) -> Self {
        ModuleSource {
            format: descriptor.format,
            imports: descriptor.imports,
            exports: descriptor.exports,
            body: Arc::new(Script::new(descriptor.body)),
        }
    }
}
