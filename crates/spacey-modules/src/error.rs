// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module engine

use crate::specifier::ModuleId;
use std::sync::Arc;
use thiserror::Error;

/// Result type for module engine operations
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors that can occur while resolving, linking or evaluating modules
///
/// Errors are cheap to clone: an evaluation failure is cached on the module
/// record and handed to every later consumer of that module.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// Specifier could not be mapped to a module
    #[error("Cannot resolve module '{specifier}'{}: {reason}", referrer_suffix(.referrer))]
    Resolution {
        /// The specifier as written
        specifier: String,
        /// The module that asked for it
        referrer: Option<ModuleId>,
        /// Reason for failure
        reason: String,
    },

    /// A binding was read before its owning module initialized it
    #[error("ReferenceError: Cannot access '{name}' of '{module}' before initialization")]
    BindingNotInitialized {
        /// Module owning the binding
        module: ModuleId,
        /// Local name of the binding
        name: String,
    },

    /// Two export entries claim the same public name
    #[error("SyntaxError: Conflicting export '{name}' in module '{module}'")]
    DuplicateExport {
        /// Module exporting the name
        module: ModuleId,
        /// Exported name
        name: String,
    },

    /// An import asked for a name the exporter does not provide
    #[error("SyntaxError: Module '{module}' does not provide an export named '{name}'")]
    MissingExport {
        /// Module that was asked
        module: ModuleId,
        /// Requested name
        name: String,
    },

    /// A module body failed during evaluation
    #[error("Error evaluating module '{module}': {cause}")]
    Evaluation {
        /// Module whose body failed
        module: ModuleId,
        /// What the body raised
        cause: Arc<ModuleError>,
    },

    /// A body read a name that is neither a local nor an import
    #[error("ReferenceError: '{name}' is not defined in module '{module}'")]
    UnresolvedName {
        /// Module doing the read
        module: ModuleId,
        /// The unknown name
        name: String,
    },

    /// A body tried to assign an imported binding
    #[error("TypeError: Assignment to imported binding '{name}' in module '{module}'")]
    ImmutableBinding {
        /// Module doing the write
        module: ModuleId,
        /// The imported name
        name: String,
    },

    /// A legacy-only operation was used by a modern module
    #[error("TypeError: Module '{0}' has no exports object")]
    NotLegacy(ModuleId),

    /// The legacy exports value cannot take properties
    #[error("TypeError: Cannot set property '{name}' on exports of '{module}'")]
    InvalidExports {
        /// Module whose exports were written
        module: ModuleId,
        /// Property name
        name: String,
    },

    /// A value thrown by a module body
    #[error("{0}")]
    Thrown(String),

    /// Host failed to provide module source
    #[error("Failed to load module '{module}': {reason}")]
    Load {
        /// Module being loaded
        module: ModuleId,
        /// Reason for failure
        reason: String,
    },

    /// Module declarations are inconsistent
    #[error("SyntaxError: {reason} in module '{module}'")]
    Malformed {
        /// Module carrying the declarations
        module: ModuleId,
        /// What is wrong
        reason: String,
    },

    /// File system error
    #[error("File system error: {0}")]
    Io(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A namespace outlived the store it was built from
    #[error("Module '{0}' is no longer registered")]
    Detached(ModuleId),

    /// The pipeline task backing a dynamic import died
    #[error("Dynamic import aborted: {0}")]
    Aborted(String),
}

impl ModuleError {
    /// Create an error for a value thrown by a module body
    pub fn thrown(msg: impl Into<String>) -> Self {
        Self::Thrown(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(
        specifier: impl Into<String>,
        referrer: Option<&ModuleId>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            specifier: specifier.into(),
            referrer: referrer.cloned(),
            reason: reason.into(),
        }
    }

    /// Wrap a body failure as an evaluation error of `module`
    pub fn evaluation(module: &ModuleId, cause: ModuleError) -> Self {
        Self::Evaluation {
            module: module.clone(),
            cause: Arc::new(cause),
        }
    }

    /// Whether this error came from reading a binding too early
    pub fn is_not_initialized(&self) -> bool {
        match self {
            Self::BindingNotInitialized { .. } => true,
            Self::Evaluation { cause, .. } => cause.is_not_initialized(),
            _ => false,
        }
    }

    /// The innermost cause of an evaluation error chain
    pub fn root_cause(&self) -> &ModuleError {
        match self {
            Self::Evaluation { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

fn referrer_suffix(referrer: &Option<ModuleId>) -> String {
    referrer
        .as_ref()
        .map(|r| format!(" from '{}'", r))
        .unwrap_or_default()
}

impl From<std::io::Error> for ModuleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_message_names_referrer() {
        let referrer = ModuleId::new("/app/main.mjs");
        let err = ModuleError::resolution("./missing.mjs", Some(&referrer), "no such module");
        assert_eq!(
            err.to_string(),
            "Cannot resolve module './missing.mjs' from '/app/main.mjs': no such module"
        );

        let err = ModuleError::resolution("lodash", None, "no host mapping");
        assert_eq!(err.to_string(), "Cannot resolve module 'lodash': no host mapping");
    }

    #[test]
    fn test_root_cause_unwraps_evaluation_chain() {
        let a = ModuleId::new("/a.mjs");
        let b = ModuleId::new("/b.mjs");
        let inner = ModuleError::BindingNotInitialized {
            module: a.clone(),
            name: "x".to_string(),
        };
        let err = ModuleError::evaluation(&b, ModuleError::evaluation(&a, inner));

        assert!(err.is_not_initialized());
        assert!(matches!(
            err.root_cause(),
            ModuleError::BindingNotInitialized { name, .. } if name == "x"
        ));
    }
}
