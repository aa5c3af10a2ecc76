// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module bodies
//!
//! A body is the code a module runs when it is evaluated. Embedders
//! implement [`ModuleBody`] (or pass a closure); descriptors loaded from
//! disk use [`Script`], a small statement list interpreted against the
//! module's scope.

use crate::error::{ModuleError, Result};
use crate::scope::ModuleScope;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Code run when a module is evaluated
pub trait ModuleBody: Send + Sync {
    /// Run the body against the module's scope
    fn evaluate(&self, scope: &mut ModuleScope<'_>) -> Result<()>;
}

impl<F> ModuleBody for F
where
    F: Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync,
{
    fn evaluate(&self, scope: &mut ModuleScope<'_>) -> Result<()> {
        self(scope)
    }
}

/// One step of a [`Script`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    /// `name = value`
    Set {
        /// Binding to write
        name: String,
        /// Literal value
        value: serde_json::Value,
    },
    /// `to = from`
    Copy {
        /// Binding to read
        from: String,
        /// Binding to write
        to: String,
    },
    /// `to = object[property]`
    Get {
        /// Binding holding an object or namespace
        object: String,
        /// Property to read
        property: String,
        /// Binding to write
        to: String,
    },
    /// `name += by`
    Add {
        /// Binding to update
        name: String,
        /// Amount added
        by: f64,
    },
    /// `export default value`
    SetDefault {
        /// Literal value
        value: serde_json::Value,
    },
    /// `const to = require(specifier)`
    Require {
        /// Specifier passed to `require`
        specifier: String,
        /// Binding receiving the result
        #[serde(default)]
        to: Option<String>,
    },
    /// `exports[name] = value`
    Export {
        /// Property name
        name: String,
        /// Literal value
        value: serde_json::Value,
    },
    /// `exports[name] = from`
    ExportBinding {
        /// Property name
        name: String,
        /// Binding to read
        from: String,
    },
    /// `module.exports = value`
    SetExports {
        /// Literal value
        value: serde_json::Value,
    },
    /// `throw new Error(message)`
    Throw {
        /// Error message
        message: String,
    },
    /// `console.log(name)`
    Log {
        /// Binding to print
        name: String,
    },
}

/// Body made of [`Statement`]s run in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script(Vec<Statement>);

impl Script {
    /// Create a script
    pub fn new(statements: Vec<Statement>) -> Self {
        Self(statements)
    }

    /// Statements in order
    pub fn statements(&self) -> &[Statement] {
        &self.0
    }

    fn execute(scope: &mut ModuleScope<'_>, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Set { name, value } => scope.set(name, Value::from_json(value)),
            Statement::Copy { from, to } => {
                let value = scope.get(from)?;
                scope.set(to, value)
            }
            Statement::Get {
                object,
                property,
                to,
            } => {
                let value = match scope.get(object)? {
                    Value::Namespace(ns) => ns.get(property)?,
                    Value::Object(obj) => obj.get(property).unwrap_or_default(),
                    other => {
                        return Err(ModuleError::thrown(format!(
                            "TypeError: Cannot read property '{}' of {}",
                            property,
                            other.type_of()
                        )));
                    }
                };
                scope.set(to, value)
            }
            Statement::Add { name, by } => {
                let current = scope.get(name)?.as_number().unwrap_or(f64::NAN);
                scope.set(name, Value::Number(current + by))
            }
            Statement::SetDefault { value } => scope.set_default(Value::from_json(value)),
            Statement::Require { specifier, to } => {
                let value = scope.require(specifier)?;
                match to {
                    Some(to) => scope.set(to, value),
                    None => Ok(()),
                }
            }
            Statement::Export { name, value } => scope.export(name, Value::from_json(value)),
            Statement::ExportBinding { name, from } => {
                let value = scope.get(from)?;
                scope.export(name, value)
            }
            Statement::SetExports { value } => scope.set_exports(Value::from_json(value)),
            Statement::Throw { message } => Err(ModuleError::thrown(message.clone())),
            Statement::Log { name } => {
                let value = scope.get(name)?;
                tracing::info!(module = %scope.id(), "{}", value.to_json());
                Ok(())
            }
        }
    }
}

impl ModuleBody for Script {
    fn evaluate(&self, scope: &mut ModuleScope<'_>) -> Result<()> {
        for statement in &self.0 {
            Self::execute(scope, statement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_from_json() {
        let json = r#"[
            { "op": "set", "name": "count", "value": 1 },
            { "op": "add", "name": "count", "by": 2 },
            { "op": "require", "specifier": "./dep.cjs", "to": "dep" },
            { "op": "require", "specifier": "./side.cjs" },
            { "op": "throw", "message": "boom" }
        ]"#;
        let script: Script = serde_json::from_str(json).unwrap();

        assert_eq!(script.statements().len(), 5);
        assert_eq!(
            script.statements()[3],
            Statement::Require {
                specifier: "./side.cjs".to_string(),
                to: None
            }
        );
    }
}
