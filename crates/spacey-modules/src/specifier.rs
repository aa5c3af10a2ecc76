// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Canonical module identifiers and module formats

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Canonical, absolute identifier of a loaded module
///
/// Identifiers are `/`-separated and lexically normalised, so two specifiers
/// that name the same resource always produce equal identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    /// Create an identifier, normalising the path
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(Arc::from(normalize(path.as_ref())))
    }

    /// The identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory containing this module
    pub fn dirname(&self) -> &str {
        match self.0.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.0[..pos],
        }
    }

    /// Final path component
    pub fn filename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File extension including the leading dot
    pub fn extension(&self) -> Option<&str> {
        let name = self.filename();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(&name[pos..]),
        }
    }

    /// Resolve `specifier` relative to the directory of this module
    pub fn join_relative(&self, specifier: &str) -> ModuleId {
        join(self.dirname(), specifier)
    }

    /// Append a suffix to the identifier (used for extension probing)
    pub fn with_suffix(&self, suffix: &str) -> ModuleId {
        ModuleId::new(format!("{}{}", self.0, suffix))
    }

    /// Treat this identifier as a directory and name a child in it
    pub fn child(&self, name: &str) -> ModuleId {
        join(&self.0, name)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(path: &str) -> Self {
        ModuleId::new(path)
    }
}

impl From<String> for ModuleId {
    fn from(path: String) -> Self {
        ModuleId::new(path)
    }
}

impl Serialize for ModuleId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Ok(ModuleId::new(path))
    }
}

/// Export discipline of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// Dynamic, synchronous, whole-object exports (`require` / `module.exports`)
    #[serde(alias = "commonjs", alias = "cjs")]
    Legacy,
    /// Static, declarative, live per-binding exports (`import` / `export`)
    #[serde(alias = "module", alias = "esm")]
    Modern,
}

impl ModuleFormat {
    /// Map a package.json `"type"` field to a format
    pub fn from_package_type(type_field: Option<&str>) -> Option<Self> {
        match type_field {
            Some("module") => Some(ModuleFormat::Modern),
            Some("commonjs") => Some(ModuleFormat::Legacy),
            _ => None,
        }
    }

    /// Parse a user-facing format name
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "legacy" | "commonjs" | "cjs" => Some(ModuleFormat::Legacy),
            "modern" | "module" | "esm" => Some(ModuleFormat::Modern),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleFormat::Legacy => f.write_str("legacy"),
            ModuleFormat::Modern => f.write_str("modern"),
        }
    }
}

/// Whether a specifier is relative to its referrer
pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Whether a specifier is an absolute path
pub fn is_absolute(specifier: &str) -> bool {
    specifier.starts_with('/')
}

/// Join `specifier` onto the directory `base` and normalise the result
pub fn join(base: &str, specifier: &str) -> ModuleId {
    if is_absolute(specifier) {
        return ModuleId::new(specifier);
    }
    ModuleId::new(format!("{}/{}", base.trim_end_matches('/'), specifier))
}

/// Lexically normalise a `/`-separated path: collapse `.`, `..` and repeated
/// separators, and root the result at `/`
fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(ModuleId::new("/app/./lib/../main.mjs").as_str(), "/app/main.mjs");
        assert_eq!(ModuleId::new("app//main.mjs").as_str(), "/app/main.mjs");
        assert_eq!(ModuleId::new("/../../x.js").as_str(), "/x.js");
        assert_eq!(ModuleId::new("/").as_str(), "/");
    }

    #[test]
    fn test_components() {
        let id = ModuleId::new("/app/lib/util.mjs");
        assert_eq!(id.dirname(), "/app/lib");
        assert_eq!(id.filename(), "util.mjs");
        assert_eq!(id.extension(), Some(".mjs"));

        let root = ModuleId::new("/main.js");
        assert_eq!(root.dirname(), "/");
        assert_eq!(ModuleId::new("/app/.hidden").extension(), None);
    }

    #[test]
    fn test_join_relative() {
        let id = ModuleId::new("/app/lib/util.mjs");
        assert_eq!(id.join_relative("./a.mjs").as_str(), "/app/lib/a.mjs");
        assert_eq!(id.join_relative("../b.mjs").as_str(), "/app/b.mjs");
        assert_eq!(id.join_relative("/abs.mjs").as_str(), "/abs.mjs");
        assert_eq!(id.child("index.js").as_str(), "/app/lib/util.mjs/index.js");
    }

    #[test]
    fn test_specifier_kinds() {
        assert!(is_relative("./a"));
        assert!(is_relative("../a"));
        assert!(!is_relative("lodash"));
        assert!(is_absolute("/a.js"));
        assert!(!is_absolute("a.js"));
    }

    #[test]
    fn test_format_names() {
        assert_eq!(ModuleFormat::from_package_type(Some("module")), Some(ModuleFormat::Modern));
        assert_eq!(ModuleFormat::from_package_type(Some("commonjs")), Some(ModuleFormat::Legacy));
        assert_eq!(ModuleFormat::from_package_type(None), None);
        assert_eq!(ModuleFormat::parse("ESM"), Some(ModuleFormat::Modern));
        assert_eq!(ModuleFormat::parse("cjs"), Some(ModuleFormat::Legacy));
        assert_eq!(ModuleFormat::parse("wasm"), None);
    }
}
