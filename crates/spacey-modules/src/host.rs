// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host integration
//!
//! The host owns the outside world: which identifiers exist, where bare
//! specifiers point, and how a module's source is obtained. Two hosts ship
//! with the engine: [`MemoryHost`] for embedding and tests, and [`FsHost`]
//! for module descriptors laid out on disk.

use crate::error::{ModuleError, Result};
use crate::source::{ModuleDescriptor, ModuleSource};
use crate::specifier::{ModuleFormat, ModuleId};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of modules for the engine
#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// Check whether a module exists under `id`
    fn exists(&self, id: &ModuleId) -> bool;

    /// Map a bare specifier (`lodash`, `@scope/pkg/sub`) to a candidate
    /// identifier; extension and index probing still apply to the result
    fn resolve_bare(&self, _specifier: &str, _referrer: Option<&ModuleId>) -> Option<ModuleId> {
        None
    }

    /// Format the host knows for `id` (e.g. from package metadata)
    fn format_hint(&self, _id: &ModuleId) -> Option<ModuleFormat> {
        None
    }

    /// Load a module synchronously
    fn load_source(&self, id: &ModuleId) -> Result<Arc<ModuleSource>>;

    /// Load a module without blocking the caller
    async fn fetch_source(&self, id: &ModuleId) -> Result<Arc<ModuleSource>> {
        self.load_source(id)
    }
}

/// Module set described in a single JSON document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Entry specifier to run when none is given
    pub entry: Option<String>,
    /// Bare specifier to identifier mappings
    pub aliases: BTreeMap<String, String>,
    /// Modules by identifier
    pub modules: BTreeMap<String, ModuleDescriptor>,
}

/// In-memory host
#[derive(Default)]
pub struct MemoryHost {
    modules: RwLock<HashMap<ModuleId, Arc<ModuleSource>>>,
    aliases: RwLock<HashMap<String, ModuleId>>,
    loads: AtomicUsize,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, builder style
    pub fn with_module(self, path: &str, source: ModuleSource) -> Self {
        self.insert(path, source);
        self
    }

    /// Add a bare specifier mapping, builder style
    pub fn with_alias(self, specifier: &str, path: &str) -> Self {
        self.alias(specifier, path);
        self
    }

    /// Add or replace a module
    pub fn insert(&self, path: &str, source: ModuleSource) {
        self.modules
            .write()
            .insert(ModuleId::new(path), Arc::new(source));
    }

    /// Map a bare specifier to a module path
    pub fn alias(&self, specifier: &str, path: &str) {
        self.aliases
            .write()
            .insert(specifier.to_string(), ModuleId::new(path));
    }

    /// Number of successful source loads so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Build a host from a manifest
    pub fn from_manifest(manifest: Manifest) -> Self {
        let host = MemoryHost::new();
        for (specifier, path) in &manifest.aliases {
            host.alias(specifier, path);
        }
        for (path, descriptor) in manifest.modules {
            host.insert(&path, ModuleSource::from(descriptor));
        }
        host
    }

    /// Read a manifest file and build a host from it
    pub fn from_manifest_file(path: &Path) -> Result<(Self, Option<String>)> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&content)?;
        let entry = manifest.entry.clone();
        Ok((Self::from_manifest(manifest), entry))
    }
}

#[async_trait]
impl ModuleHost for MemoryHost {
    fn exists(&self, id: &ModuleId) -> bool {
        self.modules.read().contains_key(id)
    }

    fn resolve_bare(&self, specifier: &str, _referrer: Option<&ModuleId>) -> Option<ModuleId> {
        self.aliases.read().get(specifier).cloned()
    }

    fn format_hint(&self, id: &ModuleId) -> Option<ModuleFormat> {
        self.modules.read().get(id).and_then(|source| source.format)
    }

    fn load_source(&self, id: &ModuleId) -> Result<Arc<ModuleSource>> {
        let source = self
            .modules
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ModuleError::Load {
                module: id.clone(),
                reason: "not registered with host".to_string(),
            })?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(source)
    }
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    main: Option<String>,
    #[serde(rename = "type")]
    type_field: Option<String>,
}

/// Host backed by the file system
///
/// Module files hold a JSON [`ModuleDescriptor`]; `.json` files are loaded as
/// data modules whose exports are the parsed document. Bare specifiers are
/// looked up in `node_modules` directories, walking up from the referrer.
pub struct FsHost {
    root: PathBuf,
    modules_dir: String,
}

impl FsHost {
    /// Create a host rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            modules_dir: "node_modules".to_string(),
        }
    }

    /// Use a different package directory name
    pub fn with_modules_dir(mut self, name: &str) -> Self {
        self.modules_dir = name.to_string();
        self
    }

    /// Root directory of this host
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(id: &ModuleId) -> &Path {
        Path::new(id.as_str())
    }

    /// Parse a package specifier into name and optional subpath
    fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
        if specifier.starts_with('@') {
            // Scoped package: @scope/name or @scope/name/subpath
            if let Some(slash_pos) = specifier[1..].find('/') {
                let after_scope = &specifier[slash_pos + 2..];
                if let Some(subpath_pos) = after_scope.find('/') {
                    let name_end = slash_pos + 2 + subpath_pos;
                    return (&specifier[..name_end], Some(&specifier[name_end + 1..]));
                }
            }
            (specifier, None)
        } else if let Some(slash_pos) = specifier.find('/') {
            (&specifier[..slash_pos], Some(&specifier[slash_pos + 1..]))
        } else {
            (specifier, None)
        }
    }

    fn read_package_json(dir: &Path) -> Option<PackageJson> {
        let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Candidate for a package directory: its `main` entry, or the directory
    /// itself so index probing applies
    fn package_entry(dir: &Path) -> ModuleId {
        match Self::read_package_json(dir).and_then(|pkg| pkg.main) {
            Some(main) => ModuleId::new(dir.join(main).to_string_lossy()),
            None => ModuleId::new(dir.to_string_lossy()),
        }
    }

    fn parse_source(id: &ModuleId, content: &str) -> Result<Arc<ModuleSource>> {
        if id.extension() == Some(".json") {
            let value: serde_json::Value =
                serde_json::from_str(content).map_err(|e| ModuleError::Load {
                    module: id.clone(),
                    reason: e.to_string(),
                })?;
            return Ok(Arc::new(ModuleSource::json(value)));
        }

        let descriptor: ModuleDescriptor =
            serde_json::from_str(content).map_err(|e| ModuleError::Load {
                module: id.clone(),
                reason: format!("invalid module descriptor: {}", e),
            })?;
        Ok(Arc::new(ModuleSource::from(descriptor)))
    }

    fn load_error(id: &ModuleId, err: std::io::Error) -> ModuleError {
        ModuleError::Load {
            module: id.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ModuleHost for FsHost {
    fn exists(&self, id: &ModuleId) -> bool {
        Self::path_of(id).is_file()
    }

    fn resolve_bare(&self, specifier: &str, referrer: Option<&ModuleId>) -> Option<ModuleId> {
        let (package_name, subpath) = Self::parse_package_specifier(specifier);

        let start = match referrer {
            Some(id) => PathBuf::from(id.dirname()),
            None => self.root.clone(),
        };

        // Walk up directory tree looking for the package
        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            let package_dir = dir.join(&self.modules_dir).join(package_name);
            if package_dir.is_dir() {
                return Some(match subpath {
                    Some(sub) if package_dir.join(sub).is_dir() => {
                        Self::package_entry(&package_dir.join(sub))
                    }
                    Some(sub) => ModuleId::new(package_dir.join(sub).to_string_lossy()),
                    None => Self::package_entry(&package_dir),
                });
            }
            current = dir.parent();
        }

        None
    }

    fn format_hint(&self, id: &ModuleId) -> Option<ModuleFormat> {
        let mut current = Self::path_of(id).parent();
        while let Some(dir) = current {
            if dir.join("package.json").is_file() {
                return Self::read_package_json(dir)
                    .and_then(|pkg| ModuleFormat::from_package_type(pkg.type_field.as_deref()));
            }
            current = dir.parent();
        }
        None
    }

    fn load_source(&self, id: &ModuleId) -> Result<Arc<ModuleSource>> {
        let content =
            std::fs::read_to_string(Self::path_of(id)).map_err(|e| Self::load_error(id, e))?;
        Self::parse_source(id, &content)
    }

    async fn fetch_source(&self, id: &ModuleId) -> Result<Arc<ModuleSource>> {
        let content = tokio::fs::read_to_string(Self::path_of(id))
            .await
            .map_err(|e| Self::load_error(id, e))?;
        Self::parse_source(id, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_specifier() {
        assert_eq!(FsHost::parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(
            FsHost::parse_package_specifier("lodash/get"),
            ("lodash", Some("get"))
        );
        assert_eq!(
            FsHost::parse_package_specifier("@types/node"),
            ("@types/node", None)
        );
        assert_eq!(
            FsHost::parse_package_specifier("@babel/core/lib/index"),
            ("@babel/core", Some("lib/index"))
        );
    }

    #[test]
    fn test_memory_host_counts_loads() {
        let host = MemoryHost::new()
            .with_module("/a.mjs", ModuleSource::modern())
            .with_alias("a", "/a.mjs");

        let id = ModuleId::new("/a.mjs");
        assert!(host.exists(&id));
        assert_eq!(host.resolve_bare("a", None), Some(id.clone()));
        assert_eq!(host.format_hint(&id), Some(ModuleFormat::Modern));

        host.load_source(&id).unwrap();
        assert_eq!(host.load_count(), 1);
        assert!(host.load_source(&ModuleId::new("/b.mjs")).is_err());
        assert_eq!(host.load_count(), 1);
    }

    #[test]
    fn test_manifest() {
        let json = r#"{
            "entry": "./main.mjs",
            "aliases": { "util": "/lib/util.cjs" },
            "modules": {
                "/main.mjs": { "format": "modern" },
                "/lib/util.cjs": {}
            }
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.entry.as_deref(), Some("./main.mjs"));

        let host = MemoryHost::from_manifest(manifest);
        assert!(host.exists(&ModuleId::new("/main.mjs")));
        assert_eq!(
            host.resolve_bare("util", None),
            Some(ModuleId::new("/lib/util.cjs"))
        );
    }
}
