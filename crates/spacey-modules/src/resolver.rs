// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier resolution
//!
//! Maps a specifier plus its referrer to a canonical identifier and a
//! format. Results are memoized per `(specifier, referrer)` pair, so a pair
//! always resolves to the same identifier until the engine is reset.

use crate::config::EngineConfig;
use crate::error::{ModuleError, Result};
use crate::host::ModuleHost;
use crate::specifier::{self, ModuleFormat, ModuleId};
use dashmap::DashMap;

/// A resolved specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Canonical identifier
    pub id: ModuleId,
    /// Format the module is loaded with
    pub format: ModuleFormat,
}

/// Module resolver
pub struct Resolver {
    config: EngineConfig,
    memo: DashMap<(String, Option<ModuleId>), ResolvedModule>,
}

impl Resolver {
    /// Create a resolver
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
            memo: DashMap::new(),
        }
    }

    /// Resolve `specifier` as requested by `referrer`
    pub fn resolve(
        &self,
        specifier: &str,
        referrer: Option<&ModuleId>,
        host: &dyn ModuleHost,
    ) -> Result<ResolvedModule> {
        let key = (specifier.to_string(), referrer.cloned());
        if let Some(hit) = self.memo.get(&key) {
            return Ok(hit.clone());
        }

        let resolved = self.resolve_uncached(specifier, referrer, host)?;
        tracing::trace!(
            "Resolved '{}' to {} ({})",
            specifier,
            resolved.id,
            resolved.format
        );
        self.memo.insert(key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_uncached(
        &self,
        specifier: &str,
        referrer: Option<&ModuleId>,
        host: &dyn ModuleHost,
    ) -> Result<ResolvedModule> {
        if specifier.is_empty() {
            return Err(ModuleError::resolution(specifier, referrer, "empty specifier"));
        }

        let candidate = if specifier::is_relative(specifier) {
            match referrer {
                Some(referrer) => referrer.join_relative(specifier),
                None => specifier::join(&self.config.base_dir, specifier),
            }
        } else if specifier::is_absolute(specifier) {
            ModuleId::new(specifier)
        } else {
            host.resolve_bare(specifier, referrer).ok_or_else(|| {
                ModuleError::resolution(specifier, referrer, "no mapping for bare specifier")
            })?
        };

        let id = self.probe(&candidate, host).ok_or_else(|| {
            ModuleError::resolution(specifier, referrer, format!("no module at '{}'", candidate))
        })?;
        let format = self.format_of(&id, host);

        Ok(ResolvedModule { id, format })
    }

    /// Find the module a candidate identifier names: the exact identifier,
    /// then each configured extension, then an index file inside it
    pub fn probe(&self, candidate: &ModuleId, host: &dyn ModuleHost) -> Option<ModuleId> {
        if host.exists(candidate) {
            return Some(candidate.clone());
        }

        for ext in &self.config.extensions {
            let with_ext = candidate.with_suffix(ext);
            if host.exists(&with_ext) {
                return Some(with_ext);
            }
        }

        for ext in &self.config.extensions {
            let index = candidate.child(&format!("{}{}", self.config.index_name, ext));
            if host.exists(&index) {
                return Some(index);
            }
        }

        None
    }

    /// Decide the format of a module: extension rule, then host hint, then
    /// the configured default
    pub fn format_of(&self, id: &ModuleId, host: &dyn ModuleHost) -> ModuleFormat {
        self.config
            .format_for_extension(id.extension())
            .or_else(|| host.format_hint(id))
            .unwrap_or(self.config.default_format)
    }

    /// Number of memoized resolutions
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    /// Check if nothing is memoized
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Forget every memoized resolution
    pub fn clear(&self) {
        self.memo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::source::ModuleSource;

    fn host() -> MemoryHost {
        MemoryHost::new()
            .with_module("/app/main.mjs", ModuleSource::new())
            .with_module("/app/lib/util.js", ModuleSource::modern())
            .with_module("/app/lib/plain.js", ModuleSource::new())
            .with_module("/app/pkg/index.cjs", ModuleSource::new())
            .with_module("/app/data.json", ModuleSource::new())
            .with_alias("util", "/app/lib/util")
    }

    #[test]
    fn test_relative_and_probing() {
        let host = host();
        let resolver = Resolver::new(&EngineConfig::default());
        let main = ModuleId::new("/app/main.mjs");

        let util = resolver.resolve("./lib/util", Some(&main), &host).unwrap();
        assert_eq!(util.id.as_str(), "/app/lib/util.js");

        let pkg = resolver.resolve("./pkg", Some(&main), &host).unwrap();
        assert_eq!(pkg.id.as_str(), "/app/pkg/index.cjs");
        assert_eq!(pkg.format, ModuleFormat::Legacy);
    }

    #[test]
    fn test_format_precedence() {
        let host = host();
        let resolver = Resolver::new(&EngineConfig::default());

        // extension rule wins
        let main = resolver.resolve("/app/main.mjs", None, &host).unwrap();
        assert_eq!(main.format, ModuleFormat::Modern);
        // host hint next
        let util = resolver.resolve("/app/lib/util.js", None, &host).unwrap();
        assert_eq!(util.format, ModuleFormat::Modern);
        // default last
        let plain = resolver.resolve("/app/lib/plain.js", None, &host).unwrap();
        assert_eq!(plain.format, ModuleFormat::Legacy);
        let data = resolver.resolve("/app/data.json", None, &host).unwrap();
        assert_eq!(data.format, ModuleFormat::Legacy);
    }

    #[test]
    fn test_bare_and_entry_specifiers() {
        let host = host();
        let mut config = EngineConfig::default();
        config.base_dir = "/app".to_string();
        let resolver = Resolver::new(&config);

        let util = resolver.resolve("util", None, &host).unwrap();
        assert_eq!(util.id.as_str(), "/app/lib/util.js");

        let main = resolver.resolve("./main.mjs", None, &host).unwrap();
        assert_eq!(main.id.as_str(), "/app/main.mjs");

        let err = resolver.resolve("lodash", None, &host).unwrap_err();
        assert!(matches!(err, ModuleError::Resolution { .. }));
    }

    #[test]
    fn test_resolution_is_memoized() {
        let host = host();
        let resolver = Resolver::new(&EngineConfig::default());
        let main = ModuleId::new("/app/main.mjs");

        let first = resolver.resolve("./lib/util.js", Some(&main), &host).unwrap();
        host.insert("/app/lib/util.js.js", ModuleSource::new());
        let second = resolver.resolve("./lib/util.js", Some(&main), &host).unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.len(), 1);

        resolver.clear();
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_missing_module() {
        let host = host();
        let resolver = Resolver::new(&EngineConfig::default());
        let main = ModuleId::new("/app/main.mjs");

        let err = resolver.resolve("./nope", Some(&main), &host).unwrap_err();
        assert!(err.to_string().contains("from '/app/main.mjs'"));
        assert!(resolver.is_empty());
    }
}
