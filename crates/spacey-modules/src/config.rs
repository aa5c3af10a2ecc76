// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Engine configuration

use crate::error::{ModuleError, Result};
use crate::specifier::ModuleFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix of environment variables that override configuration
pub const ENV_PREFIX: &str = "SPACEY_MODULES_";

/// Configuration for the module engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory that entry specifiers without a referrer resolve against
    pub base_dir: String,

    /// Extensions tried, in order, when a specifier does not name a file
    pub extensions: Vec<String>,

    /// File stem tried inside directories (`index` -> `dir/index.js`)
    pub index_name: String,

    /// Format forced by file extension
    pub format_by_extension: BTreeMap<String, ModuleFormat>,

    /// Format used when neither the extension nor the host decide
    pub default_format: ModuleFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut format_by_extension = BTreeMap::new();
        format_by_extension.insert(".mjs".to_string(), ModuleFormat::Modern);
        format_by_extension.insert(".cjs".to_string(), ModuleFormat::Legacy);
        format_by_extension.insert(".json".to_string(), ModuleFormat::Legacy);

        Self {
            base_dir: "/".to_string(),
            extensions: vec![
                ".js".to_string(),
                ".mjs".to_string(),
                ".cjs".to_string(),
                ".json".to_string(),
            ],
            index_name: "index".to_string(),
            format_by_extension,
            default_format: ModuleFormat::Legacy,
        }
    }
}

impl EngineConfig {
    /// Load configuration: defaults, then an optional JSON file, then the
    /// environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = EngineConfig::default();

        if let Some(path) = path {
            config.merge_from_file(path)?;
        }

        config.load_from_env();

        Ok(config)
    }

    /// Merge configuration from a JSON file; keys absent from the file keep
    /// their current value
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let overrides: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&content)?;

        let mut merged = serde_json::to_value(&*self)?;
        if let Some(obj) = merged.as_object_mut() {
            for (key, value) in overrides {
                let key = key.replace('-', "_");
                if !obj.contains_key(&key) {
                    return Err(ModuleError::Config(format!("unknown key '{}'", key)));
                }
                obj.insert(key, value);
            }
        }

        *self = serde_json::from_value(merged)?;
        Ok(())
    }

    /// Load configuration from `SPACEY_MODULES_*` environment variables
    pub fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                if let Err(e) = self.set(&config_key, &value) {
                    tracing::warn!("Ignoring {}: {}", key, e);
                }
            }
        }
    }

    /// Set a configuration value from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "base-dir" => self.base_dir = value.to_string(),
            "extensions" => {
                self.extensions = value
                    .split(',')
                    .map(str::trim)
                    .filter(|ext| !ext.is_empty())
                    .map(|ext| {
                        if ext.starts_with('.') {
                            ext.to_string()
                        } else {
                            format!(".{}", ext)
                        }
                    })
                    .collect();
            }
            "index-name" => self.index_name = value.to_string(),
            "default-format" => {
                self.default_format = ModuleFormat::parse(value).ok_or_else(|| {
                    ModuleError::Config(format!("unknown module format '{}'", value))
                })?;
            }
            _ => return Err(ModuleError::Config(format!("unknown key '{}'", key))),
        }
        Ok(())
    }

    /// Get a configuration value in its string form
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "base-dir" => Some(self.base_dir.clone()),
            "extensions" => Some(self.extensions.join(",")),
            "index-name" => Some(self.index_name.clone()),
            "default-format" => Some(self.default_format.to_string()),
            _ => None,
        }
    }

    /// Format forced by the extension of `path`, if any
    pub fn format_for_extension(&self, extension: Option<&str>) -> Option<ModuleFormat> {
        extension.and_then(|ext| self.format_by_extension.get(ext).copied())
    }
}
