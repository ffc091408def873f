// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn default_workspace() -> String {
    "default".to_string()
}

/// Mount configuration of one external provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Identifier-mapping namespace
    pub provider_key: String,

    /// Overlay path mirroring the external root
    pub mount_point: String,

    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Declaring type (or `*`) to the item names (or `*`) that live in the overlay
    #[serde(default)]
    pub overridable_items: BTreeMap<String, Vec<String>>,

    /// Types a node must all match before the overlay is used for it
    #[serde(default)]
    pub extension_allowed_types: Option<Vec<String>>,
}

impl ProviderConfig {
    pub fn new<K: Into<String>, M: Into<String>>(provider_key: K, mount_point: M) -> Self {
        Self {
            provider_key: provider_key.into(),
            mount_point: mount_point.into(),
            workspace: default_workspace(),
            overridable_items: BTreeMap::new(),
            extension_allowed_types: None,
        }
    }

    /// Builder-style allow-list entry.
    #[must_use]
    pub fn overridable<T: Into<String>, I: Into<String>>(mut self, declaring_type: T, item: I) -> Self {
        self.overridable_items
            .entry(declaring_type.into())
            .or_default()
            .push(item.into());
        self
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ProviderConfig = serde_yaml_ng::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse YAML configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider_key.is_empty() {
            return Err(Error::config("provider_key cannot be empty"));
        }
        if !self.mount_point.starts_with('/') {
            return Err(Error::config(format!(
                "mount_point must be absolute: {}",
                self.mount_point
            )));
        }
        if self.mount_point == "/" || self.mount_point.ends_with('/') {
            return Err(Error::config(format!(
                "mount_point must name a node below the root without a trailing slash: {}",
                self.mount_point
            )));
        }
        for (declaring, items) in &self.overridable_items {
            if items.is_empty() {
                return Err(Error::config(format!(
                    "overridable_items entry {declaring} lists no items"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_defaults() {
        let config = ProviderConfig::from_yaml("provider_key: db\nmount_point: /mounts/db\n").unwrap();
        assert_eq!(config, ProviderConfig::new("db", "/mounts/db"));
        assert_eq!(config.workspace, "default");
    }

    #[test]
    fn test_yaml_allow_list() {
        let yaml = r#"
provider_key: fs
mount_point: /sites/ext
overridable_items:
  "jnt:file": ["size", "title"]
  "*": ["*"]
extension_allowed_types: ["jnt:file"]
"#;
        let config = ProviderConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.overridable_items["jnt:file"], vec!["size", "title"]);
        assert_eq!(
            config.extension_allowed_types,
            Some(vec!["jnt:file".to_string()])
        );
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            ProviderConfig::new("", "/m").validate(),
            Err(Error::Config(_))
        ));
        assert!(ProviderConfig::new("k", "m").validate().is_err());
        assert!(ProviderConfig::new("k", "/m/").validate().is_err());
        assert!(ProviderConfig::new("k", "/").validate().is_err());
        assert!(ProviderConfig::new("k", "/m").validate().is_ok());
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            ProviderConfig::from_yaml("provider_key: [unterminated"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "provider_key: db\nmount_point: /mounts/db").unwrap();
        let config = ProviderConfig::load(file.path()).unwrap();
        assert_eq!(config.provider_key, "db");
        assert!(matches!(
            ProviderConfig::load("/nonexistent/extfs.yaml"),
            Err(Error::Config(_))
        ));
    }
}
