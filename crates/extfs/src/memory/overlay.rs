// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::overlay::OverlayStore;
use crate::path;
use crate::types::NT_BASE;
use crate::value::PropertyValue;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct OverlayEntry {
    type_name: String,
    mixins: Vec<String>,
    properties: BTreeMap<String, PropertyValue>,
    children: Vec<String>,
}

impl OverlayEntry {
    fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            mixins: Vec::new(),
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }
}

/// Path-keyed overlay tree held in memory
pub struct MemoryOverlayStore {
    nodes: Mutex<HashMap<String, OverlayEntry>>,
}

impl Default for MemoryOverlayStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOverlayStore {
    /// An overlay holding only its root
    #[must_use]
    pub fn new() -> Self {
        Self::with_mount_parent(path::ROOT)
    }

    /// An overlay where every node down to `parent` already exists, ready
    /// for a mount point created below it.
    #[must_use]
    pub fn with_mount_parent(parent: &str) -> Self {
        let mut nodes = HashMap::new();
        let _ = nodes.insert(path::ROOT.to_string(), OverlayEntry::new(NT_BASE));
        let mut current = path::ROOT.to_string();
        for segment in parent.split('/').filter(|s| !s.is_empty()) {
            let child = path::join(&current, segment);
            if let Some(entry) = nodes.get_mut(&current) {
                entry.children.push(segment.to_string());
            }
            let _ = nodes.insert(child.clone(), OverlayEntry::new(NT_BASE));
            current = child;
        }
        Self {
            nodes: Mutex::new(nodes),
        }
    }

    pub async fn len(&self) -> usize {
        self.nodes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn missing(p: &str) -> Error {
    Error::not_found(format!("overlay node {p}"))
}

#[async_trait]
impl OverlayStore for MemoryOverlayStore {
    async fn exists(&self, p: &str) -> Result<bool> {
        Ok(self.nodes.lock().await.contains_key(p))
    }

    async fn node_type(&self, p: &str) -> Result<String> {
        let nodes = self.nodes.lock().await;
        nodes
            .get(p)
            .map(|e| e.type_name.clone())
            .ok_or_else(|| missing(p))
    }

    async fn add_node(&self, parent: &str, name: &str, type_name: &str) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let child = path::join(parent, name);
        if nodes.contains_key(&child) {
            return Err(Error::item_exists(child));
        }
        let entry = nodes.get_mut(parent).ok_or_else(|| missing(parent))?;
        entry.children.push(name.to_string());
        let _ = nodes.insert(child, OverlayEntry::new(type_name));
        Ok(())
    }

    async fn remove_node(&self, p: &str) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        if !nodes.contains_key(p) {
            return Err(missing(p));
        }
        nodes.retain(|k, _| !path::is_descendant_or_self(k, p));
        if let Some(parent) = path::parent(p) {
            if let Some(entry) = nodes.get_mut(parent) {
                let name = path::name(p);
                entry.children.retain(|c| c != name);
            }
        }
        Ok(())
    }

    async fn children(&self, p: &str) -> Result<Vec<String>> {
        let nodes = self.nodes.lock().await;
        nodes
            .get(p)
            .map(|e| e.children.clone())
            .ok_or_else(|| missing(p))
    }

    async fn mixins(&self, p: &str) -> Result<Vec<String>> {
        let nodes = self.nodes.lock().await;
        nodes
            .get(p)
            .map(|e| e.mixins.clone())
            .ok_or_else(|| missing(p))
    }

    async fn add_mixin(&self, p: &str, mixin: &str) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let entry = nodes.get_mut(p).ok_or_else(|| missing(p))?;
        if !entry.mixins.iter().any(|m| m == mixin) {
            entry.mixins.push(mixin.to_string());
        }
        Ok(())
    }

    async fn remove_mixin(&self, p: &str, mixin: &str) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let entry = nodes.get_mut(p).ok_or_else(|| missing(p))?;
        let before = entry.mixins.len();
        entry.mixins.retain(|m| m != mixin);
        if entry.mixins.len() == before {
            return Err(Error::no_such_node_type(mixin));
        }
        Ok(())
    }

    async fn property(&self, p: &str, name: &str) -> Result<Option<PropertyValue>> {
        let nodes = self.nodes.lock().await;
        let entry = nodes.get(p).ok_or_else(|| missing(p))?;
        Ok(entry.properties.get(name).cloned())
    }

    async fn property_names(&self, p: &str) -> Result<Vec<String>> {
        let nodes = self.nodes.lock().await;
        let entry = nodes.get(p).ok_or_else(|| missing(p))?;
        Ok(entry.properties.keys().cloned().collect())
    }

    async fn set_property(&self, p: &str, name: &str, value: PropertyValue) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let entry = nodes.get_mut(p).ok_or_else(|| missing(p))?;
        let _ = entry.properties.insert(name.to_string(), value);
        Ok(())
    }

    async fn remove_property(&self, p: &str, name: &str) -> Result<bool> {
        let mut nodes = self.nodes.lock().await;
        let entry = nodes.get_mut(p).ok_or_else(|| missing(p))?;
        Ok(entry.properties.remove(name).is_some())
    }
}
