// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Overlay store contract
//!
//! The overlay is a secondary, fully writable tree addressed by absolute
//! path. It holds the properties, mixins and children the external source
//! cannot store itself.

use crate::error::Result;
use crate::path;
use crate::value::PropertyValue;
use async_trait::async_trait;
use std::sync::Arc;

pub const EXTENDED_TYPE_PROPERTY: &str = "j:extendedType";
pub const PROVIDER_ROOT_PROPERTY: &str = "j:isExternalProviderRoot";
pub const EXTERNAL_IDENTIFIER_PROPERTY: &str = "j:externalNodeIdentifier";

#[async_trait]
pub trait OverlayStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool>;
    async fn node_type(&self, path: &str) -> Result<String>;

    /// Fails with `ItemExists` if taken, `NotFound` if the parent is missing
    async fn add_node(&self, parent: &str, name: &str, type_name: &str) -> Result<()>;
    async fn remove_node(&self, path: &str) -> Result<()>;

    /// Child names in insertion order
    async fn children(&self, path: &str) -> Result<Vec<String>>;

    async fn mixins(&self, path: &str) -> Result<Vec<String>>;
    async fn add_mixin(&self, path: &str, mixin: &str) -> Result<()>;
    async fn remove_mixin(&self, path: &str, mixin: &str) -> Result<()>;

    async fn property(&self, path: &str, name: &str) -> Result<Option<PropertyValue>>;
    async fn property_names(&self, path: &str) -> Result<Vec<String>>;
    async fn set_property(&self, path: &str, name: &str, value: PropertyValue) -> Result<()>;
    async fn remove_property(&self, path: &str, name: &str) -> Result<bool>;
}

/// A node of the overlay tree, bound to its store.
#[derive(Clone)]
pub struct OverlayNode {
    store: Arc<dyn OverlayStore>,
    path: String,
}

impl std::fmt::Debug for OverlayNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayNode").field("path", &self.path).finish()
    }
}

impl OverlayNode {
    pub(crate) fn new(store: Arc<dyn OverlayStore>, path: String) -> Self {
        Self { store, path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn store(&self) -> &Arc<dyn OverlayStore> {
        &self.store
    }

    pub async fn type_name(&self) -> Result<String> {
        self.store.node_type(&self.path).await
    }

    pub async fn has_property(&self, name: &str) -> Result<bool> {
        Ok(self.store.property(&self.path, name).await?.is_some())
    }

    pub async fn property(&self, name: &str) -> Result<Option<PropertyValue>> {
        self.store.property(&self.path, name).await
    }

    pub async fn property_names(&self) -> Result<Vec<String>> {
        self.store.property_names(&self.path).await
    }

    pub async fn set_property(&self, name: &str, value: PropertyValue) -> Result<()> {
        self.store.set_property(&self.path, name, value).await
    }

    pub async fn remove_property(&self, name: &str) -> Result<bool> {
        self.store.remove_property(&self.path, name).await
    }

    pub async fn mixins(&self) -> Result<Vec<String>> {
        self.store.mixins(&self.path).await
    }

    pub async fn add_mixin(&self, mixin: &str) -> Result<()> {
        self.store.add_mixin(&self.path, mixin).await
    }

    pub async fn remove_mixin(&self, mixin: &str) -> Result<()> {
        self.store.remove_mixin(&self.path, mixin).await
    }

    pub async fn children(&self) -> Result<Vec<String>> {
        self.store.children(&self.path).await
    }

    pub async fn has_child(&self, name: &str) -> Result<bool> {
        self.store.exists(&path::join(&self.path, name)).await
    }

    pub fn child(&self, name: &str) -> OverlayNode {
        OverlayNode::new(self.store.clone(), path::join(&self.path, name))
    }

    pub async fn add_child(&self, name: &str, type_name: &str) -> Result<OverlayNode> {
        self.store.add_node(&self.path, name, type_name).await?;
        Ok(self.child(name))
    }

    pub async fn remove(&self) -> Result<()> {
        self.store.remove_node(&self.path).await
    }
}
