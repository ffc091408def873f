// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::overlay::OverlayNode;
use crate::path;
use crate::property::{Property, PropertyOrigin};
use crate::session::Session;
use crate::types::PropertyDefinition;
use crate::value::PropertyValue;
use std::sync::Arc;
use utilities::glob::NamePattern;

/// An overlay-only node, shown at its path in the external tree
#[derive(Clone)]
pub struct ExtensionNode {
    session: Session,
    overlay: OverlayNode,
    path: String,
}

impl std::fmt::Debug for ExtensionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionNode")
            .field("path", &self.path)
            .field("overlay", &self.overlay)
            .finish()
    }
}

impl ExtensionNode {
    pub(crate) fn new(session: Session, overlay: OverlayNode, path: String) -> Self {
        Self {
            session,
            overlay,
            path,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        path::name(&self.path)
    }

    /// The backing node in the overlay tree
    pub fn overlay(&self) -> &OverlayNode {
        &self.overlay
    }

    pub async fn type_name(&self) -> Result<String> {
        self.overlay.type_name().await
    }

    async fn property_definition(&self, name: &str) -> Result<Option<Arc<PropertyDefinition>>> {
        let defs = self.session.types().definitions_for(&self.type_name().await?)?;
        Ok(defs.property(name).or(defs.residual_property()).cloned())
    }

    pub async fn get_property(&self, name: &str) -> Result<Property> {
        let value = self
            .overlay
            .property(name)
            .await?
            .ok_or_else(|| Error::not_found(path::join(&self.path, name)))?;
        let def = self.property_definition(name).await?;
        Ok(Property::new(&self.path, name, value, def, PropertyOrigin::Overlay))
    }

    pub async fn has_property(&self, name: &str) -> Result<bool> {
        self.overlay.has_property(name).await
    }

    pub async fn set_property(&self, name: &str, value: Option<PropertyValue>) -> Result<Property> {
        let def = self.property_definition(name).await?;
        match value {
            Some(v) => {
                self.overlay.set_property(name, v.clone()).await?;
                Ok(Property::new(&self.path, name, v, def, PropertyOrigin::Overlay))
            }
            None => {
                let _ = self.overlay.remove_property(name).await?;
                Ok(Property::null(&self.path, name, def))
            }
        }
    }

    pub async fn remove_property(&self, name: &str) -> Result<bool> {
        self.overlay.remove_property(name).await
    }

    pub async fn get_properties(&self, pattern: Option<&str>) -> Result<Vec<Property>> {
        let pattern = pattern.map(NamePattern::parse).transpose()?;
        let mut properties = Vec::new();
        for name in self.overlay.property_names().await? {
            if pattern.as_ref().is_none_or(|p| p.matches(&name)) {
                properties.push(self.get_property(&name).await?);
            }
        }
        Ok(properties)
    }

    pub async fn child(&self, name: &str) -> Result<Option<ExtensionNode>> {
        if !self.overlay.has_child(name).await? {
            return Ok(None);
        }
        Ok(Some(ExtensionNode::new(
            self.session.clone(),
            self.overlay.child(name),
            path::join(&self.path, name),
        )))
    }

    pub async fn get_node(&self, name: &str) -> Result<ExtensionNode> {
        self.child(name)
            .await?
            .ok_or_else(|| Error::not_found(path::join(&self.path, name)))
    }

    pub async fn get_nodes(&self, pattern: Option<&str>) -> Result<Vec<ExtensionNode>> {
        let pattern = pattern.map(NamePattern::parse).transpose()?;
        Ok(self
            .overlay
            .children()
            .await?
            .into_iter()
            .filter(|name| pattern.as_ref().is_none_or(|p| p.matches(name)))
            .map(|name| {
                ExtensionNode::new(
                    self.session.clone(),
                    self.overlay.child(&name),
                    path::join(&self.path, &name),
                )
            })
            .collect())
    }

    pub async fn add_node(&self, name: &str, type_name: &str) -> Result<ExtensionNode> {
        let _ = self.session.types().definitions_for(type_name)?;
        let child = self.overlay.add_child(name, type_name).await?;
        Ok(ExtensionNode::new(
            self.session.clone(),
            child,
            path::join(&self.path, name),
        ))
    }

    pub async fn mixin_types(&self) -> Result<Vec<String>> {
        self.overlay.mixins().await
    }

    pub async fn add_mixin(&self, mixin: &str) -> Result<()> {
        if !self.session.types().definitions_for(mixin)?.is_mixin() {
            return Err(Error::constraint_violation(format!("{mixin} is not a mixin")));
        }
        if self.mixin_types().await?.iter().any(|m| m == mixin) {
            return Ok(());
        }
        self.overlay.add_mixin(mixin).await
    }

    pub async fn remove_mixin(&self, mixin: &str) -> Result<()> {
        if !self.mixin_types().await?.iter().any(|m| m == mixin) {
            return Err(Error::no_such_node_type(mixin));
        }
        self.overlay.remove_mixin(mixin).await
    }

    pub async fn remove(&self) -> Result<()> {
        self.overlay.remove().await
    }
}
