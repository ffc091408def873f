// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Overlay delegation
//!
//! Decides whether a property, mixin or child is answered by the overlay tree
//! rather than the external record, and finds or creates the overlay node that
//! mirrors an external node.

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::node::ExternalNode;
use crate::overlay::{
    EXTENDED_TYPE_PROPERTY, EXTERNAL_IDENTIFIER_PROPERTY, OverlayNode, OverlayStore,
    PROVIDER_ROOT_PROPERTY,
};
use crate::path;
use crate::types::{EXTENSION_TYPE, ItemDefinition, RESIDUAL, TypeLookup};
use crate::value::{PropertyValue, Value};
use diagnostics::*;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Clone)]
pub struct OverlayResolver {
    store: Option<Arc<dyn OverlayStore>>,
    types: Arc<dyn TypeLookup>,
    mount_point: String,
    overridable: BTreeMap<String, Vec<String>>,
    allowed_types: Option<Vec<String>>,
}

impl OverlayResolver {
    pub fn new(
        config: &ProviderConfig,
        types: Arc<dyn TypeLookup>,
        store: Option<Arc<dyn OverlayStore>>,
    ) -> Self {
        Self {
            store,
            types,
            mount_point: path::normalize(&config.mount_point).to_string(),
            overridable: config.overridable_items.clone(),
            allowed_types: config.extension_allowed_types.clone(),
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn OverlayStore>> {
        self.store.as_ref()
    }

    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Path in the overlay tree mirroring `external_path`.
    #[must_use]
    pub fn mirrored_path(&self, external_path: &str) -> String {
        if path::is_root(external_path) {
            self.mount_point.clone()
        } else {
            path::join(&self.mount_point, external_path)
        }
    }

    fn allow_listed(&self, declaring_type: &str, item_name: &str) -> bool {
        [declaring_type, RESIDUAL].iter().any(|key| {
            self.overridable
                .get(*key)
                .is_some_and(|items| items.iter().any(|i| i == item_name || i == RESIDUAL))
        })
    }

    /// Whether an item with `definition` lives in the overlay, given the
    /// mixins currently carried by the overlay node.
    pub fn can_delegate(
        &self,
        definition: Option<&dyn ItemDefinition>,
        overlay_mixins: &[String],
    ) -> Result<bool> {
        let def = definition
            .ok_or_else(|| Error::constraint_violation("no matching item definition"))?;
        if self.allow_listed(def.declaring_type(), def.name()) {
            return Ok(true);
        }
        let declaring = self.types.definitions_for(def.declaring_type())?;
        Ok(declaring.is_mixin()
            && overlay_mixins
                .iter()
                .any(|m| self.types.is_subtype(m, def.declaring_type())))
    }

    /// Every configured allowed type must match the node.
    fn type_allowed(&self, primary_type: &str, mixins: &[String]) -> bool {
        let Some(allowed) = &self.allowed_types else {
            return true;
        };
        allowed.iter().all(|t| {
            self.types.is_subtype(primary_type, t)
                || mixins.iter().any(|m| self.types.is_subtype(m, t))
        })
    }

    /// An overlay is configured and admits `node`.
    pub(crate) async fn accepts(&self, node: &ExternalNode) -> bool {
        self.store.is_some() && self.type_allowed(node.primary_type(), &node.record_mixins().await)
    }

    /// The overlay node mirroring `node`, created (with its ancestors) on demand.
    pub(crate) fn overlay_node<'a>(
        &'a self,
        node: &'a ExternalNode,
        create: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Option<OverlayNode>>> + Send + 'a>> {
        Box::pin(async move {
            let Some(store) = &self.store else {
                return Ok(None);
            };
            if !self.type_allowed(node.primary_type(), &node.record_mixins().await) {
                return Ok(None);
            }

            let mirrored = self.mirrored_path(node.path());
            if store.exists(&mirrored).await? {
                return Ok(Some(OverlayNode::new(store.clone(), mirrored)));
            }
            if !create {
                return Ok(None);
            }

            let is_root = path::is_root(node.path());
            let parent_overlay = if is_root {
                // The mount point hangs directly below its structural parent
                let parent = path::parent(&mirrored).ok_or_else(|| {
                    Error::invalid_state(format!("mount point {mirrored} has no parent"))
                })?;
                if !store.exists(parent).await? {
                    return Err(Error::not_found(parent));
                }
                OverlayNode::new(store.clone(), parent.to_string())
            } else {
                let parent = node.parent_external().await?;
                match self.overlay_node(&parent, true).await? {
                    Some(p) => p,
                    None => return Ok(None),
                }
            };

            let created = parent_overlay
                .add_child(path::name(&mirrored), EXTENSION_TYPE)
                .await?;
            created
                .set_property(
                    EXTENDED_TYPE_PROPERTY,
                    PropertyValue::from(node.primary_type()),
                )
                .await?;
            created
                .set_property(PROVIDER_ROOT_PROPERTY, PropertyValue::from(is_root))
                .await?;
            let identifier = node.identifier().await?;
            created
                .set_property(
                    EXTERNAL_IDENTIFIER_PROPERTY,
                    PropertyValue::Single(Value::reference(identifier, true)),
                )
                .await?;
            debug!("Created overlay node {mirrored}", mirrored);
            Ok(Some(created))
        })
    }
}
