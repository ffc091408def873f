// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Stable identifiers for external records
//!
//! Sources whose IDs are not globally unique get an opaque identifier per
//! `(provider_key, external_id)`, persisted through an `IdentifierStore`. The
//! store enforces uniqueness; this layer only reacts to it.

use crate::error::{Error, Result};
use crate::record::Record;
use crate::translation;
use async_trait::async_trait;
use diagnostics::*;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentifierMapping {
    pub provider_key: String,
    pub external_id: String,
    pub internal_id: String,
}

#[async_trait]
pub trait IdentifierStore: Send + Sync {
    async fn internal_id(&self, provider_key: &str, external_id: &str) -> Result<Option<String>>;
    async fn external_id(&self, provider_key: &str, internal_id: &str) -> Result<Option<String>>;

    /// Must fail with `ItemExists` when the pair or the internal id is taken
    async fn insert(&self, mapping: IdentifierMapping) -> Result<()>;

    /// Re-point a mapping at a new external id. Returns whether one existed.
    async fn update_external_id(&self, provider_key: &str, old: &str, new: &str) -> Result<bool>;

    async fn remove(&self, provider_key: &str, external_id: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct IdentifierMapper {
    store: Arc<dyn IdentifierStore>,
    provider_key: String,
}

impl IdentifierMapper {
    pub fn new<S: Into<String>>(store: Arc<dyn IdentifierStore>, provider_key: S) -> Self {
        Self {
            store,
            provider_key: provider_key.into(),
        }
    }

    pub fn provider_key(&self) -> &str {
        &self.provider_key
    }

    /// Identifier of `record`. Native ids pass through unless the record is a
    /// virtual translation child.
    pub async fn resolve(&self, record: &Record, supports_uuid: bool) -> Result<String> {
        if supports_uuid && !translation::is_translation_id(record.id()) {
            return Ok(record.id().to_string());
        }
        self.internal_for(record.id()).await
    }

    /// Look up the mapping for `external_id`, allocating one if absent.
    pub async fn internal_for(&self, external_id: &str) -> Result<String> {
        if let Some(id) = self.store.internal_id(&self.provider_key, external_id).await? {
            return Ok(id);
        }

        let internal_id = uuid7::uuid7().to_string();
        let mapping = IdentifierMapping {
            provider_key: self.provider_key.clone(),
            external_id: external_id.to_string(),
            internal_id: internal_id.clone(),
        };
        match self.store.insert(mapping).await {
            Ok(()) => {
                debug!("Allocated identifier {internal_id} for {external_id}", internal_id, external_id);
                Ok(internal_id)
            }
            Err(Error::ItemExists(_)) => {
                // Another session won; reuse its row
                warn!("Identifier allocation race lost for {external_id}, reusing winner", external_id);
                self.store
                    .internal_id(&self.provider_key, external_id)
                    .await?
                    .ok_or_else(|| Error::invalid_state(format!("mapping for {external_id} vanished")))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn external_for(&self, internal_id: &str) -> Result<Option<String>> {
        self.store.external_id(&self.provider_key, internal_id).await
    }

    /// Keep the internal identifier across a move that changed the external id
    pub async fn moved(&self, old_external: &str, new_external: &str) -> Result<bool> {
        self.store
            .update_external_id(&self.provider_key, old_external, new_external)
            .await
    }

    pub async fn forget(&self, external_id: &str) -> Result<bool> {
        self.store.remove(&self.provider_key, external_id).await
    }
}
