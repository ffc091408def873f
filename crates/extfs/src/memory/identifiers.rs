// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::idmap::{IdentifierMapping, IdentifierStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct MappingTable {
    // (provider_key, external_id) -> internal_id
    by_external: HashMap<(String, String), String>,
    // internal_id -> (provider_key, external_id)
    by_internal: HashMap<String, (String, String)>,
}

/// Identifier table unique on `(provider_key, external_id)` and on `internal_id`
#[derive(Default)]
pub struct MemoryIdentifierStore {
    table: Mutex<MappingTable>,
}

impl MemoryIdentifierStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.by_internal.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IdentifierStore for MemoryIdentifierStore {
    async fn internal_id(&self, provider_key: &str, external_id: &str) -> Result<Option<String>> {
        let table = self.table.lock().await;
        Ok(table
            .by_external
            .get(&(provider_key.to_string(), external_id.to_string()))
            .cloned())
    }

    async fn external_id(&self, provider_key: &str, internal_id: &str) -> Result<Option<String>> {
        let table = self.table.lock().await;
        Ok(table
            .by_internal
            .get(internal_id)
            .filter(|(p, _)| p == provider_key)
            .map(|(_, e)| e.clone()))
    }

    async fn insert(&self, mapping: IdentifierMapping) -> Result<()> {
        let mut table = self.table.lock().await;
        let key = (mapping.provider_key, mapping.external_id);
        if table.by_external.contains_key(&key) {
            return Err(Error::item_exists(format!("mapping for {}", key.1)));
        }
        if table.by_internal.contains_key(&mapping.internal_id) {
            return Err(Error::item_exists(format!(
                "identifier {}",
                mapping.internal_id
            )));
        }
        let _ = table
            .by_internal
            .insert(mapping.internal_id.clone(), key.clone());
        let _ = table.by_external.insert(key, mapping.internal_id);
        Ok(())
    }

    async fn update_external_id(&self, provider_key: &str, old: &str, new: &str) -> Result<bool> {
        let mut table = self.table.lock().await;
        let new_key = (provider_key.to_string(), new.to_string());
        if table.by_external.contains_key(&new_key) {
            return Err(Error::item_exists(format!("mapping for {new}")));
        }
        let Some(internal) = table
            .by_external
            .remove(&(provider_key.to_string(), old.to_string()))
        else {
            return Ok(false);
        };
        let _ = table.by_internal.insert(internal.clone(), new_key.clone());
        let _ = table.by_external.insert(new_key, internal);
        Ok(true)
    }

    async fn remove(&self, provider_key: &str, external_id: &str) -> Result<bool> {
        let mut table = self.table.lock().await;
        let Some(internal) = table
            .by_external
            .remove(&(provider_key.to_string(), external_id.to_string()))
        else {
            return Ok(false);
        };
        let _ = table.by_internal.remove(&internal);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(provider: &str, external: &str, internal: &str) -> IdentifierMapping {
        IdentifierMapping {
            provider_key: provider.to_string(),
            external_id: external.to_string(),
            internal_id: internal.to_string(),
        }
    }

    #[tokio::test]
    async fn test_uniqueness() {
        let store = MemoryIdentifierStore::new();
        store.insert(mapping("p", "e1", "i1")).await.unwrap();
        assert!(matches!(
            store.insert(mapping("p", "e1", "i2")).await,
            Err(Error::ItemExists(_))
        ));
        assert!(matches!(
            store.insert(mapping("q", "e9", "i1")).await,
            Err(Error::ItemExists(_))
        ));
        store.insert(mapping("q", "e1", "i3")).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_lookup_is_scoped_by_provider() {
        let store = MemoryIdentifierStore::new();
        store.insert(mapping("p", "e1", "i1")).await.unwrap();
        assert_eq!(store.external_id("p", "i1").await.unwrap(), Some("e1".to_string()));
        assert_eq!(store.external_id("q", "i1").await.unwrap(), None);
        assert_eq!(store.internal_id("q", "e1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let store = MemoryIdentifierStore::new();
        store.insert(mapping("p", "e1", "i1")).await.unwrap();
        assert!(store.update_external_id("p", "e1", "e2").await.unwrap());
        assert!(!store.update_external_id("p", "e1", "e3").await.unwrap());
        assert_eq!(store.internal_id("p", "e2").await.unwrap(), Some("i1".to_string()));
        assert!(store.remove("p", "e2").await.unwrap());
        assert!(store.is_empty().await);
    }
}
