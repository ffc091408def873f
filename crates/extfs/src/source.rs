// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::BinaryHandle;
use async_trait::async_trait;

/// Read path of an external data source - no caching, no pending changes
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn get_item_by_path(&self, path: &str) -> Result<Record>;
    async fn get_item_by_identifier(&self, id: &str) -> Result<Record>;

    /// Child names in the source's natural order
    async fn get_children(&self, path: &str) -> Result<Vec<String>>;

    /// External identifiers are stable and globally unique
    fn supports_uuid(&self) -> bool;

    // Lazy value fetches
    async fn get_property_values(&self, record: &Record, name: &str) -> Result<Vec<String>>;
    async fn get_binary_property_values(&self, record: &Record, name: &str) -> Result<Vec<BinaryHandle>>;

    /// Values of a lazy internationalized property. `record` is the
    /// translation child the value was requested through.
    async fn get_i18n_property_values(
        &self,
        record: &Record,
        lang: &str,
        name: &str,
    ) -> Result<Vec<String>> {
        let _ = (record, lang);
        Err(Error::unsupported(format!("lazy i18n property {name}")))
    }

    /// Write capability, if this source offers one
    fn as_writable(&self) -> Option<&dyn WritableDataSource> {
        None
    }
}

/// Optional write capability of a data source
#[async_trait]
pub trait WritableDataSource: Send + Sync {
    async fn save_item(&self, record: &Record) -> Result<()>;
    async fn remove_item_by_path(&self, path: &str) -> Result<()>;
    async fn move_item(&self, source: &str, dest: &str) -> Result<()>;
    async fn order(&self, path: &str, names: &[String]) -> Result<()>;
}
