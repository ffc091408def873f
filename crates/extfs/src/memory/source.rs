// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::path;
use crate::record::Record;
use crate::source::{DataSource, WritableDataSource};
use crate::translation;
use crate::value::BinaryHandle;
use async_trait::async_trait;
use diagnostics::*;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
struct SourceState {
    records: HashMap<String, Record>,
    // parent path -> child names in order
    children: HashMap<String, Vec<String>>,
    lazy_values: HashMap<(String, String), Vec<String>>,
    lazy_binaries: HashMap<(String, String), Vec<BinaryHandle>>,
    // (parent id, lang, name)
    lazy_i18n: HashMap<(String, String, String), Vec<String>>,
    fetches: HashMap<String, usize>,
    saved: usize,
    fail_saves: bool,
    // property names whose lazy fetch fails
    failing_fetches: HashSet<String>,
    // paths whose lookup fails
    failing_lookups: HashSet<String>,
}

impl SourceState {
    fn upsert(&mut self, record: Record) {
        let p = record.path().to_string();
        if let Some(parent) = path::parent(&p) {
            let names = self.children.entry(parent.to_string()).or_default();
            let name = path::name(&p);
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        let _ = self.records.insert(p, record);
    }

    fn record(&self, p: &str) -> Result<&Record> {
        self.records
            .get(path::normalize(p))
            .ok_or_else(|| Error::not_found(p))
    }

    fn count_fetch(&mut self, name: &str) -> Result<()> {
        *self.fetches.entry(name.to_string()).or_default() += 1;
        if self.failing_fetches.contains(name) {
            return Err(Error::invalid_state(format!("fetch of {name} failed")));
        }
        Ok(())
    }
}

/// A data source over an in-memory record tree.
///
/// Lazy values are registered separately from the records that announce
/// them, keyed by record identifier, so fetches can be observed.
pub struct MemoryDataSource {
    state: Mutex<SourceState>,
    writable: bool,
    supports_uuid: bool,
}

impl Default for MemoryDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDataSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SourceState::default()),
            writable: false,
            supports_uuid: false,
        }
    }

    #[must_use]
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    #[must_use]
    pub fn supports_uuid(mut self, supports_uuid: bool) -> Self {
        self.supports_uuid = supports_uuid;
        self
    }

    #[must_use]
    pub fn with_record(mut self, record: Record) -> Self {
        self.state.get_mut().upsert(record);
        self
    }

    #[must_use]
    pub fn with_lazy_value<I: Into<String>, N: Into<String>>(
        mut self,
        id: I,
        name: N,
        values: Vec<String>,
    ) -> Self {
        let _ = self
            .state
            .get_mut()
            .lazy_values
            .insert((id.into(), name.into()), values);
        self
    }

    #[must_use]
    pub fn with_lazy_binary<I: Into<String>, N: Into<String>>(
        mut self,
        id: I,
        name: N,
        values: Vec<BinaryHandle>,
    ) -> Self {
        let _ = self
            .state
            .get_mut()
            .lazy_binaries
            .insert((id.into(), name.into()), values);
        self
    }

    #[must_use]
    pub fn with_lazy_i18n_value<I, L, N>(mut self, parent_id: I, lang: L, name: N, values: Vec<String>) -> Self
    where
        I: Into<String>,
        L: Into<String>,
        N: Into<String>,
    {
        let _ = self
            .state
            .get_mut()
            .lazy_i18n
            .insert((parent_id.into(), lang.into(), name.into()), values);
        self
    }

    /// Stored record at `p`, as the last save left it
    pub async fn record(&self, p: &str) -> Option<Record> {
        self.state.lock().await.record(p).ok().cloned()
    }

    pub async fn children_of(&self, p: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .children
            .get(path::normalize(p))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of successful `save_item` calls
    pub async fn saved_count(&self) -> usize {
        self.state.lock().await.saved
    }

    /// Number of lazy fetches for property `name`, any record
    pub async fn fetch_count(&self, name: &str) -> usize {
        self.state.lock().await.fetches.get(name).copied().unwrap_or(0)
    }

    /// Make every subsequent `save_item` fail
    pub async fn set_fail_saves(&self, fail: bool) {
        self.state.lock().await.fail_saves = fail;
    }

    /// Make lazy fetches of property `name` fail, on any record
    pub async fn set_fail_fetch(&self, name: &str, fail: bool) {
        let mut state = self.state.lock().await;
        if fail {
            let _ = state.failing_fetches.insert(name.to_string());
        } else {
            let _ = state.failing_fetches.remove(name);
        }
    }

    /// Make lookups of the item at `p` fail with something other than `NotFound`
    pub async fn set_fail_lookup(&self, p: &str, fail: bool) {
        let p = path::normalize(p).to_string();
        let mut state = self.state.lock().await;
        if fail {
            let _ = state.failing_lookups.insert(p);
        } else {
            let _ = state.failing_lookups.remove(&p);
        }
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    async fn get_item_by_path(&self, p: &str) -> Result<Record> {
        let state = self.state.lock().await;
        if state.failing_lookups.contains(path::normalize(p)) {
            return Err(Error::invalid_state(format!("lookup of {p} failed")));
        }
        state.record(p).cloned()
    }

    async fn get_item_by_identifier(&self, id: &str) -> Result<Record> {
        let state = self.state.lock().await;
        state
            .records
            .values()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("identifier {id}")))
    }

    async fn get_children(&self, p: &str) -> Result<Vec<String>> {
        Ok(self.children_of(p).await)
    }

    fn supports_uuid(&self) -> bool {
        self.supports_uuid
    }

    async fn get_property_values(&self, record: &Record, name: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        state.count_fetch(name)?;
        state
            .lazy_values
            .get(&(record.id().to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found(path::join(record.path(), name)))
    }

    async fn get_binary_property_values(&self, record: &Record, name: &str) -> Result<Vec<BinaryHandle>> {
        let mut state = self.state.lock().await;
        state.count_fetch(name)?;
        state
            .lazy_binaries
            .get(&(record.id().to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found(path::join(record.path(), name)))
    }

    async fn get_i18n_property_values(&self, record: &Record, lang: &str, name: &str) -> Result<Vec<String>> {
        let parent_id = translation::parse_translation_id(record.id())
            .map(|(_, parent)| parent)
            .unwrap_or(record.id());
        let mut state = self.state.lock().await;
        state.count_fetch(name)?;
        state
            .lazy_i18n
            .get(&(parent_id.to_string(), lang.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found(path::join(record.path(), name)))
    }

    fn as_writable(&self) -> Option<&dyn WritableDataSource> {
        if self.writable {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl WritableDataSource for MemoryDataSource {
    async fn save_item(&self, record: &Record) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_saves {
            let record_path = record.path().to_string();
            warn!("Refusing to save {record_path}", record_path);
            return Err(Error::invalid_state(format!("save of {record_path} failed")));
        }
        state.upsert(record.clone());
        state.saved += 1;
        Ok(())
    }

    async fn remove_item_by_path(&self, p: &str) -> Result<()> {
        let p = path::normalize(p);
        let mut state = self.state.lock().await;
        state.records.retain(|k, _| !path::is_descendant_or_self(k, p));
        state.children.retain(|k, _| !path::is_descendant_or_self(k, p));
        if let Some(parent) = path::parent(p) {
            if let Some(names) = state.children.get_mut(parent) {
                let name = path::name(p);
                names.retain(|n| n != name);
            }
        }
        Ok(())
    }

    async fn move_item(&self, source: &str, dest: &str) -> Result<()> {
        let source = path::normalize(source);
        let dest = path::normalize(dest);
        let mut state = self.state.lock().await;
        let _ = state.record(source)?;
        if state.records.contains_key(dest) {
            return Err(Error::item_exists(dest));
        }
        if let Some(parent) = path::parent(dest) {
            if !path::is_root(parent) && !state.records.contains_key(parent) {
                return Err(Error::not_found(parent));
            }
        }

        let moved: Vec<String> = state
            .records
            .keys()
            .filter(|k| path::is_descendant_or_self(k, source))
            .cloned()
            .collect();
        for old in moved {
            let Some(record) = state.records.remove(&old) else {
                continue;
            };
            let new = format!("{dest}{}", &old[source.len()..]);
            // Path-derived identifiers follow the path
            let id = if record.id() == old {
                new.clone()
            } else {
                record.id().to_string()
            };
            let _ = state.records.insert(new.clone(), record.relocated(id, new));
            if let Some(names) = state.children.remove(&old) {
                let _ = state.children.insert(format!("{dest}{}", &old[source.len()..]), names);
            }
        }

        if let Some(parent) = path::parent(source) {
            if let Some(names) = state.children.get_mut(parent) {
                let name = path::name(source);
                names.retain(|n| n != name);
            }
        }
        if let Some(parent) = path::parent(dest) {
            state
                .children
                .entry(parent.to_string())
                .or_default()
                .push(path::name(dest).to_string());
        }
        debug!("Moved {source} to {dest}", source, dest);
        Ok(())
    }

    async fn order(&self, p: &str, names: &[String]) -> Result<()> {
        let mut state = self.state.lock().await;
        let _ = state
            .children
            .insert(path::normalize(p).to_string(), names.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemoryDataSource {
        MemoryDataSource::new()
            .writable(true)
            .with_record(Record::new("/a", "/a", "nt:base"))
            .with_record(Record::new("fixed", "/a/b", "nt:base").with_lazy_property("body"))
            .with_record(Record::new("/a/b/c", "/a/b/c", "nt:base"))
            .with_lazy_value("fixed", "body", vec!["text".to_string()])
    }

    #[tokio::test]
    async fn test_children_follow_insertion_order() {
        let src = source().with_record(Record::new("z", "/a/z", "nt:base"));
        assert_eq!(src.get_children("/").await.unwrap(), vec!["a".to_string()]);
        assert_eq!(
            src.get_children("/a").await.unwrap(),
            vec!["b".to_string(), "z".to_string()]
        );
        assert!(src.get_children("/nowhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lazy_fetch_is_counted() {
        let src = source();
        let record = src.get_item_by_path("/a/b").await.unwrap();
        assert_eq!(
            src.get_property_values(&record, "body").await.unwrap(),
            vec!["text".to_string()]
        );
        assert_eq!(src.fetch_count("body").await, 1);
    }

    #[tokio::test]
    async fn test_move_rewrites_subtree() {
        let src = source();
        src.move_item("/a/b", "/b").await.unwrap();

        assert!(src.record("/a/b").await.is_none());
        assert_eq!(src.get_item_by_path("/b").await.unwrap().id(), "fixed");
        assert_eq!(src.get_item_by_path("/b/c").await.unwrap().id(), "/b/c");
        assert!(src.children_of("/a").await.is_empty());
        assert_eq!(src.children_of("/").await, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(
            src.move_item("/b", "/a").await,
            Err(Error::ItemExists(_))
        ));
    }

    #[tokio::test]
    async fn test_failing_saves_leave_records_alone() {
        let src = source();
        src.set_fail_saves(true).await;
        let changed = Record::new("/a", "/a", "nt:base").with_property("t", "x");
        assert!(src.save_item(&changed).await.is_err());
        assert_eq!(src.saved_count().await, 0);
        assert!(src.record("/a").await.unwrap().properties().is_empty());
    }

    #[tokio::test]
    async fn test_remove_takes_descendants() {
        let src = source();
        src.remove_item_by_path("/a/b").await.unwrap();
        assert!(src.record("/a/b/c").await.is_none());
        assert!(src.children_of("/a").await.is_empty());
        src.remove_item_by_path("/a/b").await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let src = source();
        let record = src.get_item_by_path("/a/b").await.unwrap();
        src.set_fail_fetch("body", true).await;
        let err = src.get_property_values(&record, "body").await.unwrap_err();
        assert!(!err.is_not_found());
        src.set_fail_fetch("body", false).await;
        assert!(src.get_property_values(&record, "body").await.is_ok());

        src.set_fail_lookup("/a/b/", true).await;
        assert!(!src.get_item_by_path("/a/b").await.unwrap_err().is_not_found());
        assert!(src.get_item_by_path("/a").await.is_ok());
    }

    #[test]
    fn test_read_only_has_no_write_capability() {
        assert!(MemoryDataSource::new().as_writable().is_none());
        assert!(source().as_writable().is_some());
    }
}
