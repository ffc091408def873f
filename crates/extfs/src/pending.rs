// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Session-scoped buffer of uncommitted changes

use crate::path;
use crate::record::Record;
use std::collections::HashMap;

/// Path-keyed map that remembers first insertion order.
///
/// Re-inserting an existing path overwrites its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct PathMap<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for PathMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> PathMap<T> {
    pub fn insert(&mut self, path: String, value: T) {
        match self.index.get(&path) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                let _ = self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, value));
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&T> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut T> {
        self.index.get(path).map(|&i| &mut self.entries[i].1)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Drop every entry for which `keep` answers false, preserving order.
    pub fn retain<F: FnMut(&str, &T) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|(p, v)| keep(p, v));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (p, _))| (p.clone(), i))
            .collect();
    }

    pub fn remove(&mut self, path: &str) -> Option<T> {
        let i = *self.index.get(path)?;
        let (_, value) = self.entries.remove(i);
        self.retain(|_, _| true);
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(p, v)| (p.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

/// Changed, deleted and reordered items of one session.
///
/// A path in `deleted` is never also in `changed`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChanges {
    pub changed: PathMap<Record>,
    pub deleted: PathMap<Record>,
    pub reordered: PathMap<Vec<String>>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty() && self.reordered.is_empty()
    }

    pub fn clear(&mut self) {
        self.changed.clear();
        self.deleted.clear();
        self.reordered.clear();
    }

    pub(crate) fn register_changed(&mut self, record: Record) {
        // Re-creating a path cancels its pending deletion
        let _ = self.deleted.remove(record.path());
        self.changed.insert(record.path().to_string(), record);
    }

    pub(crate) fn register_deleted(&mut self, record: Record) {
        let p = record.path().to_string();
        self.changed.retain(|c, _| !path::is_descendant_or_self(c, &p));
        self.reordered.retain(|c, _| !path::is_descendant_or_self(c, &p));
        self.deleted.retain(|c, _| !path::is_descendant_or_self(c, &p));
        self.deleted.insert(p, record);
    }

    /// The path itself or one of its ancestors is pending deletion.
    #[must_use]
    pub fn is_deleted(&self, p: &str) -> bool {
        self.deleted
            .iter()
            .any(|(d, _)| path::is_descendant_or_self(p, d))
    }

    pub fn changed_by_id(&self, id: &str) -> Option<&Record> {
        self.changed.values().find(|r| r.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_with_overwrite() {
        let mut m = PathMap::default();
        m.insert("/b".to_string(), 1);
        m.insert("/a".to_string(), 2);
        m.insert("/b".to_string(), 3);
        let seen: Vec<(&str, &i32)> = m.iter().collect();
        assert_eq!(seen, vec![("/b", &3), ("/a", &2)]);

        assert_eq!(m.remove("/b"), Some(3));
        assert_eq!(m.get("/a"), Some(&2));
        assert!(!m.contains("/b"));
    }

    #[test]
    fn test_delete_supersedes_changes_below() {
        let mut p = PendingChanges::default();
        p.register_changed(Record::new("1", "/y", "nt:base"));
        p.register_changed(Record::new("2", "/y/z", "nt:base"));
        p.register_changed(Record::new("3", "/yy", "nt:base"));
        p.reordered.insert("/y".to_string(), vec!["z".to_string()]);

        p.register_deleted(Record::new("1", "/y", "nt:base"));
        assert!(!p.changed.contains("/y"));
        assert!(!p.changed.contains("/y/z"));
        assert!(p.changed.contains("/yy"));
        assert!(p.reordered.is_empty());
        assert!(p.is_deleted("/y/z"));
        assert!(!p.is_deleted("/yy"));
    }

    #[test]
    fn test_recreate_cancels_delete() {
        let mut p = PendingChanges::default();
        p.register_deleted(Record::new("1", "/y", "nt:base"));
        p.register_changed(Record::new("/y", "/y", "nt:base"));
        assert!(p.deleted.is_empty());
        assert_eq!(p.changed_by_id("/y").map(Record::path), Some("/y"));
    }
}
