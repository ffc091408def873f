// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Session context
//!
//! A session owns the pending-change buffer. Nothing reaches the data source
//! before `save()`, which applies reorders, then saves changed records, then
//! deletes, and clears the buffer only once all of that succeeded.

use crate::error::{Error, Result};
use crate::idmap::IdentifierMapper;
use crate::node::{ExternalNode, Item, Node};
use crate::path;
use crate::pending::{PathMap, PendingChanges};
use crate::property::Property;
use crate::provider::ProviderContext;
use crate::record::Record;
use crate::resolver::OverlayResolver;
use crate::source::{DataSource, WritableDataSource};
use crate::translation;
use crate::types::TypeLookup;
use crate::workspace::Workspace;
use diagnostics::*;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

struct SessionInner {
    ctx: Arc<ProviderContext>,
    pending: Mutex<PendingChanges>,
}

/// One caller's view of the external tree. Cloning shares the buffer.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub(crate) fn new(ctx: Arc<ProviderContext>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                ctx,
                pending: Mutex::new(PendingChanges::default()),
            }),
        }
    }

    pub(crate) fn source(&self) -> &Arc<dyn DataSource> {
        &self.inner.ctx.source
    }

    pub(crate) fn types(&self) -> &Arc<dyn TypeLookup> {
        &self.inner.ctx.types
    }

    pub(crate) fn mapper(&self) -> &IdentifierMapper {
        &self.inner.ctx.mapper
    }

    pub(crate) fn resolver(&self) -> &OverlayResolver {
        &self.inner.ctx.resolver
    }

    /// The write capability, or `Unsupported` on a read-only source.
    pub(crate) fn writable(&self) -> Result<&dyn WritableDataSource> {
        self.source().as_writable().ok_or_else(|| {
            Error::unsupported(format!(
                "provider {} is read-only",
                self.inner.ctx.config.provider_key
            ))
        })
    }

    pub fn provider_key(&self) -> &str {
        &self.inner.ctx.config.provider_key
    }

    #[must_use]
    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.clone(), self.inner.ctx.config.workspace.clone())
    }

    // Pending-change bookkeeping

    pub(crate) async fn register_changed(&self, record: Record) {
        let record_path = record.path().to_string();
        debug!("Pending change for {record_path}", record_path);
        self.inner.pending.lock().await.register_changed(record);
    }

    /// Apply `change` to the buffered record at `base`'s path, starting from
    /// `base` when nothing is buffered there yet. Every handle on a path thus
    /// writes into one record.
    pub(crate) async fn change_record<F>(&self, base: &Record, change: F) -> Record
    where
        F: FnOnce(&mut Record) + Send,
    {
        let record_path = base.path().to_string();
        let mut pending = self.inner.pending.lock().await;
        let mut record = match pending.changed.get(&record_path) {
            Some(buffered) => {
                let mut record = buffered.clone();
                record.adopt_loaded(base);
                record
            }
            None => base.clone(),
        };
        change(&mut record);
        debug!("Pending change for {record_path}", record_path);
        pending.register_changed(record.clone());
        record
    }

    /// Buffered record at `p`, if this session changed it.
    pub(crate) async fn buffered_record(&self, p: &str) -> Option<Record> {
        self.inner.pending.lock().await.changed.get(p).cloned()
    }

    pub(crate) async fn register_deleted(&self, record: Record) {
        let record_path = record.path().to_string();
        debug!("Pending deletion of {record_path}", record_path);
        self.inner.pending.lock().await.register_deleted(record);
    }

    pub(crate) async fn register_order(&self, parent: &str, names: Vec<String>) {
        debug!("Pending child order for {parent}", parent);
        self.inner
            .pending
            .lock()
            .await
            .reordered
            .insert(parent.to_string(), names);
    }

    pub(crate) async fn pending_order(&self, parent: &str) -> Option<Vec<String>> {
        self.inner.pending.lock().await.reordered.get(parent).cloned()
    }

    pub(crate) async fn is_deleted(&self, p: &str) -> bool {
        self.inner.pending.lock().await.is_deleted(p)
    }

    /// Names of children added in this session and not yet saved
    pub(crate) async fn pending_children(&self, parent: &str) -> Vec<String> {
        self.inner
            .pending
            .lock()
            .await
            .changed
            .iter()
            .filter(|(p, _)| path::parent(p) == Some(parent))
            .map(|(p, _)| path::name(p).to_string())
            .filter(|name| translation::language_of_name(name).is_none())
            .collect()
    }

    /// Snapshot of the buffer
    pub async fn pending_changes(&self) -> PendingChanges {
        self.inner.pending.lock().await.clone()
    }

    pub async fn has_pending_changes(&self) -> bool {
        !self.inner.pending.lock().await.is_empty()
    }

    // Lookup

    /// Record at `p` as this session sees it.
    pub(crate) fn record_at<'a>(
        &'a self,
        p: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Record>> + Send + 'a>> {
        Box::pin(async move {
            let p = path::normalize(p);
            {
                let pending = self.inner.pending.lock().await;
                if pending.is_deleted(p) {
                    return Err(Error::not_found(p));
                }
                if let Some(record) = pending.changed.get(p) {
                    return Ok(record.clone());
                }
            }
            if let Some(lang) = translation::language_of_path(p) {
                let parent = path::parent(p).ok_or_else(|| Error::not_found(p))?;
                let parent_record = self.record_at(parent).await?;
                if parent_record.type_name() == translation::TRANSLATION_TYPE {
                    return Err(Error::not_found(p));
                }
                return translation::synthesize(&parent_record, lang);
            }
            self.source().get_item_by_path(p).await
        })
    }

    pub(crate) async fn external_node(&self, p: &str) -> Result<ExternalNode> {
        let record = self.record_at(p).await?;
        Ok(ExternalNode::new(record, self.clone()))
    }

    pub async fn root_node(&self) -> Result<Node> {
        self.get_node(path::ROOT).await
    }

    /// Node at `p`: external first, then an overlay-only child of its parent.
    pub fn get_node<'a>(&'a self, p: &'a str) -> Pin<Box<dyn Future<Output = Result<Node>> + Send + 'a>> {
        Box::pin(async move {
            let p = path::normalize(p);
            let err = match self.external_node(p).await {
                Ok(node) => return Ok(Node::External(node)),
                Err(e) if e.is_not_found() => e,
                Err(e) => return Err(e),
            };
            let Some(parent) = path::parent(p) else {
                return Err(err);
            };
            if self.is_deleted(p).await {
                return Err(err);
            }
            let child = match self.get_node(parent).await {
                Ok(Node::External(parent)) => parent.extension_child(path::name(p)).await?,
                Ok(Node::Extension(parent)) => parent.child(path::name(p)).await?,
                Err(_) => None,
            };
            child.map(Node::Extension).ok_or(err)
        })
    }

    /// Property at `p`, looked up on its parent node.
    pub async fn get_property(&self, p: &str) -> Result<Property> {
        let p = path::normalize(p);
        let parent = path::parent(p).ok_or_else(|| Error::not_found(p))?;
        self.get_node(parent).await?.get_property(path::name(p)).await
    }

    /// Node or property at `p`. Nodes win when both exist.
    pub async fn get_item(&self, p: &str) -> Result<Item> {
        let p = path::normalize(p);
        match self.get_node(p).await {
            Ok(node) => Ok(Item::Node(node)),
            Err(e) if e.is_not_found() && !path::is_root(p) => {
                match self.get_property(p).await {
                    Ok(property) => Ok(Item::Property(property)),
                    Err(pe) if pe.is_not_found() => Err(e),
                    Err(pe) => Err(pe),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// True when `get_item` succeeds
    pub async fn item_exists(&self, p: &str) -> Result<bool> {
        exists(self.get_item(p).await)
    }

    pub async fn node_exists(&self, p: &str) -> Result<bool> {
        exists(self.get_node(p).await)
    }

    pub async fn property_exists(&self, p: &str) -> Result<bool> {
        exists(self.get_property(p).await)
    }

    /// Node whose identifier is `id`
    pub async fn node_by_identifier(&self, id: &str) -> Result<ExternalNode> {
        let external = match self.mapper().external_for(id).await? {
            Some(external) => external,
            None if self.source().supports_uuid() => id.to_string(),
            None => return Err(Error::not_found(id)),
        };
        self.node_by_external_id(&external).await
    }

    fn node_by_external_id<'a>(
        &'a self,
        external: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ExternalNode>> + Send + 'a>> {
        Box::pin(async move {
            let pending_record = self
                .inner
                .pending
                .lock()
                .await
                .changed_by_id(external)
                .cloned();
            if let Some(record) = pending_record {
                return Ok(ExternalNode::new(record, self.clone()));
            }

            if let Some((lang, parent_id)) = translation::parse_translation_id(external) {
                let parent = self.node_by_external_id(parent_id).await?;
                return self
                    .external_node(&path::join(parent.path(), &translation::child_name(lang)))
                    .await;
            }

            let record = self.source().get_item_by_identifier(external).await?;
            if self.is_deleted(record.path()).await {
                return Err(Error::not_found(external));
            }
            Ok(ExternalNode::new(record, self.clone()))
        })
    }

    // Mutation

    pub async fn remove_item(&self, p: &str) -> Result<()> {
        match self.get_item(p).await? {
            Item::Node(node) => node.remove().await,
            Item::Property(property) => {
                self.get_node(property.parent_path())
                    .await?
                    .remove_property(property.name())
                    .await
            }
        }
    }

    /// Move immediately on the source. The internal identifier follows the
    /// item when the source assigns a new external id.
    pub async fn move_item(&self, source: &str, dest: &str) -> Result<()> {
        let writable = self.writable()?;
        let before = self.source().get_item_by_path(source).await?;
        writable.move_item(source, dest).await?;
        let after = self.source().get_item_by_path(dest).await?;
        if before.id() != after.id() {
            let _ = self.mapper().moved(before.id(), after.id()).await?;
        }
        debug!("Moved {source} to {dest}", source, dest);
        Ok(())
    }

    // Flush

    /// Records to save, with translation children folded into their parents.
    async fn fold_translations(&self, pending: &PendingChanges) -> Result<PathMap<Record>> {
        let mut to_save = PathMap::default();
        for (p, record) in pending.changed.iter() {
            if translation::language_of_path(p).is_none() {
                to_save.insert(p.to_string(), record.clone());
            }
        }

        let translated = pending
            .changed
            .iter()
            .chain(pending.deleted.iter())
            .filter(|(p, _)| translation::language_of_path(p).is_some());
        for (p, record) in translated {
            let Some(parent) = path::parent(p) else {
                continue;
            };
            if pending.is_deleted(parent) {
                continue;
            }
            if !to_save.contains(parent) {
                let parent_record = self.source().get_item_by_path(parent).await?;
                to_save.insert(parent.to_string(), parent_record);
            }
            if let Some(parent_record) = to_save.get_mut(parent) {
                if pending.deleted.contains(p) {
                    if let Some(lang) = translation::language_of_path(p) {
                        let _ = parent_record.remove_i18n_language(lang);
                    }
                } else {
                    translation::fold_into(parent_record, record)?;
                }
            }
        }
        Ok(to_save)
    }

    /// Commit the buffer to the data source.
    pub async fn save(&self) -> Result<()> {
        let mut pending = self.inner.pending.lock().await;
        if pending.is_empty() {
            return Ok(());
        }
        let writable = self.writable()?;

        let to_save = self.fold_translations(&pending).await?;

        let count = pending.reordered.len();
        debug!("Flush: applying {count} reorders", count);
        for (parent, names) in pending.reordered.iter() {
            writable.order(parent, names).await?;
        }

        let count = to_save.len();
        debug!("Flush: saving {count} records", count);
        for record in to_save.values() {
            writable.save_item(record).await?;
        }

        let count = pending.deleted.len();
        debug!("Flush: deleting {count} records", count);
        for (p, record) in pending.deleted.iter() {
            if translation::language_of_path(p).is_some() {
                continue;
            }
            writable.remove_item_by_path(p).await?;
            let _ = self.mapper().forget(record.id()).await?;
        }

        pending.clear();
        let provider_key = self.provider_key();
        info!("Flushed session changes on provider {provider_key}", provider_key);
        Ok(())
    }

    /// Drop every pending change without touching the source.
    pub async fn discard(&self) {
        self.inner.pending.lock().await.clear();
        let provider_key = self.provider_key();
        info!("Discarded session changes on provider {provider_key}", provider_key);
    }

    /// `keep_changes = false` discards the buffer.
    pub async fn refresh(&self, keep_changes: bool) {
        if !keep_changes {
            self.discard().await;
        }
    }
}

fn exists<T>(lookup: Result<T>) -> Result<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::memory::MemoryDataSource;
    use crate::provider::ExternalProvider;
    use crate::types::{NodeTypeDef, TypeRegistry};
    use crate::value::PropertyValue;

    fn provider(source: Arc<MemoryDataSource>) -> ExternalProvider {
        let types = TypeRegistry::with_builtins()
            .node_type(
                NodeTypeDef::new("jnt:item")
                    .supertype("nt:base")
                    .residual_property()
                    .residual_child(&["nt:base"]),
            )
            .build()
            .unwrap();
        ExternalProvider::builder(ProviderConfig::new("mem", "/mounts/mem"), source, Arc::new(types))
            .build()
            .unwrap()
    }

    fn tree(writable: bool) -> Arc<MemoryDataSource> {
        Arc::new(
            MemoryDataSource::new()
                .writable(writable)
                .with_record(Record::new("a", "/a", "jnt:item").with_property("title", "A"))
                .with_record(Record::new("/a/b", "/a/b", "jnt:item")),
        )
    }

    #[tokio::test]
    async fn test_item_exists_is_true_for_found_items() {
        let session = provider(tree(false)).login();
        assert!(session.item_exists("/a").await.unwrap());
        assert!(session.item_exists("/a/").await.unwrap());
        assert!(session.item_exists("/a/title").await.unwrap());
        assert!(!session.item_exists("/missing").await.unwrap());
        assert!(session.property_exists("/a/title").await.unwrap());
        assert!(!session.node_exists("/a/title").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_item_resolves_properties() {
        let session = provider(tree(false)).login();
        match session.get_item("/a/title").await.unwrap() {
            Item::Property(p) => assert_eq!(p.get_string().unwrap(), "A"),
            Item::Node(_) => panic!("expected a property"),
        }
    }

    #[tokio::test]
    async fn test_read_only_save_with_nothing_pending() {
        let session = provider(tree(false)).login();
        session.save().await.unwrap();
        assert!(!session.has_pending_changes().await);
    }

    #[tokio::test]
    async fn test_discard_leaves_source_untouched() {
        let source = tree(true);
        let session = provider(source.clone()).login();
        let node = session.get_node("/a").await.unwrap();
        let _ = node
            .set_property("title", Some(PropertyValue::from("changed")))
            .await
            .unwrap();
        assert!(session.has_pending_changes().await);

        session.refresh(true).await;
        assert!(session.has_pending_changes().await);
        session.refresh(false).await;
        assert!(!session.has_pending_changes().await);
        assert_eq!(source.saved_count().await, 0);
        assert_eq!(
            source.record("/a").await.unwrap().properties()["title"],
            vec!["A".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sessions_have_independent_buffers() {
        let p = provider(tree(true));
        let one = p.login();
        let two = p.login();
        one.get_node("/a/b").await.unwrap().remove().await.unwrap();
        assert!(!one.node_exists("/a/b").await.unwrap());
        assert!(two.node_exists("/a/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_move_keeps_identifier() {
        let source = tree(true);
        let session = provider(source.clone()).login();
        let id = session
            .get_node("/a/b")
            .await
            .unwrap()
            .identifier()
            .await
            .unwrap();
        session.move_item("/a/b", "/b").await.unwrap();

        let moved = session.node_by_identifier(&id).await.unwrap();
        assert_eq!(moved.path(), "/b");
        assert_eq!(moved.identifier().await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_move_on_read_only_source() {
        let session = provider(tree(false)).login();
        assert!(session.move_item("/a/b", "/b").await.unwrap_err().is_unsupported());
    }
}
