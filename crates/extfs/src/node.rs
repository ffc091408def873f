// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Node adapter
//!
//! `ExternalNode` answers every read and write against one tree position
//! backed by a `Record`. Reads consult the overlay first for delegable items,
//! then the record, loading lazy values on first access. Writes either go to
//! the overlay or mutate the record and register it with the session.

use crate::error::{Error, Result};
use crate::extension::ExtensionNode;
use crate::overlay::{
    EXTENDED_TYPE_PROPERTY, EXTERNAL_IDENTIFIER_PROPERTY, OverlayNode, PROVIDER_ROOT_PROPERTY,
};
use crate::path;
use crate::property::{Property, PropertyOrigin};
use crate::record::Record;
use crate::session::Session;
use crate::translation;
use crate::types::{ChildDefinition, ItemDefinition, PropertyDefinition};
use crate::value::{BinaryHandle, PropertyType, PropertyValue};
use async_stream::stream;
use diagnostics::*;
use futures::{Stream, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use utilities::glob::NamePattern;

/// Canonical binary content property
pub const JCR_DATA: &str = "jcr:data";
/// Synthetic property answering the node identifier
pub const JCR_UUID: &str = "jcr:uuid";

pub type NodeStream = Pin<Box<dyn Stream<Item = Node> + Send>>;
pub type PropertyStream = Pin<Box<dyn Stream<Item = Property> + Send>>;

/// A node of the projected tree
#[derive(Clone)]
pub enum Node {
    External(ExternalNode),
    /// Overlay-only node shown at its external path
    Extension(ExtensionNode),
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::External(n) => std::fmt::Debug::fmt(n, f),
            Node::Extension(n) => std::fmt::Debug::fmt(n, f),
        }
    }
}

/// A node or a property
#[derive(Clone, Debug)]
pub enum Item {
    Node(Node),
    Property(Property),
}

impl Item {
    pub fn path(&self) -> String {
        match self {
            Item::Node(n) => n.path().to_string(),
            Item::Property(p) => p.path(),
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }
}

impl Node {
    pub fn path(&self) -> &str {
        match self {
            Node::External(n) => n.path(),
            Node::Extension(n) => n.path(),
        }
    }

    pub fn name(&self) -> &str {
        path::name(self.path())
    }

    pub fn is_extension(&self) -> bool {
        matches!(self, Node::Extension(_))
    }

    pub fn as_external(&self) -> Option<&ExternalNode> {
        match self {
            Node::External(n) => Some(n),
            Node::Extension(_) => None,
        }
    }

    /// The external node, or `NotFound` for an overlay-only node.
    pub fn into_external(self) -> Result<ExternalNode> {
        match self {
            Node::External(n) => Ok(n),
            Node::Extension(n) => Err(Error::not_found(format!(
                "{} is not an external node",
                n.path()
            ))),
        }
    }

    /// Stable identifier. Overlay-only nodes are identified by their overlay path.
    pub async fn identifier(&self) -> Result<String> {
        match self {
            Node::External(n) => n.identifier().await,
            Node::Extension(n) => Ok(n.overlay().path().to_string()),
        }
    }

    pub async fn primary_type(&self) -> Result<String> {
        match self {
            Node::External(n) => Ok(n.primary_type().to_string()),
            Node::Extension(n) => n.type_name().await,
        }
    }

    pub async fn get_property(&self, name: &str) -> Result<Property> {
        match self {
            Node::External(n) => n.get_property(name).await,
            Node::Extension(n) => n.get_property(name).await,
        }
    }

    pub async fn set_property(&self, name: &str, value: Option<PropertyValue>) -> Result<Property> {
        match self {
            Node::External(n) => n.set_property(name, value).await,
            Node::Extension(n) => n.set_property(name, value).await,
        }
    }

    pub async fn remove_property(&self, name: &str) -> Result<()> {
        match self {
            Node::External(n) => n.remove_property(name).await,
            Node::Extension(n) => n.remove_property(name).await.map(|_| ()),
        }
    }

    pub async fn remove(&self) -> Result<()> {
        match self {
            Node::External(n) => n.remove().await,
            Node::Extension(n) => n.remove().await,
        }
    }
}

struct NodeState {
    record: Record,
    identifier: Option<String>,
    properties: BTreeMap<String, Property>,
}

/// Tree item backed by an external record
#[derive(Clone)]
pub struct ExternalNode {
    session: Session,
    path: String,
    type_name: String,
    state: Arc<Mutex<NodeState>>,
}

impl std::fmt::Debug for ExternalNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalNode")
            .field("path", &self.path)
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn as_item<D: ItemDefinition>(def: &Option<Arc<D>>) -> Option<&dyn ItemDefinition> {
    def.as_deref().map(|d| d as &dyn ItemDefinition)
}

/// Required type and multiplicity of a record property.
fn shape(def: Option<&PropertyDefinition>, len: usize) -> (PropertyType, bool) {
    match def {
        Some(d) if !d.is_residual() => (d.required_type, d.multiple),
        Some(d) => (d.required_type, d.multiple || len != 1),
        None => (PropertyType::Undefined, len != 1),
    }
}

fn matcher(pattern: Option<&str>) -> Result<impl Fn(&str) -> bool + Send + 'static> {
    let pattern = pattern.map(NamePattern::parse).transpose()?;
    Ok(move |name: &str| pattern.as_ref().is_none_or(|p| p.matches(name)))
}

fn is_link_property(name: &str) -> bool {
    [
        EXTENDED_TYPE_PROPERTY,
        PROVIDER_ROOT_PROPERTY,
        EXTERNAL_IDENTIFIER_PROPERTY,
    ]
    .contains(&name)
}

impl ExternalNode {
    pub(crate) fn new(record: Record, session: Session) -> Self {
        Self {
            session,
            path: record.path().to_string(),
            type_name: record.type_name().to_string(),
            state: Arc::new(Mutex::new(NodeState {
                record,
                identifier: None,
                properties: BTreeMap::new(),
            })),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        path::name(&self.path)
    }

    pub fn primary_type(&self) -> &str {
        &self.type_name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Node state, caught up with what other handles on this path have
    /// buffered in the session.
    async fn current(&self) -> MutexGuard<'_, NodeState> {
        let mut state = self.state.lock().await;
        if let Some(mut buffered) = self.session.buffered_record(&self.path).await {
            buffered.adopt_loaded(&state.record);
            if buffered != state.record {
                state.record = buffered;
                state.properties.clear();
            }
        }
        state
    }

    /// Snapshot of the backing record
    pub async fn record(&self) -> Record {
        self.current().await.record.clone()
    }

    pub async fn external_id(&self) -> String {
        self.state.lock().await.record.id().to_string()
    }

    pub(crate) async fn record_mixins(&self) -> Vec<String> {
        self.current().await.record.mixins().to_vec()
    }

    fn is_translation(&self) -> bool {
        self.type_name == translation::TRANSLATION_TYPE
    }

    /// Stable identifier, resolved once per node instance.
    pub async fn identifier(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(id) = &state.identifier {
            return Ok(id.clone());
        }
        let id = self
            .session
            .mapper()
            .resolve(&state.record, self.session.source().supports_uuid())
            .await?;
        state.identifier = Some(id.clone());
        Ok(id)
    }

    pub(crate) async fn parent_external(&self) -> Result<ExternalNode> {
        let parent = path::parent(&self.path)
            .ok_or_else(|| Error::not_found(format!("parent of {}", self.path)))?;
        self.session.external_node(parent).await
    }

    pub async fn parent(&self) -> Result<Node> {
        Ok(Node::External(self.parent_external().await?))
    }

    /// Overlay node mirroring this one; `create` makes it (and its ancestors).
    pub async fn overlay_node(&self, create: bool) -> Result<Option<OverlayNode>> {
        self.session.resolver().overlay_node(self, create).await
    }

    async fn overlay_mixins(&self) -> Result<Vec<String>> {
        match self.overlay_node(false).await? {
            Some(overlay) => overlay.mixins().await,
            None => Ok(Vec::new()),
        }
    }

    /// Record mixins followed by overlay mixins
    pub async fn mixin_types(&self) -> Result<Vec<String>> {
        let mut mixins = self.record_mixins().await;
        for m in self.overlay_mixins().await? {
            if !mixins.contains(&m) {
                mixins.push(m);
            }
        }
        Ok(mixins)
    }

    pub async fn is_node_type(&self, type_name: &str) -> Result<bool> {
        let types = self.session.types();
        if types.is_subtype(&self.type_name, type_name) {
            return Ok(true);
        }
        Ok(self
            .mixin_types()
            .await?
            .iter()
            .any(|m| types.is_subtype(m, type_name)))
    }

    // Definitions

    /// Primary type, then record and overlay mixins, then the residual definition.
    pub async fn property_definition(&self, name: &str) -> Result<Option<Arc<PropertyDefinition>>> {
        let types = self.session.types();
        let primary = types.definitions_for(&self.type_name)?;
        if let Some(def) = primary.property(name) {
            return Ok(Some(def.clone()));
        }
        for mixin in self.mixin_types().await? {
            if let Some(def) = types.definitions_for(&mixin)?.property(name) {
                return Ok(Some(def.clone()));
            }
        }
        Ok(primary.residual_property().cloned())
    }

    pub async fn child_definition(
        &self,
        name: &str,
        child_type: &str,
    ) -> Result<Option<Arc<ChildDefinition>>> {
        let types = self.session.types();
        let mut candidates = vec![types.definitions_for(&self.type_name)?];
        for mixin in self.mixin_types().await? {
            candidates.push(types.definitions_for(&mixin)?);
        }
        if let Some(def) = candidates.iter().find_map(|c| c.child(name)) {
            return Ok(Some(def.clone()));
        }
        Ok(candidates
            .iter()
            .flat_map(|c| c.residual_children())
            .find(|def| {
                def.required_types
                    .iter()
                    .all(|required| types.is_subtype(child_type, required))
            })
            .cloned())
    }

    // Reads

    async fn overlay_property(
        &self,
        name: &str,
        def: &Option<Arc<PropertyDefinition>>,
    ) -> Result<Option<Property>> {
        if is_link_property(name) {
            return Ok(None);
        }
        let Some(overlay) = self.overlay_node(false).await? else {
            return Ok(None);
        };
        let Some(value) = overlay.property(name).await? else {
            return Ok(None);
        };
        let mixins = overlay.mixins().await?;
        if !self.session.resolver().can_delegate(as_item(def), &mixins)? {
            return Ok(None);
        }
        Ok(Some(Property::new(
            &self.path,
            name,
            value,
            def.clone(),
            PropertyOrigin::Overlay,
        )))
    }

    fn materialize(
        &self,
        record: &Record,
        name: &str,
        def: &Option<Arc<PropertyDefinition>>,
    ) -> Option<Property> {
        let value = if let Some(values) = record.properties().get(name) {
            let (kind, multiple) = shape(def.as_deref(), values.len());
            PropertyValue::from_strings(values, kind, multiple)
        } else if let Some(values) = record.binary_properties().get(name) {
            let (_, multiple) = shape(def.as_deref(), values.len());
            PropertyValue::from_binaries(values, multiple)
        } else {
            return None;
        };
        Some(Property::new(
            &self.path,
            name,
            value,
            def.clone(),
            PropertyOrigin::External,
        ))
    }

    /// Property from the record, fetching a lazy value at most once.
    async fn external_property(
        &self,
        name: &str,
        def: &Option<Arc<PropertyDefinition>>,
    ) -> Result<Option<Property>> {
        let mut state = self.current().await;
        if let Some(cached) = state.properties.get(name) {
            return Ok(Some(cached.clone()));
        }

        let source = self.session.source();
        let node_path = self.path.as_str();
        if state.record.lazy_properties().contains(name) {
            let values = match translation::language_of_path(&self.path)
                .filter(|_| self.is_translation())
            {
                Some(lang) => {
                    source
                        .get_i18n_property_values(&state.record, lang, name)
                        .await?
                }
                None => source.get_property_values(&state.record, name).await?,
            };
            debug!("Loaded lazy property {name} of {node_path}", name, node_path);
            state.record.set_values(name, values);
        } else if state.record.lazy_binary_properties().contains(name) {
            let values = source
                .get_binary_property_values(&state.record, name)
                .await?;
            debug!("Loaded lazy binary property {name} of {node_path}", name, node_path);
            state.record.set_binary_values(name, values);
        }

        let property = self.materialize(&state.record, name, def);
        if let Some(p) = &property {
            let _ = state.properties.insert(name.to_string(), p.clone());
        }
        Ok(property)
    }

    pub async fn get_property(&self, name: &str) -> Result<Property> {
        let def = self.property_definition(name).await?;
        if let Some(p) = self.overlay_property(name, &def).await? {
            return Ok(p);
        }
        if name == JCR_UUID {
            let id = self.identifier().await?;
            return Ok(Property::new(
                &self.path,
                name,
                PropertyValue::from(id),
                def,
                PropertyOrigin::External,
            ));
        }
        self.external_property(name, &def)
            .await?
            .ok_or_else(|| Error::not_found(path::join(&self.path, name)))
    }

    pub async fn has_property(&self, name: &str) -> Result<bool> {
        if name == JCR_UUID || self.current().await.record.has(name) {
            return Ok(true);
        }
        let def = self.property_definition(name).await?;
        Ok(self.overlay_property(name, &def).await?.is_some())
    }

    /// Properties matching `pattern`: delegable overlay ones first, then the
    /// record's. Elements failing to load are logged and skipped.
    pub async fn properties(&self, pattern: Option<&str>) -> Result<PropertyStream> {
        let matches = matcher(pattern)?;
        let mut names: Vec<String> = Vec::new();
        if let Some(overlay) = self.overlay_node(false).await? {
            names.extend(
                overlay
                    .property_names()
                    .await?
                    .into_iter()
                    .filter(|n| !is_link_property(n)),
            );
        }
        names.extend(self.current().await.record.property_names());
        names.push(JCR_UUID.to_string());

        let mut seen = BTreeSet::new();
        names.retain(|n| matches(n) && seen.insert(n.clone()));

        let node = self.clone();
        Ok(Box::pin(stream! {
            for name in names {
                match node.get_property(&name).await {
                    Ok(property) => yield property,
                    Err(e) => {
                        let node_path = node.path();
                        let reason = e.to_string();
                        warn!("Skipping property {name} of {node_path}: {reason}", name, node_path, reason);
                    }
                }
            }
        }))
    }

    pub async fn get_properties(&self, pattern: Option<&str>) -> Result<Vec<Property>> {
        Ok(self.properties(pattern).await?.collect().await)
    }

    pub async fn has_properties(&self) -> Result<bool> {
        Ok(self.properties(None).await?.next().await.is_some())
    }

    // Writes

    /// Set (`Some`) or remove (`None`) a property.
    pub async fn set_property(&self, name: &str, value: Option<PropertyValue>) -> Result<Property> {
        let def = self.property_definition(name).await?;
        let mixins = self.overlay_mixins().await?;
        if self.session.resolver().can_delegate(as_item(&def), &mixins)? {
            if let Some(overlay) = self.overlay_node(true).await? {
                return match value {
                    Some(v) => {
                        overlay.set_property(name, v.clone()).await?;
                        Ok(Property::new(&self.path, name, v, def, PropertyOrigin::Overlay))
                    }
                    None => {
                        let _ = overlay.remove_property(name).await?;
                        Ok(Property::null(&self.path, name, def))
                    }
                };
            }
        }

        let _ = self.session.writable()?;
        let Some(value) = value else {
            return self.clear_property(name, def).await;
        };

        if let Some(current) = self.external_property(name, &def).await? {
            if current
                .property_value()
                .is_some_and(|v| v.same_content(&value))
            {
                return Ok(current);
            }
        }

        let mut state = self.current().await;
        let values = value.as_slice();
        let all_binary = !values.is_empty()
            && values
                .iter()
                .all(|v| v.property_type() == PropertyType::Binary);
        if name == JCR_DATA || all_binary {
            let handles = values
                .iter()
                .map(|v| {
                    v.get_binary()
                        .or_else(|_| v.get_string().map(|s| BinaryHandle::from(s.into_bytes())))
                })
                .collect::<Result<Vec<_>>>()?;
            state.record = self
                .session
                .change_record(&state.record, |record| {
                    record.set_binary_values(name, handles)
                })
                .await;
        } else {
            let strings = values
                .iter()
                .map(|v| {
                    v.to_record_string()?.ok_or_else(|| {
                        Error::value_format(format!("{name} mixes binary and text values"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            // Translation content reaches the parent's i18n map on flush
            if def.as_ref().is_some_and(|d| d.internationalized) && !self.is_translation() {
                return Err(Error::constraint_violation(format!(
                    "{name} is internationalized but {} is not a translation node",
                    self.path
                )));
            }
            state.record = self
                .session
                .change_record(&state.record, |record| record.set_values(name, strings))
                .await;
        }

        let property = self
            .materialize(&state.record, name, &def)
            .ok_or_else(|| Error::invalid_state(format!("{name} vanished after write")))?;
        state.properties.clear();
        let _ = state
            .properties
            .insert(name.to_string(), property.clone());
        Ok(property)
    }

    async fn clear_property(
        &self,
        name: &str,
        def: Option<Arc<PropertyDefinition>>,
    ) -> Result<Property> {
        let Some(current) = self.external_property(name, &def).await? else {
            return Ok(Property::null(&self.path, name, def));
        };
        let mut state = self.current().await;
        state.record = self
            .session
            .change_record(&state.record, |record| {
                let _ = record.remove_property(name);
            })
            .await;
        state.properties.clear();
        Ok(current)
    }

    pub async fn remove_property(&self, name: &str) -> Result<()> {
        let def = self.property_definition(name).await?;
        if let Some(overlay) = self.overlay_node(false).await? {
            if overlay.has_property(name).await?
                && self
                    .session
                    .resolver()
                    .can_delegate(as_item(&def), &overlay.mixins().await?)?
            {
                let _ = overlay.remove_property(name).await?;
                return Ok(());
            }
        }

        let _ = self.session.writable()?;
        let mut state = self.current().await;
        if !state.record.has(name) {
            return Err(Error::not_found(path::join(&self.path, name)));
        }
        state.record = self
            .session
            .change_record(&state.record, |record| {
                let _ = record.remove_property(name);
            })
            .await;
        state.properties.clear();
        Ok(())
    }

    /// Add a child, in the overlay when the child definition is delegable.
    pub async fn add_node(&self, name: &str, type_name: &str) -> Result<Node> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::constraint_violation(format!(
                "invalid child name '{name}'"
            )));
        }
        let _ = self.session.types().definitions_for(type_name)?;
        let child_path = path::join(&self.path, name);
        if self.session.node_exists(&child_path).await? {
            return Err(Error::item_exists(child_path));
        }

        let def = self.child_definition(name, type_name).await?;
        let mixins = self.overlay_mixins().await?;
        if self.session.resolver().can_delegate(as_item(&def), &mixins)? {
            if let Some(overlay) = self.overlay_node(true).await? {
                let child = overlay.add_child(name, type_name).await?;
                child
                    .set_property(
                        EXTENDED_TYPE_PROPERTY,
                        PropertyValue::from(self.type_name.as_str()),
                    )
                    .await?;
                child
                    .set_property(PROVIDER_ROOT_PROPERTY, PropertyValue::from(false))
                    .await?;
                return Ok(Node::Extension(ExtensionNode::new(
                    self.session.clone(),
                    child,
                    child_path,
                )));
            }
        }

        let _ = self.session.writable()?;
        let parent_id = self.external_id().await;
        let id = if parent_id == path::ROOT {
            format!("/{name}")
        } else {
            format!("{parent_id}/{name}")
        };
        let record = Record::new(id, child_path, type_name);
        self.session.register_changed(record.clone()).await;
        Ok(Node::External(ExternalNode::new(record, self.session.clone())))
    }

    /// Child names in effective order: a pending reorder, else the source
    /// order followed by children added in this session.
    async fn child_names(&self) -> Result<Vec<String>> {
        let mut names = match self.session.pending_order(&self.path).await {
            Some(names) => names,
            None => self.session.source().get_children(&self.path).await?,
        };
        for added in self.session.pending_children(&self.path).await {
            if !names.contains(&added) {
                names.push(added);
            }
        }
        let mut live = Vec::with_capacity(names.len());
        for name in names {
            if !self.session.is_deleted(&path::join(&self.path, &name)).await {
                live.push(name);
            }
        }
        Ok(live)
    }

    /// Move `source` immediately before `dest`, or to the end.
    pub async fn order_before(&self, source: &str, dest: Option<&str>) -> Result<()> {
        let _ = self.session.writable()?;
        let mut names = self.child_names().await?;
        if !names.iter().any(|n| n == source) {
            return Err(Error::not_found(path::join(&self.path, source)));
        }
        names.retain(|n| n != source);
        let at = dest
            .and_then(|d| names.iter().position(|n| n == d))
            .unwrap_or(names.len());
        names.insert(at, source.to_string());
        self.session.register_order(&self.path, names).await;
        Ok(())
    }

    pub async fn remove(&self) -> Result<()> {
        let _ = self.session.writable()?;
        let record = self.record().await;
        self.session.register_deleted(record).await;
        Ok(())
    }

    // Children

    /// Overlay-only child `name`, if the overlay has one.
    pub(crate) async fn extension_child(&self, name: &str) -> Result<Option<ExtensionNode>> {
        let Some(overlay) = self.overlay_node(false).await? else {
            return Ok(None);
        };
        if !overlay.has_child(name).await? {
            return Ok(None);
        }
        Ok(Some(ExtensionNode::new(
            self.session.clone(),
            overlay.child(name),
            path::join(&self.path, name),
        )))
    }

    /// Overlay child `name` if its definition is delegable here.
    async fn delegable_extension_child(
        &self,
        overlay: &OverlayNode,
        mixins: &[String],
        name: &str,
    ) -> Result<Option<ExtensionNode>> {
        let child = overlay.child(name);
        let child_type = child.type_name().await?;
        let def = self.child_definition(name, &child_type).await?;
        if !self.session.resolver().can_delegate(as_item(&def), mixins)? {
            return Ok(None);
        }
        Ok(Some(ExtensionNode::new(
            self.session.clone(),
            child,
            path::join(&self.path, name),
        )))
    }

    pub async fn get_node(&self, rel: &str) -> Result<Node> {
        let child_path = path::join(&self.path, rel);
        match self.session.external_node(&child_path).await {
            Ok(node) => Ok(Node::External(node)),
            Err(e) if e.is_not_found() => self
                .extension_child(rel)
                .await?
                .map(Node::Extension)
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    pub async fn has_node(&self, rel: &str) -> Result<bool> {
        match self.get_node(rel).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Children matching `pattern`: external children and translation
    /// children, then overlay-only children not already listed.
    pub async fn nodes(&self, pattern: Option<&str>) -> Result<NodeStream> {
        let matches = matcher(pattern)?;
        let mut names = self.child_names().await?;
        // Translation children have no translations of their own
        if !self.is_translation() {
            let languages = self.current().await.record.languages();
            names.extend(languages.iter().map(|lang| translation::child_name(lang)));
        }
        names.retain(|n| matches(n));

        let overlay = self.overlay_node(false).await?;
        let (overlay_names, mixins) = match &overlay {
            Some(o) => {
                let children: Vec<String> = o
                    .children()
                    .await?
                    .into_iter()
                    .filter(|n| matches(n) && !names.contains(n))
                    .collect();
                (children, o.mixins().await?)
            }
            None => (Vec::new(), Vec::new()),
        };

        let node = self.clone();
        Ok(Box::pin(stream! {
            let node_path = node.path().to_string();
            for name in names {
                match node.get_node(&name).await {
                    Ok(child) => yield child,
                    Err(e) => {
                        let reason = e.to_string();
                        warn!("Skipping child {name} of {node_path}: {reason}", name, node_path, reason);
                    }
                }
            }
            if let Some(overlay) = overlay {
                for name in overlay_names {
                    match node.delegable_extension_child(&overlay, &mixins, &name).await {
                        Ok(Some(child)) => yield Node::Extension(child),
                        Ok(None) => {}
                        Err(e) => {
                            let reason = e.to_string();
                            warn!("Skipping overlay child {name} of {node_path}: {reason}", name, node_path, reason);
                        }
                    }
                }
            }
        }))
    }

    pub async fn get_nodes(&self, pattern: Option<&str>) -> Result<Vec<Node>> {
        Ok(self.nodes(pattern).await?.collect().await)
    }

    pub async fn has_nodes(&self) -> Result<bool> {
        Ok(self.nodes(None).await?.next().await.is_some())
    }

    // Mixins

    /// No-op when already of that type; otherwise recorded on the overlay.
    pub async fn add_mixin(&self, mixin: &str) -> Result<()> {
        if self.is_node_type(mixin).await? {
            return Ok(());
        }
        if !self.session.types().definitions_for(mixin)?.is_mixin() {
            return Err(Error::constraint_violation(format!("{mixin} is not a mixin")));
        }
        match self.overlay_node(true).await? {
            Some(overlay) => overlay.add_mixin(mixin).await,
            None => Err(Error::unsupported(format!(
                "adding mixin {mixin} to {}",
                self.path
            ))),
        }
    }

    pub async fn remove_mixin(&self, mixin: &str) -> Result<()> {
        if let Some(overlay) = self.overlay_node(false).await? {
            if overlay.mixins().await?.iter().any(|m| m == mixin) {
                return overlay.remove_mixin(mixin).await;
            }
        }
        if !self.is_node_type(mixin).await? {
            return Err(Error::no_such_node_type(mixin));
        }
        Err(Error::unsupported(format!(
            "removing mixin {mixin} from {}",
            self.path
        )))
    }

    pub async fn can_add_mixin(&self, mixin: &str) -> Result<bool> {
        if !self.session.types().definitions_for(mixin)?.is_mixin() {
            return Ok(false);
        }
        Ok(self.session.resolver().accepts(self).await)
    }

    // Fixed answers

    pub async fn references(&self) -> Result<Vec<Property>> {
        Ok(Vec::new())
    }

    pub async fn weak_references(&self) -> Result<Vec<Property>> {
        Ok(Vec::new())
    }

    pub async fn primary_item(&self) -> Result<Item> {
        Err(Error::not_found(format!("primary item of {}", self.path)))
    }

    pub fn is_checked_out(&self) -> bool {
        true
    }

    pub fn allowed_lifecycle_transitions(&self) -> Vec<String> {
        Vec::new()
    }

    pub fn corresponding_node_path(&self, _workspace: &str) -> String {
        self.path.clone()
    }
}

macro_rules! unsupported_operations {
    ($($(#[$doc:meta])* $method:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        impl ExternalNode {
            $(
                $(#[$doc])*
                pub async fn $method(&self, $($arg: $ty),*) -> Result<$ret> {
                    let _ = ($($arg,)*);
                    Err(Error::unsupported(format!(
                        "{} on {}",
                        stringify!($method),
                        self.path
                    )))
                }
            )*
        }
    };
}

unsupported_operations! {
    set_primary_type(type_name: &str) -> ();
    checkin() -> ();
    checkout() -> ();
    restore(version: &str, remove_existing: bool) -> ();
    merge(workspace: &str, best_effort: bool) -> Vec<Node>;
    done_merge(version: &str) -> ();
    cancel_merge(version: &str) -> ();
    update(workspace: &str) -> ();
    version_history() -> Node;
    base_version() -> Node;
    lock(deep: bool) -> ();
    unlock() -> ();
    shared_set() -> Vec<Node>;
    remove_shared_set() -> ();
    remove_share() -> ();
    follow_lifecycle_transition(transition: &str) -> ();
}
