// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Node type lookup
//!
//! The projection never owns a schema. It asks a `TypeLookup` for the property
//! and child definitions of a type name. `TypeRegistry` is the in-memory
//! implementation: built once, immutable afterwards, shared as
//! `Arc<dyn TypeLookup>` across sessions.

use crate::error::{Error, Result};
use crate::value::PropertyType;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Name of residual ("unstructured") definitions.
pub const RESIDUAL: &str = "*";

pub const NT_BASE: &str = "nt:base";
pub const MIX_REFERENCEABLE: &str = "mix:referenceable";
pub const EXTENSION_TYPE: &str = "jnt:externalProviderExtension";

/// Common shape of property and child definitions, as seen by overlay delegation.
pub trait ItemDefinition {
    fn name(&self) -> &str;
    fn declaring_type(&self) -> &str;

    fn is_residual(&self) -> bool {
        self.name() == RESIDUAL
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    pub name: String,
    pub declaring_type: String,
    pub required_type: PropertyType,
    pub multiple: bool,
    pub internationalized: bool,
}

impl ItemDefinition for PropertyDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn declaring_type(&self) -> &str {
        &self.declaring_type
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChildDefinition {
    pub name: String,
    pub declaring_type: String,
    /// The child's type must be a subtype of every entry
    pub required_types: Vec<String>,
}

impl ItemDefinition for ChildDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn declaring_type(&self) -> &str {
        &self.declaring_type
    }
}

/// Declaration of one node type, as handed to the registry builder.
#[derive(Debug, Clone, Default)]
pub struct NodeTypeDef {
    name: String,
    mixin: bool,
    supertypes: Vec<String>,
    properties: Vec<PropertyDefinition>,
    children: Vec<ChildDefinition>,
}

impl NodeTypeDef {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn mixin(mut self) -> Self {
        self.mixin = true;
        self
    }

    #[must_use]
    pub fn supertype<S: Into<String>>(mut self, name: S) -> Self {
        self.supertypes.push(name.into());
        self
    }

    fn push_property(mut self, name: String, required_type: PropertyType, multiple: bool, i18n: bool) -> Self {
        self.properties.push(PropertyDefinition {
            name,
            declaring_type: self.name.clone(),
            required_type,
            multiple,
            internationalized: i18n,
        });
        self
    }

    #[must_use]
    pub fn property<S: Into<String>>(self, name: S, required_type: PropertyType) -> Self {
        self.push_property(name.into(), required_type, false, false)
    }

    #[must_use]
    pub fn multiple_property<S: Into<String>>(self, name: S, required_type: PropertyType) -> Self {
        self.push_property(name.into(), required_type, true, false)
    }

    #[must_use]
    pub fn i18n_property<S: Into<String>>(self, name: S, required_type: PropertyType) -> Self {
        self.push_property(name.into(), required_type, false, true)
    }

    #[must_use]
    pub fn residual_property(self) -> Self {
        self.push_property(RESIDUAL.to_string(), PropertyType::Undefined, false, false)
    }

    #[must_use]
    pub fn residual_i18n_property(self) -> Self {
        self.push_property(RESIDUAL.to_string(), PropertyType::Undefined, false, true)
    }

    #[must_use]
    pub fn child<S: Into<String>>(mut self, name: S, required_types: &[&str]) -> Self {
        self.children.push(ChildDefinition {
            name: name.into(),
            declaring_type: self.name.clone(),
            required_types: required_types.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    #[must_use]
    pub fn residual_child(self, required_types: &[&str]) -> Self {
        self.child(RESIDUAL, required_types)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Effective definitions of a type, inherited ones included.
#[derive(Debug, Clone, Default)]
pub struct TypeDefinitions {
    name: String,
    mixin: bool,
    ancestors: BTreeSet<String>,
    properties: BTreeMap<String, Arc<PropertyDefinition>>,
    residual_properties: Vec<Arc<PropertyDefinition>>,
    children: BTreeMap<String, Arc<ChildDefinition>>,
    residual_children: Vec<Arc<ChildDefinition>>,
}

impl TypeDefinitions {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_mixin(&self) -> bool {
        self.mixin
    }

    /// The type itself and all of its supertypes.
    pub fn ancestors(&self) -> &BTreeSet<String> {
        &self.ancestors
    }

    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDefinition>> {
        self.properties.get(name)
    }

    /// The "unstructured" fallback property definition, if any.
    pub fn residual_property(&self) -> Option<&Arc<PropertyDefinition>> {
        self.residual_properties.first()
    }

    pub fn child(&self, name: &str) -> Option<&Arc<ChildDefinition>> {
        self.children.get(name)
    }

    pub fn residual_children(&self) -> &[Arc<ChildDefinition>] {
        &self.residual_children
    }
}

/// The type lookup the projection depends on.
pub trait TypeLookup: Send + Sync {
    /// Effective definitions; unknown names fail with `NoSuchNodeType`.
    fn definitions_for(&self, type_name: &str) -> Result<Arc<TypeDefinitions>>;

    /// `type_name` is `ancestor` or inherits from it. Unknown names are never subtypes.
    fn is_subtype(&self, type_name: &str, ancestor: &str) -> bool {
        self.definitions_for(type_name)
            .map(|defs| defs.ancestors.contains(ancestor))
            .unwrap_or(false)
    }
}

pub struct TypeRegistry {
    types: BTreeMap<String, Arc<TypeDefinitions>>,
}

#[derive(Default)]
pub struct TypeRegistryBuilder {
    declared: BTreeMap<String, NodeTypeDef>,
}

impl TypeRegistry {
    #[must_use]
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// A builder seeded with the types the projection itself needs.
    #[must_use]
    pub fn with_builtins() -> TypeRegistryBuilder {
        Self::builder()
            .node_type(NodeTypeDef::new(NT_BASE))
            .node_type(
                NodeTypeDef::new(MIX_REFERENCEABLE)
                    .mixin()
                    .property("jcr:uuid", PropertyType::String),
            )
            .node_type(
                NodeTypeDef::new(crate::translation::TRANSLATION_TYPE)
                    .supertype(NT_BASE)
                    .property(crate::translation::LANGUAGE_PROPERTY, PropertyType::String)
                    .residual_i18n_property(),
            )
            .node_type(
                NodeTypeDef::new(EXTENSION_TYPE)
                    .supertype(NT_BASE)
                    .property("j:extendedType", PropertyType::String)
                    .property("j:isExternalProviderRoot", PropertyType::Boolean)
                    .property("j:externalNodeIdentifier", PropertyType::String)
                    .residual_property()
                    .residual_child(&[NT_BASE]),
            )
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeRegistryBuilder {
    #[must_use]
    pub fn node_type(mut self, def: NodeTypeDef) -> Self {
        let _ = self.declared.insert(def.name.clone(), def);
        self
    }

    /// Resolve inheritance. Fails on unknown supertypes and cycles.
    pub fn build(self) -> Result<TypeRegistry> {
        let mut types = BTreeMap::new();
        for name in self.declared.keys() {
            let mut visiting = Vec::new();
            let defs = self.resolve(name, &mut visiting)?;
            let _ = types.insert(name.clone(), Arc::new(defs));
        }
        Ok(TypeRegistry { types })
    }

    fn resolve(&self, name: &str, visiting: &mut Vec<String>) -> Result<TypeDefinitions> {
        if visiting.iter().any(|v| v == name) {
            return Err(Error::constraint_violation(format!(
                "cyclic supertypes through {name}"
            )));
        }
        let decl = self
            .declared
            .get(name)
            .ok_or_else(|| Error::no_such_node_type(name))?;
        visiting.push(name.to_string());

        let mut defs = TypeDefinitions {
            name: name.to_string(),
            mixin: decl.mixin,
            ..Default::default()
        };
        let _ = defs.ancestors.insert(name.to_string());

        // Own declarations win over inherited ones
        for prop in &decl.properties {
            let prop = Arc::new(prop.clone());
            if prop.is_residual() {
                defs.residual_properties.push(prop);
            } else {
                let _ = defs.properties.insert(prop.name.clone(), prop);
            }
        }
        for child in &decl.children {
            let child = Arc::new(child.clone());
            if child.is_residual() {
                defs.residual_children.push(child);
            } else {
                let _ = defs.children.insert(child.name.clone(), child);
            }
        }

        for sup in &decl.supertypes {
            let inherited = self.resolve(sup, visiting)?;
            defs.ancestors.extend(inherited.ancestors);
            for (k, v) in inherited.properties {
                let _ = defs.properties.entry(k).or_insert(v);
            }
            defs.residual_properties.extend(inherited.residual_properties);
            for (k, v) in inherited.children {
                let _ = defs.children.entry(k).or_insert(v);
            }
            defs.residual_children.extend(inherited.residual_children);
        }

        let _ = visiting.pop();
        Ok(defs)
    }
}

impl TypeLookup for TypeRegistry {
    fn definitions_for(&self, type_name: &str) -> Result<Arc<TypeDefinitions>> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::no_such_node_type(type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtins()
            .node_type(
                NodeTypeDef::new("jnt:content")
                    .supertype(NT_BASE)
                    .property("title", PropertyType::String)
                    .multiple_property("tags", PropertyType::String)
                    .residual_child(&[NT_BASE]),
            )
            .node_type(
                NodeTypeDef::new("jnt:article")
                    .supertype("jnt:content")
                    .property("title", PropertyType::Long),
            )
            .node_type(NodeTypeDef::new("jmix:tagged").mixin().property("tag", PropertyType::String))
            .build()
            .unwrap()
    }

    #[test]
    fn test_inheritance_and_override() {
        let reg = registry();
        let article = reg.definitions_for("jnt:article").unwrap();
        assert_eq!(article.property("title").unwrap().required_type, PropertyType::Long);
        assert_eq!(article.property("title").unwrap().declaring_type, "jnt:article");
        assert_eq!(article.property("tags").unwrap().declaring_type, "jnt:content");
        assert_eq!(article.residual_children().len(), 1);
        assert!(reg.is_subtype("jnt:article", NT_BASE));
        assert!(!reg.is_subtype("jnt:content", "jnt:article"));
    }

    #[test]
    fn test_unknown_type() {
        let reg = registry();
        assert_eq!(
            reg.definitions_for("jnt:missing").unwrap_err(),
            Error::no_such_node_type("jnt:missing")
        );
        assert!(!reg.is_subtype("jnt:missing", NT_BASE));
    }

    #[test]
    fn test_mixin_flag() {
        let reg = registry();
        assert!(reg.definitions_for("jmix:tagged").unwrap().is_mixin());
        assert!(!reg.definitions_for("jnt:content").unwrap().is_mixin());
    }

    #[test]
    fn test_builtin_translation_type_is_residual_i18n() {
        let reg = registry();
        let t = reg.definitions_for(crate::translation::TRANSLATION_TYPE).unwrap();
        let residual = t.residual_property().unwrap();
        assert!(residual.internationalized);
        assert!(t.property(crate::translation::LANGUAGE_PROPERTY).is_some());
    }

    #[test]
    fn test_unknown_supertype_fails_build() {
        let result = TypeRegistry::builder()
            .node_type(NodeTypeDef::new("a").supertype("b"))
            .build();
        assert!(matches!(result, Err(Error::NoSuchNodeType(_))));
    }

    #[test]
    fn test_cycle_fails_build() {
        let result = TypeRegistry::builder()
            .node_type(NodeTypeDef::new("a").supertype("b"))
            .node_type(NodeTypeDef::new("b").supertype("a"))
            .build();
        assert!(matches!(result, Err(Error::ConstraintViolation(_))));
    }
}
