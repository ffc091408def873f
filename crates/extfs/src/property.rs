// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::path;
use crate::types::PropertyDefinition;
use crate::value::{BinaryHandle, PropertyType, PropertyValue, Value};
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

/// Where a property's value is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOrigin {
    External,
    Overlay,
}

/// A property as seen through the tree
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: String,
    parent_path: String,
    value: Option<PropertyValue>,
    definition: Option<Arc<PropertyDefinition>>,
    origin: PropertyOrigin,
}

impl Property {
    pub(crate) fn new(
        parent_path: &str,
        name: &str,
        value: PropertyValue,
        definition: Option<Arc<PropertyDefinition>>,
        origin: PropertyOrigin,
    ) -> Self {
        Self {
            name: name.to_string(),
            parent_path: parent_path.to_string(),
            value: Some(value),
            definition,
            origin,
        }
    }

    /// Placeholder answered when a missing property is set to nothing
    pub(crate) fn null(
        parent_path: &str,
        name: &str,
        definition: Option<Arc<PropertyDefinition>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            parent_path: parent_path.to_string(),
            value: None,
            definition,
            origin: PropertyOrigin::External,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> String {
        path::join(&self.parent_path, &self.name)
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn origin(&self) -> PropertyOrigin {
        self.origin
    }

    pub fn definition(&self) -> Option<&Arc<PropertyDefinition>> {
        self.definition.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_multiple(&self) -> bool {
        self.value.as_ref().is_some_and(PropertyValue::is_multiple)
    }

    pub fn property_value(&self) -> Option<&PropertyValue> {
        self.value.as_ref()
    }

    /// Declared type, or the type of the first value when undeclared.
    pub fn property_type(&self) -> PropertyType {
        match (&self.definition, &self.value) {
            (Some(def), _) if def.required_type != PropertyType::Undefined => def.required_type,
            (_, Some(v)) => v
                .as_slice()
                .first()
                .map_or(PropertyType::String, Value::property_type),
            _ => PropertyType::Undefined,
        }
    }

    /// The single value. Multi-valued properties fail with `ValueFormat`.
    pub fn value(&self) -> Result<&Value> {
        match &self.value {
            Some(PropertyValue::Single(v)) => Ok(v),
            Some(PropertyValue::Multiple(_)) => Err(Error::value_format(format!(
                "{} is multi-valued",
                self.path()
            ))),
            None => Err(Error::not_found(self.path())),
        }
    }

    /// All values. Single-valued properties fail with `ValueFormat`.
    pub fn values(&self) -> Result<&[Value]> {
        match &self.value {
            Some(PropertyValue::Multiple(vs)) => Ok(vs),
            Some(PropertyValue::Single(_)) => Err(Error::value_format(format!(
                "{} is single-valued",
                self.path()
            ))),
            None => Err(Error::not_found(self.path())),
        }
    }

    pub fn get_string(&self) -> Result<String> {
        self.value()?.get_string()
    }

    pub fn get_long(&self) -> Result<i64> {
        self.value()?.get_long()
    }

    pub fn get_double(&self) -> Result<f64> {
        self.value()?.get_double()
    }

    pub fn get_boolean(&self) -> Result<bool> {
        self.value()?.get_boolean()
    }

    pub fn get_date(&self) -> Result<DateTime<FixedOffset>> {
        self.value()?.get_date()
    }

    pub fn get_binary(&self) -> Result<BinaryHandle> {
        self.value()?.get_binary()
    }
}
