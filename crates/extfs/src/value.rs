// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Typed property values
//!
//! External records carry every value as a string (or a binary handle). A
//! `Value` keeps the raw data together with the type the property definition
//! asks for, and coerces lazily when a typed getter is called.

use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Opaque binary content owned by an external record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinaryHandle(Bytes);

impl BinaryHandle {
    #[must_use]
    pub fn new<B: Into<Bytes>>(content: B) -> Self {
        Self(content.into())
    }

    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for BinaryHandle {
    fn from(content: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(content))
    }
}

impl From<Vec<u8>> for BinaryHandle {
    fn from(content: Vec<u8>) -> Self {
        Self(Bytes::from(content))
    }
}

/// Property types understood by the type lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyType {
    #[default]
    Undefined,
    String,
    Binary,
    Long,
    Double,
    Date,
    Boolean,
    Name,
    Path,
    Reference,
    WeakReference,
}

#[derive(Debug, Clone, PartialEq)]
enum ValueData {
    Text(String),
    Binary(BinaryHandle),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<FixedOffset>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    data: ValueData,
    kind: PropertyType,
}

impl Value {
    /// A string-typed value.
    pub fn string<S: Into<String>>(s: S) -> Self {
        Self {
            data: ValueData::Text(s.into()),
            kind: PropertyType::String,
        }
    }

    /// A value read from a record, tagged with the definition's required type.
    ///
    /// No coercion happens here; typed getters parse on demand.
    pub fn typed<S: Into<String>>(s: S, kind: PropertyType) -> Self {
        let kind = match kind {
            PropertyType::Undefined | PropertyType::Binary => PropertyType::String,
            other => other,
        };
        Self {
            data: ValueData::Text(s.into()),
            kind,
        }
    }

    #[must_use]
    pub fn binary(handle: BinaryHandle) -> Self {
        Self {
            data: ValueData::Binary(handle),
            kind: PropertyType::Binary,
        }
    }

    #[must_use]
    pub fn long(v: i64) -> Self {
        Self {
            data: ValueData::Long(v),
            kind: PropertyType::Long,
        }
    }

    #[must_use]
    pub fn double(v: f64) -> Self {
        Self {
            data: ValueData::Double(v),
            kind: PropertyType::Double,
        }
    }

    #[must_use]
    pub fn boolean(v: bool) -> Self {
        Self {
            data: ValueData::Boolean(v),
            kind: PropertyType::Boolean,
        }
    }

    #[must_use]
    pub fn date(v: DateTime<FixedOffset>) -> Self {
        Self {
            data: ValueData::Date(v),
            kind: PropertyType::Date,
        }
    }

    /// A reference value pointing at a node identifier.
    pub fn reference<S: Into<String>>(identifier: S, weak: bool) -> Self {
        Self {
            data: ValueData::Text(identifier.into()),
            kind: if weak {
                PropertyType::WeakReference
            } else {
                PropertyType::Reference
            },
        }
    }

    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.kind
    }

    /// String form of the value. Dates render as RFC 3339.
    pub fn get_string(&self) -> Result<String> {
        Ok(match &self.data {
            ValueData::Text(s) => s.clone(),
            ValueData::Long(v) => v.to_string(),
            ValueData::Double(v) => v.to_string(),
            ValueData::Boolean(v) => v.to_string(),
            ValueData::Date(v) => v.to_rfc3339_opts(SecondsFormat::Millis, false),
            ValueData::Binary(b) => String::from_utf8(b.bytes().to_vec())
                .map_err(|e| Error::value_format(format!("binary is not UTF-8: {e}")))?,
        })
    }

    pub fn get_long(&self) -> Result<i64> {
        match &self.data {
            ValueData::Long(v) => Ok(*v),
            _ => {
                let s = self.get_string()?;
                s.trim()
                    .parse::<i64>()
                    .map_err(|e| Error::value_format(format!("'{s}' is not a long: {e}")))
            }
        }
    }

    pub fn get_double(&self) -> Result<f64> {
        match &self.data {
            ValueData::Double(v) => Ok(*v),
            ValueData::Long(v) => Ok(*v as f64),
            _ => {
                let s = self.get_string()?;
                s.trim()
                    .parse::<f64>()
                    .map_err(|e| Error::value_format(format!("'{s}' is not a double: {e}")))
            }
        }
    }

    /// Anything other than a case-insensitive "true" reads as false.
    pub fn get_boolean(&self) -> Result<bool> {
        match &self.data {
            ValueData::Boolean(v) => Ok(*v),
            _ => Ok(self.get_string()?.eq_ignore_ascii_case("true")),
        }
    }

    pub fn get_date(&self) -> Result<DateTime<FixedOffset>> {
        match &self.data {
            ValueData::Date(v) => Ok(*v),
            _ => {
                let s = self.get_string()?;
                DateTime::parse_from_rfc3339(s.trim())
                    .map_err(|e| Error::value_format(format!("'{s}' is not a date: {e}")))
            }
        }
    }

    pub fn get_binary(&self) -> Result<BinaryHandle> {
        match &self.data {
            ValueData::Binary(b) => Ok(b.clone()),
            _ => Err(Error::value_format("value is not binary")),
        }
    }

    /// The record-level representation of this value, if it is not binary.
    pub(crate) fn to_record_string(&self) -> Result<Option<String>> {
        match &self.data {
            ValueData::Binary(_) => Ok(None),
            _ => self.get_string().map(Some),
        }
    }

    /// Compare by content, the way the record would store it.
    #[must_use]
    pub fn same_content(&self, other: &Value) -> bool {
        match (&self.data, &other.data) {
            (ValueData::Binary(a), ValueData::Binary(b)) => a == b,
            (ValueData::Binary(_), _) | (_, ValueData::Binary(_)) => false,
            _ => matches!((self.get_string(), other.get_string()), (Ok(a), Ok(b)) if a == b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::boolean(v)
    }
}

impl From<BinaryHandle> for Value {
    fn from(b: BinaryHandle) -> Self {
        Value::binary(b)
    }
}

/// A single value or an ordered list of values.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Single(Value),
    Multiple(Vec<Value>),
}

impl PropertyValue {
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self, PropertyValue::Multiple(_))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        match self {
            PropertyValue::Single(v) => std::slice::from_ref(v),
            PropertyValue::Multiple(vs) => vs,
        }
    }

    #[must_use]
    pub fn same_content(&self, other: &PropertyValue) -> bool {
        self.is_multiple() == other.is_multiple()
            && self.as_slice().len() == other.as_slice().len()
            && self
                .as_slice()
                .iter()
                .zip(other.as_slice())
                .all(|(a, b)| a.same_content(b))
    }

    /// Build from record strings using the definition's type.
    #[must_use]
    pub fn from_strings(values: &[String], kind: PropertyType, multiple: bool) -> Self {
        let mut typed: Vec<Value> = values.iter().map(|s| Value::typed(s.clone(), kind)).collect();
        if multiple {
            PropertyValue::Multiple(typed)
        } else if typed.is_empty() {
            PropertyValue::Single(Value::typed(String::new(), kind))
        } else {
            PropertyValue::Single(typed.swap_remove(0))
        }
    }

    #[must_use]
    pub fn from_binaries(values: &[BinaryHandle], multiple: bool) -> Self {
        let mut typed: Vec<Value> = values.iter().cloned().map(Value::binary).collect();
        if multiple {
            PropertyValue::Multiple(typed)
        } else if typed.is_empty() {
            PropertyValue::Single(Value::binary(BinaryHandle::default()))
        } else {
            PropertyValue::Single(typed.swap_remove(0))
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(v: Value) -> Self {
        PropertyValue::Single(v)
    }
}

impl From<Vec<Value>> for PropertyValue {
    fn from(vs: Vec<Value>) -> Self {
        PropertyValue::Multiple(vs)
    }
}

macro_rules! single_property_value {
    ($($t:ty),*) => {
        $(impl From<$t> for PropertyValue {
            fn from(v: $t) -> Self {
                PropertyValue::Single(v.into())
            }
        })*
    };
}

single_property_value!(&str, String, i64, f64, bool, BinaryHandle);
