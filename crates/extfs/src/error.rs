// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the external tree projection.
///
/// Errors are surfaced unchanged from the point of detection; nothing in this
/// crate retries.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// Path, identifier or property absent
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Capability not offered by the current source (read-only, versioning, ...)
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Definition missing, or item not legally placeable
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Unknown node type name
    #[error("No such node type: {0}")]
    NoSuchNodeType(String),

    /// Value could not be coerced to the requested type
    #[error("Value format error: {0}")]
    ValueFormat(String),

    #[error("Item exists: {0}")]
    ItemExists(String),

    #[error("Invalid item state: {0}")]
    InvalidState(String),

    /// Provider configuration could not be read or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Name pattern error: {0}")]
    Glob(#[from] utilities::glob::GlobError),
}

impl Error {
    pub fn not_found<S: AsRef<str>>(what: S) -> Self {
        Error::NotFound(what.as_ref().to_string())
    }

    pub fn unsupported<S: AsRef<str>>(operation: S) -> Self {
        Error::Unsupported(operation.as_ref().to_string())
    }

    pub fn constraint_violation<S: AsRef<str>>(what: S) -> Self {
        Error::ConstraintViolation(what.as_ref().to_string())
    }

    pub fn no_such_node_type<S: AsRef<str>>(name: S) -> Self {
        Error::NoSuchNodeType(name.as_ref().to_string())
    }

    pub fn value_format<S: AsRef<str>>(what: S) -> Self {
        Error::ValueFormat(what.as_ref().to_string())
    }

    pub fn item_exists<S: AsRef<str>>(what: S) -> Self {
        Error::ItemExists(what.as_ref().to_string())
    }

    pub fn invalid_state<S: AsRef<str>>(what: S) -> Self {
        Error::InvalidState(what.as_ref().to_string())
    }

    pub fn config<S: AsRef<str>>(what: S) -> Self {
        Error::Config(what.as_ref().to_string())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }
}
