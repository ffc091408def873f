#![allow(missing_docs)]

//! extfs - An external content tree projected into a hierarchical repository
//!
//! A data source hands out flat records; this crate shows them as typed nodes
//! and properties, buffers writes per session, and stores local additions in
//! an optional overlay tree.
//!
//! Set EXTFS_LOG environment variable to control logging:
//! - EXTFS_LOG=off (default) - silent
//! - EXTFS_LOG=info - flushes and logins
//! - EXTFS_LOG=debug - lazy loads, pending registrations, overlay creation

// Error types
pub mod error;

// Values and property types
pub mod value;

/// Flat item representation exchanged with data sources
pub mod record;

// Path arithmetic
pub mod path;

/// Node type definitions and lookup
pub mod types;

/// Provider configuration
pub mod config;

/// External data source contract
pub mod source;

// Internal identifier mapping
pub mod idmap;

/// Overlay tree contract and handle
pub mod overlay;

// Overlay resolution and delegation rules
pub mod resolver;

// Virtual translation children
pub mod translation;

// Per-session pending change buffer
pub mod pending;

pub mod property;
pub mod node;
pub mod extension;

// Provider, session and workspace entry points
pub mod provider;
pub mod session;
pub mod workspace;

/// In-memory collaborators
pub mod memory;

pub use config::ProviderConfig;
pub use error::{Error, Result};
pub use extension::ExtensionNode;
pub use idmap::{IdentifierMapper, IdentifierMapping, IdentifierStore};
pub use node::{ExternalNode, Item, Node, NodeStream, PropertyStream};
pub use overlay::{OverlayNode, OverlayStore};
pub use pending::PendingChanges;
pub use property::{Property, PropertyOrigin};
pub use provider::{ExternalProvider, ExternalProviderBuilder};
pub use record::Record;
pub use resolver::OverlayResolver;
pub use session::Session;
pub use source::{DataSource, WritableDataSource};
pub use types::{
    ChildDefinition, ItemDefinition, NodeTypeDef, PropertyDefinition, TypeDefinitions, TypeLookup,
    TypeRegistry, TypeRegistryBuilder,
};
pub use value::{BinaryHandle, PropertyType, PropertyValue, Value};
pub use workspace::Workspace;
