// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::idmap::{IdentifierMapper, IdentifierStore};
use crate::memory::MemoryIdentifierStore;
use crate::overlay::OverlayStore;
use crate::resolver::OverlayResolver;
use crate::session::Session;
use crate::source::DataSource;
use crate::types::TypeLookup;
use diagnostics::*;
use std::sync::Arc;

/// Collaborators shared, read-mostly, by every session of one provider
pub(crate) struct ProviderContext {
    pub(crate) config: ProviderConfig,
    pub(crate) source: Arc<dyn DataSource>,
    pub(crate) types: Arc<dyn TypeLookup>,
    pub(crate) mapper: IdentifierMapper,
    pub(crate) resolver: OverlayResolver,
}

/// An external source mounted as a content tree
#[derive(Clone)]
pub struct ExternalProvider {
    ctx: Arc<ProviderContext>,
}

pub struct ExternalProviderBuilder {
    config: ProviderConfig,
    source: Arc<dyn DataSource>,
    types: Arc<dyn TypeLookup>,
    identifiers: Option<Arc<dyn IdentifierStore>>,
    overlay: Option<Arc<dyn OverlayStore>>,
}

impl ExternalProviderBuilder {
    #[must_use]
    pub fn identifier_store(mut self, store: Arc<dyn IdentifierStore>) -> Self {
        self.identifiers = Some(store);
        self
    }

    #[must_use]
    pub fn overlay_store(mut self, store: Arc<dyn OverlayStore>) -> Self {
        self.overlay = Some(store);
        self
    }

    pub fn build(self) -> Result<ExternalProvider> {
        self.config.validate()?;
        let identifiers = self
            .identifiers
            .unwrap_or_else(|| Arc::new(MemoryIdentifierStore::new()));
        let mapper = IdentifierMapper::new(identifiers, self.config.provider_key.clone());
        let resolver = OverlayResolver::new(&self.config, self.types.clone(), self.overlay);
        Ok(ExternalProvider {
            ctx: Arc::new(ProviderContext {
                config: self.config,
                source: self.source,
                types: self.types,
                mapper,
                resolver,
            }),
        })
    }
}

impl ExternalProvider {
    pub fn builder(
        config: ProviderConfig,
        source: Arc<dyn DataSource>,
        types: Arc<dyn TypeLookup>,
    ) -> ExternalProviderBuilder {
        ExternalProviderBuilder {
            config,
            source,
            types,
            identifiers: None,
            overlay: None,
        }
    }

    /// Open an independent session with its own pending-change buffer.
    #[must_use]
    pub fn login(&self) -> Session {
        let provider_key = &self.ctx.config.provider_key;
        info!("Opening session on provider {provider_key}", provider_key);
        Session::new(self.ctx.clone())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.ctx.config
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.ctx.source
    }

    pub fn types(&self) -> &Arc<dyn TypeLookup> {
        &self.ctx.types
    }

    pub fn is_writable(&self) -> bool {
        self.ctx.source.as_writable().is_some()
    }

    pub fn has_overlay(&self) -> bool {
        self.ctx.resolver.store().is_some()
    }
}
