// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::session::Session;

/// The single workspace an external provider exposes
#[derive(Clone)]
pub struct Workspace {
    session: Session,
    name: String,
}

impl Workspace {
    pub(crate) fn new(session: Session, name: String) -> Self {
        Self { session, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn move_item(&self, source: &str, dest: &str) -> Result<()> {
        self.session.move_item(source, dest).await
    }

    pub async fn copy(&self, _source: &str, _dest: &str) -> Result<()> {
        Err(Error::unsupported("copy"))
    }

    pub async fn clone_from(
        &self,
        _workspace: &str,
        _source: &str,
        _dest: &str,
        _remove_existing: bool,
    ) -> Result<()> {
        Err(Error::unsupported("clone"))
    }

    pub async fn restore(&self, _versions: &[String], _remove_existing: bool) -> Result<()> {
        Err(Error::unsupported("restore"))
    }

    pub async fn create_workspace(&self, _name: &str) -> Result<()> {
        Err(Error::unsupported("create workspace"))
    }

    pub async fn delete_workspace(&self, _name: &str) -> Result<()> {
        Err(Error::unsupported("delete workspace"))
    }
}
