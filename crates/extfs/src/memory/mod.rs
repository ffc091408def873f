// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators for tests and embedding

mod identifiers;
mod overlay;
mod source;

pub use identifiers::MemoryIdentifierStore;
pub use overlay::MemoryOverlayStore;
pub use source::MemoryDataSource;
