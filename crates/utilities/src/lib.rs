#![allow(missing_docs)]

//! extfs Utilities
//!
//! Shared utilities used across extfs crates

pub mod glob;
