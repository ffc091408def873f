// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! `/`-delimited tree path helpers

pub const ROOT: &str = "/";

/// Strips a trailing slash, except from the root itself
#[must_use]
pub fn normalize(p: &str) -> &str {
    if p.len() > 1 && p.ends_with('/') {
        &p[..p.len() - 1]
    } else {
        p
    }
}

#[must_use]
pub fn is_root(p: &str) -> bool {
    p == ROOT
}

/// Extracts the final segment, empty for the root
#[must_use]
pub fn name(p: &str) -> &str {
    let p = normalize(p);
    match p.rfind('/') {
        Some(i) => &p[i + 1..],
        None => p,
    }
}

/// Extracts the parent path, `None` for the root
#[must_use]
pub fn parent(p: &str) -> Option<&str> {
    let p = normalize(p);
    if is_root(p) {
        return None;
    }
    match p.rfind('/') {
        Some(0) => Some(ROOT),
        Some(i) => Some(&p[..i]),
        None => None,
    }
}

/// Joins a child name (or relative path) below `base`
#[must_use]
pub fn join(base: &str, rel: &str) -> String {
    let rel = rel.trim_start_matches('/');
    if base.ends_with('/') {
        format!("{base}{rel}")
    } else {
        format!("{base}/{rel}")
    }
}

/// True if `p` is `ancestor` or lies below it
#[must_use]
pub fn is_descendant_or_self(p: &str, ancestor: &str) -> bool {
    if is_root(ancestor) {
        return true;
    }
    p == ancestor
        || p.strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}
