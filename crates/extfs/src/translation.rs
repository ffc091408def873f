// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Virtual per-language translation children.
//!
//! A record's internationalized content for language `L` is shown as a child
//! named `j:translation_L` of type `jnt:translation`. The child is never stored
//! on its own; writes to it are folded into the parent when the session flushes.

use crate::error::{Error, Result};
use crate::path;
use crate::record::Record;

pub const TRANSLATION_PREFIX: &str = "translation:";
pub const TRANSLATION_NODE_PREFIX: &str = "j:translation_";
pub const TRANSLATION_TYPE: &str = "jnt:translation";
pub const LANGUAGE_PROPERTY: &str = "jcr:language";

#[must_use]
pub fn child_name(lang: &str) -> String {
    format!("{TRANSLATION_NODE_PREFIX}{lang}")
}

/// Language of a translation child name, `None` for ordinary names.
#[must_use]
pub fn language_of_name(name: &str) -> Option<&str> {
    name.strip_prefix(TRANSLATION_NODE_PREFIX)
        .filter(|lang| !lang.is_empty())
}

/// Language of a translation child path (`.../j:translation_<lang>`).
#[must_use]
pub fn language_of_path(p: &str) -> Option<&str> {
    language_of_name(path::name(p))
}

#[must_use]
pub fn translation_id(lang: &str, parent_id: &str) -> String {
    format!("{TRANSLATION_PREFIX}{lang}:{parent_id}")
}

#[must_use]
pub fn is_translation_id(id: &str) -> bool {
    id.starts_with(TRANSLATION_PREFIX)
}

/// Split `translation:<lang>:<parentId>` into `(lang, parentId)`.
#[must_use]
pub fn parse_translation_id(id: &str) -> Option<(&str, &str)> {
    let rest = id.strip_prefix(TRANSLATION_PREFIX)?;
    let (lang, parent) = rest.split_once(':')?;
    if lang.is_empty() {
        return None;
    }
    Some((lang, parent))
}

/// Project language `lang` of `parent` as a synthetic translation record.
///
/// Fails with `NotFound` if the parent has no content (materialized or lazy)
/// for that language.
pub fn synthesize(parent: &Record, lang: &str) -> Result<Record> {
    let materialized = parent.i18n_properties().get(lang);
    let lazy = parent.lazy_i18n_properties().get(lang);
    if materialized.is_none() && lazy.is_none() {
        return Err(Error::not_found(path::join(parent.path(), &child_name(lang))));
    }

    let mut record = Record::new(
        translation_id(lang, parent.id()),
        path::join(parent.path(), &child_name(lang)),
        TRANSLATION_TYPE,
    );
    if let Some(props) = materialized {
        for (name, values) in props {
            record.set_values(name.clone(), values.clone());
        }
    }
    if let Some(names) = lazy {
        for name in names {
            if !record.has(name) {
                record = record.with_lazy_property(name.clone());
            }
        }
    }
    record.set_values(LANGUAGE_PROPERTY, vec![lang.to_string()]);
    Ok(record)
}

/// Write a modified translation child back into its parent's i18n map.
///
/// Names still lazy on the child keep their lazy status on the parent;
/// names the child no longer has are dropped.
pub fn fold_into(parent: &mut Record, translation: &Record) -> Result<()> {
    let lang = language_of_path(translation.path()).ok_or_else(|| {
        Error::invalid_state(format!("{} is not a translation child", translation.path()))
    })?;

    let known: Vec<String> = parent
        .i18n_properties()
        .get(lang)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();
    for name in known {
        if !translation.has(&name) {
            let _ = parent.remove_i18n_value(lang, &name);
        }
    }
    for (name, values) in translation.properties() {
        if name != LANGUAGE_PROPERTY {
            parent.set_i18n_value(lang, name.clone(), values.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_ids() {
        assert_eq!(child_name("fr"), "j:translation_fr");
        assert_eq!(language_of_name("j:translation_fr"), Some("fr"));
        assert_eq!(language_of_name("j:translation_"), None);
        assert_eq!(language_of_path("/x/j:translation_de"), Some("de"));
        assert_eq!(language_of_path("/x/title"), None);

        let id = translation_id("fr", "row:12");
        assert_eq!(id, "translation:fr:row:12");
        assert!(is_translation_id(&id));
        assert_eq!(parse_translation_id(&id), Some(("fr", "row:12")));
        assert_eq!(parse_translation_id("translation::x"), None);
    }

    #[test]
    fn test_synthesize_injects_language() {
        let parent = Record::new("p1", "/x", "jnt:content")
            .with_i18n("fr", "title", vec!["Bonjour".to_string()]);
        let t = synthesize(&parent, "fr").unwrap();
        assert_eq!(t.id(), "translation:fr:p1");
        assert_eq!(t.path(), "/x/j:translation_fr");
        assert_eq!(t.type_name(), TRANSLATION_TYPE);
        assert_eq!(t.properties()["title"], vec!["Bonjour".to_string()]);
        assert_eq!(t.properties()[LANGUAGE_PROPERTY], vec!["fr".to_string()]);
    }

    #[test]
    fn test_synthesize_lazy_language() {
        let parent = Record::new("p1", "/", "jnt:content").with_lazy_i18n("de", "title");
        let t = synthesize(&parent, "de").unwrap();
        assert_eq!(t.path(), "/j:translation_de");
        assert!(t.is_lazy("title"));
    }

    #[test]
    fn test_fold_into_parent() {
        let mut parent = Record::new("p1", "/x", "jnt:content")
            .with_i18n("fr", "old", vec!["a".to_string()])
            .with_lazy_i18n("fr", "body");
        let mut t = synthesize(&parent, "fr").unwrap();
        t.set_values("title", vec!["Salut".to_string()]);
        let _ = t.remove_property("old");

        fold_into(&mut parent, &t).unwrap();
        let fr = &parent.i18n_properties()["fr"];
        assert_eq!(fr["title"], vec!["Salut".to_string()]);
        assert!(!fr.contains_key("old"));
        assert!(!fr.contains_key(LANGUAGE_PROPERTY));
        assert!(parent.lazy_i18n_properties()["fr"].contains("body"));
    }

    #[test]
    fn test_fold_rejects_ordinary_child() {
        let mut parent = Record::new("p1", "/x", "jnt:content");
        let child = Record::new("c", "/x/c", "jnt:content");
        assert!(matches!(
            fold_into(&mut parent, &child),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_synthesize_unknown_language() {
        let parent = Record::new("p1", "/x", "jnt:content");
        assert!(synthesize(&parent, "it").unwrap_err().is_not_found());
    }
}
