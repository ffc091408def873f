// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory representation of one external item.
//!
//! A property name lives in at most one of `properties`, `binary_properties`,
//! `lazy_properties` and `lazy_binary_properties`. The mutators below keep
//! that invariant; once a lazy name is materialized it never becomes lazy again.

use crate::value::BinaryHandle;
use std::collections::{BTreeMap, BTreeSet};

pub type StringValues = Vec<String>;
pub type I18nMap = BTreeMap<String, BTreeMap<String, StringValues>>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    id: String,
    path: String,
    type_name: String,
    properties: BTreeMap<String, StringValues>,
    binary_properties: BTreeMap<String, Vec<BinaryHandle>>,
    lazy_properties: BTreeSet<String>,
    lazy_binary_properties: BTreeSet<String>,
    i18n_properties: I18nMap,
    /// lang -> names not fetched yet; the key set is the lazy language set
    lazy_i18n_properties: BTreeMap<String, BTreeSet<String>>,
    mixins: Vec<String>,
}

impl Record {
    pub fn new<I, P, T>(id: I, path: P, type_name: T) -> Self
    where
        I: Into<String>,
        P: Into<String>,
        T: Into<String>,
    {
        Self {
            id: id.into(),
            path: path.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    /// Builder-style single-valued string property.
    #[must_use]
    pub fn with_property<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.set_values(name, vec![value.into()]);
        self
    }

    #[must_use]
    pub fn with_values<N: Into<String>>(mut self, name: N, values: StringValues) -> Self {
        self.set_values(name, values);
        self
    }

    #[must_use]
    pub fn with_binary<N: Into<String>>(mut self, name: N, value: BinaryHandle) -> Self {
        self.set_binary_values(name, vec![value]);
        self
    }

    #[must_use]
    pub fn with_lazy_property<N: Into<String>>(mut self, name: N) -> Self {
        let name = name.into();
        self.forget(&name);
        let _ = self.lazy_properties.insert(name);
        self
    }

    #[must_use]
    pub fn with_lazy_binary_property<N: Into<String>>(mut self, name: N) -> Self {
        let name = name.into();
        self.forget(&name);
        let _ = self.lazy_binary_properties.insert(name);
        self
    }

    #[must_use]
    pub fn with_i18n<L: Into<String>, N: Into<String>>(mut self, lang: L, name: N, values: StringValues) -> Self {
        let _ = self
            .i18n_properties
            .entry(lang.into())
            .or_default()
            .insert(name.into(), values);
        self
    }

    #[must_use]
    pub fn with_lazy_i18n<L: Into<String>, N: Into<String>>(mut self, lang: L, name: N) -> Self {
        let _ = self
            .lazy_i18n_properties
            .entry(lang.into())
            .or_default()
            .insert(name.into());
        self
    }

    #[must_use]
    pub fn with_mixin<M: Into<String>>(mut self, mixin: M) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn mixins(&self) -> &[String] {
        &self.mixins
    }

    pub fn properties(&self) -> &BTreeMap<String, StringValues> {
        &self.properties
    }

    pub fn binary_properties(&self) -> &BTreeMap<String, Vec<BinaryHandle>> {
        &self.binary_properties
    }

    pub fn lazy_properties(&self) -> &BTreeSet<String> {
        &self.lazy_properties
    }

    pub fn lazy_binary_properties(&self) -> &BTreeSet<String> {
        &self.lazy_binary_properties
    }

    pub fn i18n_properties(&self) -> &I18nMap {
        &self.i18n_properties
    }

    pub fn lazy_i18n_properties(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.lazy_i18n_properties
    }

    /// Languages with materialized or lazy internationalized content.
    pub fn languages(&self) -> BTreeSet<String> {
        self.i18n_properties
            .keys()
            .chain(self.lazy_i18n_properties.keys())
            .cloned()
            .collect()
    }

    pub fn is_lazy(&self, name: &str) -> bool {
        self.lazy_properties.contains(name) || self.lazy_binary_properties.contains(name)
    }

    /// Known by name, materialized or not.
    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
            || self.binary_properties.contains_key(name)
            || self.is_lazy(name)
    }

    /// Every property name the record knows, materialized first.
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .properties
            .keys()
            .chain(self.binary_properties.keys())
            .cloned()
            .collect();
        names.extend(self.lazy_properties.iter().cloned());
        names.extend(self.lazy_binary_properties.iter().cloned());
        names
    }

    fn forget(&mut self, name: &str) -> bool {
        let a = self.properties.remove(name).is_some();
        let b = self.binary_properties.remove(name).is_some();
        let c = self.lazy_properties.remove(name);
        let d = self.lazy_binary_properties.remove(name);
        a || b || c || d
    }

    pub fn set_values<N: Into<String>>(&mut self, name: N, values: StringValues) {
        let name = name.into();
        let _ = self.forget(&name);
        let _ = self.properties.insert(name, values);
    }

    pub fn set_binary_values<N: Into<String>>(&mut self, name: N, values: Vec<BinaryHandle>) {
        let name = name.into();
        let _ = self.forget(&name);
        let _ = self.binary_properties.insert(name, values);
    }

    /// Remove a property from whichever map holds it. Returns whether it existed.
    pub fn remove_property(&mut self, name: &str) -> bool {
        self.forget(name)
    }

    pub fn set_i18n_value<L: Into<String>, N: Into<String>>(&mut self, lang: L, name: N, values: StringValues) {
        let lang = lang.into();
        let name = name.into();
        if let Some(lazy) = self.lazy_i18n_properties.get_mut(&lang) {
            let _ = lazy.remove(&name);
        }
        let _ = self
            .i18n_properties
            .entry(lang)
            .or_default()
            .insert(name, values);
    }

    /// Replace the whole content of one language.
    pub fn set_i18n_language<L: Into<String>>(&mut self, lang: L, values: BTreeMap<String, StringValues>) {
        let lang = lang.into();
        let _ = self.lazy_i18n_properties.remove(&lang);
        let _ = self.i18n_properties.insert(lang, values);
    }

    pub fn remove_i18n_value(&mut self, lang: &str, name: &str) -> bool {
        let materialized = self
            .i18n_properties
            .get_mut(lang)
            .is_some_and(|props| props.remove(name).is_some());
        let lazy = self
            .lazy_i18n_properties
            .get_mut(lang)
            .is_some_and(|names| names.remove(name));
        materialized || lazy
    }

    /// Drop every value of one language, materialized or lazy.
    pub fn remove_i18n_language(&mut self, lang: &str) -> bool {
        let a = self.i18n_properties.remove(lang).is_some();
        let b = self.lazy_i18n_properties.remove(lang).is_some();
        a || b
    }

    /// Same content under a new identity, as after a move.
    #[must_use]
    pub fn relocated<I: Into<String>, P: Into<String>>(&self, id: I, path: P) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            ..self.clone()
        }
    }

    /// Take values `other` has already fetched for names still lazy here.
    pub fn adopt_loaded(&mut self, other: &Record) {
        let lazy: Vec<String> = self
            .lazy_properties
            .iter()
            .chain(self.lazy_binary_properties.iter())
            .cloned()
            .collect();
        for name in lazy {
            if let Some(values) = other.properties.get(&name) {
                self.set_values(name, values.clone());
            } else if let Some(values) = other.binary_properties.get(&name) {
                self.set_binary_values(name, values.clone());
            }
        }
    }
}
