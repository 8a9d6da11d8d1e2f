//! Diff of key/value settings whose persisted entries carry a server id.
//!
//! Resources keep the user's mapping plus a list of `"<key>;;;<id>"` strings so
//! that later updates can address existing entries by id.

use std::{collections::BTreeMap, fmt::Display};

use log::warn;

use crate::errors::{InextError, Result};

/// Separator between a key and its server id in persisted id strings
pub const ID_SEPARATOR: &str = ";;;";

/// Changes needed to turn one mapping into another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsDiff<K, V, Id> {
    /// Entries present only in the new mapping
    pub added: Vec<(K, V)>,
    /// Entries whose value changed, addressed by id
    pub updated: Vec<(Id, K, V)>,
    /// Ids of entries present only in the old mapping
    pub removed_ids: Vec<Id>,
}

impl<K, V, Id> Default for SettingsDiff<K, V, Id> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed_ids: Vec::new(),
        }
    }
}

impl<K, V, Id> SettingsDiff<K, V, Id> {
    /// Returns `true` when the mappings are equivalent
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed_ids.is_empty()
    }
}

/// Compute the changes from `old` to `new`.
///
/// Keys only in `new` are added. Keys in both with a different value are
/// updated. Keys only in `old` are removed. Updated and removed entries need an
/// id from `id_of`; entries without one are logged and skipped.
pub fn diff<K, V, Id, F>(
    old: &BTreeMap<K, V>,
    new: &BTreeMap<K, V>,
    mut id_of: F,
) -> SettingsDiff<K, V, Id>
where
    K: Ord + Clone + Display,
    V: Clone + PartialEq,
    F: FnMut(&K) -> Option<Id>,
{
    let mut result = SettingsDiff::default();

    for (key, value) in new {
        match old.get(key) {
            None => result.added.push((key.clone(), value.clone())),
            Some(previous) if previous == value => {}
            Some(_) => match id_of(key) {
                Some(id) => result.updated.push((id, key.clone(), value.clone())),
                None => warn!("Key {key} does not have an ID in state, skipping update"),
            },
        }
    }

    for key in old.keys().filter(|key| !new.contains_key(*key)) {
        match id_of(key) {
            Some(id) => result.removed_ids.push(id),
            None => warn!("Key {key} does not have an ID in state, skipping removal"),
        }
    }

    result
}

/// Render a persisted id string
pub fn format_stored_id(key: &str, id: &str) -> String {
    format!("{key}{ID_SEPARATOR}{id}")
}

/// Parse persisted id strings back into a key to id mapping.
///
/// The id is the text after the last separator. Entries without a separator,
/// or with an empty id, are rejected with an error naming `field`.
pub fn parse_stored_ids<'a, I>(field: &str, entries: I) -> Result<BTreeMap<String, String>>
where
    I: IntoIterator<Item = &'a str>,
{
    entries
        .into_iter()
        .map(|entry| match entry.rsplit_once(ID_SEPARATOR) {
            Some((key, id)) if !id.is_empty() => Ok((key.to_string(), id.to_string())),
            _ => Err(InextError::resource_state(
                field,
                format!("malformed id entry '{entry}', expected <key>{ID_SEPARATOR}<id>"),
            )),
        })
        .collect()
}
