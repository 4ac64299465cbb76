//! Change classification between the two staged snapshots.
//!
//! The staging queries say *which* rows changed; this module turns those
//! rows back into typed document entities, one [`Diff`] per entity kind.
//! Diffs are computed in dependency order (sets, items, relationships,
//! joins) and each later stage consults the earlier ones so children of a
//! doomed parent are never classified twice.

pub mod engine;
mod synth;

pub use engine::DiffEngine;

use crate::model::{Item, ItemKey, Join, JoinKey, Relationship, RelationshipKey, Set, SetKey};
use serde::Serialize;
use std::collections::BTreeSet;

/// Entities that can be tracked in a [`Diff`].
pub trait Keyed {
    type Key: Ord + Clone + std::fmt::Debug;

    fn diff_key(&self) -> Self::Key;
}

impl Keyed for Set {
    type Key = SetKey;

    fn diff_key(&self) -> SetKey {
        self.key()
    }
}

impl Keyed for Item {
    type Key = ItemKey;

    fn diff_key(&self) -> ItemKey {
        self.set.item(&self.name.physical)
    }
}

impl Keyed for Relationship {
    type Key = RelationshipKey;

    fn diff_key(&self) -> RelationshipKey {
        self.key()
    }
}

/// A join together with the relationship that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinChange {
    pub schema: String,
    /// Physical name of the owning relationship.
    pub relationship: String,
    /// Catalog ID of the owning relationship, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_id: Option<String>,
    pub join: Join,
}

impl JoinChange {
    #[must_use]
    pub fn relationship_key(&self) -> RelationshipKey {
        RelationshipKey::new(&self.schema, &self.relationship)
    }
}

impl Keyed for JoinChange {
    type Key = JoinKey;

    fn diff_key(&self) -> JoinKey {
        JoinKey::new(
            self.relationship_key(),
            &self.join.parent.fqdn,
            &self.join.child.fqdn,
        )
    }
}

/// An updated entity and the tracked fields that differ.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update<T> {
    #[serde(flatten)]
    pub entity: T,
    pub changed: Vec<&'static str>,
}

/// Added, updated and deleted entities of one kind.
#[derive(Debug, Clone, Serialize)]
#[serde(bound(serialize = "T: Serialize"))]
pub struct Diff<T: Keyed> {
    #[serde(rename = "add")]
    added: Vec<T>,
    #[serde(rename = "update")]
    updated: Vec<Update<T>>,
    #[serde(rename = "delete")]
    deleted: Vec<T>,

    #[serde(skip)]
    adds: BTreeSet<T::Key>,
    #[serde(skip)]
    updates: BTreeSet<T::Key>,
    #[serde(skip)]
    deletes: BTreeSet<T::Key>,
}

impl<T: Keyed> Default for Diff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            adds: BTreeSet::new(),
            updates: BTreeSet::new(),
            deletes: BTreeSet::new(),
        }
    }
}

impl<T: Keyed> Diff<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: T) {
        self.adds.insert(entity.diff_key());
        self.added.push(entity);
    }

    pub fn update(&mut self, entity: T, changed: Vec<&'static str>) {
        self.updates.insert(entity.diff_key());
        self.updated.push(Update { entity, changed });
    }

    pub fn delete(&mut self, entity: T) {
        self.deletes.insert(entity.diff_key());
        self.deleted.push(entity);
    }

    #[must_use]
    pub fn added(&self) -> &[T] {
        &self.added
    }

    #[must_use]
    pub fn updated(&self) -> &[Update<T>] {
        &self.updated
    }

    #[must_use]
    pub fn deleted(&self) -> &[T] {
        &self.deleted
    }

    /// Mutable access to added entities, used to record remote IDs on commit.
    pub fn added_mut(&mut self) -> &mut [T] {
        &mut self.added
    }

    #[must_use]
    pub fn has_addition(&self, key: &T::Key) -> bool {
        self.adds.contains(key)
    }

    #[must_use]
    pub fn has_update(&self, key: &T::Key) -> bool {
        self.updates.contains(key)
    }

    #[must_use]
    pub fn has_deletion(&self, key: &T::Key) -> bool {
        self.deletes.contains(key)
    }

    /// Whether any list mentions `key`.
    #[must_use]
    pub fn touches(&self, key: &T::Key) -> bool {
        self.has_addition(key) || self.has_update(key) || self.has_deletion(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }
}

/// The four diffs of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diffs {
    pub sets: Diff<Set>,
    pub items: Diff<Item>,
    pub relationships: Diff<Relationship>,
    pub joins: Diff<JoinChange>,
}

impl Diffs {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
            && self.items.is_empty()
            && self.relationships.is_empty()
            && self.joins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SetType;

    fn set(schema: &str, name: &str) -> Set {
        let mut set = Set::new(name, SetType::Table);
        set.schema = schema.into();
        set
    }

    #[test]
    fn test_diff_indexes_by_identity() {
        let mut diff = Diff::new();
        diff.delete(set("Sales", "Orders"));
        diff.add(set("sales", "customers"));
        diff.update(set("sales", "invoices"), vec!["description"]);

        assert!(diff.has_deletion(&SetKey::new("sales", "orders")));
        assert!(!diff.has_deletion(&SetKey::new("sales", "customers")));
        assert!(diff.has_addition(&SetKey::new("SALES", "CUSTOMERS")));
        assert!(diff.has_update(&SetKey::new("sales", "invoices")));
        assert!(diff.touches(&SetKey::new("sales", "invoices")));
        assert_eq!(diff.len(), 3);
        assert_eq!(diff.updated()[0].changed, vec!["description"]);
    }

    #[test]
    fn test_empty_diff_is_valid() {
        let diffs = Diffs::default();
        assert!(diffs.is_empty());
        assert_eq!(diffs.sets.len(), 0);
    }

    #[test]
    fn test_diff_serializes_lists_only() {
        let mut diff = Diff::new();
        diff.add(set("sales", "orders"));
        let value = serde_json::to_value(&diff).unwrap();
        assert_eq!(value["add"].as_array().unwrap().len(), 1);
        assert!(value["delete"].as_array().unwrap().is_empty());
        assert!(value.get("adds").is_none());
    }
}
