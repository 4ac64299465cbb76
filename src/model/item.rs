//! Item (column) model.

use super::key::upsert_key;
use super::{
    Key, KeyKind, Metadata, Name, SetKey, fill_metadata, fill_string, identity, ids_conflict,
    replace_string,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A column of a set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Remote-assigned ID, present once the catalog knows this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: Name,

    /// Owning set. Assigned by [`Set::upsert_item`](super::Set::upsert_item).
    #[serde(skip)]
    pub set: SetKey,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(rename = "type", default)]
    pub data_type: String,

    #[serde(default)]
    pub nullable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,

    #[serde(default)]
    pub fqdn: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<Key>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Item {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: Name::physical(name),
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        identity(&self.name.physical)
    }

    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn upsert_key(&mut self, key: Key) -> &mut Key {
        upsert_key(&mut self.keys, key)
    }

    #[must_use]
    pub fn key(&self, name: &str) -> Option<&Key> {
        let id = identity(name);
        self.keys.iter().find(|k| k.id() == id)
    }

    /// Staged key columns: the primary key if any, else the first named key.
    #[must_use]
    pub fn key_flags(&self) -> (bool, &str) {
        if let Some(pk) = self.keys.iter().find(|k| k.is_primary()) {
            return (true, &pk.name);
        }
        self.keys
            .iter()
            .find(|k| !k.name.trim().is_empty() && k.kind != Some(KeyKind::Json))
            .map_or((false, ""), |k| (false, k.name.as_str()))
    }

    /// Merge `other` into this item.
    ///
    /// A non-empty incoming comment replaces; every other field only fills a
    /// gap. Fails without changes when both sides carry different remote IDs.
    pub fn merge(&mut self, other: Item) -> Result<()> {
        if ids_conflict(self.remote_id(), other.remote_id()) {
            return Err(Error::conflict(
                "item",
                self.set.item(&self.name.physical).to_string(),
                format!(
                    "remote id {} != {}",
                    self.id.as_deref().unwrap_or_default(),
                    other.id.as_deref().unwrap_or_default()
                ),
            ));
        }

        if self.remote_id().is_none() && other.remote_id().is_some() {
            self.id = other.id;
        }
        self.name.fill(&other.name);
        replace_string(&mut self.comment, &other.comment);
        fill_string(&mut self.data_type, &other.data_type);
        fill_string(&mut self.fqdn, &other.fqdn);
        if self.default.is_none() {
            self.default = other.default;
        }
        if self.example.is_none() {
            self.example = other.example;
        }
        for key in other.keys {
            self.upsert_key(key);
        }
        fill_metadata(&mut self.metadata, other.metadata);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_fills_gaps_and_replaces_comment() {
        let mut a = Item::new("total", "numeric");
        a.comment = "old".into();
        let mut b = Item::new("TOTAL", "text");
        b.comment = "order total".into();
        b.default = Some("0".into());
        b.id = Some("item-1".into());

        a.merge(b).unwrap();
        assert_eq!(a.comment, "order total");
        assert_eq!(a.data_type, "numeric");
        assert_eq!(a.default.as_deref(), Some("0"));
        assert_eq!(a.remote_id(), Some("item-1"));
    }

    #[test]
    fn test_merge_rejects_conflicting_ids() {
        let mut a = Item::new("id", "int");
        a.id = Some("one".into());
        let mut b = Item::new("id", "int");
        b.id = Some("two".into());
        b.comment = "changed".into();

        let err = a.merge(b).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(a.comment.is_empty());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut a = Item::new("id", "int");
        a.upsert_key(Key::new("pk", Some(KeyKind::Primary)).with_item("id"));
        let before = a.clone();
        a.merge(before.clone()).unwrap();
        assert_eq!(a, before);
    }

    #[test]
    fn test_key_flags() {
        let mut item = Item::new("customer_id", "int");
        assert_eq!(item.key_flags(), (false, ""));
        item.upsert_key(Key::new("fk_customer", Some(KeyKind::Foreign)));
        assert_eq!(item.key_flags(), (false, "fk_customer"));
        item.upsert_key(Key::new("pk_orders", Some(KeyKind::Primary)));
        assert_eq!(item.key_flags(), (true, "pk_orders"));
    }
}
