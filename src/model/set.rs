//! Set (table or view) model.

use super::key::upsert_key;
use super::{
    Item, Key, Metadata, Name, SetKey, fill_metadata, fill_string, identity, ids_conflict,
    replace_string,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Set type as reported by the source system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SetType {
    Table,
    View,
    MaterializedView,
    Other(String),
    #[default]
    Unspecified,
}

impl SetType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::MaterializedView => "MATERIALIZED VIEW",
            Self::Other(s) => s,
            Self::Unspecified => "",
        }
    }

    /// Parse from string. `BASE TABLE` is a table; unknown kinds are kept verbatim.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "" => Self::Unspecified,
            "TABLE" | "BASE TABLE" => Self::Table,
            "VIEW" => Self::View,
            "MATERIALIZED VIEW" | "MATVIEW" => Self::MaterializedView,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    #[must_use]
    pub fn is_view(&self) -> bool {
        matches!(self, Self::View | Self::MaterializedView)
    }
}

impl From<String> for SetType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<SetType> for String {
    fn from(t: SetType) -> Self {
        t.as_str().to_string()
    }
}

/// Role a set plays in a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    Parent,
    Child,
}

/// Denormalized index entry: this set is the parent or child of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipLink {
    pub relationship: String,
    pub role: LinkRole,
}

/// A table or view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Set {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: Name,

    /// Physical name of the owning schema.
    #[serde(default)]
    pub schema: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(rename = "type", default)]
    pub set_type: SetType,

    /// View definition text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub definition: String,

    #[serde(default)]
    pub fqdn: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<Key>,

    #[serde(default)]
    pub items: BTreeMap<String, Item>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<RelationshipLink>,
}

impl Set {
    pub fn new(name: impl Into<String>, set_type: SetType) -> Self {
        Self {
            name: Name::physical(name),
            set_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        identity(&self.name.physical)
    }

    #[must_use]
    pub fn key(&self) -> SetKey {
        SetKey::new(&self.schema, &self.name.physical)
    }

    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Fully-qualified name of an item in this set.
    #[must_use]
    pub fn qualify(&self, item: &str) -> String {
        if self.fqdn.is_empty() {
            format!("{}.{item}", self.name.physical)
        } else {
            format!("{}.{item}", self.fqdn)
        }
    }

    #[must_use]
    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(&identity(name))
    }

    pub fn item_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.items.get_mut(&identity(name))
    }

    /// Insert a new item or merge into the existing one with the same identity.
    pub fn upsert_item(&mut self, mut item: Item) -> Result<&mut Item> {
        item.set = self.key();
        if item.fqdn.trim().is_empty() && !self.fqdn.is_empty() {
            item.fqdn = self.qualify(&item.name.physical);
        }
        match self.items.entry(item.id()) {
            Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                existing.merge(item)?;
                Ok(existing)
            }
            Entry::Vacant(entry) => Ok(entry.insert(item)),
        }
    }

    pub fn upsert_key(&mut self, key: Key) -> &mut Key {
        upsert_key(&mut self.keys, key)
    }

    /// Record that this set takes part in a relationship.
    pub fn link(&mut self, relationship: &str, role: LinkRole) {
        let relationship = identity(relationship);
        if !self
            .links
            .iter()
            .any(|l| l.relationship == relationship && l.role == role)
        {
            self.links.push(RelationshipLink { relationship, role });
        }
    }

    fn check_merge(&self, other: &Set) -> Result<()> {
        if ids_conflict(self.remote_id(), other.remote_id()) {
            return Err(Error::conflict(
                "set",
                self.key().to_string(),
                format!(
                    "remote id {} != {}",
                    self.id.as_deref().unwrap_or_default(),
                    other.id.as_deref().unwrap_or_default()
                ),
            ));
        }
        for (id, incoming) in &other.items {
            if let Some(existing) = self.items.get(id) {
                if ids_conflict(existing.remote_id(), incoming.remote_id()) {
                    return Err(Error::conflict(
                        "item",
                        self.key().item(id).to_string(),
                        "remote ids differ",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Merge `other` into this set, items included.
    ///
    /// Conflicting remote IDs on the set or any shared item reject the whole
    /// merge before anything is applied.
    pub fn merge(&mut self, other: Set) -> Result<()> {
        self.check_merge(&other)?;

        if self.remote_id().is_none() && other.remote_id().is_some() {
            self.id = other.id;
        }
        self.name.fill(&other.name);
        replace_string(&mut self.comment, &other.comment);
        if self.set_type == SetType::Unspecified {
            self.set_type = other.set_type;
        }
        fill_string(&mut self.definition, &other.definition);
        fill_string(&mut self.fqdn, &other.fqdn);
        fill_metadata(&mut self.metadata, other.metadata);
        for key in other.keys {
            self.upsert_key(key);
        }
        for link in other.links {
            self.link(&link.relationship, link.role);
        }
        for item in other.items.into_values() {
            self.upsert_item(item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_type_parse() {
        assert_eq!(SetType::parse("BASE TABLE"), SetType::Table);
        assert_eq!(SetType::parse("view"), SetType::View);
        assert_eq!(SetType::parse(""), SetType::Unspecified);
        assert_eq!(SetType::parse("foreign table"), SetType::Other("foreign table".into()));
        assert!(SetType::MaterializedView.is_view());
    }

    #[test]
    fn test_upsert_item_sets_back_reference() {
        let mut set = Set::new("Orders", SetType::Table);
        set.schema = "Sales".into();
        set.fqdn = "Sales.Orders".into();

        let item = set.upsert_item(Item::new("ID", "int")).unwrap();
        assert_eq!(item.set, SetKey::new("sales", "orders"));
        assert_eq!(item.fqdn, "Sales.Orders.ID");
        assert!(set.item("id").is_some());
    }

    #[test]
    fn test_upsert_item_twice_merges() {
        let mut set = Set::new("orders", SetType::Table);
        set.upsert_item(Item::new("total", "numeric")).unwrap();
        let mut again = Item::new("TOTAL", "");
        again.comment = "sum".into();
        set.upsert_item(again).unwrap();
        assert_eq!(set.items.len(), 1);
        assert_eq!(set.item("total").unwrap().comment, "sum");
        assert_eq!(set.item("total").unwrap().data_type, "numeric");
    }

    #[test]
    fn test_merge_rejects_item_id_conflict_without_applying() {
        let mut a = Set::new("orders", SetType::Table);
        let mut item = Item::new("id", "int");
        item.id = Some("i-1".into());
        a.upsert_item(item).unwrap();

        let mut b = Set::new("orders", SetType::Table);
        b.comment = "incoming".into();
        let mut item = Item::new("id", "int");
        item.id = Some("i-2".into());
        b.upsert_item(item).unwrap();

        assert!(a.merge(b).is_err());
        assert!(a.comment.is_empty());
    }

    #[test]
    fn test_link_dedupes() {
        let mut set = Set::new("orders", SetType::Table);
        set.link("FK_Customer", LinkRole::Child);
        set.link("fk_customer", LinkRole::Child);
        set.link("fk_customer", LinkRole::Parent);
        assert_eq!(set.links.len(), 2);
    }
}
