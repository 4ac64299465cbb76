//! Schema model.

use super::{
    Join, LinkRole, Metadata, Name, Relationship, Set, fill_metadata, fill_string, identity,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// A namespace of sets and relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: Name,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    #[serde(default)]
    pub sets: BTreeMap<String, Set>,

    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Name::physical(name),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        identity(&self.name.physical)
    }

    #[must_use]
    pub fn set(&self, name: &str) -> Option<&Set> {
        self.sets.get(&identity(name))
    }

    pub fn set_mut(&mut self, name: &str) -> Option<&mut Set> {
        self.sets.get_mut(&identity(name))
    }

    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(&identity(name))
    }

    pub fn relationship_mut(&mut self, name: &str) -> Option<&mut Relationship> {
        self.relationships.get_mut(&identity(name))
    }

    /// Insert a set or merge into the existing one with the same identity.
    pub fn upsert_set(&mut self, mut set: Set) -> Result<&mut Set> {
        set.schema.clone_from(&self.name.physical);
        if set.fqdn.trim().is_empty() {
            set.fqdn = format!("{}.{}", self.name.physical, set.name.physical);
        }
        let id = set.id();
        match self.sets.entry(id.clone()) {
            Entry::Occupied(entry) => entry.into_mut().merge(set)?,
            Entry::Vacant(entry) => {
                for item in std::mem::take(&mut set.items).into_values() {
                    set.upsert_item(item)?;
                }
                entry.insert(set);
            }
        }
        self.link_set(&id);
        self.sets
            .get_mut(&id)
            .ok_or_else(|| Error::resolution("set", id, "vanished during upsert"))
    }

    /// Insert a relationship or merge into the existing one, then refresh
    /// the parent/child links of the sets it touches.
    pub fn upsert_relationship(&mut self, mut rel: Relationship) -> Result<&mut Relationship> {
        rel.schema.clone_from(&self.name.physical);
        let id = rel.id();
        match self.relationships.entry(id.clone()) {
            Entry::Occupied(entry) => entry.into_mut().merge(rel)?,
            Entry::Vacant(entry) => {
                let joins = std::mem::take(&mut rel.joins);
                let inserted = entry.insert(rel);
                for join in joins {
                    inserted.upsert_join(join);
                }
            }
        }
        self.link_relationship(&id);
        self.relationships
            .get_mut(&id)
            .ok_or_else(|| Error::resolution("relationship", id, "vanished during upsert"))
    }

    /// Upsert a join into a relationship of this schema.
    pub fn upsert_join(&mut self, relationship: &str, join: Join) -> Result<()> {
        let id = identity(relationship);
        let rel = self.relationships.get_mut(&id).ok_or_else(|| {
            Error::resolution("relationship", relationship, "not in schema")
        })?;
        rel.upsert_join(join);
        self.link_relationship(&id);
        Ok(())
    }

    /// Sets of this schema touched by a relationship, with their role.
    fn roles(&self, rel: &Relationship) -> Vec<(String, LinkRole)> {
        let schema = self.id();
        let mut roles = vec![(identity(&rel.set), LinkRole::Parent)];
        for join in &rel.joins {
            if identity(&join.child.schema) == schema {
                roles.push((identity(&join.child.set), LinkRole::Child));
            }
        }
        roles
    }

    fn link_relationship(&mut self, rel_id: &str) {
        let Some(rel) = self.relationships.get(rel_id) else {
            return;
        };
        let name = rel.name.physical.clone();
        for (set_id, role) in self.roles(rel) {
            if let Some(set) = self.sets.get_mut(&set_id) {
                set.link(&name, role);
            }
        }
    }

    fn link_set(&mut self, set_id: &str) {
        let links: Vec<(String, LinkRole)> = self
            .relationships
            .values()
            .flat_map(|rel| {
                self.roles(rel)
                    .into_iter()
                    .filter(|(id, _)| id == set_id)
                    .map(|(_, role)| (rel.name.physical.clone(), role))
            })
            .collect();
        if let Some(set) = self.sets.get_mut(set_id) {
            for (name, role) in links {
                set.link(&name, role);
            }
        }
    }

    /// Merge another schema with the same identity into this one.
    ///
    /// Nothing is applied if any set or relationship conflicts.
    pub fn merge(&mut self, other: Schema) -> Result<()> {
        let mut merged = self.clone();
        merged.absorb(other)?;
        *self = merged;
        Ok(())
    }

    fn absorb(&mut self, other: Schema) -> Result<()> {
        self.name.fill(&other.name);
        fill_string(&mut self.comment, &other.comment);
        fill_metadata(&mut self.metadata, other.metadata);
        for set in other.sets.into_values() {
            self.upsert_set(set)?;
        }
        for rel in other.relationships.into_values() {
            self.upsert_relationship(rel)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, RelItem, SetType};

    fn orders_fk() -> Relationship {
        let mut rel = Relationship::new("fk_orders_customer", "orders");
        rel.upsert_join(Join::new(
            RelItem::new("sales", "orders", "customer_id"),
            RelItem::new("sales", "customers", "id"),
            1,
        ));
        rel
    }

    #[test]
    fn test_upsert_set_assigns_schema_and_fqdn() {
        let mut schema = Schema::new("Sales");
        let mut set = Set::new("Orders", SetType::Table);
        set.upsert_item(Item::new("id", "int")).unwrap();
        let set = schema.upsert_set(set).unwrap();
        assert_eq!(set.schema, "Sales");
        assert_eq!(set.fqdn, "Sales.Orders");
        assert_eq!(set.item("id").unwrap().fqdn, "Sales.Orders.id");
        assert_eq!(set.item("id").unwrap().set.to_string(), "sales.orders");
    }

    #[test]
    fn test_upsert_set_by_identity() {
        let mut schema = Schema::new("sales");
        schema.upsert_set(Set::new("Orders", SetType::Table)).unwrap();
        schema.upsert_set(Set::new("ORDERS", SetType::Unspecified)).unwrap();
        assert_eq!(schema.sets.len(), 1);
        assert_eq!(schema.set("orders").unwrap().set_type, SetType::Table);
    }

    #[test]
    fn test_relationship_links_sets_in_any_order() {
        let mut schema = Schema::new("sales");
        schema.upsert_set(Set::new("orders", SetType::Table)).unwrap();
        schema.upsert_relationship(orders_fk()).unwrap();
        schema.upsert_set(Set::new("customers", SetType::Table)).unwrap();

        let orders = schema.set("orders").unwrap();
        assert_eq!(orders.links.len(), 1);
        assert_eq!(orders.links[0].role, LinkRole::Parent);
        let customers = schema.set("customers").unwrap();
        assert_eq!(customers.links[0].role, LinkRole::Child);
        assert_eq!(customers.links[0].relationship, "fk_orders_customer");
    }

    #[test]
    fn test_upsert_relationship_conflict_propagates() {
        let mut schema = Schema::new("sales");
        schema.upsert_relationship(orders_fk()).unwrap();
        let mut other = orders_fk();
        other.set = "invoices".into();
        assert!(schema.upsert_relationship(other).is_err());
    }

    #[test]
    fn test_upsert_join_requires_relationship() {
        let mut schema = Schema::new("sales");
        let join = Join::new(
            RelItem::new("sales", "a", "x"),
            RelItem::new("sales", "b", "y"),
            1,
        );
        assert!(schema.upsert_join("missing", join.clone()).is_err());
        schema.upsert_relationship(orders_fk()).unwrap();
        schema.upsert_join("FK_ORDERS_CUSTOMER", join).unwrap();
        assert_eq!(schema.relationship("fk_orders_customer").unwrap().joins.len(), 2);
    }

    #[test]
    fn test_failed_merge_leaves_schema_untouched() {
        let mut schema = Schema::new("sales");
        schema.upsert_set(Set::new("orders", SetType::Table)).unwrap();
        let mut fk = orders_fk();
        fk.id = Some("r1".into());
        schema.upsert_relationship(fk).unwrap();
        let before = schema.clone();

        let mut incoming = Schema::new("sales");
        incoming.comment = "sales data".into();
        let mut orders = Set::new("orders", SetType::Table);
        orders.comment = "new comment".into();
        incoming.upsert_set(orders).unwrap();
        let mut fk = orders_fk();
        fk.id = Some("r2".into());
        incoming.upsert_relationship(fk).unwrap();

        let err = schema.merge(incoming).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(schema, before);
        assert_eq!(schema.set("orders").unwrap().comment, "");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut schema = Schema::new("sales");
        schema.comment = "sales data".into();
        let mut set = Set::new("orders", SetType::Table);
        set.upsert_item(Item::new("id", "int")).unwrap();
        schema.upsert_set(set).unwrap();
        schema.upsert_relationship(orders_fk()).unwrap();

        let before = schema.clone();
        schema.merge(before.clone()).unwrap();
        assert_eq!(schema, before);
    }
}
