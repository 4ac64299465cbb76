//! Identity keys.
//!
//! Each key is built from physical names and normalized with
//! [`identity`](super::identity), so two keys built from the same names in
//! any casing compare equal.

use super::identity;
use std::fmt;

/// Identity of a set within a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetKey {
    pub schema: String,
    pub set: String,
}

impl SetKey {
    pub fn new(schema: &str, set: &str) -> Self {
        Self {
            schema: identity(schema),
            set: identity(set),
        }
    }

    /// Key of an item inside this set.
    #[must_use]
    pub fn item(&self, item: &str) -> ItemKey {
        ItemKey {
            set: self.clone(),
            item: identity(item),
        }
    }
}

impl fmt::Display for SetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.set)
    }
}

/// Identity of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub set: SetKey,
    pub item: String,
}

impl ItemKey {
    pub fn new(schema: &str, set: &str, item: &str) -> Self {
        SetKey::new(schema, set).item(item)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.set, self.item)
    }
}

/// Identity of a relationship. Relationships are scoped to a schema, not a set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipKey {
    pub schema: String,
    pub relationship: String,
}

impl RelationshipKey {
    pub fn new(schema: &str, relationship: &str) -> Self {
        Self {
            schema: identity(schema),
            relationship: identity(relationship),
        }
    }
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.relationship)
    }
}

/// Identity of a join: `parent-stub::child-stub` within a relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinKey {
    pub relationship: RelationshipKey,
    pub join: String,
}

impl JoinKey {
    pub fn new(relationship: RelationshipKey, parent_fqdn: &str, child_fqdn: &str) -> Self {
        Self {
            relationship,
            join: join_identity(parent_fqdn, child_fqdn),
        }
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.relationship, self.join)
    }
}

/// Identity string of a join from its two stubs.
#[must_use]
pub fn join_identity(parent_fqdn: &str, child_fqdn: &str) -> String {
    format!("{}::{}", identity(parent_fqdn), identity(child_fqdn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_key_ignores_case() {
        assert_eq!(SetKey::new("Sales", "ORDERS"), SetKey::new("sales", "orders"));
        assert_eq!(SetKey::new("Sales", "Orders").to_string(), "sales.orders");
    }

    #[test]
    fn test_item_key_from_set() {
        let key = SetKey::new("sales", "orders").item("ID");
        assert_eq!(key, ItemKey::new("SALES", "Orders", "id"));
        assert_eq!(key.to_string(), "sales.orders.id");
    }

    #[test]
    fn test_join_identity() {
        assert_eq!(
            join_identity("Sales.Orders.Customer_Id", "sales.customers.id"),
            "sales.orders.customer_id::sales.customers.id"
        );
    }
}
