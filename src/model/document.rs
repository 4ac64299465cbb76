//! The document root.

use super::{
    Item, ItemKey, Key, KeyKind, Metadata, Name, Relationship, RelationshipKey, Schema,
    SchemaFilter, Set, SetKey, identity,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The system a snapshot was taken from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: Name,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// One snapshot of a source: its schemas and everything they own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub source: Source,

    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
}

impl Document {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Source {
                name: Name::physical(source),
                comment: String::new(),
            },
            schemas: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.values().all(|s| s.sets.is_empty() && s.relationships.is_empty())
    }

    /// Attach a schema, or merge it into the existing one with the same identity.
    ///
    /// Child sets and relationships are upserted one by one so every
    /// back-reference and identity is re-derived. On a conflict the
    /// document is left as it was.
    pub fn apply_schema(&mut self, mut schema: Schema) -> Result<&mut Schema> {
        let id = schema.id();
        if let Some(existing) = self.schemas.get_mut(&id) {
            existing.merge(schema)?;
        } else {
            let sets = std::mem::take(&mut schema.sets);
            let relationships = std::mem::take(&mut schema.relationships);
            for set in sets.into_values() {
                schema.upsert_set(set)?;
            }
            for rel in relationships.into_values() {
                schema.upsert_relationship(rel)?;
            }
            self.schemas.insert(id.clone(), schema);
        }
        self.schema_mut(&id)
    }

    pub fn schema(&self, name: &str) -> Result<&Schema> {
        self.schemas
            .get(&identity(name))
            .ok_or_else(|| Error::resolution("schema", name, "not in document"))
    }

    pub fn schema_mut(&mut self, name: &str) -> Result<&mut Schema> {
        self.schemas
            .get_mut(&identity(name))
            .ok_or_else(|| Error::resolution("schema", name, "not in document"))
    }

    #[must_use]
    pub fn set(&self, key: &SetKey) -> Option<&Set> {
        self.schemas.get(&key.schema)?.sets.get(&key.set)
    }

    pub fn set_mut(&mut self, key: &SetKey) -> Option<&mut Set> {
        self.schemas.get_mut(&key.schema)?.sets.get_mut(&key.set)
    }

    #[must_use]
    pub fn item(&self, key: &ItemKey) -> Option<&Item> {
        self.set(&key.set)?.items.get(&key.item)
    }

    pub fn item_mut(&mut self, key: &ItemKey) -> Option<&mut Item> {
        self.set_mut(&key.set)?.items.get_mut(&key.item)
    }

    #[must_use]
    pub fn relationship(&self, key: &RelationshipKey) -> Option<&Relationship> {
        self.schemas
            .get(&key.schema)?
            .relationships
            .get(&key.relationship)
    }

    pub fn relationship_mut(&mut self, key: &RelationshipKey) -> Option<&mut Relationship> {
        self.schemas
            .get_mut(&key.schema)?
            .relationships
            .get_mut(&key.relationship)
    }

    pub fn sets(&self) -> impl Iterator<Item = &Set> {
        self.schemas.values().flat_map(|s| s.sets.values())
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.sets().flat_map(|s| s.items.values())
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.schemas.values().flat_map(|s| s.relationships.values())
    }

    pub fn views(&self) -> impl Iterator<Item = &Set> {
        self.sets().filter(|s| s.set_type.is_view())
    }

    /// Keys of all items whose data type is one of `types` (case-insensitive).
    #[must_use]
    pub fn items_by_type(&self, types: &[&str]) -> Vec<ItemKey> {
        let types: Vec<String> = types.iter().map(|t| identity(t)).collect();
        self.items()
            .filter(|i| types.contains(&identity(&i.data_type)))
            .map(|i| i.set.item(&i.name.physical))
            .collect()
    }

    /// Drop schemas the filter does not allow.
    pub fn retain_schemas(&mut self, filter: &SchemaFilter) {
        self.schemas.retain(|_, s| filter.allows(&s.name.physical));
    }

    /// Add one synthetic child item per observed key of a JSON-like column.
    ///
    /// Each child is a nullable `text` item named `<column>::<key>` whose
    /// metadata records the source column. The source column is tagged
    /// with a `json` key listing the children. Returns the number of
    /// children added or merged.
    pub fn expand_item(&mut self, key: &ItemKey, observed: &[String]) -> Result<usize> {
        let set = self
            .set_mut(&key.set)
            .ok_or_else(|| Error::resolution("set", key.set.to_string(), "not in document"))?;
        let column = set
            .item(&key.item)
            .map(|i| i.name.physical.clone())
            .ok_or_else(|| Error::resolution("item", key.to_string(), "not in document"))?;

        let mut expansion = Key::new(
            format!("{}_json_expansion_key", identity(&set.name.physical)),
            Some(KeyKind::Json),
        );
        expansion.comment = format!(
            "Generated by JSON autoexpansion of the {} item.",
            set.name.physical
        );

        for attribute in observed.iter().filter(|a| !a.trim().is_empty()) {
            let mut metadata = Metadata::new();
            metadata.insert("source".into(), column.clone().into());

            let child = Item {
                name: Name::physical(format!("{column}::{attribute}")),
                data_type: "text".into(),
                nullable: true,
                fqdn: set.qualify(attribute),
                metadata: Some(metadata),
                ..Item::default()
            };
            expansion = expansion.with_item(child.name.physical.clone());
            set.upsert_item(child)?;
        }

        let added = expansion.items.len();
        if added > 0 {
            if let Some(source) = set.item_mut(&key.item) {
                source.upsert_key(expansion);
            }
        }
        Ok(added)
    }

    /// Render the nested, key-ordered projection.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let out = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(out)
    }

    /// Parse a projection and rebuild the graph through the upsert path.
    pub fn from_json(input: &str) -> Result<Self> {
        let parsed: Document = serde_json::from_str(input)?;
        let mut doc = Document {
            source: parsed.source,
            schemas: BTreeMap::new(),
        };
        for schema in parsed.schemas.into_values() {
            doc.apply_schema(schema)?;
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Join, RelItem, SetType};

    fn sales() -> Document {
        let mut doc = Document::new("warehouse");
        let mut schema = Schema::new("sales");
        let mut orders = Set::new("orders", SetType::Table);
        let mut id = Item::new("id", "int");
        id.upsert_key(Key::new("pk_orders", Some(KeyKind::Primary)).with_item("id"));
        orders.upsert_item(id).unwrap();
        orders.upsert_item(Item::new("total", "numeric")).unwrap();
        orders.upsert_item(Item::new("payload", "jsonb")).unwrap();
        schema.sets.insert("orders".into(), orders);
        schema
            .sets
            .insert("customers".into(), Set::new("customers", SetType::Table));
        let mut rel = Relationship::new("fk_orders_customer", "orders");
        rel.joins.push(Join::new(
            RelItem::new("sales", "orders", "customer_id"),
            RelItem::new("sales", "customers", "id"),
            1,
        ));
        schema.relationships.insert("fk_orders_customer".into(), rel);
        doc.apply_schema(schema).unwrap();
        doc
    }

    #[test]
    fn test_apply_schema_normalizes_children() {
        let doc = sales();
        let set = doc.set(&SetKey::new("SALES", "Orders")).unwrap();
        assert_eq!(set.fqdn, "sales.orders");
        assert_eq!(set.item("total").unwrap().fqdn, "sales.orders.total");
        let rel = doc
            .relationship(&RelationshipKey::new("sales", "fk_orders_customer"))
            .unwrap();
        assert_eq!(rel.schema, "sales");
        assert_eq!(rel.joins[0].relationship, "fk_orders_customer");
        assert_eq!(doc.set(&SetKey::new("sales", "customers")).unwrap().links.len(), 1);
    }

    #[test]
    fn test_apply_schema_twice_is_idempotent() {
        let mut doc = sales();
        let before = doc.clone();
        let again = before.schema("sales").unwrap().clone();
        doc.apply_schema(again).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn test_conflicting_schema_is_not_partially_applied() {
        let mut doc = sales();
        doc.relationship_mut(&RelationshipKey::new("sales", "fk_orders_customer"))
            .unwrap()
            .id = Some("r1".into());
        let before = doc.clone();

        let mut incoming = before.schema("sales").unwrap().clone();
        incoming.sets.get_mut("orders").unwrap().comment = "new comment".into();
        incoming
            .relationships
            .get_mut("fk_orders_customer")
            .unwrap()
            .id = Some("r2".into());

        assert!(matches!(doc.apply_schema(incoming), Err(Error::Conflict { .. })));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_conflicting_new_schema_is_not_attached() {
        let mut doc = sales();
        let mut hr = Schema::new("hr");
        hr.sets.insert("staff".into(), Set::new("staff", SetType::Table));
        let mut first = Relationship::new("fk_staff", "staff");
        first.id = Some("r1".into());
        let mut second = Relationship::new("FK_STAFF", "staff");
        second.id = Some("r2".into());
        hr.relationships.insert("a".into(), first);
        hr.relationships.insert("b".into(), second);

        assert!(doc.apply_schema(hr).is_err());
        assert!(matches!(doc.schema("hr"), Err(Error::Resolution { .. })));
    }

    #[test]
    fn test_schema_not_found() {
        let doc = sales();
        assert!(matches!(doc.schema("hr"), Err(Error::Resolution { .. })));
    }

    #[test]
    fn test_iterators() {
        let doc = sales();
        assert_eq!(doc.sets().count(), 2);
        assert_eq!(doc.items().count(), 3);
        assert_eq!(doc.relationships().count(), 1);
        assert_eq!(doc.views().count(), 0);
        assert_eq!(
            doc.items_by_type(&["JSON", "jsonb"]),
            vec![ItemKey::new("sales", "orders", "payload")]
        );
    }

    #[test]
    fn test_json_round_trip_rebuilds_graph() {
        let doc = sales();
        let json = doc.to_json(true).unwrap();
        let parsed = Document::from_json(&json).unwrap();
        assert_eq!(parsed, doc);
        let item = parsed.item(&ItemKey::new("sales", "orders", "id")).unwrap();
        assert_eq!(item.set, SetKey::new("sales", "orders"));
    }

    #[test]
    fn test_retain_schemas() {
        let mut doc = sales();
        doc.apply_schema(Schema::new("staging")).unwrap();
        doc.retain_schemas(&SchemaFilter::new(["sal*"]));
        assert_eq!(doc.schemas.len(), 1);
    }

    #[test]
    fn test_expand_item_adds_synthetic_children() {
        let mut doc = sales();
        let key = ItemKey::new("sales", "orders", "payload");
        let added = doc
            .expand_item(&key, &["sku".to_string(), "qty".to_string()])
            .unwrap();
        assert_eq!(added, 2);

        let set = doc.set(&key.set).unwrap();
        let child = set.item("payload::sku").unwrap();
        assert_eq!(child.data_type, "text");
        assert!(child.nullable);
        assert_eq!(child.fqdn, "sales.orders.sku");
        assert_eq!(child.metadata.as_ref().unwrap()["source"], "payload");

        let source = set.item("payload").unwrap();
        let tag = source.key("orders_json_expansion_key").unwrap();
        assert_eq!(tag.kind, Some(KeyKind::Json));
        assert_eq!(tag.items.len(), 2);
        assert_eq!(source.key_flags(), (false, ""));
    }

    #[test]
    fn test_expand_unknown_item_fails() {
        let mut doc = sales();
        let key = ItemKey::new("sales", "orders", "nope");
        assert!(doc.expand_item(&key, &["a".to_string()]).is_err());
    }
}
