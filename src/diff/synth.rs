//! Rebuild minimal entities from staged rows.
//!
//! Used when a change row no longer resolves to a live entity, typically a
//! catalog-only row whose source counterpart is gone.

use crate::error::{Error, Result};
use crate::model::{
    Integrity, Item, Join, Key, KeyKind, Metadata, Name, RelItem, Relationship, Set, SetKey,
    SetType,
};
use crate::storage::{ItemRow, JoinRow, RelationshipRow, SetRow};

pub(super) fn name(physical: &str, logical: &str) -> Name {
    Name {
        physical: physical.to_string(),
        logical: logical.to_string(),
    }
}

pub(super) fn set(row: &SetRow) -> Set {
    Set {
        id: row.id.clone(),
        name: name(&row.physical_nm, &row.logical_nm),
        schema: row.schema.clone(),
        comment: row.description.clone(),
        set_type: SetType::parse(&row.set_type),
        definition: row.definition.clone(),
        fqdn: format!("{}.{}", row.schema, row.physical_nm),
        ..Set::default()
    }
}

/// The key an item row describes, if any.
pub(super) fn key(row: &ItemRow) -> Option<Key> {
    KeyKind::from_flags(row.is_pk, &row.key_nm)
        .map(|kind| Key::new(row.key_nm.clone(), Some(kind)).with_item(row.physical_nm.clone()))
}

pub(super) fn metadata(row: &ItemRow) -> Result<Option<Metadata>> {
    let Some(text) = row.metadata.as_deref().filter(|t| !t.trim().is_empty()) else {
        return Ok(None);
    };
    serde_json::from_str(text).map(Some).map_err(|e| {
        Error::resolution(
            "item",
            format!("{}.{}.{}", row.schema, row.set, row.physical_nm),
            format!("malformed metadata: {e}"),
        )
    })
}

pub(super) fn item(row: &ItemRow) -> Result<Item> {
    let mut item = Item {
        id: row.id.clone(),
        name: name(&row.physical_nm, &row.logical_nm),
        set: SetKey::new(&row.schema, &row.set),
        comment: row.description.clone(),
        data_type: row.data_type.clone(),
        nullable: row.nullable,
        default: row.default_val.clone(),
        example: row.example.clone(),
        fqdn: format!("{}.{}.{}", row.schema, row.set, row.physical_nm),
        metadata: metadata(row)?,
        ..Item::default()
    };
    if let Some(key) = key(row) {
        item.upsert_key(key);
    }
    Ok(item)
}

pub(super) fn integrity(row: &RelationshipRow) -> Option<Integrity> {
    let integrity = Integrity {
        on_update: row.on_update.clone(),
        on_delete: row.on_delete.clone(),
        on_match: row.on_match.clone(),
    };
    (integrity != Integrity::default()).then_some(integrity)
}

pub(super) fn relationship(row: &RelationshipRow) -> Relationship {
    Relationship {
        id: row.id.clone(),
        name: name(&row.physical_nm, &row.logical_nm),
        rel_type: row.rel_type.clone(),
        comment: row.comment.clone(),
        integrity: integrity(row),
        schema: row.schema.clone(),
        set: row.set.clone(),
        joins: Vec::new(),
    }
}

pub(super) fn join(row: &JoinRow) -> Result<Join> {
    let malformed = |reason: String| {
        Error::resolution(
            "join",
            format!("{}.{}", row.schema, row.relationship),
            reason,
        )
    };
    let parent = RelItem::parse(&row.parent_fqdn)
        .ok_or_else(|| malformed(format!("malformed parent stub {}", row.parent_fqdn)))?;
    let child = RelItem::parse(&row.child_fqdn)
        .ok_or_else(|| malformed(format!("malformed child stub {}", row.child_fqdn)))?;
    let mut join = Join::new(parent, child, row.position);
    join.cardinality = row
        .cardinality
        .parse()
        .map_err(|e: Error| malformed(e.to_string()))?;
    join.relationship.clone_from(&row.relationship);
    Ok(join)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_row() -> ItemRow {
        ItemRow {
            schema: "sales".into(),
            set: "orders".into(),
            physical_nm: "id".into(),
            data_type: "int".into(),
            is_pk: true,
            key_nm: "pk_orders".into(),
            metadata: Some(r#"{"source":"db"}"#.into()),
            id: Some("item-1".into()),
            ..ItemRow::default()
        }
    }

    #[test]
    fn test_item_from_row() {
        let item = item(&item_row()).unwrap();
        assert_eq!(item.fqdn, "sales.orders.id");
        assert_eq!(item.set, SetKey::new("sales", "orders"));
        assert_eq!(item.key_flags(), (true, "pk_orders"));
        assert_eq!(item.metadata.unwrap()["source"], "db");
    }

    #[test]
    fn test_key_from_flags() {
        let mut row = item_row();
        row.is_pk = false;
        assert_eq!(key(&row).unwrap().kind, Some(KeyKind::Foreign));
        row.key_nm = String::new();
        row.is_pk = true;
        assert!(key(&row).is_none());
    }

    #[test]
    fn test_malformed_metadata_is_a_resolution_error() {
        let mut row = item_row();
        row.metadata = Some("{not json".into());
        assert!(matches!(item(&row), Err(Error::Resolution { .. })));
    }

    #[test]
    fn test_join_from_row() {
        let row = JoinRow {
            schema: "sales".into(),
            relationship: "fk_orders_customer".into(),
            parent_fqdn: "sales.orders.customer_id".into(),
            child_fqdn: "sales.customers.id".into(),
            position: 1,
            cardinality: "0,1,0,-1".into(),
            relationship_id: None,
        };
        let join = join(&row).unwrap();
        assert_eq!(join.cardinality.to_string(), "0,1,0,-1");
        assert_eq!(join.relationship, "fk_orders_customer");

        let bad = JoinRow {
            parent_fqdn: "orders".into(),
            ..row
        };
        assert!(super::join(&bad).is_err());
    }
}
