//! Typed change rows, decoded once at the store boundary.

use rusqlite::{Result, Row};

/// A staged set as returned by the new/deleted set queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetRow {
    pub schema: String,
    pub physical_nm: String,
    pub logical_nm: String,
    pub description: String,
    pub set_type: String,
    pub definition: String,
    /// Catalog ID; only present on catalog-side rows.
    pub id: Option<String>,
}

impl SetRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            schema: row.get("schema")?,
            physical_nm: row.get("physical_nm")?,
            logical_nm: row.get("logical_nm")?,
            description: row.get("description")?,
            set_type: row.get("type")?,
            definition: row.get("definition")?,
            id: row.get("id")?,
        })
    }
}

/// A set present on both sides with at least one changed field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetUpdateRow {
    /// Source-side values with the catalog ID.
    pub set: SetRow,
    pub logical_changed: bool,
    pub description_changed: bool,
    pub type_changed: bool,
    pub definition_changed: bool,
}

impl SetUpdateRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            set: SetRow::from_row(row)?,
            logical_changed: row.get("logical_changed")?,
            description_changed: row.get("description_changed")?,
            type_changed: row.get("type_changed")?,
            definition_changed: row.get("definition_changed")?,
        })
    }
}

/// A staged item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemRow {
    pub schema: String,
    /// Physical name of the owning set.
    pub set: String,
    pub physical_nm: String,
    pub logical_nm: String,
    pub data_type: String,
    pub description: String,
    pub is_pk: bool,
    pub key_nm: String,
    pub nullable: bool,
    pub example: Option<String>,
    pub default_val: Option<String>,
    /// Metadata as JSON text.
    pub metadata: Option<String>,
    pub id: Option<String>,
}

impl ItemRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            schema: row.get("schema")?,
            set: row.get("dataset_id")?,
            physical_nm: row.get("physical_nm")?,
            logical_nm: row.get("logical_nm")?,
            data_type: row.get("type")?,
            description: row.get("description")?,
            is_pk: row.get("is_pk")?,
            key_nm: row.get("key_nm")?,
            nullable: row.get("nullable")?,
            example: row.get("example")?,
            default_val: row.get("default_val")?,
            metadata: row.get("metadata")?,
            id: row.get("id")?,
        })
    }
}

/// An item present on both sides with at least one changed field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdateRow {
    /// Source-side values with the catalog item ID.
    pub item: ItemRow,
    /// Catalog ID of the owning set.
    pub set_id: Option<String>,
    pub logical_changed: bool,
    pub description_changed: bool,
    pub type_changed: bool,
    pub nullable_changed: bool,
    pub example_changed: bool,
    pub default_changed: bool,
    pub pk_changed: bool,
    pub keyname_changed: bool,
}

impl ItemUpdateRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            item: ItemRow::from_row(row)?,
            set_id: row.get("set_id")?,
            logical_changed: row.get("logical_changed")?,
            description_changed: row.get("description_changed")?,
            type_changed: row.get("type_changed")?,
            nullable_changed: row.get("nullable_changed")?,
            example_changed: row.get("example_changed")?,
            default_changed: row.get("default_changed")?,
            pk_changed: row.get("pk_changed")?,
            keyname_changed: row.get("keyname_changed")?,
        })
    }
}

/// A staged relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipRow {
    pub schema: String,
    pub physical_nm: String,
    /// Physical name of the anchoring set.
    pub set: String,
    pub logical_nm: String,
    pub rel_type: String,
    pub comment: String,
    pub on_update: String,
    pub on_delete: String,
    pub on_match: String,
    pub id: Option<String>,
}

impl RelationshipRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            schema: row.get("schema")?,
            physical_nm: row.get("physical_nm")?,
            set: row.get("dataset_id")?,
            logical_nm: row.get("logical_nm")?,
            rel_type: row.get("type")?,
            comment: row.get("comment")?,
            on_update: row.get("on_update")?,
            on_delete: row.get("on_delete")?,
            on_match: row.get("on_match")?,
            id: row.get("id")?,
        })
    }
}

/// A relationship present on both sides with at least one changed field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipUpdateRow {
    pub relationship: RelationshipRow,
    pub logical_changed: bool,
    pub comment_changed: bool,
    pub integrity_changed: bool,
}

impl RelationshipUpdateRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            relationship: RelationshipRow::from_row(row)?,
            logical_changed: row.get("logical_changed")?,
            comment_changed: row.get("comment_changed")?,
            integrity_changed: row.get("integrity_changed")?,
        })
    }
}

/// A staged join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinRow {
    pub schema: String,
    pub relationship: String,
    pub parent_fqdn: String,
    pub child_fqdn: String,
    pub position: i64,
    pub cardinality: String,
    /// Catalog ID of the owning relationship, when the catalog has it.
    pub relationship_id: Option<String>,
}

impl JoinRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            schema: row.get("schema")?,
            relationship: row.get("relationship_nm")?,
            parent_fqdn: row.get("parent_fqdn")?,
            child_fqdn: row.get("child_fqdn")?,
            position: row.get("position")?,
            cardinality: row.get("cardinality")?,
            relationship_id: row.get("relationship_id")?,
        })
    }
}

/// A join present on both sides whose position or cardinality changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinUpdateRow {
    pub join: JoinRow,
    pub position_changed: bool,
    pub cardinality_changed: bool,
}

impl JoinUpdateRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            join: JoinRow::from_row(row)?,
            position_changed: row.get("position_changed")?,
            cardinality_changed: row.get("cardinality_changed")?,
        })
    }
}

/// Change rows of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changes<R, U> {
    pub new: Vec<R>,
    pub deleted: Vec<R>,
    pub updated: Vec<U>,
}

impl<R, U> Default for Changes<R, U> {
    fn default() -> Self {
        Self {
            new: Vec::new(),
            deleted: Vec::new(),
            updated: Vec::new(),
        }
    }
}

impl<R, U> Changes<R, U> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

pub type SetChanges = Changes<SetRow, SetUpdateRow>;
pub type ItemChanges = Changes<ItemRow, ItemUpdateRow>;
pub type RelationshipChanges = Changes<RelationshipRow, RelationshipUpdateRow>;
pub type JoinChanges = Changes<JoinRow, JoinUpdateRow>;
