//! Change-detection queries.
//!
//! Each entity kind has three queries comparing the source side (`db_*`)
//! with the catalog side (`dh_*`): rows only in the source are new, rows
//! only in the catalog are deleted, rows on both sides with a differing
//! tracked field are updated.

/// The three change queries of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySet {
    pub new: String,
    pub deleted: String,
    pub updated: String,
}

impl QuerySet {
    fn embedded(new: &str, deleted: &str, updated: &str) -> Self {
        Self {
            new: new.to_string(),
            deleted: deleted.to_string(),
            updated: updated.to_string(),
        }
    }
}

/// Change queries for every entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQueries {
    pub sets: QuerySet,
    pub items: QuerySet,
    pub relationships: QuerySet,
    pub joins: QuerySet,
}

impl Default for ChangeQueries {
    fn default() -> Self {
        Self {
            sets: QuerySet::embedded(
                include_str!("../../sql/sets_new.sql"),
                include_str!("../../sql/sets_deleted.sql"),
                include_str!("../../sql/sets_updated.sql"),
            ),
            items: QuerySet::embedded(
                include_str!("../../sql/items_new.sql"),
                include_str!("../../sql/items_deleted.sql"),
                include_str!("../../sql/items_updated.sql"),
            ),
            relationships: QuerySet::embedded(
                include_str!("../../sql/relationships_new.sql"),
                include_str!("../../sql/relationships_deleted.sql"),
                include_str!("../../sql/relationships_updated.sql"),
            ),
            joins: QuerySet::embedded(
                include_str!("../../sql/joins_new.sql"),
                include_str!("../../sql/joins_deleted.sql"),
                include_str!("../../sql/joins_updated.sql"),
            ),
        }
    }
}
