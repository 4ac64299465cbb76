//! File-backed staging store.
//!
//! Holds two flattened snapshots of a document (source and catalog) and
//! answers the change-detection queries between them. Every call opens its
//! own connection and closes it on return; no transaction spans calls.

use super::queries::{ChangeQueries, QuerySet};
use super::rows::{
    Changes, ItemChanges, ItemRow, ItemUpdateRow, JoinChanges, JoinRow, JoinUpdateRow,
    RelationshipChanges, RelationshipRow, RelationshipUpdateRow, SetChanges, SetRow, SetUpdateRow,
};
use super::schema::{TABLES, TEMPLATE_SQL, apply_template, configure};
use crate::error::Result;
use crate::model::{Document, Item, Relationship, Set};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Maximum rows per insert statement.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Which snapshot a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Freshly extracted from the source system.
    Source,
    /// Freshly pulled from the catalog service.
    Catalog,
}

impl Side {
    /// Table prefix for this side.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Source => "db_",
            Self::Catalog => "dh_",
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Catalog => "catalog",
        }
    }
}

/// Construction-time configuration: template DDL, change queries and batching.
#[derive(Debug, Clone)]
pub struct StagingConfig {
    pub template: String,
    pub queries: ChangeQueries,
    pub batch_size: usize,
    pub busy_timeout: Duration,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            template: TEMPLATE_SQL.to_string(),
            queries: ChangeQueries::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Row counts of one staged side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub sets: usize,
    pub items: usize,
    pub relationships: usize,
    pub joins: usize,
}

/// The staging store.
#[derive(Debug, Clone)]
pub struct StagingStore {
    path: PathBuf,
    config: StagingConfig,
}

impl StagingStore {
    /// Open the store at `path`, creating it from the template when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the template fails.
    pub fn open(path: impl Into<PathBuf>, config: StagingConfig) -> Result<Self> {
        let store = Self {
            path: path.into(),
            config,
        };
        if !store.path.exists() {
            if let Some(parent) = store.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            debug!(path = %store.path.display(), "Bootstrapping staging store");
            let conn = Connection::open(&store.path)?;
            apply_template(&conn, &store.config.template)?;
        }
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        configure(&conn)?;
        Ok(conn)
    }

    /// Write `rows` into `table` with multi-row `INSERT OR REPLACE` statements.
    ///
    /// Each batch is one statement, so it applies atomically; the first
    /// failing batch aborts the call.
    fn write_batches(&self, table: &str, columns: &[&str], rows: &[Vec<Value>]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.connect()?;
        let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        for chunk in rows.chunks(self.config.batch_size.max(1)) {
            let sql = format!(
                "INSERT OR REPLACE INTO {table} ({})\nVALUES\n  {};",
                columns.join(", "),
                vec![placeholders.as_str(); chunk.len()].join(",\n  ")
            );
            conn.execute(&sql, params_from_iter(chunk.iter().flatten()))?;
        }
        debug!(table, rows = rows.len(), "Staged rows");
        Ok(rows.len())
    }

    /// Stage sets.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failing batch.
    pub fn upsert_sets<'a, I>(&self, side: Side, sets: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Set>,
    {
        let rows: Vec<Vec<Value>> = sets
            .into_iter()
            .map(|set| {
                vec![
                    text(&set.schema),
                    text(&set.name.physical),
                    text(&set.name.logical),
                    text(&set.comment),
                    text(set.set_type.as_str()),
                    text(&set.definition),
                    opt_text(set.remote_id()),
                ]
            })
            .collect();
        self.write_batches(
            &format!("{}dataset", side.prefix()),
            &[
                "schema",
                "physical_nm",
                "logical_nm",
                "description",
                "type",
                "definition",
                "id",
            ],
            &rows,
        )
    }

    /// Stage items together with their owning set.
    ///
    /// # Errors
    ///
    /// Returns an error if metadata cannot be encoded or a batch fails.
    pub fn upsert_items<'a, I>(&self, side: Side, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a Set, &'a Item)>,
    {
        let mut rows = Vec::new();
        for (set, item) in items {
            let (is_pk, key_nm) = item.key_flags();
            let metadata = item
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            rows.push(vec![
                text(&set.schema),
                text(&set.name.physical),
                text(&item.name.physical),
                text(&item.name.logical),
                text(&item.data_type),
                text(&item.comment),
                Value::Integer(i64::from(is_pk)),
                text(key_nm),
                Value::Integer(i64::from(item.nullable)),
                opt_text(item.example.as_deref()),
                opt_text(item.default.as_deref()),
                opt_text(metadata.as_deref()),
                opt_text(item.remote_id()),
            ]);
        }
        self.write_batches(
            &format!("{}dataitem", side.prefix()),
            &[
                "schema",
                "dataset_id",
                "physical_nm",
                "logical_nm",
                "type",
                "description",
                "is_pk",
                "key_nm",
                "nullable",
                "example",
                "default_val",
                "metadata",
                "id",
            ],
            &rows,
        )
    }

    /// Stage relationships and their joins. Relationships without joins are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failing batch.
    pub fn upsert_relationships<'a, I>(&self, side: Side, relationships: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Relationship>,
    {
        let mut rels = Vec::new();
        let mut joins = Vec::new();
        for rel in relationships.into_iter().filter(|r| !r.joins.is_empty()) {
            let integrity = rel.integrity.clone().unwrap_or_default();
            rels.push(vec![
                text(&rel.schema),
                text(&rel.name.physical),
                text(&rel.set),
                text(&rel.name.logical),
                text(&rel.rel_type),
                text(&rel.comment),
                text(&integrity.on_update),
                text(&integrity.on_delete),
                text(&integrity.on_match),
                opt_text(rel.remote_id()),
            ]);
            for join in &rel.joins {
                joins.push(vec![
                    text(&rel.schema),
                    text(&rel.name.physical),
                    text(&join.parent.fqdn),
                    text(&join.child.fqdn),
                    Value::Integer(join.position),
                    Value::Text(join.cardinality.to_string()),
                ]);
            }
        }

        let count = self.write_batches(
            &format!("{}relationship", side.prefix()),
            &[
                "schema",
                "physical_nm",
                "dataset_id",
                "logical_nm",
                "type",
                "comment",
                "on_update",
                "on_delete",
                "on_match",
                "id",
            ],
            &rels,
        )?;
        self.write_batches(
            &format!("{}join", side.prefix()),
            &[
                "schema",
                "relationship_nm",
                "parent_fqdn",
                "child_fqdn",
                "position",
                "cardinality",
            ],
            &joins,
        )?;
        Ok(count)
    }

    /// Stage a whole document on one side.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failing write.
    pub fn stage(&self, side: Side, doc: &Document) -> Result<StageCounts> {
        self.upsert_sets(side, doc.sets())?;
        self.upsert_items(
            side,
            doc.sets().flat_map(|set| set.items.values().map(move |item| (set, item))),
        )?;
        self.upsert_relationships(side, doc.relationships())?;
        self.counts(side)
    }

    fn truncate(&self, side: Side) -> Result<()> {
        let conn = self.connect()?;
        for table in TABLES {
            conn.execute(&format!("DELETE FROM {}{table}", side.prefix()), [])?;
        }
        Ok(())
    }

    /// Truncate the source side.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails.
    pub fn reset_source(&self) -> Result<()> {
        self.truncate(Side::Source)
    }

    /// Truncate the catalog side.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails.
    pub fn reset_catalog(&self) -> Result<()> {
        self.truncate(Side::Catalog)
    }

    /// Truncate both sides.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails.
    pub fn reset(&self) -> Result<()> {
        self.reset_catalog()?;
        self.reset_source()
    }

    /// Row counts of one side.
    ///
    /// # Errors
    ///
    /// Returns an error if a count query fails.
    pub fn counts(&self, side: Side) -> Result<StageCounts> {
        let conn = self.connect()?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}{table}", side.prefix()),
                [],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(n).unwrap_or_default())
        };
        Ok(StageCounts {
            sets: count("dataset")?,
            items: count("dataitem")?,
            relationships: count("relationship")?,
            joins: count("join")?,
        })
    }

    fn changes<R, U>(
        &self,
        queries: &QuerySet,
        row: fn(&Row<'_>) -> rusqlite::Result<R>,
        update: fn(&Row<'_>) -> rusqlite::Result<U>,
    ) -> Result<Changes<R, U>> {
        let conn = self.connect()?;
        let collect = |sql: &str| -> Result<Vec<R>> {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], row)?.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        };
        let new = collect(&queries.new)?;
        let deleted = collect(&queries.deleted)?;
        let mut stmt = conn.prepare(&queries.updated)?;
        let updated = stmt
            .query_map([], update)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Changes {
            new,
            deleted,
            updated,
        })
    }

    /// New, deleted and updated sets.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a row cannot be decoded.
    pub fn set_changes(&self) -> Result<SetChanges> {
        self.changes(&self.config.queries.sets, SetRow::from_row, SetUpdateRow::from_row)
    }

    /// New, deleted and updated items.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a row cannot be decoded.
    pub fn item_changes(&self) -> Result<ItemChanges> {
        self.changes(&self.config.queries.items, ItemRow::from_row, ItemUpdateRow::from_row)
    }

    /// New, deleted and updated relationships.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a row cannot be decoded.
    pub fn relationship_changes(&self) -> Result<RelationshipChanges> {
        self.changes(
            &self.config.queries.relationships,
            RelationshipRow::from_row,
            RelationshipUpdateRow::from_row,
        )
    }

    /// New, deleted and updated joins.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a row cannot be decoded.
    pub fn join_changes(&self) -> Result<JoinChanges> {
        self.changes(&self.config.queries.joins, JoinRow::from_row, JoinUpdateRow::from_row)
    }

    /// Catalog-side staged set by schema and physical name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn lookup_catalog_set(&self, schema: &str, name: &str) -> Result<Option<SetRow>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT schema, physical_nm, logical_nm, description, type, definition, id
                 FROM dh_dataset
                 WHERE schema = ?1 AND physical_nm = trim(?2)",
                [schema, name],
                SetRow::from_row,
            )
            .optional()?;
        Ok(row)
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: Option<&str>) -> Value {
    s.map_or(Value::Null, text)
}
