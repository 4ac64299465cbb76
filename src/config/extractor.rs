//! Source extraction boundary.

use crate::error::{Error, Result};
use crate::model::{Document, ItemKey, RelItem, SchemaFilter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column types whose values are expanded into per-key child items.
pub const JSON_TYPES: &[&str] = &["json", "jsonb"];

/// Produces the source-side document of a run.
pub trait SourceExtractor {
    /// Extract a document restricted to the schemas `filter` allows.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn extract(&self, filter: &SchemaFilter) -> Result<Document>;

    /// Add child items for the observed top-level keys of JSON-like
    /// columns. Returns the number of child items added.
    ///
    /// # Errors
    ///
    /// Returns an error if key discovery fails.
    fn expand_json_fields(&self, doc: &mut Document) -> Result<usize>;
}

/// Reads a serialized document from a JSON file.
///
/// Observed JSON keys come from an optional side file mapping
/// `schema.set.column` to the list of keys seen in that column.
#[derive(Debug, Clone)]
pub struct DocumentFileExtractor {
    path: PathBuf,
    observed: BTreeMap<ItemKey, Vec<String>>,
}

impl DocumentFileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            observed: BTreeMap::new(),
        }
    }

    /// Load observed JSON keys from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io`/`Error::Json` for an unreadable file and
    /// `Error::Configuration` for a column name that is not `schema.set.column`.
    pub fn with_observed_keys(mut self, path: &Path) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&std::fs::read_to_string(path)?)?;
        for (column, keys) in raw {
            let item = RelItem::parse(&column).ok_or_else(|| {
                Error::Configuration(format!(
                    "observed key column {column:?} must be schema.set.column"
                ))
            })?;
            self.observed
                .insert(ItemKey::new(&item.schema, &item.set, &item.item), keys);
        }
        Ok(self)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceExtractor for DocumentFileExtractor {
    fn extract(&self, filter: &SchemaFilter) -> Result<Document> {
        let input = std::fs::read_to_string(&self.path)?;
        let mut doc = Document::from_json(&input)?;
        let before = doc.schemas.len();
        doc.retain_schemas(filter);
        info!(
            path = %self.path.display(),
            schemas = doc.schemas.len(),
            filtered = before - doc.schemas.len(),
            "Loaded source document"
        );
        Ok(doc)
    }

    fn expand_json_fields(&self, doc: &mut Document) -> Result<usize> {
        let mut added = 0;
        for key in doc.items_by_type(JSON_TYPES) {
            let Some(keys) = self.observed.get(&key) else {
                debug!(column = %key, "No observed keys for JSON column");
                continue;
            };
            match doc.expand_item(&key, keys) {
                Ok(n) => added += n,
                Err(e @ Error::Conflict { .. }) => {
                    warn!(column = %key, error = %e, "Skipping JSON expansion");
                }
                Err(e) => return Err(e),
            }
        }
        if added > 0 {
            info!(items = added, "Expanded JSON columns");
        }
        Ok(added)
    }
}
