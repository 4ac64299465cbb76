//! Metadata document model.
//!
//! A [`Document`] is the in-memory graph of one catalog snapshot:
//! Source → Schema → {Set, Relationship}; Set → Item; Relationship → Join.
//!
//! Ownership is strictly hierarchical. Every collection is keyed by the
//! lowercased physical name of its members, and back-references (an
//! item's set, a relationship's anchor set) are plain identity keys
//! resolved against the owning [`Document`], never pointers.

pub mod document;
pub mod filter;
pub mod ident;
pub mod item;
pub mod key;
pub mod relationship;
pub mod schema;
pub mod set;

pub use document::{Document, Source};
pub use filter::SchemaFilter;
pub use ident::{ItemKey, JoinKey, RelationshipKey, SetKey};
pub use item::Item;
pub use key::{Key, KeyKind};
pub use relationship::{Cardinality, Integrity, Join, RelItem, Relationship};
pub use schema::Schema;
pub use set::{LinkRole, RelationshipLink, Set, SetType};

use serde::{Deserialize, Serialize};

/// Free-form structured metadata attached to schemas, sets and items.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Derive the identity of a physical name: trimmed and lowercased.
#[must_use]
pub fn identity(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Physical/logical name pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub physical: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logical: String,
}

impl Name {
    /// Name with only a physical part.
    pub fn physical(name: impl Into<String>) -> Self {
        Self {
            physical: name.into(),
            logical: String::new(),
        }
    }

    /// Fill an empty logical name from another name.
    pub(crate) fn fill(&mut self, other: &Name) {
        fill_string(&mut self.logical, &other.logical);
    }
}

/// Copy `incoming` into `slot` only when `slot` is blank.
pub(crate) fn fill_string(slot: &mut String, incoming: &str) {
    if slot.trim().is_empty() && !incoming.trim().is_empty() {
        incoming.clone_into(slot);
    }
}

/// Copy `incoming` into `slot` whenever it carries text.
pub(crate) fn replace_string(slot: &mut String, incoming: &str) {
    if !incoming.trim().is_empty() {
        incoming.clone_into(slot);
    }
}

/// Fill missing metadata keys from `incoming`.
pub(crate) fn fill_metadata(slot: &mut Option<Metadata>, incoming: Option<Metadata>) {
    let Some(incoming) = incoming else {
        return;
    };
    match slot {
        Some(existing) => {
            for (k, v) in incoming {
                existing.entry(k).or_insert(v);
            }
        }
        None => *slot = Some(incoming),
    }
}

/// Whether two optional remote IDs disagree.
pub(crate) fn ids_conflict(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() && a != b)
}
