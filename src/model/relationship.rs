//! Relationship and join model.

use super::ident::join_identity;
use super::{Name, RelationshipKey, SetKey, fill_string, identity, ids_conflict, replace_string};
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Referential-integrity rules of a relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    #[serde(default)]
    pub on_update: String,
    #[serde(default)]
    pub on_delete: String,
    #[serde(default, rename = "match")]
    pub on_match: String,
}

/// Join cardinality: parent-min, parent-max, child-min, child-max.
///
/// `-1` means unbounded. Serialized as `"1,1,0,-1"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality(pub [i32; 4]);

impl Default for Cardinality {
    fn default() -> Self {
        Self([1, 1, 0, -1])
    }
}

impl FromStr for Cardinality {
    type Err = Error;

    /// A blank string yields the default cardinality.
    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Other(format!("Invalid cardinality '{s}': {e}")))?;
        let values: [i32; 4] = parts
            .try_into()
            .map_err(|_| Error::Other(format!("Invalid cardinality '{s}': expected 4 values")))?;
        Ok(Self(values))
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a},{b},{c},{d}")
    }
}

impl Serialize for Cardinality {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cardinality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Values([i32; 4]),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Values(v) => Ok(Self(v)),
        }
    }
}

/// One end of a join: a schema/set/item triple plus its dotted stub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelItem {
    pub schema: String,
    pub set: String,
    pub item: String,
    pub fqdn: String,
}

impl RelItem {
    pub fn new(schema: &str, set: &str, item: &str) -> Self {
        Self {
            schema: schema.to_string(),
            set: set.to_string(),
            item: item.to_string(),
            fqdn: format!("{schema}.{set}.{item}"),
        }
    }

    /// Parse a `schema.set.item` stub.
    #[must_use]
    pub fn parse(fqdn: &str) -> Option<Self> {
        let mut parts = fqdn.trim().splitn(3, '.');
        let schema = parts.next().filter(|s| !s.is_empty())?;
        let set = parts.next().filter(|s| !s.is_empty())?;
        let item = parts.next().filter(|s| !s.is_empty())?;
        Some(Self {
            schema: schema.to_string(),
            set: set.to_string(),
            item: item.to_string(),
            fqdn: fqdn.trim().to_string(),
        })
    }

    #[must_use]
    pub fn set_key(&self) -> SetKey {
        SetKey::new(&self.schema, &self.set)
    }

    /// `schema.set` part of the stub.
    #[must_use]
    pub fn set_stub(&self) -> String {
        format!("{}.{}", self.schema, self.set)
    }
}

/// A column pair within a relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub parent: RelItem,
    pub child: RelItem,

    #[serde(default)]
    pub position: i64,

    #[serde(default)]
    pub cardinality: Cardinality,

    /// Physical name of the owning relationship.
    #[serde(skip)]
    pub relationship: String,
}

impl Join {
    pub fn new(parent: RelItem, child: RelItem, position: i64) -> Self {
        Self {
            parent,
            child,
            position,
            cardinality: Cardinality::default(),
            relationship: String::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        join_identity(&self.parent.fqdn, &self.child.fqdn)
    }

    fn merge(&mut self, other: Join) {
        self.position = other.position;
        self.cardinality = other.cardinality;
    }
}

/// A foreign-key-like link between two sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: Name,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub rel_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,

    /// Physical name of the owning schema.
    #[serde(default)]
    pub schema: String,

    /// Physical name of the anchoring (parent) set.
    #[serde(default)]
    pub set: String,

    #[serde(default)]
    pub joins: Vec<Join>,
}

impl Relationship {
    pub fn new(name: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            name: Name::physical(name),
            set: set.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        identity(&self.name.physical)
    }

    #[must_use]
    pub fn key(&self) -> RelationshipKey {
        RelationshipKey::new(&self.schema, &self.name.physical)
    }

    /// Key of the anchoring set.
    #[must_use]
    pub fn anchor(&self) -> SetKey {
        SetKey::new(&self.schema, &self.set)
    }

    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn join(&self, id: &str) -> Option<&Join> {
        let id = identity(id);
        self.joins.iter().find(|j| j.id() == id)
    }

    /// Insert a join or merge position and cardinality into the existing one.
    pub fn upsert_join(&mut self, mut join: Join) -> &mut Join {
        join.relationship.clone_from(&self.name.physical);
        let id = join.id();
        match self.joins.iter().position(|j| j.id() == id) {
            Some(idx) => {
                self.joins[idx].merge(join);
                &mut self.joins[idx]
            }
            None => {
                self.joins.push(join);
                let last = self.joins.len() - 1;
                &mut self.joins[last]
            }
        }
    }

    fn conflict(&self, reason: String) -> Error {
        Error::conflict("relationship", self.key().to_string(), reason)
    }

    /// Merge `other` into this relationship.
    ///
    /// Rejected without changes when the identities, remote IDs, types or
    /// anchoring sets disagree. Otherwise joins are unioned and a non-empty
    /// incoming comment, integrity or ID wins.
    pub fn merge(&mut self, other: Relationship) -> Result<()> {
        if self.id() != other.id() {
            return Err(self.conflict(format!("cannot merge {}", other.name.physical)));
        }
        if ids_conflict(self.remote_id(), other.remote_id()) {
            return Err(self.conflict(format!(
                "remote id {} != {}",
                self.id.as_deref().unwrap_or_default(),
                other.id.as_deref().unwrap_or_default()
            )));
        }
        if !self.rel_type.trim().is_empty()
            && !other.rel_type.trim().is_empty()
            && identity(&self.rel_type) != identity(&other.rel_type)
        {
            return Err(self.conflict(format!(
                "type {} != {}",
                self.rel_type, other.rel_type
            )));
        }
        if !self.set.trim().is_empty()
            && !other.set.trim().is_empty()
            && identity(&self.set) != identity(&other.set)
        {
            return Err(self.conflict(format!(
                "parent set {} != {}",
                self.set, other.set
            )));
        }

        if other.remote_id().is_some() {
            self.id = other.id;
        }
        self.name.fill(&other.name);
        fill_string(&mut self.rel_type, &other.rel_type);
        fill_string(&mut self.set, &other.set);
        replace_string(&mut self.comment, &other.comment);
        if other.integrity.is_some() {
            self.integrity = other.integrity;
        }
        for join in other.joins {
            self.upsert_join(join);
        }
        Ok(())
    }
}
