//! Key membership for sets and items.

use super::{fill_string, identity};
use serde::{Deserialize, Serialize};

/// Kind of key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Primary,
    Foreign,
    Unique,
    Json,
}

impl KeyKind {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Foreign => "foreign",
            Self::Unique => "unique",
            Self::Json => "json",
        }
    }

    /// Parse leniently: `"PRIMARY KEY"` is primary, `"FOREIGN KEY"` is foreign.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        if s.contains("primary") {
            Some(Self::Primary)
        } else if s.contains("foreign") {
            Some(Self::Foreign)
        } else if s.contains("unique") {
            Some(Self::Unique)
        } else if s.contains("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// Derive a kind from staged key columns.
    ///
    /// A primary flag with a key name means primary, a key name alone means
    /// foreign, and no key name means no key at all.
    #[must_use]
    pub fn from_flags(is_pk: bool, key_name: &str) -> Option<Self> {
        if key_name.trim().is_empty() {
            None
        } else if is_pk {
            Some(Self::Primary)
        } else {
            Some(Self::Foreign)
        }
    }
}

/// A named key and its member items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<KeyKind>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl Key {
    pub fn new(name: impl Into<String>, kind: Option<KeyKind>) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Add a member item unless it is already listed.
    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.add_item(&item.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> String {
        identity(&self.name)
    }

    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.kind == Some(KeyKind::Primary)
    }

    fn add_item(&mut self, item: &str) {
        if !self.items.iter().any(|i| identity(i) == identity(item)) {
            self.items.push(item.to_string());
        }
    }

    /// Union member items; kind and comment are only filled when unset.
    pub fn merge(&mut self, other: &Key) {
        if self.kind.is_none() {
            self.kind = other.kind;
        }
        fill_string(&mut self.comment, &other.comment);
        for item in &other.items {
            self.add_item(item);
        }
    }
}

/// Insert or merge `key` into `keys` by case-insensitive name.
pub(crate) fn upsert_key(keys: &mut Vec<Key>, key: Key) -> &mut Key {
    let id = key.id();
    match keys.iter().position(|k| k.id() == id) {
        Some(idx) => {
            keys[idx].merge(&key);
            &mut keys[idx]
        }
        None => {
            keys.push(key);
            let last = keys.len() - 1;
            &mut keys[last]
        }
    }
}
