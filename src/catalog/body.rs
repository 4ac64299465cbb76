//! Request bodies for catalog writes.

use crate::model::{Item, Metadata, Name, Relationship, Set};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const MOST_COMMON_VALUE: &str = "most_common_value";
const NULL_PERCENTAGE: &str = "null_percentage";

#[derive(Debug, Serialize)]
struct SetBody<'a> {
    name: &'a Name,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    #[serde(rename = "type", skip_serializing_if = "str::is_empty")]
    set_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<&'static str, Value>,
}

#[derive(Debug, Serialize)]
struct KeyBody<'a> {
    name: &'a str,
    primary: bool,
}

#[derive(Debug, Serialize)]
struct ItemBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    name: &'a Name,
    nullable: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    udt_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    keys: Vec<KeyBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<&'static str, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    example: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct IntegrityBody {
    on_update: String,
    on_delete: String,
}

#[derive(Debug, Serialize)]
struct JoinBody<'a> {
    parent: &'a str,
    child: &'a str,
}

#[derive(Debug, Serialize)]
struct RelationshipBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    parent_set: String,
    child_set: String,
    name: &'a Name,
    cardinality: [i32; 4],
    referential_integrity: IntegrityBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    match_type: Option<String>,
    items: Vec<JoinBody<'a>>,
}

/// Format a null percentage the way the catalog displays it.
fn percentage(value: &Value) -> Value {
    match value.as_f64() {
        Some(pct) if pct == 0.0 => Value::String("0".into()),
        Some(pct) => Value::String(format!("{pct:.2}")),
        None => value.clone(),
    }
}

/// Body for creating or updating a set.
///
/// View source moves into `metadata.view_source`; a most-common value is
/// lifted out of metadata into the attributes map.
#[must_use]
pub fn set_body(set: &Set) -> Value {
    let mut metadata = set.metadata.clone();
    if !set.definition.trim().is_empty() {
        metadata
            .get_or_insert_with(Metadata::new)
            .insert("view_source".into(), Value::String(set.definition.clone()));
    }

    let mut attributes = BTreeMap::new();
    if let Some(value) = metadata.as_mut().and_then(|m| m.remove(MOST_COMMON_VALUE)) {
        attributes.insert("Most Common Value", value);
    }

    serde_json::json!(SetBody {
        name: &set.name,
        description: &set.comment,
        set_type: set.set_type.as_str(),
        metadata,
        attributes,
    })
}

/// Body for one entry of a bulk item write.
#[must_use]
pub fn item_body(item: &Item) -> Value {
    let mut metadata = item.metadata.clone();
    let mut attributes = BTreeMap::new();
    if let Some(m) = metadata.as_mut() {
        if let Some(value) = m.remove(MOST_COMMON_VALUE) {
            attributes.insert("Most Common Value", value);
        }
        if let Some(value) = m.remove(NULL_PERCENTAGE) {
            attributes.insert("Null Percentage", percentage(&value));
        }
    }

    let keys = item
        .keys
        .iter()
        .filter(|k| !k.name.trim().is_empty())
        .map(|k| KeyBody {
            name: &k.name,
            primary: k.is_primary(),
        })
        .collect();

    serde_json::json!(ItemBody {
        id: item.remote_id(),
        name: &item.name,
        nullable: item.nullable,
        description: &item.comment,
        udt_type: &item.data_type,
        default: item.default.as_deref().filter(|d| !d.is_empty()),
        keys,
        metadata,
        attributes,
        example: item.example.as_deref().filter(|e| !e.is_empty()),
    })
}

/// Body for one entry of a bulk relationship write.
///
/// The parent and child sets and the cardinality come from the first
/// join. Returns `None` for a relationship without joins.
#[must_use]
pub fn relationship_body(rel: &Relationship) -> Option<Value> {
    let first = rel.joins.first()?;
    let integrity = rel.integrity.clone().unwrap_or_default();
    let body = RelationshipBody {
        id: rel.remote_id(),
        parent_set: first.parent.set_stub(),
        child_set: first.child.set_stub(),
        name: &rel.name,
        cardinality: first.cardinality.0,
        referential_integrity: IntegrityBody {
            on_update: integrity.on_update.to_uppercase(),
            on_delete: integrity.on_delete.to_uppercase(),
        },
        match_type: (!integrity.on_match.trim().is_empty())
            .then(|| integrity.on_match.to_uppercase()),
        items: rel
            .joins
            .iter()
            .map(|j| JoinBody {
                parent: &j.parent.fqdn,
                child: &j.child.fqdn,
            })
            .collect(),
    };
    Some(serde_json::json!(body))
}
