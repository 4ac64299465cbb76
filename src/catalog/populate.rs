//! Building the catalog-side document from the remote catalog.

use super::client::CatalogClient;
use super::transport::{Method, Transport};
use crate::error::{Error, Result};
use crate::model::{
    Cardinality, Document, Integrity, Item, Join, Key, KeyKind, Metadata, Name, RelItem,
    Relationship, Schema, Set, SetType, identity,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
struct RemoteName {
    #[serde(default)]
    physical: String,
    #[serde(default)]
    logical: Option<String>,
}

impl RemoteName {
    fn into_name(self) -> Name {
        Name {
            physical: self.physical,
            logical: self.logical.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteSourceSummary {
    id: String,
    #[serde(default)]
    name: RemoteName,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteSourceList {
    #[serde(default)]
    sources: Vec<RemoteSourceSummary>,
}

#[derive(Debug, Deserialize)]
struct RemoteSource {
    id: String,
    #[serde(default)]
    name: RemoteName,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sets: Vec<RemoteSet>,
}

#[derive(Debug, Deserialize)]
struct RemoteSet {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: RemoteName,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type", default)]
    set_type: Option<String>,
    #[serde(default)]
    stub: Option<String>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    items: Vec<RemoteItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteSetList {
    #[serde(default)]
    sets: Vec<RemoteSet>,
}

#[derive(Debug, Deserialize)]
struct RemoteKey {
    #[serde(default)]
    is_key: bool,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RemoteItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: RemoteName,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type", default)]
    data_type: Option<String>,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    stub: Option<String>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    example: Option<Value>,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    key: Vec<RemoteKey>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteStub {
    #[serde(default)]
    stub: String,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteEndSet {
    #[serde(default)]
    name: RemoteName,
    #[serde(default)]
    source: RemoteStub,
}

#[derive(Debug, Deserialize)]
struct RemoteEnd {
    #[serde(default)]
    name: RemoteName,
    #[serde(default)]
    stub: String,
    #[serde(default)]
    set: RemoteEndSet,
}

#[derive(Debug, Deserialize)]
struct RemoteJoin {
    #[serde(default)]
    parent: Option<RemoteEnd>,
    #[serde(default)]
    child: Option<RemoteEnd>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteIntegrity {
    #[serde(default)]
    on_update: Option<String>,
    #[serde(default)]
    on_delete: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteCardinality {
    #[serde(default)]
    raw: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RemoteRelationship {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: RemoteName,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    referential_integrity: Option<RemoteIntegrity>,
    #[serde(default)]
    match_type: Option<String>,
    #[serde(default)]
    cardinality: Option<RemoteCardinality>,
    #[serde(default)]
    items: Vec<RemoteJoin>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteRelationshipList {
    #[serde(default)]
    relationships: Vec<RemoteRelationship>,
}

/// Render a scalar the catalog may send as a string, number or bool.
fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Schema named by the first segment of a `schema.set` stub.
fn stub_schema<'a>(stub: Option<&'a str>, fallback: &'a str) -> &'a str {
    stub.and_then(|s| s.trim().split_once('.'))
        .map(|(schema, _)| schema)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

/// Four integer bounds, or the default when the catalog sends anything
/// other than four values.
fn cardinality(relationship: &str, raw: Option<RemoteCardinality>) -> Result<Cardinality> {
    let Some(raw) = raw.map(|c| c.raw).filter(|r| r.len() == 4) else {
        return Ok(Cardinality::default());
    };
    let mut bounds = [0_i32; 4];
    for (bound, value) in bounds.iter_mut().zip(&raw) {
        *bound = value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| {
                Error::resolution(
                    "relationship",
                    relationship,
                    format!("cardinality bound {value} is not a 32-bit integer"),
                )
            })?;
    }
    Ok(Cardinality(bounds))
}

fn rel_item(end: RemoteEnd, fallback_schema: &str) -> RelItem {
    RelItem::parse(&end.stub).unwrap_or_else(|| {
        let schema = if end.set.source.stub.is_empty() {
            fallback_schema
        } else {
            &end.set.source.stub
        };
        RelItem::new(schema, &end.set.name.physical, &end.name.physical)
    })
}

fn remote_item(raw: RemoteItem) -> Item {
    let mut item = Item::new(raw.name.physical.clone(), raw.data_type.unwrap_or_default());
    item.id = raw.id.filter(|id| !id.is_empty());
    item.name = raw.name.into_name();
    item.comment = raw.description.unwrap_or_default();
    item.nullable = raw.nullable;
    item.fqdn = raw.stub.unwrap_or_default();
    item.default = text(raw.default);
    item.example = text(raw.example);
    item.metadata = raw.metadata;
    for key in raw.key.into_iter().filter(|k| k.is_key && !k.name.is_empty()) {
        let kind = if key.primary { KeyKind::Primary } else { KeyKind::Foreign };
        item.upsert_key(Key::new(key.name, Some(kind)).with_item(item.name.physical.clone()));
    }
    item
}

impl<T: Transport> CatalogClient<T> {
    /// Build the catalog-side document for the configured source.
    ///
    /// Reads the source with its sets, then every set's items, then the
    /// relationships. A 404 on the source falls back to the source list,
    /// matching by ID or physical name; a 404 on the set listing retries
    /// with `?expand=items`.
    ///
    /// # Errors
    ///
    /// Any failed read is fatal: `Error::Remote` for a bad status,
    /// `Error::Json` for an unreadable body, `Error::Conflict` for
    /// contradictory entities.
    pub async fn populate(&mut self) -> Result<Document> {
        let source = self.fetch_source().await?;
        self.resolve_source(source.id.clone());

        let mut doc = Document::new(source.name.physical.clone());
        doc.source.name = source.name.into_name();
        doc.source.comment = source.description.unwrap_or_default();
        let fallback = doc.source.name.physical.clone();

        for raw in source.sets {
            apply_set(&mut doc, raw, &fallback)?;
        }

        for raw in self.fetch_sets().await?.sets {
            apply_set(&mut doc, raw, &fallback)?;
        }

        for raw in self.fetch_relationships().await?.relationships {
            match apply_relationship(&mut doc, raw, &fallback) {
                Err(e @ Error::Resolution { .. }) => {
                    warn!(error = %e, "skipping catalog relationship");
                }
                other => other?,
            }
        }

        info!(
            source = %self.source_id(),
            sets = doc.sets().count(),
            items = doc.items().count(),
            relationships = doc.relationships().count(),
            "populated catalog document"
        );
        Ok(doc)
    }

    async fn fetch_source(&mut self) -> Result<RemoteSource> {
        let path = format!("/catalog/source/{}?expand=sets", self.configured_source());
        let response = self.send(Method::Get, &path, None).await?;
        if response.status != 404 {
            return response.ensure_success(format!("GET {path}"))?.json();
        }

        debug!(source = self.configured_source(), "source not found by id, listing sources");
        let id = self.find_source().await?;
        let path = format!("/catalog/source/{id}?expand=sets");
        self.call(Method::Get, &path, None).await?.json()
    }

    async fn find_source(&mut self) -> Result<String> {
        let listing: RemoteSourceList = self
            .call(Method::Get, "/catalog/sources", None)
            .await?
            .json()?;
        let configured = self.configured_source().to_string();
        let wanted = identity(&configured);
        listing
            .sources
            .into_iter()
            .find(|s| s.id == configured || identity(&s.name.physical) == wanted)
            .map(|s| s.id)
            .ok_or_else(|| Error::Remote {
                context: "GET /catalog/sources".into(),
                status: 404,
                message: format!("no catalog source matches {configured}"),
            })
    }

    async fn fetch_sets(&mut self) -> Result<RemoteSetList> {
        let path = format!("/catalog/source/{}/sets", self.source_id());
        let response = self.send(Method::Get, &path, None).await?;
        if response.status != 404 {
            return response.ensure_success(format!("GET {path}"))?.json();
        }
        let path = format!("{path}?expand=items");
        self.call(Method::Get, &path, None).await?.json()
    }

    async fn fetch_relationships(&mut self) -> Result<RemoteRelationshipList> {
        let path = format!("/catalog/relationships/source/{}", self.source_id());
        self.call(Method::Get, &path, None).await?.json()
    }
}

/// Schema of an already-known set with this physical name, if any.
fn known_schema(doc: &Document, set: &str) -> Option<String> {
    let wanted = identity(set);
    doc.sets()
        .find(|s| s.id() == wanted)
        .map(|s| s.schema.clone())
}

fn apply_set(doc: &mut Document, raw: RemoteSet, fallback: &str) -> Result<()> {
    let schema_name = match raw.stub.as_deref() {
        Some(stub) if stub.contains('.') => stub_schema(Some(stub), fallback).to_string(),
        _ => known_schema(doc, &raw.name.physical).unwrap_or_else(|| fallback.to_string()),
    };

    let mut set = Set::new(raw.name.physical.clone(), SetType::Unspecified);
    set.id = raw.id.filter(|id| !id.is_empty());
    set.name = raw.name.into_name();
    set.comment = raw.description.unwrap_or_default();
    set.set_type = raw.set_type.as_deref().map_or(SetType::Unspecified, SetType::parse);
    set.fqdn = raw.stub.unwrap_or_default();
    if let Some(definition) = raw.definition.filter(|d| !d.trim().is_empty()) {
        set.definition = definition;
    }
    if let Some(Value::String(view)) = raw.metadata.as_ref().and_then(|m| m.get("view_source")) {
        set.definition.clone_from(view);
    }
    set.metadata = raw.metadata;
    for item in raw.items {
        set.upsert_item(remote_item(item))?;
    }

    doc.apply_schema(Schema::new(schema_name))?.upsert_set(set)?;
    Ok(())
}

fn apply_relationship(doc: &mut Document, mut raw: RemoteRelationship, fallback: &str) -> Result<()> {
    let card = cardinality(&raw.name.physical, raw.cardinality.take())?;
    let joins: Vec<Join> = raw
        .items
        .into_iter()
        .filter_map(|j| Some((j.parent?, j.child?)))
        .enumerate()
        .map(|(idx, (parent, child))| {
            let mut join = Join::new(
                rel_item(parent, fallback),
                rel_item(child, fallback),
                i64::try_from(idx + 1).unwrap_or(i64::MAX),
            );
            join.cardinality = card;
            join
        })
        .collect();

    let Some(first) = joins.first() else {
        warn!(relationship = %raw.name.physical, "catalog relationship has no joins, skipping");
        return Ok(());
    };

    let schema_name = first.parent.schema.clone();
    let mut rel = Relationship::new(raw.name.physical.clone(), first.parent.set.clone());
    rel.id = raw.id.filter(|id| !id.is_empty());
    rel.name = raw.name.into_name();
    rel.comment = raw.description.unwrap_or_default();
    let integrity = raw.referential_integrity.unwrap_or_default();
    rel.integrity = Some(Integrity {
        on_update: integrity.on_update.unwrap_or_default(),
        on_delete: integrity.on_delete.unwrap_or_default(),
        on_match: raw.match_type.unwrap_or_default(),
    });
    rel.joins = joins;

    doc.apply_schema(Schema::new(schema_name))?
        .upsert_relationship(rel)?;
    Ok(())
}
