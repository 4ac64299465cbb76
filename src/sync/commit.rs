//! Writing classified changes to the catalog.
//!
//! Within a kind: deletions, then additions, then updates. Across kinds:
//! sets, items, relationships, joins. Sets are created one call at a time
//! so each new remote ID is known before the items that need it. A failed
//! call is logged and counted; the commit moves on to the next entity.

use super::types::{KindReport, RunMode, RunReport};
use crate::catalog::{CatalogClient, Transport};
use crate::diff::{Diffs, JoinChange, Keyed};
use crate::error::{Error, Result};
use crate::model::{Document, Item, Relationship, RelationshipKey, Set, SetKey};
use crate::storage::StagingStore;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

fn failure(kind: &str, identifier: &dyn std::fmt::Display, e: &Error) {
    error!(kind, identifier = %identifier, status = ?e.status(), error = %e, "Catalog write failed");
}

/// Group items by their owning set, keeping set order stable.
fn by_set<'d>(items: impl Iterator<Item = &'d Item>) -> BTreeMap<SetKey, Vec<&'d Item>> {
    let mut groups: BTreeMap<SetKey, Vec<&Item>> = BTreeMap::new();
    for item in items {
        groups.entry(item.set.clone()).or_default().push(item);
    }
    groups
}

/// Group relationships by their parent set.
fn by_parent<'d>(
    relationships: impl IntoIterator<Item = &'d Relationship>,
) -> BTreeMap<SetKey, Vec<&'d Relationship>> {
    let mut groups: BTreeMap<SetKey, Vec<&Relationship>> = BTreeMap::new();
    for rel in relationships {
        groups.entry(rel.anchor()).or_default().push(rel);
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinOp {
    Add,
    Delete,
    Update,
}

impl JoinOp {
    fn count(self, report: &mut KindReport) {
        match self {
            Self::Add => report.added += 1,
            Self::Delete => report.deleted += 1,
            Self::Update => report.updated += 1,
        }
    }
}

struct Commit<'a, T: Transport> {
    client: &'a mut CatalogClient<T>,
    store: &'a StagingStore,
    doc: &'a Document,
    set_ids: BTreeMap<SetKey, String>,
    failed_sets: BTreeSet<SetKey>,
    report: RunReport,
}

/// Apply `diffs` to the catalog.
///
/// Remote IDs returned for new sets are written back into
/// `diffs.sets`.
///
/// # Errors
///
/// Only staging store failures are returned; catalog failures are counted
/// in the report.
pub async fn commit<T: Transport>(
    client: &mut CatalogClient<T>,
    store: &StagingStore,
    doc: &Document,
    diffs: &mut Diffs,
) -> Result<RunReport> {
    let mut commit = Commit {
        client,
        store,
        doc,
        set_ids: BTreeMap::new(),
        failed_sets: BTreeSet::new(),
        report: RunReport::new(RunMode::Commit),
    };

    commit.sets(diffs).await;
    commit.items(diffs).await?;
    commit.relationships(diffs).await;
    commit.joins(diffs).await;

    commit.report.finish();
    Ok(commit.report)
}

impl<T: Transport> Commit<'_, T> {
    async fn sets(&mut self, diffs: &mut Diffs) {
        info!(
            added = diffs.sets.added().len(),
            updated = diffs.sets.updated().len(),
            deleted = diffs.sets.deleted().len(),
            "Committing sets"
        );
        let mut report = KindReport::default();

        for set in diffs.sets.deleted() {
            let Some(id) = set.remote_id() else {
                warn!(set = %set.key(), "Set has no catalog id, cannot delete");
                report.skipped += 1;
                continue;
            };
            match self.client.delete_set(id).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    failure("set", &set.key(), &e);
                    report.failed += 1;
                }
            }
        }

        for set in diffs.sets.added_mut() {
            match self.client.create_set(set).await {
                Ok(id) => {
                    self.set_ids.insert(set.key(), id.clone());
                    set.id = Some(id);
                    report.added += 1;
                }
                Err(e) => {
                    failure("set", &set.key(), &e);
                    self.failed_sets.insert(set.key());
                    report.failed += 1;
                }
            }
        }

        for update in diffs.sets.updated() {
            let set = &update.entity;
            let Some(id) = set.remote_id() else {
                warn!(set = %set.key(), "Set has no catalog id, cannot update");
                report.skipped += 1;
                continue;
            };
            self.set_ids.insert(set.key(), id.to_string());
            match self.client.update_set(id, set).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    failure("set", &set.key(), &e);
                    report.failed += 1;
                }
            }
        }

        self.report.sets = report;
    }

    /// Catalog ID of a set: one captured this run, then the catalog-side
    /// staging rows, then a lookup against the catalog.
    async fn set_id(&mut self, key: &SetKey) -> Result<Option<String>> {
        if let Some(id) = self.set_ids.get(key) {
            return Ok(Some(id.clone()));
        }

        let doc_set = self.doc.set(key);
        if let Some(id) = doc_set.and_then(Set::remote_id) {
            self.set_ids.insert(key.clone(), id.to_string());
            return Ok(Some(id.to_string()));
        }

        let (schema, name) = doc_set.map_or_else(
            || (key.schema.clone(), key.set.clone()),
            |s| (s.schema.clone(), s.name.physical.clone()),
        );
        let staged = self
            .store
            .lookup_catalog_set(&schema, &name)?
            .and_then(|row| row.id);
        let found = match staged {
            Some(id) => Some(id),
            None => match self.client.lookup_set(&name).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(set = %key, error = %e, "Catalog set lookup failed");
                    None
                }
            },
        };

        if let Some(id) = &found {
            self.set_ids.insert(key.clone(), id.clone());
        }
        Ok(found)
    }

    /// Resolve the catalog ID for a group of items, or count the group as
    /// skipped.
    async fn group_target(&mut self, key: &SetKey, size: usize, report: &mut KindReport) -> Result<Option<String>> {
        if self.failed_sets.contains(key) {
            warn!(set = %key, items = size, "Skipping items of a set that failed to commit");
            report.skipped += size;
            return Ok(None);
        }
        let id = self.set_id(key).await?;
        if id.is_none() {
            warn!(set = %key, items = size, "No catalog id for set, skipping its items");
            report.skipped += size;
        }
        Ok(id)
    }

    async fn items(&mut self, diffs: &Diffs) -> Result<()> {
        info!(
            added = diffs.items.added().len(),
            updated = diffs.items.updated().len(),
            deleted = diffs.items.deleted().len(),
            "Committing items"
        );
        let mut report = KindReport::default();

        for item in diffs.items.deleted() {
            let key = item.diff_key();
            let Some(id) = item.remote_id() else {
                warn!(item = %key, "Item has no catalog id, cannot delete");
                report.skipped += 1;
                continue;
            };
            match self.client.delete_item(id).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    failure("item", &key, &e);
                    report.failed += 1;
                }
            }
        }

        for (key, items) in by_set(diffs.items.added().iter()) {
            let Some(id) = self.group_target(&key, items.len(), &mut report).await? else {
                continue;
            };
            match self.client.create_items(&id, &items).await {
                Ok(()) => report.added += items.len(),
                Err(e) => {
                    failure("item", &key, &e);
                    report.failed += items.len();
                }
            }
        }

        for (key, items) in by_set(diffs.items.updated().iter().map(|u| &u.entity)) {
            let Some(id) = self.group_target(&key, items.len(), &mut report).await? else {
                continue;
            };
            match self.client.update_items(&id, &items).await {
                Ok(()) => report.updated += items.len(),
                Err(e) => {
                    failure("item", &key, &e);
                    report.failed += items.len();
                }
            }
        }

        self.report.items = report;
        Ok(())
    }

    /// Deletions go out in one call; additions and updates in one call per
    /// parent set.
    async fn relationships(&mut self, diffs: &Diffs) {
        info!(
            added = diffs.relationships.added().len(),
            updated = diffs.relationships.updated().len(),
            deleted = diffs.relationships.deleted().len(),
            "Committing relationships"
        );
        let mut report = KindReport::default();

        let mut ids = Vec::new();
        for rel in diffs.relationships.deleted() {
            match rel.remote_id() {
                Some(id) => ids.push(id),
                None => {
                    warn!(relationship = %rel.key(), "Relationship has no catalog id, cannot delete");
                    report.skipped += 1;
                }
            }
        }
        if !ids.is_empty() {
            match self.client.delete_relationships(&ids).await {
                Ok(()) => report.deleted += ids.len(),
                Err(e) => {
                    failure("relationship", &"bulk delete", &e);
                    report.failed += ids.len();
                }
            }
        }

        let mut added: Vec<&Relationship> = Vec::new();
        for rel in diffs.relationships.added() {
            if self.failed_sets.contains(&rel.anchor()) {
                warn!(relationship = %rel.key(), "Skipping relationship of a set that failed to commit");
                report.skipped += 1;
            } else {
                added.push(rel);
            }
        }
        for (parent, rels) in by_parent(added) {
            match self.client.create_relationships(&rels).await {
                Ok(()) => report.added += rels.len(),
                Err(e) => {
                    failure("relationship", &parent, &e);
                    report.failed += rels.len();
                }
            }
        }

        let mut updated: Vec<&Relationship> = Vec::new();
        for update in diffs.relationships.updated() {
            if update.entity.remote_id().is_some() {
                updated.push(&update.entity);
            } else {
                warn!(relationship = %update.entity.key(), "Relationship has no catalog id, cannot update");
                report.skipped += 1;
            }
        }
        for (parent, rels) in by_parent(updated) {
            match self.client.update_relationships(&rels).await {
                Ok(()) => report.updated += rels.len(),
                Err(e) => {
                    failure("relationship", &parent, &e);
                    report.failed += rels.len();
                }
            }
        }

        self.report.relationships = report;
    }

    /// Join changes are written by re-submitting each owning relationship,
    /// unless the relationship itself is already part of this commit.
    async fn joins(&mut self, diffs: &Diffs) {
        let mut owners: BTreeMap<RelationshipKey, Vec<(&JoinChange, JoinOp)>> = BTreeMap::new();
        let changes = diffs
            .joins
            .deleted()
            .iter()
            .map(|j| (j, JoinOp::Delete))
            .chain(diffs.joins.added().iter().map(|j| (j, JoinOp::Add)))
            .chain(diffs.joins.updated().iter().map(|u| (&u.entity, JoinOp::Update)));
        for (change, op) in changes {
            owners.entry(change.relationship_key()).or_default().push((change, op));
        }

        let mut report = KindReport::default();
        let mut payload: Vec<Relationship> = Vec::new();
        let mut pending: Vec<JoinOp> = Vec::new();

        for (key, changes) in owners {
            if diffs.relationships.touches(&key) {
                continue;
            }
            let Some(rel) = self.doc.relationship(&key) else {
                warn!(relationship = %key, "Relationship not in document, skipping its joins");
                report.skipped += changes.len();
                continue;
            };
            let Some(id) = changes
                .iter()
                .find_map(|(c, _)| c.relationship_id.clone())
                .or_else(|| rel.id.clone())
            else {
                warn!(relationship = %key, "Relationship has no catalog id, skipping its joins");
                report.skipped += changes.len();
                continue;
            };
            let mut rel = rel.clone();
            rel.id = Some(id);
            payload.push(rel);
            pending.extend(changes.iter().map(|(_, op)| *op));
        }

        if !payload.is_empty() {
            info!(relationships = payload.len(), joins = pending.len(), "Committing joins");
            let refs: Vec<&Relationship> = payload.iter().collect();
            match self.client.update_relationships(&refs).await {
                Ok(()) => {
                    for op in pending {
                        op.count(&mut report);
                    }
                }
                Err(e) => {
                    failure("join", &"relationship resubmit", &e);
                    report.failed += pending.len();
                }
            }
        }

        self.report.joins = report;
    }
}
