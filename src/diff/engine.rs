//! Diff engine: staged change rows to typed diffs.

use super::{Diff, Diffs, JoinChange, synth};
use crate::error::{Error, Result};
use crate::model::{Item, Relationship, RelationshipKey, RelItem, Set, SetKey, SetType};
use crate::storage::{
    ItemRow, ItemUpdateRow, JoinRow, JoinUpdateRow, RelationshipRow, RelationshipUpdateRow, SetRow,
    SetUpdateRow, StagingStore,
};
use std::fmt::Debug;
use tracing::{debug, info, warn};

/// Resolves staged change rows against the source document.
///
/// The document is the freshly extracted source snapshot. Rows that only
/// exist on the catalog side are rebuilt from the row itself.
pub struct DiffEngine<'a> {
    store: &'a StagingStore,
    doc: &'a crate::model::Document,
}

/// Log and swallow resolution failures; everything else propagates.
fn contain(result: Result<()>, row: &impl Debug) -> Result<()> {
    match result {
        Err(e @ Error::Resolution { .. }) => {
            warn!(error = %e, ?row, "Skipping change row");
            Ok(())
        }
        other => other,
    }
}

/// Copy of a set without its items or links.
fn detached(set: &Set) -> Set {
    let mut set = set.clone();
    set.items.clear();
    set.links.clear();
    set
}

impl<'a> DiffEngine<'a> {
    #[must_use]
    pub fn new(store: &'a StagingStore, doc: &'a crate::model::Document) -> Self {
        Self { store, doc }
    }

    fn resolve_set(&self, schema: &str, name: &str) -> Result<&'a Set> {
        self.doc.schema(schema)?.set(name).ok_or_else(|| {
            Error::resolution("set", SetKey::new(schema, name).to_string(), "not in document")
        })
    }

    /// Classify sets.
    ///
    /// # Errors
    ///
    /// Returns an error if the change queries fail.
    pub fn diff_sets(&self) -> Result<Diff<Set>> {
        let changes = self.store.set_changes()?;
        let mut diff = Diff::new();
        for row in &changes.new {
            contain(self.added_set(row, &mut diff), row)?;
        }
        for row in &changes.deleted {
            contain(self.deleted_set(row, &mut diff), row)?;
        }
        for row in &changes.updated {
            contain(self.updated_set(row, &mut diff), row)?;
        }
        info!(
            added = diff.added().len(),
            updated = diff.updated().len(),
            deleted = diff.deleted().len(),
            "Set diff"
        );
        Ok(diff)
    }

    fn added_set(&self, row: &SetRow, diff: &mut Diff<Set>) -> Result<()> {
        let mut set = detached(self.resolve_set(&row.schema, &row.physical_nm)?);
        if set.comment.trim().is_empty() && !row.description.is_empty() {
            set.comment.clone_from(&row.description);
        }
        if !row.set_type.trim().is_empty() {
            set.set_type = SetType::parse(&row.set_type);
        }
        if !row.definition.is_empty() {
            set.definition.clone_from(&row.definition);
        }
        diff.add(set);
        Ok(())
    }

    fn deleted_set(&self, row: &SetRow, diff: &mut Diff<Set>) -> Result<()> {
        let schema = self.doc.schema(&row.schema)?;
        let mut set = schema
            .set(&row.physical_nm)
            .map_or_else(|| synth::set(row), detached);
        if row.id.is_some() {
            set.id.clone_from(&row.id);
        }
        diff.delete(set);
        Ok(())
    }

    fn updated_set(&self, row: &SetUpdateRow, diff: &mut Diff<Set>) -> Result<()> {
        let values = &row.set;
        let mut set = detached(self.resolve_set(&values.schema, &values.physical_nm)?);
        if values.id.is_some() {
            set.id.clone_from(&values.id);
        }

        let mut changed = Vec::new();
        if row.logical_changed {
            set.name.logical.clone_from(&values.logical_nm);
            changed.push("logical name");
        }
        if row.description_changed {
            set.comment.clone_from(&values.description);
            changed.push("description");
        }
        if row.type_changed {
            set.set_type = SetType::parse(&values.set_type);
            changed.push("type");
        }
        if row.definition_changed {
            set.definition.clone_from(&values.definition);
            changed.push("definition");
        }
        diff.update(set, changed);
        Ok(())
    }

    /// Classify items. Rows under a set scheduled for deletion are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the change queries fail.
    pub fn diff_items(&self, sets: &Diff<Set>) -> Result<Diff<Item>> {
        let changes = self.store.item_changes()?;
        let mut diff = Diff::new();
        for row in &changes.new {
            contain(self.added_item(row, &mut diff), row)?;
        }
        for row in &changes.deleted {
            if sets.has_deletion(&SetKey::new(&row.schema, &row.set)) {
                debug!(set = %row.set, item = %row.physical_nm, "Item removed with its set");
                continue;
            }
            contain(self.deleted_item(row, &mut diff), row)?;
        }
        for row in &changes.updated {
            let item = &row.item;
            let key = SetKey::new(&item.schema, &item.set);
            if sets.has_deletion(&key) || diff.has_deletion(&key.item(&item.physical_nm)) {
                debug!(set = %item.set, item = %item.physical_nm, "Update suppressed by deletion");
                continue;
            }
            contain(self.updated_item(row, &mut diff), row)?;
        }
        info!(
            added = diff.added().len(),
            updated = diff.updated().len(),
            deleted = diff.deleted().len(),
            "Item diff"
        );
        Ok(diff)
    }

    /// Live item for a row, or one rebuilt from the row when the item or
    /// its set is gone from the document.
    fn resolve_item(&self, row: &ItemRow) -> Result<Item> {
        let schema = self.doc.schema(&row.schema)?;
        match schema.set(&row.set).and_then(|set| set.item(&row.physical_nm)) {
            Some(item) => Ok(item.clone()),
            None => synth::item(row),
        }
    }

    fn added_item(&self, row: &ItemRow, diff: &mut Diff<Item>) -> Result<()> {
        let set = self.resolve_set(&row.schema, &row.set)?;
        let item = match set.item(&row.physical_nm) {
            Some(item) => item.clone(),
            None => synth::item(row)?,
        };
        diff.add(item);
        Ok(())
    }

    fn deleted_item(&self, row: &ItemRow, diff: &mut Diff<Item>) -> Result<()> {
        let mut item = self.resolve_item(row)?;
        if row.id.is_some() {
            item.id.clone_from(&row.id);
        }
        diff.delete(item);
        Ok(())
    }

    fn updated_item(&self, row: &ItemUpdateRow, diff: &mut Diff<Item>) -> Result<()> {
        let values = &row.item;
        let mut item = self.resolve_item(values)?;
        if values.id.is_some() {
            item.id.clone_from(&values.id);
        }

        let mut changed = Vec::new();
        if row.logical_changed {
            item.name.logical.clone_from(&values.logical_nm);
            changed.push("logical name");
        }
        if row.description_changed {
            item.comment.clone_from(&values.description);
            changed.push("description");
        }
        if row.type_changed {
            item.data_type.clone_from(&values.data_type);
            changed.push("type");
        }
        if row.nullable_changed {
            item.nullable = values.nullable;
            changed.push("nullable");
        }
        if row.example_changed {
            item.example.clone_from(&values.example);
            changed.push("example");
        }
        if row.default_changed {
            item.default.clone_from(&values.default_val);
            changed.push("default");
        }
        if row.pk_changed || row.keyname_changed {
            item.keys.retain(|k| k.kind == Some(crate::model::KeyKind::Json));
            if let Some(key) = synth::key(values) {
                item.upsert_key(key);
            }
            changed.push("key");
        }
        diff.update(item, changed);
        Ok(())
    }

    /// Classify relationships. Rows anchored on a set scheduled for
    /// deletion are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the change queries fail.
    pub fn diff_relationships(&self, sets: &Diff<Set>) -> Result<Diff<Relationship>> {
        let changes = self.store.relationship_changes()?;
        let mut diff = Diff::new();
        for row in &changes.new {
            contain(
                self.resolve_relationship(row, sets).map(|rel| diff.add(rel)),
                row,
            )?;
        }
        for row in &changes.deleted {
            contain(
                self.resolve_relationship(row, sets).map(|rel| diff.delete(rel)),
                row,
            )?;
        }
        for row in &changes.updated {
            contain(self.updated_relationship(row, sets, &mut diff), row)?;
        }
        info!(
            added = diff.added().len(),
            updated = diff.updated().len(),
            deleted = diff.deleted().len(),
            "Relationship diff"
        );
        Ok(diff)
    }

    fn resolve_relationship(&self, row: &RelationshipRow, sets: &Diff<Set>) -> Result<Relationship> {
        let key = RelationshipKey::new(&row.schema, &row.physical_nm);
        if sets.has_deletion(&SetKey::new(&row.schema, &row.set)) {
            return Err(Error::resolution(
                "relationship",
                key.to_string(),
                format!("parent set {} is scheduled for deletion", row.set),
            ));
        }
        let mut rel = match self.doc.relationship(&key) {
            Some(rel) => rel.clone(),
            None => {
                self.doc.schema(&row.schema)?;
                synth::relationship(row)
            }
        };
        if row.id.is_some() {
            rel.id.clone_from(&row.id);
        }
        Ok(rel)
    }

    fn updated_relationship(
        &self,
        row: &RelationshipUpdateRow,
        sets: &Diff<Set>,
        diff: &mut Diff<Relationship>,
    ) -> Result<()> {
        let values = &row.relationship;
        let mut rel = self.resolve_relationship(values, sets)?;

        let mut changed = Vec::new();
        if row.logical_changed {
            rel.name.logical.clone_from(&values.logical_nm);
            changed.push("logical name");
        }
        if row.comment_changed {
            rel.comment.clone_from(&values.comment);
            changed.push("comment");
        }
        if row.integrity_changed {
            rel.integrity = synth::integrity(values);
            changed.push("integrity");
        }
        diff.update(rel, changed);
        Ok(())
    }

    /// Classify joins. Rows whose relationship is scheduled for deletion,
    /// or whose parent set is, are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the change queries fail.
    pub fn diff_joins(
        &self,
        sets: &Diff<Set>,
        relationships: &Diff<Relationship>,
    ) -> Result<Diff<JoinChange>> {
        let changes = self.store.join_changes()?;
        let mut diff = Diff::new();
        for row in &changes.new {
            if self.doomed(row, sets, relationships, false) {
                continue;
            }
            contain(self.resolve_join(row).map(|join| diff.add(join)), row)?;
        }
        for row in &changes.deleted {
            if self.doomed(row, sets, relationships, false) {
                continue;
            }
            contain(self.resolve_join(row).map(|join| diff.delete(join)), row)?;
        }
        for row in &changes.updated {
            if self.doomed(&row.join, sets, relationships, true) {
                continue;
            }
            contain(self.updated_join(row, &mut diff), row)?;
        }
        info!(
            added = diff.added().len(),
            updated = diff.updated().len(),
            deleted = diff.deleted().len(),
            "Join diff"
        );
        Ok(diff)
    }

    /// Whether a join row belongs to a relationship or parent set that is
    /// being deleted anyway.
    fn doomed(
        &self,
        row: &JoinRow,
        sets: &Diff<Set>,
        relationships: &Diff<Relationship>,
        update: bool,
    ) -> bool {
        let key = RelationshipKey::new(&row.schema, &row.relationship);
        if relationships.has_deletion(&key) {
            if update {
                warn!(relationship = %key, ?row, "Dropping join update: relationship scheduled for deletion");
            } else {
                debug!(relationship = %key, "Join removed with its relationship");
            }
            return true;
        }
        let parent_deleted = RelItem::parse(&row.parent_fqdn)
            .is_some_and(|parent| sets.has_deletion(&parent.set_key()));
        if parent_deleted {
            debug!(relationship = %key, parent = %row.parent_fqdn, "Join removed with its set");
        }
        parent_deleted
    }

    fn resolve_join(&self, row: &JoinRow) -> Result<JoinChange> {
        let key = RelationshipKey::new(&row.schema, &row.relationship);
        let rel = self
            .doc
            .relationship(&key)
            .ok_or_else(|| Error::resolution("relationship", key.to_string(), "not in document"))?;
        let staged = synth::join(row)?;
        let join = rel.join(&staged.id()).cloned().unwrap_or(staged);
        Ok(JoinChange {
            schema: rel.schema.clone(),
            relationship: rel.name.physical.clone(),
            relationship_id: row
                .relationship_id
                .clone()
                .or_else(|| rel.remote_id().map(str::to_string)),
            join,
        })
    }

    fn updated_join(&self, row: &JoinUpdateRow, diff: &mut Diff<JoinChange>) -> Result<()> {
        let mut change = self.resolve_join(&row.join)?;
        let staged = synth::join(&row.join)?;

        let mut changed = Vec::new();
        if row.position_changed {
            change.join.position = staged.position;
            changed.push("position");
        }
        if row.cardinality_changed {
            change.join.cardinality = staged.cardinality;
            changed.push("cardinality");
        }
        diff.update(change, changed);
        Ok(())
    }

    /// Run all four diffs in dependency order.
    ///
    /// # Errors
    ///
    /// Returns an error if a change query fails.
    pub fn diff_all(&self) -> Result<Diffs> {
        let sets = self.diff_sets()?;
        let items = self.diff_items(&sets)?;
        let relationships = self.diff_relationships(&sets)?;
        let joins = self.diff_joins(&sets, &relationships)?;
        Ok(Diffs {
            sets,
            items,
            relationships,
            joins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Keyed;
    use crate::model::{Document, ItemKey};
    use crate::storage::Side;
    use crate::testing::{customers, fk_orders_customer, orders, sales, store, with_remote_ids};
    use tempfile::TempDir;

    fn diffs(dir: &TempDir, source: &Document, catalog: &Document) -> Diffs {
        let store = store(dir);
        store.stage(Side::Source, source).unwrap();
        store.stage(Side::Catalog, catalog).unwrap();
        DiffEngine::new(&store, source).diff_all().unwrap()
    }

    fn names<T: Keyed>(list: &[T]) -> Vec<String>
    where
        T::Key: ToString,
    {
        list.iter().map(|e| e.diff_key().to_string()).collect()
    }

    #[test]
    fn test_new_table_against_empty_catalog() {
        let dir = TempDir::new().unwrap();
        let source = sales(vec![orders()], vec![]);
        let diffs = diffs(&dir, &source, &Document::new("warehouse"));

        assert_eq!(names(diffs.sets.added()), vec!["sales.orders"]);
        assert!(diffs.sets.updated().is_empty());
        assert!(diffs.sets.deleted().is_empty());
        assert_eq!(
            names(diffs.items.added()),
            vec!["sales.orders.id", "sales.orders.total"]
        );
        assert!(diffs.items.added()[0].remote_id().is_none());
        assert_eq!(diffs.items.added()[0].key_flags(), (true, "pk_orders"));
    }

    #[test]
    fn test_identical_snapshots_yield_empty_diffs() {
        let dir = TempDir::new().unwrap();
        let source = sales(vec![orders(), customers()], vec![fk_orders_customer()]);
        let catalog = with_remote_ids(source.clone());
        assert!(diffs(&dir, &source, &catalog).is_empty());
    }

    #[test]
    fn test_removed_set_suppresses_its_items() {
        let dir = TempDir::new().unwrap();
        let source = sales(vec![orders()], vec![]);
        let catalog = with_remote_ids(sales(vec![orders(), customers()], vec![]));
        let diffs = diffs(&dir, &source, &catalog);

        assert_eq!(names(diffs.sets.deleted()), vec!["sales.customers"]);
        assert!(diffs.sets.added().is_empty());
        assert!(diffs.sets.updated().is_empty());
        assert_eq!(diffs.sets.deleted()[0].remote_id(), Some("set-customers"));
        assert!(diffs.items.is_empty());
    }

    #[test]
    fn test_relationship_update_under_deleted_set_is_suppressed() {
        let dir = TempDir::new().unwrap();
        let mut rel = crate::model::Relationship::new("fk_customers_region", "customers");
        rel.upsert_join(crate::model::Join::new(
            RelItem::new("sales", "customers", "region_id"),
            RelItem::new("sales", "orders", "id"),
            1,
        ));
        let mut changed = rel.clone();
        changed.comment = "new comment".into();

        let source = sales(vec![orders()], vec![changed]);
        let catalog = with_remote_ids(sales(vec![orders(), customers()], vec![rel]));
        let diffs = diffs(&dir, &source, &catalog);

        assert!(diffs.sets.has_deletion(&SetKey::new("sales", "customers")));
        assert!(diffs.relationships.updated().is_empty());
        assert!(diffs.joins.is_empty());
    }

    #[test]
    fn test_item_update_copies_flagged_fields_and_remote_id() {
        let dir = TempDir::new().unwrap();
        let mut source_orders = orders();
        source_orders.item_mut("total").unwrap().comment = "order total".into();
        let source = sales(vec![source_orders], vec![]);
        let catalog = with_remote_ids(sales(vec![orders()], vec![]));
        let diffs = diffs(&dir, &source, &catalog);

        assert_eq!(diffs.items.updated().len(), 1);
        let update = &diffs.items.updated()[0];
        assert_eq!(update.changed, vec!["description"]);
        assert_eq!(update.entity.comment, "order total");
        assert_eq!(update.entity.remote_id(), Some("item-orders.total"));
        assert_eq!(update.entity.diff_key(), ItemKey::new("sales", "orders", "total"));
    }

    #[test]
    fn test_removed_item_is_rebuilt_from_catalog_row() {
        let dir = TempDir::new().unwrap();
        let source = sales(vec![orders()], vec![]);
        let mut catalog_orders = orders();
        catalog_orders
            .upsert_item(crate::model::Item::new("legacy_flag", "bool"))
            .unwrap();
        let catalog = with_remote_ids(sales(vec![catalog_orders], vec![]));
        let diffs = diffs(&dir, &source, &catalog);

        assert_eq!(names(diffs.items.deleted()), vec!["sales.orders.legacy_flag"]);
        let item = &diffs.items.deleted()[0];
        assert_eq!(item.remote_id(), Some("item-orders.legacy_flag"));
        assert_eq!(item.data_type, "bool");
    }

    #[test]
    fn test_relationship_and_join_changes() {
        let dir = TempDir::new().unwrap();
        let mut source_fk = fk_orders_customer();
        source_fk.joins[0].cardinality = "0,1,0,-1".parse().unwrap();
        let source = sales(vec![orders(), customers()], vec![source_fk]);

        let mut stale = fk_orders_customer();
        stale.name = crate::model::Name::physical("fk_stale");
        let catalog = with_remote_ids(sales(
            vec![orders(), customers()],
            vec![fk_orders_customer(), stale],
        ));
        let diffs = diffs(&dir, &source, &catalog);

        assert_eq!(names(diffs.relationships.deleted()), vec!["sales.fk_stale"]);
        assert_eq!(diffs.relationships.deleted()[0].remote_id(), Some("rel-fk_stale"));
        assert!(diffs.joins.deleted().is_empty());

        assert_eq!(diffs.joins.updated().len(), 1);
        let update = &diffs.joins.updated()[0];
        assert_eq!(update.changed, vec!["cardinality"]);
        assert_eq!(update.entity.join.cardinality.to_string(), "0,1,0,-1");
        assert_eq!(update.entity.relationship_id.as_deref(), Some("rel-fk_orders_customer"));
    }

    #[test]
    fn test_rows_outside_the_document_are_skipped() {
        let dir = TempDir::new().unwrap();
        let source = sales(vec![orders()], vec![]);
        let mut catalog = with_remote_ids(source.clone());
        let mut hr = crate::model::Schema::new("hr");
        hr.upsert_set(Set::new("employees", SetType::Table)).unwrap();
        catalog.apply_schema(hr).unwrap();

        let diffs = diffs(&dir, &source, &catalog);
        assert!(diffs.is_empty());
    }
}
