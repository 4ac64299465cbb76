//! Shared fixtures for unit tests.

use crate::catalog::{ApiRequest, ApiResponse, Transport};
use crate::error::Result;
use crate::model::{Document, Item, Join, Key, KeyKind, RelItem, Relationship, Schema, Set, SetType};
use crate::storage::{StagingConfig, StagingStore};
use std::collections::VecDeque;
use std::sync::Mutex;
use tempfile::TempDir;

pub fn store(dir: &TempDir) -> StagingStore {
    StagingStore::open(dir.path().join("staging.db"), StagingConfig::default()).unwrap()
}

fn pk(set: &str, column: &str) -> Key {
    Key::new(format!("pk_{set}"), Some(KeyKind::Primary)).with_item(column)
}

/// `orders(id PK int, total numeric)`.
pub fn orders() -> Set {
    let mut set = Set::new("orders", SetType::Table);
    let mut id = Item::new("id", "int");
    id.upsert_key(pk("orders", "id"));
    set.upsert_item(id).unwrap();
    set.upsert_item(Item::new("total", "numeric")).unwrap();
    set
}

/// `customers(id PK int, name text)`.
pub fn customers() -> Set {
    let mut set = Set::new("customers", SetType::Table);
    let mut id = Item::new("id", "int");
    id.upsert_key(pk("customers", "id"));
    set.upsert_item(id).unwrap();
    set.upsert_item(Item::new("name", "text")).unwrap();
    set
}

/// `orders.customer_id -> customers.id`, anchored on orders.
pub fn fk_orders_customer() -> Relationship {
    let mut rel = Relationship::new("fk_orders_customer", "orders");
    rel.upsert_join(Join::new(
        RelItem::new("sales", "orders", "customer_id"),
        RelItem::new("sales", "customers", "id"),
        1,
    ));
    rel
}

/// A `warehouse` document with one `sales` schema.
pub fn sales(sets: Vec<Set>, relationships: Vec<Relationship>) -> Document {
    let mut doc = Document::new("warehouse");
    let mut schema = Schema::new("sales");
    for set in sets {
        schema.upsert_set(set).unwrap();
    }
    for rel in relationships {
        schema.upsert_relationship(rel).unwrap();
    }
    doc.apply_schema(schema).unwrap();
    doc
}

/// Give every entity a catalog-style remote ID, as a populated catalog
/// document would carry.
pub fn with_remote_ids(mut doc: Document) -> Document {
    for schema in doc.schemas.values_mut() {
        for set in schema.sets.values_mut() {
            set.id = Some(format!("set-{}", set.name.physical));
            for item in set.items.values_mut() {
                item.id = Some(format!("item-{}.{}", set.name.physical, item.name.physical));
            }
        }
        for rel in schema.relationships.values_mut() {
            rel.id = Some(format!("rel-{}", rel.name.physical));
        }
    }
    doc
}

type Handler = Box<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<ApiResponse>>),
    Route(Handler),
}

/// In-memory transport that records every request and answers from a
/// fixed queue or a routing closure.
pub struct ScriptedTransport {
    script: Script,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    /// Answer requests in order; an exhausted queue answers 599.
    pub fn queue(responses: Vec<ApiResponse>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(responses.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn route(handler: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Self {
        Self {
            script: Script::Route(Box::new(handler)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `METHOD path` of every request, in order.
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ApiResponse::new(599, "script exhausted")),
            Script::Route(handler) => handler(request),
        })
    }
}
