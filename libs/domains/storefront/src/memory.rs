//! In-memory implementations of [`RemoteStore`] and [`ObjectStorage`] for
//! development and testing.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::query::{Direction, Order, Predicate};
use crate::storage::{ObjectStorage, UploadOptions};
use crate::store::{RemoteStore, SelectQuery, StoreError, StoreResult};

type Row = Map<String, Value>;

/// Table-per-`Vec` store that evaluates [`SelectQuery`] the way the remote
/// service does: conjunctive filters, OR groups, embedded relations (left or
/// inner), ordering with Postgres null placement, limits and unique keys.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    /// (parent table, child table) → foreign key column on the child
    relations: HashMap<(&'static str, &'static str), &'static str>,
    unique_keys: HashMap<&'static str, Vec<Vec<&'static str>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preconfigured with the storefront schema
    pub fn storefront() -> Self {
        Self::new()
            .with_relation("products", "product_images", "product_id")
            .with_relation("products", "product_variants", "product_id")
            .with_relation("products", "product_attributes", "product_id")
            .with_unique("wishlist", &["user_id", "product_id"])
    }

    pub fn with_relation(
        mut self,
        parent: &'static str,
        child: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        self.relations.insert((parent, child), foreign_key);
        self
    }

    pub fn with_unique(mut self, table: &'static str, columns: &[&'static str]) -> Self {
        self.unique_keys
            .entry(table)
            .or_default()
            .push(columns.to_vec());
        self
    }

    /// Snapshot of a table's raw rows
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    fn with_generated_columns(mut row: Row) -> Row {
        let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::now_v7().to_string()));
        row.entry("created_at").or_insert_with(|| now.clone());
        row.entry("updated_at").or_insert(now);
        row
    }

    fn check_unique(&self, table: &str, existing: &[Row], row: &Row) -> StoreResult<()> {
        let mut keys: Vec<Vec<&str>> = vec![vec!["id"]];
        if let Some(configured) = self.unique_keys.get(table) {
            keys.extend(configured.iter().cloned());
        }

        for columns in keys {
            let duplicate = existing.iter().any(|other| {
                columns
                    .iter()
                    .all(|column| match (other.get(*column), row.get(*column)) {
                        (Some(a), Some(b)) => !a.is_null() && values_equal(a, b),
                        _ => false,
                    })
            });
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "duplicate key value violates unique constraint on {table} ({})",
                    columns.join(", ")
                )));
            }
        }
        Ok(())
    }

    fn embed(
        &self,
        parent_table: &str,
        row: &mut Row,
        tables: &HashMap<String, Vec<Row>>,
        query: &SelectQuery,
    ) -> bool {
        for relation in &query.relations {
            let foreign_key = self
                .relations
                .iter()
                .find(|((parent, child), _)| *parent == parent_table && *child == relation.table)
                .map(|(_, fk)| *fk);
            let Some(foreign_key) = foreign_key else {
                continue;
            };

            let parent_id = row.get("id").cloned().unwrap_or(Value::Null);
            let mut children: Vec<Row> = tables
                .get(relation.table)
                .map(|rows| {
                    rows.iter()
                        .filter(|child| {
                            child
                                .get(foreign_key)
                                .is_some_and(|fk| values_equal(fk, &parent_id))
                        })
                        .filter(|child| match &relation.filter {
                            Some((column, value)) => {
                                matches(child, &Predicate::Eq(*column, value.clone()))
                            }
                            None => true,
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            if let Some(order) = &relation.order {
                sort_rows(&mut children, std::slice::from_ref(order));
            }
            if relation.inner && children.is_empty() {
                return false;
            }
            row.insert(
                relation.table.to_string(),
                Value::Array(children.into_iter().map(Value::Object).collect()),
            );
        }
        true
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal) || a == b
}

fn matches(row: &Row, predicate: &Predicate) -> bool {
    let null = Value::Null;
    match predicate {
        Predicate::Eq(column, Value::Null) => row.get(*column).is_none_or(Value::is_null),
        Predicate::Eq(column, value) => values_equal(row.get(*column).unwrap_or(&null), value),
        Predicate::Gte(column, value) => matches!(
            compare_values(row.get(*column).unwrap_or(&null), value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Predicate::Lte(column, value) => matches!(
            compare_values(row.get(*column).unwrap_or(&null), value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Predicate::AnyContains { columns, needle } => {
            let needle = needle.to_lowercase();
            columns.iter().any(|column| {
                row.get(*column)
                    .and_then(Value::as_str)
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
        }
    }
}

/// Nulls sort last ascending and first descending
fn compare_for_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
    }
}

fn sort_rows(rows: &mut [Row], order: &[Order]) {
    rows.sort_by(|a, b| {
        order
            .iter()
            .map(|o| {
                let ordering = compare_for_order(a.get(o.column), b.get(o.column));
                match o.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn select(&self, query: SelectQuery) -> StoreResult<Vec<Value>> {
        let tables = self.tables.read().await;
        let source = tables.get(query.table).map(Vec::as_slice).unwrap_or(&[]);

        let mut rows: Vec<Row> = Vec::new();
        for row in source {
            if !query.filters.iter().all(|predicate| matches(row, predicate)) {
                continue;
            }
            let mut row = row.clone();
            if self.embed(query.table, &mut row, &tables, &query) {
                rows.push(row);
            }
        }

        sort_rows(&mut rows, &query.order);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        if !query.columns.is_empty() {
            for row in rows.iter_mut() {
                row.retain(|key, _| {
                    query.columns.iter().any(|column| *column == key.as_str())
                        || query.relations.iter().any(|r| r.table == key.as_str())
                });
            }
        }

        Ok(rows.into_iter().map(Value::Object).collect())
    }

    async fn select_single(&self, query: SelectQuery) -> StoreResult<Value> {
        let mut rows = self.select(query).await?;
        match rows.len() {
            0 => Err(StoreError::NoRows),
            1 => Ok(rows.remove(0)),
            n => Err(StoreError::Backend {
                status: 406,
                code: None,
                message: format!("single row requested, {n} rows matched"),
            }),
        }
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Value> {
        let row = Self::with_generated_columns(row);
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        self.check_unique(table, rows, &row)?;
        rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        table: &str,
        filters: Vec<Predicate>,
        patch: Row,
    ) -> StoreResult<Vec<Value>> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if filters.iter().all(|predicate| matches(row, predicate)) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                updated.push(Value::Object(row.clone()));
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: Vec<Predicate>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|predicate| matches(row, predicate)));
        Ok((before - rows.len()) as u64)
    }
}

/// An object held by [`InMemoryObjectStorage`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub payload: Vec<u8>,
    pub options: UploadOptions,
}

#[derive(Debug, Clone)]
pub struct InMemoryObjectStorage {
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
    public_base_url: String,
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new("memory://storage")
    }
}

impl InMemoryObjectStorage {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            public_base_url: public_base_url.into(),
        }
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        let objects = self.objects.read().await;
        objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        payload: Vec<u8>,
        options: UploadOptions,
    ) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        let key = (bucket.to_string(), path.to_string());
        if !options.upsert && objects.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "object {bucket}/{path} already exists"
            )));
        }
        objects.insert(key, StoredObject { payload, options });
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: Vec<String>) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        for path in paths {
            objects.remove(&(bucket.to_string(), path));
        }
        Ok(())
    }
}
