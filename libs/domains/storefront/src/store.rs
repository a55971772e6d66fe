//! Contract for the remote relational store.
//!
//! Rows travel as JSON objects keyed by storage column names. Relation
//! embedding, predicates and ordering are described by [`SelectQuery`] and
//! executed by the store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::{Column, Directive, Order, Predicate};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached or no handle exists.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A single-row fetch matched nothing.
    #[error("no matching row")]
    NoRows,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error (status {status}{}): {message}", .code.as_deref().map(|c| format!(", code {c}")).unwrap_or_default())]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StoreError::Unavailable(err.to_string())
        } else if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Backend {
                status: err.status().map(|s| s.as_u16()).unwrap_or_default(),
                code: None,
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// A nested one-to-many relation to embed in each parent row
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSelect {
    /// Child table name; also the key the rows are embedded under
    pub table: &'static str,
    /// Only embed child rows where `column == value`
    pub filter: Option<(Column, Value)>,
    pub order: Option<Order>,
    /// Drop parent rows with no matching child rows
    pub inner: bool,
}

impl RelationSelect {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            filter: None,
            order: None,
            inner: false,
        }
    }

    pub fn only(mut self, column: Column, value: impl Into<Value>) -> Self {
        self.filter = Some((column, value.into()));
        self
    }

    pub fn ordered(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn inner(mut self) -> Self {
        self.inner = true;
        self
    }
}

/// A read against one table
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: &'static str,
    /// Projected columns; empty means all columns
    pub columns: Vec<Column>,
    pub relations: Vec<RelationSelect>,
    /// Conjunctive predicates
    pub filters: Vec<Predicate>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            relations: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[Column]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    pub fn relation(mut self, relation: RelationSelect) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Append builder output, preserving its order
    pub fn apply(mut self, directives: Vec<Directive>) -> Self {
        for directive in directives {
            match directive {
                Directive::Filter(predicate) => self.filters.push(predicate),
                Directive::Order(order) => self.order.push(order),
            }
        }
        self
    }
}

/// Remote relational store.
///
/// Implementations are long-lived and shared across tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, query: SelectQuery) -> StoreResult<Vec<Value>>;

    /// Exactly one row, or [`StoreError::NoRows`]
    async fn select_single(&self, query: SelectQuery) -> StoreResult<Value>;

    /// Insert one row and return it as stored (generated columns included)
    async fn insert(&self, table: &str, row: Map<String, Value>) -> StoreResult<Value>;

    /// Apply `patch` to every matching row and return the updated rows
    async fn update(
        &self,
        table: &str,
        filters: Vec<Predicate>,
        patch: Map<String, Value>,
    ) -> StoreResult<Vec<Value>>;

    /// Delete every matching row and return how many were removed
    async fn delete(&self, table: &str, filters: Vec<Predicate>) -> StoreResult<u64>;
}
