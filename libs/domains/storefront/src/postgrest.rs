//! [`RemoteStore`] over the backend's PostgREST endpoint.

use async_trait::async_trait;
use core_config::BackendConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::query::{Direction, Order, Predicate};
use crate::store::{RemoteStore, SelectQuery, StoreError, StoreResult};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const NO_ROWS_CODE: &str = "PGRST116";
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl PostgrestStore {
    pub fn new(client: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            client,
            base_url: config.rest_url(),
            api_key: config.api_key.clone(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
    }

    async fn send(request: reqwest::RequestBuilder) -> StoreResult<Value> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            if text.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let text = response.text().await.unwrap_or_default();
        let body: PostgrestErrorBody = serde_json::from_str(&text).unwrap_or_default();
        Err(classify_error(status.as_u16(), body, text))
    }

    fn rows(value: Value) -> StoreResult<Vec<Value>> {
        match value {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::Decode(format!("expected an array of rows, got {other}"))),
        }
    }
}

fn classify_error(status: u16, body: PostgrestErrorBody, raw: String) -> StoreError {
    let code = body.code;
    let message = match (body.message, body.details) {
        (Some(message), Some(details)) => format!("{message} ({details})"),
        (Some(message), None) => message,
        (None, _) => raw,
    };

    if code.as_deref() == Some(NO_ROWS_CODE) {
        return StoreError::NoRows;
    }
    if status == 409 || code.as_deref() == Some(UNIQUE_VIOLATION_CODE) {
        return StoreError::Conflict(message);
    }

    warn!(status, code = ?code, message = %message, "PostgREST request failed");
    StoreError::Backend {
        status,
        code,
        message,
    }
}

/// Value as it appears after the operator in a filter parameter
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escape POSIX regex metacharacters so the term only matches literally.
/// `like` patterns are not usable here: the service rewrites `*` to `%`
/// inside them, even when quoted.
fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(
            ch,
            '\\' | '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Double-quote a value inside a logic tree such as `or=(..)`
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn filter_param(predicate: &Predicate) -> (String, String) {
    match predicate {
        Predicate::Eq(column, Value::Null) => (column.to_string(), "is.null".to_string()),
        Predicate::Eq(column, value) => (column.to_string(), format!("eq.{}", literal(value))),
        Predicate::Gte(column, value) => (column.to_string(), format!("gte.{}", literal(value))),
        Predicate::Lte(column, value) => (column.to_string(), format!("lte.{}", literal(value))),
        Predicate::AnyContains { columns, needle } => {
            let pattern = quote(&escape_regex(needle));
            let alternatives: Vec<String> = columns
                .iter()
                .map(|column| format!("{column}.imatch.{pattern}"))
                .collect();
            ("or".to_string(), format!("({})", alternatives.join(",")))
        }
    }
}

fn order_value(order: &Order) -> String {
    let direction = match order.direction {
        Direction::Ascending => "asc",
        Direction::Descending => "desc",
    };
    format!("{}.{}", order.column, direction)
}

/// Query-string parameters for a select, in a stable order
fn select_params(query: &SelectQuery) -> Vec<(String, String)> {
    let mut select = if query.columns.is_empty() {
        vec!["*".to_string()]
    } else {
        query.columns.iter().map(|c| c.to_string()).collect()
    };
    for relation in &query.relations {
        let join = if relation.inner { "!inner" } else { "" };
        select.push(format!("{}{}(*)", relation.table, join));
    }

    let mut params = vec![("select".to_string(), select.join(","))];

    for relation in &query.relations {
        if let Some((column, value)) = &relation.filter {
            let (_, condition) = filter_param(&Predicate::Eq(*column, value.clone()));
            params.push((format!("{}.{}", relation.table, column), condition));
        }
        if let Some(order) = &relation.order {
            params.push((format!("{}.order", relation.table), order_value(order)));
        }
    }

    params.extend(query.filters.iter().map(filter_param));

    if !query.order.is_empty() {
        let order: Vec<String> = query.order.iter().map(order_value).collect();
        params.push(("order".to_string(), order.join(",")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl RemoteStore for PostgrestStore {
    #[instrument(skip(self, query), fields(table = query.table))]
    async fn select(&self, query: SelectQuery) -> StoreResult<Vec<Value>> {
        let params = select_params(&query);
        debug!(?params, "select");
        let value = Self::send(self.request(reqwest::Method::GET, query.table).query(&params)).await?;
        Self::rows(value)
    }

    #[instrument(skip(self, query), fields(table = query.table))]
    async fn select_single(&self, query: SelectQuery) -> StoreResult<Value> {
        let params = select_params(&query);
        debug!(?params, "select single");
        Self::send(
            self.request(reqwest::Method::GET, query.table)
                .query(&params)
                .header("accept", SINGLE_OBJECT),
        )
        .await
    }

    #[instrument(skip(self, row))]
    async fn insert(&self, table: &str, row: Map<String, Value>) -> StoreResult<Value> {
        let value = Self::send(
            self.request(reqwest::Method::POST, table)
                .header("prefer", "return=representation")
                .json(&row),
        )
        .await?;

        Self::rows(value)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no representation".to_string()))
    }

    #[instrument(skip(self, filters, patch))]
    async fn update(
        &self,
        table: &str,
        filters: Vec<Predicate>,
        patch: Map<String, Value>,
    ) -> StoreResult<Vec<Value>> {
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let value = Self::send(
            self.request(reqwest::Method::PATCH, table)
                .query(&params)
                .header("prefer", "return=representation")
                .json(&patch),
        )
        .await?;
        Self::rows(value)
    }

    #[instrument(skip(self, filters))]
    async fn delete(&self, table: &str, filters: Vec<Predicate>) -> StoreResult<u64> {
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let value = Self::send(
            self.request(reqwest::Method::DELETE, table)
                .query(&params)
                .header("prefer", "return=representation"),
        )
        .await?;
        Ok(Self::rows(value)?.len() as u64)
    }
}
