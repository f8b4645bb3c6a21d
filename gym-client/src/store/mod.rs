//! Remote data store seam
//!
//! Table-scoped select/insert/update/delete with equality filters, plus
//! stored procedures. Rows travel as JSON; typed decoding happens at the
//! cache boundary.

mod http;
mod memory;

pub use http::RestStore;
pub use memory::{MemoryStore, StoreOp};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Stored procedure that validates a member QR token and records attendance
pub const CHECK_IN_BY_QR: &str = "check_in_by_qr";

/// Equality filter list: `column = value` for every entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub eq: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.eq.push((column.into(), value.into()));
        self
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().eq("id", id)
    }

    /// Whether `row` satisfies every condition
    pub fn matches(&self, row: &Value) -> bool {
        self.eq.iter().all(|(column, expected)| match row.get(column) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        })
    }
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Select query: filter plus optional ordering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filter: Filter,
    pub order: Option<Order>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = self.filter.eq(column, value);
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    async fn select(&self, table: &str, query: Query) -> StoreResult<Vec<Value>>;

    /// Insert one row and return it as stored (with generated columns)
    async fn insert(&self, table: &str, row: Value) -> StoreResult<Value>;

    /// Patch every matching row; returns the updated rows
    async fn update(&self, table: &str, filter: Filter, patch: Value) -> StoreResult<Vec<Value>>;

    /// Delete every matching row; returns the deleted rows
    async fn delete(&self, table: &str, filter: Filter) -> StoreResult<Vec<Value>>;

    /// Call a stored procedure
    async fn rpc(&self, function: &str, args: Value) -> StoreResult<Value>;
}

// ========== Typed helpers ==========

pub(crate) fn decode<T: DeserializeOwned>(row: Value) -> StoreResult<T> {
    serde_json::from_value(row).map_err(StoreError::decode)
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> StoreResult<Vec<T>> {
    rows.into_iter().map(decode).collect()
}

/// Serialize a payload and stamp it with the owning account
pub(crate) fn owned_row<T: Serialize>(payload: &T, owner_column: &str, account_id: &str) -> StoreResult<Value> {
    let mut row = serde_json::to_value(payload).map_err(StoreError::decode)?;
    match row.as_object_mut() {
        Some(map) => {
            map.insert(owner_column.to_string(), Value::String(account_id.to_string()));
            Ok(row)
        }
        None => Err(StoreError::new(StoreError::DECODE, "row payload must be an object")),
    }
}
