//! In-memory [`RemoteStore`]
//!
//! Behaves like the hosted store closely enough to drive the cache in tests and
//! demos: generated ids and timestamps, equality filters, ordering, the
//! `check_in_by_qr` procedure and change events on an attached feed. Failures
//! and latency can be injected per table and operation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use shared::message::{ChangeEvent, ChangeOperation, ChangeTable};

use super::{CHECK_IN_BY_QR, Filter, Query, RemoteStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::realtime::MemoryChangeFeed;

/// Store operation kind, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
    Rpc,
}

#[derive(Debug)]
struct InjectedFailure {
    table: String,
    op: StoreOp,
    error: StoreError,
    /// `None` = fail until cleared
    remaining: Option<usize>,
}

pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failures: Mutex<Vec<InjectedFailure>>,
    calls: Mutex<HashMap<(String, StoreOp), usize>>,
    latency: Mutex<Duration>,
    last_ts: Mutex<Option<DateTime<Utc>>>,
    feed: Option<MemoryChangeFeed>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables: Vec<(String, usize)> = self
            .tables
            .lock()
            .iter()
            .map(|(name, rows)| (name.clone(), rows.len()))
            .collect();
        f.debug_struct("MemoryStore").field("tables", &tables).finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            latency: Mutex::new(Duration::ZERO),
            last_ts: Mutex::new(None),
            feed: None,
            clock,
        }
    }

    /// Publish change events for every write to `feed`
    pub fn with_feed(mut self, feed: MemoryChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    // ========== Test controls ==========

    /// Fail the next `op` on `table` once
    pub fn fail_next(&self, table: &str, op: StoreOp, error: StoreError) {
        self.failures.lock().push(InjectedFailure {
            table: table.to_string(),
            op,
            error,
            remaining: Some(1),
        });
    }

    /// Fail every `op` on `table` until [`clear_failures`](Self::clear_failures)
    pub fn fail_always(&self, table: &str, op: StoreOp, error: StoreError) {
        self.failures.lock().push(InjectedFailure {
            table: table.to_string(),
            op,
            error,
            remaining: None,
        });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Number of `op` calls made against `table`
    pub fn call_count(&self, table: &str, op: StoreOp) -> usize {
        self.calls
            .lock()
            .get(&(table.to_string(), op))
            .copied()
            .unwrap_or(0)
    }

    /// Insert a row directly, without latency, failures or change events
    pub fn seed(&self, table: &str, row: Value) -> Value {
        let row = self.prepare_insert(row);
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Current rows of `table`
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    // ========== Internals ==========

    async fn enter(&self, table: &str, op: StoreOp) -> StoreResult<()> {
        *self.calls.lock().entry((table.to_string(), op)).or_insert(0) += 1;

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.lock();
        let hit = failures
            .iter()
            .position(|f| f.op == op && f.table == table);
        if let Some(index) = hit {
            let error = failures[index].error.clone();
            if let Some(remaining) = failures[index].remaining.as_mut() {
                *remaining -= 1;
                if *remaining == 0 {
                    failures.remove(index);
                }
            }
            tracing::debug!(table, ?op, code = %error.code, "Injected store failure");
            return Err(error);
        }
        Ok(())
    }

    /// Strictly increasing timestamps so `created_at` ordering is deterministic
    fn next_timestamp(&self) -> String {
        let now = self.clock.now();
        let mut last = self.last_ts.lock();
        let ts = match *last {
            Some(prev) if prev >= now => prev + chrono::Duration::microseconds(1),
            _ => now,
        };
        *last = Some(ts);
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn prepare_insert(&self, mut row: Value) -> Value {
        if let Some(map) = row.as_object_mut() {
            if !map.get("id").is_some_and(|v| v.is_string()) {
                map.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
            }
            if !map.get("created_at").is_some_and(|v| v.is_string()) {
                map.insert("created_at".into(), Value::String(self.next_timestamp()));
            }
        }
        row
    }

    fn notify(&self, table: &str, operation: ChangeOperation, rows: &[Value]) {
        let (Some(feed), Some(table)) = (&self.feed, ChangeTable::from_name(table)) else {
            return;
        };
        for row in rows {
            if let Some(owner) = row.get(table.owner_column()).and_then(Value::as_str) {
                feed.publish(owner, ChangeEvent::new(table, operation));
            }
        }
    }

    fn check_in_by_qr(&self, args: &Value) -> StoreResult<Value> {
        let arg = |name: &str| args.get(name).and_then(Value::as_str).map(str::to_string);
        let (Some(account_id), Some(token)) = (arg("p_user_id"), arg("p_qr_token")) else {
            return Err(StoreError::new("22023", "p_user_id and p_qr_token are required"));
        };

        let today = self.clock.today();
        let offset = self.clock.offset();
        let mut tables = self.tables.lock();

        let member = tables.get("members").and_then(|rows| {
            rows.iter()
                .find(|m| {
                    m.get("user_id").and_then(Value::as_str) == Some(account_id.as_str())
                        && m.get("qr_token").and_then(Value::as_str) == Some(token.as_str())
                })
                .cloned()
        });
        let Some(member) = member else {
            return Ok(json!({"success": false, "error": "Member not found for this QR code"}));
        };

        let member_id = member.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let member_name = member.get("name").and_then(Value::as_str).unwrap_or_default().to_string();

        let expired = member
            .get("expiry_date")
            .and_then(Value::as_str)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .is_some_and(|expiry| expiry < today);
        if expired {
            return Ok(json!({"success": false, "error": format!("{member_name}'s membership has expired")}));
        }

        let already = tables.get("attendance").is_some_and(|rows| {
            rows.iter().any(|a| {
                a.get("member_id").and_then(Value::as_str) == Some(member_id.as_str())
                    && a.get("check_in")
                        .and_then(Value::as_str)
                        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                        .is_some_and(|ts| ts.with_timezone(&offset).date_naive() == today)
            })
        });
        if already {
            return Ok(json!({"success": false, "error": format!("{member_name} has already checked in today")}));
        }

        let mut row = Map::new();
        row.insert("user_id".into(), Value::String(account_id.clone()));
        row.insert("member_id".into(), Value::String(member_id.clone()));
        row.insert("member_name".into(), Value::String(member_name.clone()));
        row.insert(
            "check_in".into(),
            Value::String(self.clock.now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        row.insert("source".into(), Value::String("qr".into()));
        for (arg_name, column) in [("p_branch_id", "branch_id"), ("p_device_id", "device_id")] {
            if let Some(v) = arg(arg_name) {
                row.insert(column.into(), Value::String(v));
            }
        }
        let row = self.prepare_insert(Value::Object(row));
        tables.entry("attendance".into()).or_default().push(row.clone());
        drop(tables);

        self.notify("attendance", ChangeOperation::Insert, &[row]);
        Ok(json!({
            "success": true,
            "member": {"id": member_id, "name": member_name},
        }))
    }
}

/// Null / missing sorts after every value (Postgres `NULLS LAST` for ascending)
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, table: &str, query: Query) -> StoreResult<Vec<Value>> {
        self.enter(table, StoreOp::Select).await?;

        let mut rows: Vec<Value> = self
            .tables
            .lock()
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> StoreResult<Value> {
        self.enter(table, StoreOp::Insert).await?;
        if !row.is_object() {
            return Err(StoreError::new("22023", "insert payload must be an object"));
        }

        let row = self.prepare_insert(row);
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());

        self.notify(table, ChangeOperation::Insert, std::slice::from_ref(&row));
        Ok(row)
    }

    async fn update(&self, table: &str, filter: Filter, patch: Value) -> StoreResult<Vec<Value>> {
        self.enter(table, StoreOp::Update).await?;
        let Value::Object(patch) = patch else {
            return Err(StoreError::new("22023", "update payload must be an object"));
        };

        let stamp = self.next_timestamp();
        let mut updated = Vec::new();
        if let Some(rows) = self.tables.lock().get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                if let Some(map) = row.as_object_mut() {
                    for (k, v) in &patch {
                        map.insert(k.clone(), v.clone());
                    }
                    map.insert("updated_at".into(), Value::String(stamp.clone()));
                }
                updated.push(row.clone());
            }
        }

        self.notify(table, ChangeOperation::Update, &updated);
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: Filter) -> StoreResult<Vec<Value>> {
        self.enter(table, StoreOp::Delete).await?;

        let mut removed = Vec::new();
        if let Some(rows) = self.tables.lock().get_mut(table) {
            let (gone, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|r| filter.matches(r));
            *rows = kept;
            removed = gone;
        }

        self.notify(table, ChangeOperation::Delete, &removed);
        Ok(removed)
    }

    async fn rpc(&self, function: &str, args: Value) -> StoreResult<Value> {
        self.enter(function, StoreOp::Rpc).await?;
        match function {
            CHECK_IN_BY_QR => self.check_in_by_qr(&args),
            other => Err(StoreError::new(
                "PGRST202",
                format!("Could not find the function {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::realtime::ChangeFeed;
    use tokio::sync::broadcast::error::TryRecvError;

    fn store() -> (MemoryStore, MemoryChangeFeed) {
        let clock = Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()));
        let feed = MemoryChangeFeed::new();
        (MemoryStore::new(clock).with_feed(feed.clone()), feed)
    }

    #[tokio::test]
    async fn test_insert_generates_id_and_timestamp() {
        let (store, _) = store();
        let row = store
            .insert("plans", json!({"user_id": "acc", "name": "Monthly", "duration": 1}))
            .await
            .unwrap();
        assert!(row["id"].is_string());
        assert!(row["created_at"].as_str().unwrap().starts_with("2025-06-15T09:00:00"));
    }

    #[tokio::test]
    async fn test_select_filters_and_orders() {
        let (store, _) = store();
        for (name, duration, owner) in [("Year", 12, "acc"), ("Month", 1, "acc"), ("Other", 3, "x")] {
            store.seed("plans", json!({"user_id": owner, "name": name, "duration": duration}));
        }
        let rows = store
            .select("plans", Query::new().eq("user_id", "acc").order("duration", true))
            .await
            .unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Month", "Year"]);

        // newest first
        let rows = store
            .select("plans", Query::new().eq("user_id", "acc").order("created_at", false))
            .await
            .unwrap();
        assert_eq!(rows[0]["name"], "Month");
    }

    #[tokio::test]
    async fn test_writes_publish_scoped_events() {
        let (store, feed) = store();
        let mut rx = feed.subscribe("acc").await.unwrap();
        let mut other = feed.subscribe("other").await.unwrap();

        let row = store.insert("members", json!({"user_id": "acc", "name": "A"})).await.unwrap();
        let id = row["id"].as_str().unwrap().to_string();
        store
            .update("members", Filter::by_id(&id), json!({"name": "B"}))
            .await
            .unwrap();
        store.delete("members", Filter::by_id(&id)).await.unwrap();

        let ops: Vec<ChangeOperation> = (0..3).map(|_| rx.try_recv().unwrap().operation).collect();
        assert_eq!(
            ops,
            vec![ChangeOperation::Insert, ChangeOperation::Update, ChangeOperation::Delete]
        );
        assert!(matches!(other.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_delete_missing_returns_empty() {
        let (store, _) = store();
        let removed = store.delete("members", Filter::by_id("nope")).await.unwrap();
        assert!(removed.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let (store, _) = store();
        store.fail_next("payments", StoreOp::Insert, StoreError::new("23514", "check violation"));
        let err = store.insert("payments", json!({"user_id": "acc"})).await.unwrap_err();
        assert_eq!(err.code, "23514");
        assert!(store.insert("payments", json!({"user_id": "acc"})).await.is_ok());
        assert_eq!(store.call_count("payments", StoreOp::Insert), 2);
    }

    #[tokio::test]
    async fn test_check_in_by_qr() {
        let (store, _) = store();
        store.seed(
            "members",
            json!({"id": "m1", "user_id": "acc", "name": "Asha", "qr_token": "MDQR_1",
                   "expiry_date": "2025-07-01", "joining_date": "2025-06-01"}),
        );
        store.seed(
            "members",
            json!({"id": "m2", "user_id": "acc", "name": "Ravi", "qr_token": "MDQR_2",
                   "expiry_date": "2025-06-01", "joining_date": "2025-05-01"}),
        );
        let args = |token: &str| json!({"p_user_id": "acc", "p_qr_token": token, "p_branch_id": "b1", "p_device_id": "gate"});

        let ok = store.rpc(CHECK_IN_BY_QR, args("MDQR_1")).await.unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["member"]["name"], "Asha");
        assert_eq!(store.rows("attendance").len(), 1);
        assert_eq!(store.rows("attendance")[0]["device_id"], "gate");

        let again = store.rpc(CHECK_IN_BY_QR, args("MDQR_1")).await.unwrap();
        assert_eq!(again["success"], false);

        let expired = store.rpc(CHECK_IN_BY_QR, args("MDQR_2")).await.unwrap();
        assert_eq!(expired["success"], false);

        let unknown = store.rpc(CHECK_IN_BY_QR, args("MDQR_3")).await.unwrap();
        assert_eq!(unknown["success"], false);
        assert_eq!(store.rows("attendance").len(), 1);
    }
}
