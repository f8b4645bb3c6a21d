//! Snapshot fetch
//!
//! 并发请求合并为一次读取；结果按序号判定新旧，旧结果直接丢弃。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;
use shared::message::ChangeTable;
use shared::models::{Attendance, Branch, Member, Payment, Plan, ProfileRow, StaffMember};
use tokio::time::Instant;

use super::snapshot::{BaseData, Snapshot};
use super::{CacheInner, CacheState};
use crate::auth::AccountSession;
use crate::error::{CacheError, CacheResult};
use crate::store::{Query, RemoteStore, decode_rows};

pub(crate) type SharedFetch = Shared<BoxFuture<'static, CacheResult<Arc<Snapshot>>>>;

/// The one fetch currently running
pub(crate) struct InFlight {
    seq: u64,
    epoch: u64,
    fut: SharedFetch,
}

impl CacheInner {
    /// Fetch a snapshot, joining the running fetch if it started after `min_seq`.
    ///
    /// `min_seq = 0` joins any running fetch. Callers that need data newer than
    /// some event pass the sequence observed at that event.
    pub(crate) async fn fetch_after(self: &Arc<Self>, min_seq: u64) -> CacheResult<Arc<Snapshot>> {
        let (account, epoch) = self.session()?;

        let fut = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(running) if running.epoch == epoch && running.seq > min_seq => {
                    tracing::debug!(seq = running.seq, "Joining in-flight fetch");
                    running.fut.clone()
                }
                _ => {
                    let seq = self.next_seq();
                    self.state_tx.send_if_modified(|state| {
                        let next = state.on_fetch_start();
                        let changed = next != *state;
                        *state = next;
                        changed
                    });

                    let inner = Arc::clone(self);
                    let handle = tokio::spawn(async move { inner.run_fetch(account, epoch, seq).await });
                    let fut = async move {
                        handle
                            .await
                            .unwrap_or_else(|e| Err(CacheError::Internal(format!("fetch task failed: {e}"))))
                    }
                    .boxed()
                    .shared();

                    *slot = Some(InFlight {
                        seq,
                        epoch,
                        fut: fut.clone(),
                    });
                    fut
                }
            }
        };

        fut.await
    }

    async fn run_fetch(self: Arc<Self>, account: AccountSession, epoch: u64, seq: u64) -> CacheResult<Arc<Snapshot>> {
        let started = Instant::now();
        let result = load_base(self.store.as_ref(), &account.account_id, self.clock.now()).await;

        {
            let mut slot = self.in_flight.lock();
            if slot.as_ref().is_some_and(|running| running.seq == seq) {
                *slot = None;
            }
        }

        let mut core = self.core.lock();
        if !core.is_current(epoch) {
            tracing::debug!(seq, "Dropping fetch result for a closed session");
            return Err(CacheError::AuthRequired);
        }

        match result {
            Ok(mut base) => {
                core.last_fetch = Some(Instant::now());
                if seq <= core.authority {
                    tracing::debug!(seq, authority = core.authority, "Discarding stale fetch result");
                    // 读取期间已有确认写入，需再读一次；被更新的读取覆盖则无需
                    if seq <= core.write_authority {
                        tokio::spawn(Arc::clone(&self).follow_up(core.authority));
                    }
                } else {
                    if let Some(previous) = core.base.take() {
                        base.activity_log = previous.activity_log;
                    }
                    core.base = Some(base);
                    core.authority = seq;
                }

                let view = self.publish(&core);
                self.set_state(CacheState::Ready);
                match view {
                    Some(view) => {
                        tracing::debug!(
                            seq,
                            members = view.members.len(),
                            payments = view.payments.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Snapshot fetched"
                        );
                        Ok(view)
                    }
                    None => Err(CacheError::Internal("snapshot unavailable after fetch".into())),
                }
            }
            Err(err) => {
                let fallback = if core.base.is_some() {
                    CacheState::Ready
                } else {
                    CacheState::Error
                };
                self.set_state(fallback);
                drop(core);

                tracing::warn!(seq, code = ?err.code(), error = %err, "Snapshot fetch failed");
                self.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Fetch again after a stale result so the change that prompted it still lands
    fn follow_up(self: Arc<Self>, min_seq: u64) -> BoxFuture<'static, ()> {
        async move {
            if let Err(e) = self.fetch_after(min_seq).await {
                tracing::warn!(error = %e, "Follow-up fetch failed");
            }
        }
        .boxed()
    }
}

/// Read every collection for `account_id` in parallel
pub(crate) async fn load_base(store: &dyn RemoteStore, account_id: &str, now: DateTime<Utc>) -> CacheResult<BaseData> {
    let (profile, branches, members, payments, plans, staff, attendance) = tokio::try_join!(
        read::<ProfileRow>(store, ChangeTable::Users, account_id, None),
        read::<Branch>(store, ChangeTable::Branches, account_id, Some(("created_at", false))),
        read::<Member>(store, ChangeTable::Members, account_id, Some(("created_at", false))),
        read::<Payment>(store, ChangeTable::Payments, account_id, Some(("payment_date", false))),
        read::<Plan>(store, ChangeTable::Plans, account_id, Some(("duration", true))),
        read::<StaffMember>(store, ChangeTable::StaffMembers, account_id, Some(("created_at", false))),
        read::<Attendance>(store, ChangeTable::Attendance, account_id, Some(("check_in", false))),
    )?;

    Ok(BaseData {
        account_id: account_id.to_string(),
        profile_row: profile.into_iter().next(),
        branches,
        staff,
        members,
        payments,
        plans,
        attendance,
        activity_log: Vec::new(),
        fetched_at: now,
    })
}

async fn read<T: DeserializeOwned>(
    store: &dyn RemoteStore,
    table: ChangeTable,
    account_id: &str,
    order: Option<(&str, bool)>,
) -> CacheResult<Vec<T>> {
    let mut query = Query::new().eq(table.owner_column(), account_id);
    if let Some((column, ascending)) = order {
        query = query.order(column, ascending);
    }

    let rows = store.select(table.as_str(), query).await.map_err(|e| {
        tracing::warn!(table = %table, code = %e.code, error = %e.message, "Read failed");
        CacheError::remote_read(e)
    })?;
    decode_rows(rows).map_err(CacheError::remote_read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccountSession;
    use crate::cache::GymCache;
    use crate::clock::FixedClock;
    use crate::config::CacheConfig;
    use crate::error::StoreError;
    use crate::realtime::MemoryChangeFeed;
    use crate::store::{MemoryStore, StoreOp};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::time::Duration;

    fn setup() -> (GymCache, Arc<MemoryStore>) {
        let clock = Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let cache = GymCache::new(
            store.clone(),
            Arc::new(MemoryChangeFeed::new()),
            clock,
            CacheConfig::default(),
        );
        (cache, store)
    }

    fn seed_member(store: &MemoryStore, id: &str, owner: &str) {
        store.seed(
            "members",
            json!({"id": id, "user_id": owner, "name": id, "plan_duration": 1,
                   "joining_date": "2025-06-01", "expiry_date": "2025-07-01"}),
        );
    }

    #[tokio::test]
    async fn test_load_base_scopes_to_account() {
        let (_, store) = setup();
        seed_member(&store, "mine", "acc");
        seed_member(&store, "theirs", "other");
        store.seed("users", json!({"id": "acc", "gym_name": "Iron Temple"}));
        store.seed("branches", json!({"id": "b1", "owner_id": "acc", "name": "Main"}));

        let base = load_base(store.as_ref(), "acc", Utc::now()).await.unwrap();
        assert_eq!(base.members.len(), 1);
        assert_eq!(base.members[0].id, "mine");
        assert_eq!(base.profile_row.and_then(|p| p.gym_name).as_deref(), Some("Iron Temple"));
        assert_eq!(base.branches.len(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_maps_to_remote_read() {
        let (_, store) = setup();
        store.fail_next("payments", StoreOp::Select, StoreError::new("57014", "statement timeout"));
        let err = load_base(store.as_ref(), "acc", Utc::now()).await.unwrap_err();
        assert!(matches!(err, CacheError::RemoteRead { ref code, .. } if code == "57014"));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_read() {
        let (cache, store) = setup();
        seed_member(&store, "m1", "acc");
        cache.open(AccountSession::new("acc")).await.unwrap();
        let before = store.call_count("members", StoreOp::Select);

        store.set_latency(Duration::from_millis(50));
        let (a, b, c) = tokio::join!(cache.fetch_snapshot(), cache.fetch_snapshot(), cache.fetch_snapshot());
        assert_eq!(a.unwrap().revision, b.as_ref().unwrap().revision);
        assert_eq!(c.unwrap().members.len(), 1);
        assert_eq!(store.call_count("members", StoreOp::Select), before + 1);
        cache.close().await;
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let (cache, store) = setup();
        seed_member(&store, "m1", "acc");
        cache.open(AccountSession::new("acc")).await.unwrap();

        let inner = Arc::clone(&cache.inner);
        let (account, epoch) = inner.session().unwrap();
        let old_seq = inner.next_seq();
        // a newer authoritative write lands before the old read completes
        let newer = inner.next_seq();
        {
            let mut core = inner.core.lock();
            core.authority = newer;
            core.write_authority = newer;
        }

        seed_member(&store, "m2", "acc");
        let view = Arc::clone(&inner).run_fetch(account, epoch, old_seq).await.unwrap();
        assert_eq!(view.revision, newer);
        assert!(view.member("m2").is_none());

        // the follow-up read picks up m2
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.snapshot().unwrap().member("m2").is_some());
        cache.close().await;
    }

    #[tokio::test]
    async fn test_fetch_overtaken_by_newer_fetch_reads_once() {
        let (cache, store) = setup();
        seed_member(&store, "m1", "acc");
        cache.open(AccountSession::new("acc")).await.unwrap();

        let inner = Arc::clone(&cache.inner);
        let (account, epoch) = inner.session().unwrap();
        let old_seq = inner.next_seq();
        let newer = cache.fetch_snapshot().await.unwrap().revision;
        assert!(newer > old_seq);

        let before = store.call_count("members", StoreOp::Select);
        let view = Arc::clone(&inner).run_fetch(account, epoch, old_seq).await.unwrap();
        assert_eq!(view.revision, newer);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.call_count("members", StoreOp::Select), before + 1);
        cache.close().await;
    }

    #[tokio::test]
    async fn test_failed_first_load_enters_error_state() {
        let (cache, store) = setup();
        store.fail_next("plans", StoreOp::Select, StoreError::network("connection reset"));
        let mut notices = cache.subscribe_notices();

        let err = cache.open(AccountSession::new("acc")).await.unwrap_err();
        assert!(matches!(err, CacheError::RemoteRead { .. }));
        assert_eq!(cache.state(), CacheState::Error);
        assert!(notices.recv().await.unwrap().is_error());

        // retry recovers
        let view = cache.fetch_snapshot().await.unwrap();
        assert_eq!(view.members.len(), 0);
        assert_eq!(cache.state(), CacheState::Ready);
        cache.close().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let (cache, store) = setup();
        seed_member(&store, "m1", "acc");
        cache.open(AccountSession::new("acc")).await.unwrap();

        store.fail_next("members", StoreOp::Select, StoreError::network("connection reset"));
        assert!(cache.fetch_snapshot().await.is_err());
        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.snapshot().unwrap().members.len(), 1);
        cache.close().await;
    }
}
