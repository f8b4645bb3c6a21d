//! Reconciling data cache
//!
//! 账户级数据缓存：一次会话内持有一份快照，由两个入口修改：
//! - `fetch_snapshot`：从远端整体读取，替换基础数据
//! - `apply_mutation`：乐观写入，确认后合并，失败则回滚并重新读取
//!
//! 实时通知只触发合并后的重新读取，不携带行数据。

mod checkin;
mod fetch;
mod mutation;
mod pending;
mod resync;
mod snapshot;
mod state;

pub use checkin::CheckInResult;
pub use mutation::MutationOutcome;
pub use snapshot::{AttendanceStats, Snapshot};
pub use state::CacheState;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use shared::message::Notice;
use shared::models::MemberUpdate;
use shared::{CrudAction, GymIntent};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::auth::{AccountSession, AuthProvider};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::realtime::ChangeFeed;
use crate::store::RemoteStore;

use fetch::InFlight;
use pending::PendingWrites;
use resync::ResyncHandle;
use snapshot::BaseData;

#[derive(Debug, Clone)]
struct ActiveSession {
    account: AccountSession,
    epoch: u64,
}

/// Mutable cache state, guarded by one lock
#[derive(Debug, Default)]
struct Core {
    session: Option<ActiveSession>,
    base: Option<BaseData>,
    /// Sequence of the newest authoritative data merged into `base`.
    /// Fetch results with a lower sequence are stale.
    authority: u64,
    /// Sequence taken by the last confirmed write. A stale fetch only needs a
    /// follow-up when it lost to a write, not to a newer fetch.
    write_authority: u64,
    pending: PendingWrites,
    last_fetch: Option<Instant>,
}

impl Core {
    fn is_current(&self, epoch: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.epoch == epoch)
    }
}

pub(crate) struct CacheInner {
    store: Arc<dyn RemoteStore>,
    feed: Arc<dyn ChangeFeed>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    core: Mutex<Core>,
    /// Orders fetches and confirmed writes
    seq: AtomicU64,
    /// Bumped on every open/close; work from an older epoch is dropped
    epochs: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
    worker: Mutex<Option<ResyncHandle>>,
    /// Serializes open/close
    lifecycle: tokio::sync::Mutex<()>,
    state_tx: watch::Sender<CacheState>,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    notices: broadcast::Sender<Notice>,
}

impl CacheInner {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Signed-in account and its epoch
    fn session(&self) -> CacheResult<(AccountSession, u64)> {
        self.core
            .lock()
            .session
            .as_ref()
            .map(|s| (s.account.clone(), s.epoch))
            .ok_or(CacheError::AuthRequired)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.core.lock().is_current(epoch)
    }

    fn build_view(&self, core: &Core) -> Option<Arc<Snapshot>> {
        let session = core.session.as_ref()?;
        let base = core.base.as_ref()?;
        Some(Arc::new(Snapshot::build(
            base,
            &core.pending,
            session.account.identity(),
            self.clock.today(),
            self.clock.offset(),
            core.authority,
        )))
    }

    /// Rebuild the view and hand it to subscribers.
    ///
    /// Callers hold the core lock, so views go out in the order they were built.
    fn publish(&self, core: &Core) -> Option<Arc<Snapshot>> {
        let view = self.build_view(core);
        if view.is_some() || core.session.is_none() {
            self.snapshot_tx.send_replace(view.clone());
        }
        view
    }

    /// Current view, rebuilt first if the business date moved on since it was published
    fn roll_over_day(&self) -> Option<Arc<Snapshot>> {
        let current = self.snapshot_tx.borrow().clone();
        match current {
            Some(view) if view.today != self.clock.today() => {
                let core = self.core.lock();
                tracing::info!(
                    from = %view.today,
                    to = %self.clock.today(),
                    "Business date changed, rebuilding snapshot"
                );
                self.publish(&core)
            }
            other => other,
        }
    }

    fn set_state(&self, state: CacheState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn notify(&self, notice: Notice) {
        // 没有订阅者时丢弃
        let _ = self.notices.send(notice);
    }

    fn notify_error(&self, err: &CacheError) {
        self.notify(Notice::error(err.code(), err.user_message()));
    }

    /// Look something up in the published view
    fn view_lookup<T>(&self, f: impl FnOnce(&Snapshot) -> Option<T>) -> Option<T> {
        self.snapshot_tx.borrow().as_deref().and_then(f)
    }

    /// Drop the session: stop the resync worker, forget all data
    async fn teardown(&self) {
        self.epochs.fetch_add(1, Ordering::SeqCst);
        let closed = {
            let mut core = self.core.lock();
            let closed = core.session.take();
            core.base = None;
            core.pending.clear();
            core.last_fetch = None;
            closed
        };
        self.in_flight.lock().take();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.shutdown().await;
        }

        self.snapshot_tx.send_replace(None);
        self.set_state(CacheState::Unauthenticated);
        if let Some(session) = closed {
            tracing::info!(account_id = %session.account.account_id, epoch = session.epoch, "Cache session closed");
        }
    }
}

/// Account-scoped reconciling cache
///
/// Cheap to clone; all clones share one snapshot, one change subscription
/// and one in-flight fetch.
#[derive(Clone)]
pub struct GymCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for GymCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GymCache")
            .field("state", &self.state())
            .field("account_id", &self.account_id())
            .finish()
    }
}

impl GymCache {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        feed: Arc<dyn ChangeFeed>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(CacheState::Unauthenticated);
        let (snapshot_tx, _) = watch::channel(None);
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        Self {
            inner: Arc::new(CacheInner {
                store,
                feed,
                clock,
                config,
                core: Mutex::new(Core::default()),
                seq: AtomicU64::new(0),
                epochs: AtomicU64::new(0),
                in_flight: Mutex::new(None),
                worker: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
                state_tx,
                snapshot_tx,
                notices,
            }),
        }
    }

    // ========== Session lifecycle ==========

    /// Start a session for `account`: subscribe to its change feed and load
    /// the first snapshot.
    ///
    /// Opening the account that is already open returns the current snapshot.
    /// Opening a different account closes the previous session first.
    pub async fn open(&self, account: AccountSession) -> CacheResult<Arc<Snapshot>> {
        let inner = &self.inner;
        {
            let _guard = inner.lifecycle.lock().await;

            let open_account = inner.core.lock().session.as_ref().map(|s| s.account.account_id.clone());
            match open_account {
                Some(id) if id == account.account_id => {
                    if let Some(session) = inner.core.lock().session.as_mut() {
                        session.account = account;
                    }
                    if let Some(view) = self.snapshot() {
                        return Ok(view);
                    }
                }
                other => {
                    if other.is_some() {
                        inner.teardown().await;
                    }
                    self.start_session(account).await;
                }
            }
        }
        inner.fetch_after(0).await
    }

    async fn start_session(&self, account: AccountSession) {
        let inner = &self.inner;
        let epoch = inner.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        let account_id = account.account_id.clone();
        {
            let mut core = inner.core.lock();
            core.session = Some(ActiveSession { account, epoch });
            core.base = None;
            core.pending.clear();
            core.last_fetch = None;
        }
        inner.set_state(CacheState::Loading);
        tracing::info!(account_id = %account_id, epoch, "Cache session opened");

        match inner.feed.subscribe(&account_id).await {
            Ok(rx) => {
                let handle = ResyncHandle::spawn(
                    Arc::downgrade(inner),
                    rx,
                    epoch,
                    inner.config.min_refresh_interval,
                    inner.config.day_check_interval,
                );
                *inner.worker.lock() = Some(handle);
            }
            Err(e) => {
                // 无实时通知时缓存仍可用，只是不会自动刷新
                let err = CacheError::Subscription(e.message);
                tracing::warn!(account_id = %account_id, error = %err, "Change subscription failed");
                inner.notify_error(&err);
            }
        }
    }

    /// End the session: release the change subscription and clear all data
    pub async fn close(&self) {
        let _guard = self.inner.lifecycle.lock().await;
        self.inner.teardown().await;
    }

    /// Open and close sessions as `auth` signs in and out
    pub fn follow_auth(&self, auth: &dyn AuthProvider) -> JoinHandle<()> {
        let cache = self.clone();
        let mut rx = auth.watch();
        tokio::spawn(async move {
            loop {
                let session = rx.borrow_and_update().clone();
                match session {
                    Some(account) => {
                        if let Err(e) = cache.open(account).await {
                            tracing::warn!(error = %e, "Initial snapshot load failed");
                        }
                    }
                    None => cache.close().await,
                }
                if rx.changed().await.is_err() {
                    tracing::debug!("Auth provider dropped, no longer following sessions");
                    break;
                }
            }
        })
    }

    // ========== Reads ==========

    pub fn account_id(&self) -> Option<String> {
        self.inner
            .core
            .lock()
            .session
            .as_ref()
            .map(|s| s.account.account_id.clone())
    }

    pub fn state(&self) -> CacheState {
        *self.inner.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CacheState> {
        self.inner.state_tx.subscribe()
    }

    /// Current snapshot
    ///
    /// Derived fields are rebuilt first when the business date has moved on
    /// since the view was published.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.roll_over_day()
    }

    /// Follow published snapshots.
    ///
    /// The resync worker republishes when the business date changes, so
    /// receivers see new statuses and reminders within `day_check_interval`.
    pub fn watch_snapshot(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// User-facing success / error notices
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    pub fn pending_writes(&self) -> usize {
        self.inner.core.lock().pending.len()
    }

    // ========== Fetch ==========

    /// Read every collection for the account and replace the snapshot.
    ///
    /// Concurrent callers share one in-flight read.
    pub async fn fetch_snapshot(&self) -> CacheResult<Arc<Snapshot>> {
        self.inner.fetch_after(0).await
    }

    /// Fetch unless the last successful fetch is within the dedup interval
    pub async fn revalidate(&self) -> CacheResult<Arc<Snapshot>> {
        let fresh = self
            .inner
            .core
            .lock()
            .last_fetch
            .is_some_and(|at| at.elapsed() < self.inner.config.dedup_interval);
        if fresh && let Some(view) = self.snapshot() {
            return Ok(view);
        }
        self.fetch_snapshot().await
    }

    // ========== Writes ==========

    /// Apply a create/update/delete intent optimistically
    pub async fn apply_mutation(&self, intent: GymIntent) -> CacheResult<MutationOutcome> {
        self.inner.apply_mutation(intent).await
    }

    /// Restart a membership today for the member's current plan duration
    pub async fn renew_member(&self, member_id: &str) -> CacheResult<MutationOutcome> {
        let today = self.inner.clock.today();
        let Some(months) = self.inner.view_lookup(|s| s.member(member_id).map(|m| m.plan_duration)) else {
            let err = CacheError::NotFound {
                entity: "member",
                id: member_id.to_string(),
            };
            self.inner.notify_error(&err);
            return Err(err);
        };
        let patch = MemberUpdate {
            joining_date: Some(today),
            expiry_date: Some(shared::lifecycle::expiry_for(today, months)),
            ..Default::default()
        };
        self.apply_mutation(GymIntent::Member(CrudAction::Update {
            id: member_id.to_string(),
            data: patch,
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::realtime::MemoryChangeFeed;
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    fn cache() -> (GymCache, Arc<MemoryStore>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()));
        let feed = MemoryChangeFeed::new();
        let store = Arc::new(MemoryStore::new(clock.clone()).with_feed(feed.clone()));
        let cache = GymCache::new(store.clone(), Arc::new(feed), clock.clone(), CacheConfig::default());
        (cache, store, clock)
    }

    #[tokio::test]
    async fn test_reads_require_session() {
        let (cache, _, _) = cache();
        assert_eq!(cache.state(), CacheState::Unauthenticated);
        assert!(cache.snapshot().is_none());
        assert!(matches!(cache.fetch_snapshot().await, Err(CacheError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_snapshot_rebuilds_when_the_day_changes() {
        let (cache, store, clock) = cache();
        store.seed(
            "members",
            json!({"id": "m1", "user_id": "acc", "name": "Asha", "plan_duration": 1,
                   "joining_date": "2025-05-20", "expiry_date": "2025-06-20"}),
        );
        let first = cache.open(AccountSession::new("acc")).await.unwrap();
        assert_eq!(first.reminders.len(), 1);

        clock.advance(Duration::days(6));
        let later = cache.snapshot().unwrap();
        assert_eq!(later.today, NaiveDate::from_ymd_opt(2025, 6, 21).unwrap());
        assert!(later.reminders.is_empty());
        assert_eq!(
            later.member("m1").unwrap().status,
            shared::models::MemberStatus::Expired
        );
        cache.close().await;
    }

    #[tokio::test]
    async fn test_open_same_account_is_idempotent() {
        let (cache, store, _) = cache();
        cache.open(AccountSession::new("acc")).await.unwrap();
        let reads = store.call_count("members", crate::store::StoreOp::Select);
        cache.open(AccountSession::new("acc")).await.unwrap();
        assert_eq!(store.call_count("members", crate::store::StoreOp::Select), reads);
        cache.close().await;
    }
}
