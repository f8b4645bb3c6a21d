//! Resync worker
//!
//! 监听账户的变更通知，合并成一次重新读取：
//! - 第一条通知安排一次刷新，距上次刷新不少于 `min_interval`
//! - 刷新前到达的通知并入同一次刷新
//! - 刷新期间到达的通知安排下一次刷新，不会丢失
//! - 通道滞后（Lagged）视为有变更
//! - 定期检查业务日期，跨日后重新发布快照

use std::sync::Weak;
use std::time::Duration;

use shared::message::ChangeEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::CacheInner;

/// Running worker; shutting it down drops the change subscription
pub(crate) struct ResyncHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ResyncHandle {
    pub(crate) fn spawn(
        cache: Weak<CacheInner>,
        rx: broadcast::Receiver<ChangeEvent>,
        epoch: u64,
        min_interval: Duration,
        day_check: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let worker = ResyncWorker {
            cache,
            rx,
            epoch,
            min_interval,
            day_check,
            cancel: cancel.clone(),
        };
        Self {
            cancel,
            join: tokio::spawn(worker.run()),
        }
    }

    pub(crate) async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await
            && !e.is_cancelled()
        {
            tracing::warn!(error = %e, "Resync worker ended abnormally");
        }
    }
}

impl std::fmt::Debug for ResyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResyncHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

struct ResyncWorker {
    cache: Weak<CacheInner>,
    rx: broadcast::Receiver<ChangeEvent>,
    epoch: u64,
    min_interval: Duration,
    day_check: Duration,
    cancel: CancellationToken,
}

impl ResyncWorker {
    async fn run(mut self) {
        tracing::debug!(epoch = self.epoch, "Resync worker started");

        let mut deadline: Option<Instant> = None;
        let mut last_run: Option<Instant> = None;
        // fetch sequence observed at the newest event; a refresh must start after it
        let mut marker: u64 = 0;
        let day_check = self.day_check.max(Duration::from_millis(1));
        let mut day_tick = tokio::time::interval_at(Instant::now() + day_check, day_check);
        day_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = self.cancel.cancelled() => break,

                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    deadline = None;
                    last_run = Some(Instant::now());
                    if !self.refresh(marker).await {
                        break;
                    }
                }

                _ = day_tick.tick() => {
                    let Some(cache) = self.cache.upgrade() else { break };
                    if !cache.is_current(self.epoch) {
                        break;
                    }
                    cache.roll_over_day();
                }

                result = self.rx.recv() => match result {
                    Ok(event) => {
                        if !event.table.is_watched() {
                            continue;
                        }
                        tracing::debug!(%event, "Change notification");
                        let Some(seq) = self.current_seq() else { break };
                        marker = seq;
                        if deadline.is_none() {
                            deadline = Some(self.next_slot(last_run));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Change feed lagged, scheduling full refresh");
                        let Some(seq) = self.current_seq() else { break };
                        marker = seq;
                        if deadline.is_none() {
                            deadline = Some(self.next_slot(last_run));
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Change feed closed, stopping resync worker");
                        break;
                    }
                },
            }
        }

        tracing::debug!(epoch = self.epoch, "Resync worker stopped");
    }

    /// Earliest refresh time honouring the minimum interval
    fn next_slot(&self, last_run: Option<Instant>) -> Instant {
        let now = Instant::now();
        match last_run {
            Some(at) => (at + self.min_interval).max(now),
            None => now,
        }
    }

    fn current_seq(&self) -> Option<u64> {
        self.cache.upgrade().map(|cache| cache.current_seq())
    }

    /// Returns false once the cache or its session is gone
    async fn refresh(&self, marker: u64) -> bool {
        let Some(cache) = self.cache.upgrade() else {
            return false;
        };
        if !cache.is_current(self.epoch) {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            result = cache.fetch_after(marker) => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Resync fetch failed");
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_worker_stops_when_cache_is_dropped() {
        let (tx, rx) = broadcast::channel(8);
        let handle = ResyncHandle::spawn(Weak::new(), rx, 1, Duration::from_millis(10), Duration::from_secs(60));
        tx.send(ChangeEvent::new(
            shared::message::ChangeTable::Members,
            shared::message::ChangeOperation::Insert,
        ))
        .unwrap();
        // the upgrade fails on the first event, ending the loop
        tokio::time::timeout(Duration::from_secs(1), handle.join)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_releases_receiver() {
        let (tx, rx) = broadcast::channel::<ChangeEvent>(8);
        let handle = ResyncHandle::spawn(Weak::new(), rx, 1, Duration::from_millis(10), Duration::from_secs(60));
        assert_eq!(tx.receiver_count(), 1);
        handle.shutdown().await;
        assert_eq!(tx.receiver_count(), 0);
    }

    #[test]
    fn test_next_slot_respects_min_interval() {
        let (_, rx) = broadcast::channel(1);
        let worker = ResyncWorker {
            cache: Weak::new(),
            rx,
            epoch: 1,
            min_interval: Duration::from_secs(5),
            day_check: Duration::from_secs(60),
            cancel: CancellationToken::new(),
        };
        let now = Instant::now();
        assert!(worker.next_slot(None) <= Instant::now());
        assert!(worker.next_slot(Some(now)) >= now + Duration::from_secs(5));
    }
}
