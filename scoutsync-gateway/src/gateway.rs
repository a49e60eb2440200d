//! The cache/store gateway.
//!
//! Every read and write flows through one `Gateway`, which hides remote
//! outages from its callers: reads fall back to the stale cache, writes
//! degrade to the queue and are replayed opportunistically. The whole of
//! every operation (marker check, cache file access, queue mutation, the
//! remote attempts in between) runs under a single async mutex so concurrent
//! connections never observe a partial update.

use crate::cache::{CacheDir, MARKER_FIELD};
use crate::error::GatewayError;
use crate::now_ms;
use crate::queue::{QueuedWrite, WriteQueue};
use crate::remote::{RemoteRecord, RemoteStore};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Retry budget for each remote operation.
    pub attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { attempts: 3 }
    }
}

impl GatewayConfig {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }
}

/// Outcome of a write. Both are success from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The remote store accepted the write.
    Acked,
    /// The remote store was unavailable; the write is queued for replay.
    Queued,
}

/// Result of a remote fetch after the retry budget.
enum Fetched<T> {
    Got(T),
    Absent,
    Unavailable,
}

struct Inner {
    cache: CacheDir,
    queue: WriteQueue,
}

/// Mediator between the local cache and the remote authoritative store.
pub struct Gateway {
    remote: Arc<dyn RemoteStore>,
    attempts: u32,
    inner: Mutex<Inner>,
}

impl Gateway {
    pub fn new(cache: CacheDir, remote: Arc<dyn RemoteStore>, config: GatewayConfig) -> Self {
        Self {
            remote,
            attempts: config.attempts.max(1),
            inner: Mutex::new(Inner {
                cache,
                queue: WriteQueue::new(),
            }),
        }
    }

    /// Reads a record, preferring fresh remote data but never failing a read
    /// the cache can serve.
    ///
    /// Cache miss: fetch from the remote; `None` if the record is absent or
    /// the remote stayed unavailable. Cache hit: check the remote freshness
    /// marker; refetch the body only if the marker is newer or could not be
    /// obtained, and fall back to the cached body if that refetch fails.
    pub async fn get(&self, location: &str, key: &str) -> Result<Option<Value>, GatewayError> {
        let inner = self.inner.lock().await;

        let Some(cached_marker) = inner.cache.marker(location, key) else {
            return match self.fetch_body(location, key).await {
                Fetched::Got(record) => {
                    inner.cache.write(location, key, &record.body)?;
                    Ok(Some(record.body))
                }
                Fetched::Absent => Ok(None),
                Fetched::Unavailable => {
                    tracing::warn!("get {}/{}: remote unavailable and no cached copy", location, key);
                    Ok(None)
                }
            };
        };

        let refetch = match self.fetch_marker(location, key).await {
            Fetched::Got(remote_marker) => remote_marker > cached_marker,
            // The remote answered but has no record; the cached copy is all
            // there is.
            Fetched::Absent => false,
            // Can't tell whether we are stale, so try for the body.
            Fetched::Unavailable => true,
        };

        if !refetch {
            return inner.cache.read(location, key);
        }

        match self.fetch_body(location, key).await {
            Fetched::Got(record) => {
                inner.cache.write(location, key, &record.body)?;
                Ok(Some(record.body))
            }
            Fetched::Absent | Fetched::Unavailable => {
                tracing::debug!("get {}/{}: serving stale cached copy", location, key);
                inner.cache.read(location, key)
            }
        }
    }

    /// Writes a record: stamp, push to the remote, cache on success, queue
    /// on failure. A successful push also drains the write queue.
    pub async fn put(
        &self,
        location: &str,
        key: &str,
        mut body: Value,
    ) -> Result<WriteOutcome, GatewayError> {
        let mut inner = self.inner.lock().await;

        if let Some(obj) = body.as_object_mut() {
            obj.insert(MARKER_FIELD.to_string(), Value::from(now_ms()));
        }

        if self.push_remote(location, key, &body).await {
            inner.cache.write(location, key, &body)?;
            self.drain(&mut inner).await?;
            Ok(WriteOutcome::Acked)
        } else {
            tracing::warn!("put {}/{}: remote unavailable, write queued", location, key);
            inner.queue.push(QueuedWrite {
                location: location.to_string(),
                key: key.to_string(),
                body,
            });
            Ok(WriteOutcome::Queued)
        }
    }

    /// Reads every cached record under a location, for the full-sync reply.
    pub async fn read_all(&self, location: &str) -> Result<Vec<Value>, GatewayError> {
        self.inner.lock().await.cache.read_all(location)
    }

    /// Number of writes waiting for replay.
    pub async fn queued_writes(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Replays the queue, each entry attempted once in FIFO order. Entries
    /// the remote still rejects stay queued for the next pass; no recursive
    /// re-drain is started for them.
    async fn drain(&self, inner: &mut Inner) -> Result<(), GatewayError> {
        if inner.queue.is_empty() {
            return Ok(());
        }

        let pass = inner.queue.take_all();
        tracing::info!("Draining {} queued write(s)", pass.len());

        let mut retained = Vec::new();
        for write in pass {
            match self.remote.put(&write.location, &write.key, &write.body).await {
                Ok(()) => {
                    inner.cache.write(&write.location, &write.key, &write.body)?;
                    tracing::info!("Drained queued write {}/{}", write.location, write.key);
                }
                Err(e) => {
                    tracing::warn!(
                        "Queued write {}/{} still failing: {}",
                        write.location,
                        write.key,
                        e
                    );
                    retained.push(write);
                }
            }
        }
        inner.queue.extend(retained);

        Ok(())
    }

    async fn push_remote(&self, location: &str, key: &str, body: &Value) -> bool {
        for attempt in 1..=self.attempts {
            match self.remote.put(location, key, body).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!(
                        "put {}/{} attempt {}/{} failed: {}",
                        location,
                        key,
                        attempt,
                        self.attempts,
                        e
                    );
                }
            }
        }
        false
    }

    async fn fetch_body(&self, location: &str, key: &str) -> Fetched<RemoteRecord> {
        for attempt in 1..=self.attempts {
            match self.remote.get(location, key).await {
                Ok(Some(record)) => return Fetched::Got(record),
                Ok(None) => return Fetched::Absent,
                Err(e) => {
                    tracing::warn!(
                        "get {}/{} attempt {}/{} failed: {}",
                        location,
                        key,
                        attempt,
                        self.attempts,
                        e
                    );
                }
            }
        }
        Fetched::Unavailable
    }

    async fn fetch_marker(&self, location: &str, key: &str) -> Fetched<i64> {
        for attempt in 1..=self.attempts {
            match self.remote.get_marker(location, key).await {
                Ok(Some(marker)) => return Fetched::Got(marker),
                Ok(None) => return Fetched::Absent,
                Err(e) => {
                    tracing::warn!(
                        "marker {}/{} attempt {}/{} failed: {}",
                        location,
                        key,
                        attempt,
                        self.attempts,
                        e
                    );
                }
            }
        }
        Fetched::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// In-memory remote with scriptable failures.
    ///
    /// `fail_gets`/`fail_markers` fail the next N calls of that operation;
    /// `put_script` holds explicit per-call outcomes for `put` (true =
    /// fail), falling back to success once exhausted.
    #[derive(Default)]
    struct FakeRemote {
        records: SyncMutex<HashMap<(String, String), Value>>,
        fail_gets: AtomicU32,
        fail_markers: AtomicU32,
        put_script: SyncMutex<std::collections::VecDeque<bool>>,
        get_count: AtomicU32,
        put_count: AtomicU32,
    }

    impl FakeRemote {
        fn fail_next(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }

        fn script_puts(&self, outcomes: impl IntoIterator<Item = bool>) {
            self.put_script.lock().extend(outcomes);
        }

        fn seed(&self, location: &str, key: &str, body: Value) {
            self.records
                .lock()
                .insert((location.to_string(), key.to_string()), body);
        }

        fn stored(&self, location: &str, key: &str) -> Option<Value> {
            self.records
                .lock()
                .get(&(location.to_string(), key.to_string()))
                .cloned()
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn get(
            &self,
            location: &str,
            key: &str,
        ) -> Result<Option<RemoteRecord>, RemoteError> {
            self.get_count.fetch_add(1, Ordering::SeqCst);
            if Self::fail_next(&self.fail_gets) {
                return Err(RemoteError::Unavailable("scripted failure".into()));
            }
            Ok(self.stored(location, key).map(|body| {
                let last_modified = body
                    .get(MARKER_FIELD)
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                RemoteRecord {
                    body,
                    last_modified,
                }
            }))
        }

        async fn get_marker(&self, location: &str, key: &str) -> Result<Option<i64>, RemoteError> {
            if Self::fail_next(&self.fail_markers) {
                return Err(RemoteError::Unavailable("scripted failure".into()));
            }
            Ok(self
                .stored(location, key)
                .map(|body| body.get(MARKER_FIELD).and_then(Value::as_i64).unwrap_or(0)))
        }

        async fn put(&self, location: &str, key: &str, body: &Value) -> Result<(), RemoteError> {
            self.put_count.fetch_add(1, Ordering::SeqCst);
            if self.put_script.lock().pop_front().unwrap_or(false) {
                return Err(RemoteError::Unavailable("scripted failure".into()));
            }
            self.seed(location, key, body.clone());
            Ok(())
        }
    }

    fn gateway_with(remote: Arc<FakeRemote>) -> (TempDir, Gateway) {
        let dir = TempDir::new().unwrap();
        let cache = CacheDir::open(dir.path()).unwrap();
        let gateway = Gateway::new(cache, remote, GatewayConfig::default());
        (dir, gateway)
    }

    #[tokio::test]
    async fn test_miss_fetches_and_caches() {
        let remote = Arc::new(FakeRemote::default());
        remote.seed("pit", "254", json!({"team": 254, "last_modified": 100i64}));
        let (_dir, gateway) = gateway_with(remote.clone());

        let body = gateway.get("pit", "254").await.unwrap().unwrap();
        assert_eq!(body["team"], 254);

        // Second read is served by the marker check, no body refetch
        let before = remote.get_count.load(Ordering::SeqCst);
        let again = gateway.get("pit", "254").await.unwrap().unwrap();
        assert_eq!(again["team"], 254);
        assert_eq!(remote.get_count.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_miss_with_remote_down() {
        let remote = Arc::new(FakeRemote::default());
        remote.fail_gets.store(u32::MAX, Ordering::SeqCst);
        let (_dir, gateway) = gateway_with(remote.clone());

        let result = gateway.get("pit", "254").await.unwrap();
        assert!(result.is_none());
        // Exactly the retry budget was spent
        assert_eq!(remote.get_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_miss_with_record_absent() {
        let remote = Arc::new(FakeRemote::default());
        let (_dir, gateway) = gateway_with(remote.clone());

        assert!(gateway.get("pit", "999").await.unwrap().is_none());
        // An affirmative "absent" answer is not retried
        assert_eq!(remote.get_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_fallback_when_remote_down() {
        let remote = Arc::new(FakeRemote::default());
        remote.seed("match", "1_254", json!({"score": 10, "last_modified": 100i64}));
        let (_dir, gateway) = gateway_with(remote.clone());

        // Populate the cache while the remote is up
        gateway.get("match", "1_254").await.unwrap();

        // Total outage: every marker and body attempt errors
        remote.fail_gets.store(u32::MAX, Ordering::SeqCst);
        remote.fail_markers.store(u32::MAX, Ordering::SeqCst);

        let body = gateway.get("match", "1_254").await.unwrap().unwrap();
        assert_eq!(body["score"], 10);
    }

    #[tokio::test]
    async fn test_newer_remote_marker_refetches() {
        let remote = Arc::new(FakeRemote::default());
        remote.seed("match", "1_254", json!({"score": 10, "last_modified": 100i64}));
        let (_dir, gateway) = gateway_with(remote.clone());

        gateway.get("match", "1_254").await.unwrap();

        // Remote copy moves ahead
        remote.seed("match", "1_254", json!({"score": 12, "last_modified": 200i64}));

        let body = gateway.get("match", "1_254").await.unwrap().unwrap();
        assert_eq!(body["score"], 12);

        // Cache was overwritten: read with the remote fully down
        remote.fail_gets.store(u32::MAX, Ordering::SeqCst);
        remote.fail_markers.store(u32::MAX, Ordering::SeqCst);
        let cached = gateway.get("match", "1_254").await.unwrap().unwrap();
        assert_eq!(cached["score"], 12);
    }

    #[tokio::test]
    async fn test_put_stamps_and_caches() {
        let remote = Arc::new(FakeRemote::default());
        let (_dir, gateway) = gateway_with(remote.clone());

        let outcome = gateway
            .put("pit", "254", json!({"team": 254, "drivetrain": "swerve"}))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Acked);

        let stored = remote.stored("pit", "254").unwrap();
        assert_eq!(stored["team"], 254);
        assert!(stored[MARKER_FIELD].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_put_queues_on_outage_and_drains_on_recovery() {
        let remote = Arc::new(FakeRemote::default());
        remote.script_puts([true, true, true]);
        let (_dir, gateway) = gateway_with(remote.clone());

        let outcome = gateway
            .put("match", "1_254", json!({"score": 10}))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Queued);
        assert_eq!(gateway.queued_writes().await, 1);
        // Exactly the retry budget was spent, and exactly one queue entry
        assert_eq!(remote.put_count.load(Ordering::SeqCst), 3);

        // Remote recovers; the next successful put drains the queue
        let outcome = gateway
            .put("match", "1_971", json!({"score": 7}))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Acked);
        assert_eq!(gateway.queued_writes().await, 0);

        let drained = remote.stored("match", "1_254").unwrap();
        assert_eq!(drained["score"], 10);
    }

    #[tokio::test]
    async fn test_put_retries_within_budget() {
        let remote = Arc::new(FakeRemote::default());
        // Fail twice, succeed on the third attempt of the same put
        remote.script_puts([true, true]);
        let (_dir, gateway) = gateway_with(remote.clone());

        let outcome = gateway
            .put("pit", "254", json!({"team": 254}))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Acked);
        assert_eq!(remote.put_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_drain_failure_keeps_entry_queued() {
        let remote = Arc::new(FakeRemote::default());
        remote.script_puts([true, true, true]);
        let (_dir, gateway) = gateway_with(remote.clone());

        // Queued after the 3-attempt budget
        gateway
            .put("match", "1_254", json!({"score": 10}))
            .await
            .unwrap();
        assert_eq!(gateway.queued_writes().await, 1);

        // Direct put of the next write succeeds; the single drain attempt
        // for the queued entry fails. The entry must stay queued, untouched.
        remote.script_puts([false, true]);
        let outcome = gateway
            .put("match", "1_971", json!({"score": 7}))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Acked);
        assert_eq!(gateway.queued_writes().await, 1);
        assert!(remote.stored("match", "1_254").is_none());

        // A later successful put finally drains it
        gateway
            .put("match", "2_118", json!({"score": 3}))
            .await
            .unwrap();
        assert_eq!(gateway.queued_writes().await, 0);
        assert_eq!(remote.stored("match", "1_254").unwrap()["score"], 10);
    }

    #[tokio::test]
    async fn test_read_all_serves_cache() {
        let remote = Arc::new(FakeRemote::default());
        let (_dir, gateway) = gateway_with(remote.clone());

        gateway.put("pit", "254", json!({"team": 254})).await.unwrap();
        gateway.put("pit", "971", json!({"team": 971})).await.unwrap();

        let all = gateway.read_all("pit").await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(gateway.read_all("feedback").await.unwrap().is_empty());
    }
}
