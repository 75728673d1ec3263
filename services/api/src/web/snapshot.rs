//! services/api/src/web/snapshot.rs
//!
//! The debounced snapshot writer. Navigation changes notify this task; it
//! waits for a quiet period and then persists the transient flow state, so a
//! burst of rapid changes coalesces into a single local write.

use crate::web::state::SessionState;
use arcana_core::ports::LocalStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How long the session must stay quiet before a snapshot is written.
pub const SNAPSHOT_QUIET_PERIOD: Duration = Duration::from_millis(800);

/// The long-running task backing the debounce. It resets its timer on every
/// notification and only writes after the quiet period elapses.
pub async fn snapshot_debounce_task(
    local: Arc<dyn LocalStore>,
    session_lock: Arc<Mutex<SessionState>>,
    notify: Arc<Notify>,
    cancellation_token: CancellationToken,
) {
    loop {
        // Wait for the first change since the last write.
        tokio::select! {
            _ = cancellation_token.cancelled() => return,
            _ = notify.notified() => {}
        }

        // Keep extending the quiet period while changes continue to arrive.
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => return,
                _ = notify.notified() => {}
                _ = tokio::time::sleep(SNAPSHOT_QUIET_PERIOD) => break,
            }
        }

        let (owner, snapshot) = {
            let session = session_lock.lock().await;
            (session.identity.owner_key(), session.snapshot())
        };
        if let Err(e) = local.save_snapshot(&owner, &snapshot) {
            warn!("Debounced snapshot write failed for {owner}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_core::domain::{DeviceRecord, Identity, UserProfile};
    use arcana_core::flow::ReadingSession;
    use arcana_core::ports::{LocalSnapshot, PortResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        saves: AtomicUsize,
    }

    impl LocalStore for CountingStore {
        fn load_snapshot(&self, _owner: &str) -> PortResult<Option<LocalSnapshot>> {
            Ok(None)
        }
        fn save_snapshot(&self, _owner: &str, _snapshot: &LocalSnapshot) -> PortResult<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn load_device(&self, _device_id: &str) -> PortResult<Option<DeviceRecord>> {
            Ok(None)
        }
        fn save_device(&self, _record: &DeviceRecord) -> PortResult<()> {
            Ok(())
        }
    }

    fn test_session() -> SessionState {
        SessionState {
            identity: Identity::Guest {
                device_id: "device-1".to_string(),
            },
            profile: UserProfile::default(),
            device: DeviceRecord::new("device-1"),
            flow: ReadingSession::default(),
            pending_images: HashMap::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_burst_of_changes_coalesces_into_one_write() {
        let store = Arc::new(CountingStore::default());
        let session_lock = Arc::new(Mutex::new(test_session()));
        let notify = Arc::new(Notify::new());
        let token = CancellationToken::new();

        let task = tokio::spawn(snapshot_debounce_task(
            store.clone() as Arc<dyn LocalStore>,
            session_lock,
            notify.clone(),
            token.clone(),
        ));

        // Five rapid changes, each inside the quiet period of the previous.
        for _ in 0..5 {
            notify.notify_one();
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        tokio::time::advance(SNAPSHOT_QUIET_PERIOD).await;
        tokio::task::yield_now().await;

        assert_eq!(store.saves.load(Ordering::SeqCst), 1);

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_each_get_a_write() {
        let store = Arc::new(CountingStore::default());
        let session_lock = Arc::new(Mutex::new(test_session()));
        let notify = Arc::new(Notify::new());
        let token = CancellationToken::new();

        let task = tokio::spawn(snapshot_debounce_task(
            store.clone() as Arc<dyn LocalStore>,
            session_lock,
            notify.clone(),
            token.clone(),
        ));

        for _ in 0..2 {
            notify.notify_one();
            tokio::time::advance(SNAPSHOT_QUIET_PERIOD * 2).await;
            tokio::task::yield_now().await;
        }

        assert_eq!(store.saves.load(Ordering::SeqCst), 2);

        token.cancel();
        task.await.unwrap();
    }
}
