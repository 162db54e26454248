//! Tracking of open client connections.

use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Open connection tasks keyed by a monotonically increasing id.
///
/// A task removes itself when its connection closes. Cloning is cheap and
/// all clones share the same set.
#[derive(Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    connections: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `connection` as a tracked task and return its id.
    pub fn spawn<F>(&self, connection: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        // The lock is held across spawn and insert so that the task cannot
        // deregister before it was registered.
        let mut connections = self.inner.connections.lock();
        let handle = tokio::spawn(async move {
            connection.await;
            inner.connections.lock().remove(&id);
            debug!("Connection {} closed", id);
        });
        connections.insert(id, handle);
        id
    }

    pub fn len(&self) -> usize {
        self.inner.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every tracked connection and wait until the tasks are gone.
    pub async fn destroy_all(&self) -> usize {
        let handles: Vec<(u64, JoinHandle<()>)> = self.inner.connections.lock().drain().collect();
        let count = handles.len();
        let pending = handles.into_iter().map(|(id, handle)| {
            handle.abort();
            async move {
                // Aborted tasks resolve with a cancellation error.
                let _ = handle.await;
                debug!("Connection {} destroyed", id);
            }
        });
        join_all(pending).await;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_finished_connection_deregisters() {
        let tracker = ConnectionTracker::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tracker.spawn(async move {
            let _ = rx.await;
        });
        assert_eq!(tracker.len(), 1);

        tx.send(()).unwrap();
        for _ in 0..100 {
            if tracker.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_all_aborts_pending() {
        let tracker = ConnectionTracker::new();
        for _ in 0..3 {
            tracker.spawn(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            });
        }
        assert_eq!(tracker.len(), 3);
        let destroyed = tokio::time::timeout(Duration::from_secs(1), tracker.destroy_all())
            .await
            .unwrap();
        assert_eq!(destroyed, 3);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let tracker = ConnectionTracker::new();
        let a = tracker.spawn(async {});
        let b = tracker.spawn(async {});
        assert!(b > a);
    }
}
