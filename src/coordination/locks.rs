use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-competition async lock registry.
///
/// Settlement writes a competition's participant aggregates and the
/// lifecycle pass flips its status; both hold the competition's lock so
/// the two passes never interleave writes for the same competition.
/// Locks are created on first use and kept for the process lifetime.
#[derive(Clone, Default)]
pub struct CompetitionLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CompetitionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one competition, waiting if another task
    /// holds it. The guard releases on drop.
    pub async fn acquire(&self, competition_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(competition_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_competition_serializes() {
        let locks = CompetitionLocks::new();
        let competition_id = Uuid::new_v4();
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(competition_id).await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn different_competitions_do_not_block() {
        let locks = CompetitionLocks::new();
        let first = locks.acquire(Uuid::new_v4()).await;

        // A second competition's lock is immediately available
        let second = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(Uuid::new_v4()),
        )
        .await;
        assert!(second.is_ok());

        drop(first);
        assert_eq!(locks.len(), 2);
    }
}
