use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use tradegenie_utils::time::now_unix_secs_f64;

use crate::store::{ConversationStore, SharedConversationStore};

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Drop every conversation older than `max_age`. Returns how many were removed.
pub fn cleanup_old_user_data(store: &mut ConversationStore, max_age: Duration) -> usize {
    cleanup_expired_at(store, now_unix_secs_f64(), max_age)
}

/// [`cleanup_old_user_data`] against an explicit clock.
pub fn cleanup_expired_at(store: &mut ConversationStore, now: f64, max_age: Duration) -> usize {
    let max_age_secs = max_age.as_secs_f64();

    // Collect first; the map cannot be mutated while it is iterated.
    let expired: Vec<u64> = store
        .iter()
        .filter(|(_, record)| record.age_secs(now).is_some_and(|age| age > max_age_secs))
        .map(|(user_id, _)| *user_id)
        .collect();

    for user_id in &expired {
        store.remove(user_id);
    }

    if expired.is_empty() {
        debug!(remaining = store.len(), "no expired conversation data");
    } else {
        info!(
            removed = expired.len(),
            remaining = store.len(),
            "cleaned up expired conversation data"
        );
    }

    expired.len()
}

/// Sweep `store` every `max_age`, holding the lock only for the sweep itself.
pub fn spawn_cleanup_task(store: SharedConversationStore, max_age: Duration) -> JoinHandle<()> {
    let period = max_age.max(MIN_SWEEP_PERIOD);

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing can be stale yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let mut guard = store.lock().await;
            cleanup_old_user_data(&mut guard, max_age);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tradegenie_utils::time::now_unix_secs_f64;

    use super::{cleanup_expired_at, cleanup_old_user_data, spawn_cleanup_task};
    use crate::model::conversation::ConversationRecord;
    use crate::store::{ConversationStore, shared_store};

    fn sample_store(now: f64) -> ConversationStore {
        ConversationStore::from([
            (1, ConversationRecord::started_at(now - 1000.0)),
            (2, ConversationRecord::started_at(now)),
            (3, ConversationRecord::default().with_field("other", 1)),
        ])
    }

    #[test]
    fn removes_only_stale_timestamped_entries() {
        let now = now_unix_secs_f64();
        let mut store = sample_store(now);

        let removed = cleanup_old_user_data(&mut store, Duration::from_secs(500));

        assert_eq!(removed, 1);
        assert_eq!(store, {
            let mut expected = sample_store(now);
            expected.remove(&1);
            expected
        });
    }

    #[test]
    fn entries_at_exactly_max_age_are_kept() {
        let mut store = ConversationStore::from([
            (10, ConversationRecord::started_at(1_000.0)),
            (11, ConversationRecord::started_at(999.5)),
        ]);

        assert_eq!(cleanup_expired_at(&mut store, 1_500.0, Duration::from_secs(500)), 1);
        assert!(store.contains_key(&10));
        assert!(!store.contains_key(&11));
    }

    #[test]
    fn sub_second_ages_are_not_truncated() {
        let mut store = ConversationStore::from([
            (20, ConversationRecord::started_at(1_000.25)),
            (21, ConversationRecord::started_at(1_000.75)),
        ]);

        // Ages 1.5s and 1.0s against a 1s limit.
        assert_eq!(cleanup_expired_at(&mut store, 1_001.75, Duration::from_secs(1)), 1);
        assert!(!store.contains_key(&20));
        assert!(store.contains_key(&21));
    }

    #[test]
    fn empty_store_is_a_no_op() {
        let mut store = ConversationStore::new();
        assert_eq!(cleanup_expired_at(&mut store, 1_000.0, Duration::from_secs(1)), 0);
    }

    #[tokio::test]
    async fn background_sweep_prunes_shared_store() {
        let store = shared_store();
        let now = now_unix_secs_f64();
        {
            let mut guard = store.lock().await;
            guard.insert(1, ConversationRecord::started_at(now - 100.0));
            guard.insert(2, ConversationRecord::started_at(now + 1_000.0));
            guard.insert(3, ConversationRecord::default());
        }

        let handle = spawn_cleanup_task(store.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        handle.abort();

        let guard = store.lock().await;
        let mut remaining: Vec<u64> = guard.keys().copied().collect();
        remaining.sort_unstable();
        assert_eq!(remaining, vec![2, 3]);
    }
}
