//! Named async locks serializing operations on a shared parent resource

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Default)]
pub struct NameLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Held for the duration of an operation; dropping it releases the name
#[derive(Debug)]
pub struct NameLockGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for NameLockGuard {
    fn drop(&mut self) {
        self.guard.take();

        // Waiters clone the entry under the map lock, so a count of one means
        // nobody else is queued for this name.
        let mut locks = lock_map(&self.locks);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
        debug!("Released lock {}", self.key);
    }
}

fn lock_map(locks: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    match locks.lock() {
        Ok(locks) => locks,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `(kind, name)` remains
    pub async fn by_name(&self, name: &str, kind: &str) -> NameLockGuard {
        let key = format!("{}.{}", kind, name);
        let lock = lock_map(&self.locks).entry(key.clone()).or_default().clone();

        debug!("Waiting for lock {}", key);
        let guard = lock.lock_owned().await;
        debug!("Acquired lock {}", key);

        NameLockGuard {
            key,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn same_name_is_serialized() {
        let locks = Arc::new(NameLocks::new());
        let first = locks.by_name("ns1", "azurerm_servicebus_namespace").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _second = locks.by_name("ns1", "azurerm_servicebus_namespace").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("second holder should acquire the lock")
            .unwrap();
    }

    #[tokio::test]
    async fn different_names_do_not_block() {
        let locks = NameLocks::new();
        let _a = locks.by_name("ns1", "azurerm_servicebus_namespace").await;
        let _b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.by_name("ns2", "azurerm_servicebus_namespace"),
        )
        .await
        .expect("a different name should not wait");
        let _c = tokio::time::timeout(
            Duration::from_millis(100),
            locks.by_name("ns1", "azurerm_api_management"),
        )
        .await
        .expect("a different kind should not wait");
    }

    #[test]
    fn waiter_is_woken_on_release() {
        let locks = NameLocks::new();
        let first = task::spawn(locks.by_name("ns1", "azurerm_servicebus_namespace")).poll();
        let first = assert_ready!(first);

        let mut second = task::spawn(locks.by_name("ns1", "azurerm_servicebus_namespace"));
        assert_pending!(second.poll());

        drop(first);
        assert!(second.is_woken());
        let _second = assert_ready!(second.poll());
    }

    #[tokio::test]
    async fn released_names_are_forgotten() {
        let locks = NameLocks::new();
        let first = locks.by_name("ns1", "azurerm_servicebus_namespace").await;
        let other = locks.by_name("ns2", "azurerm_servicebus_namespace").await;
        assert_eq!(lock_map(&locks.locks).len(), 2);

        drop(first);
        assert!(!lock_map(&locks.locks).contains_key("azurerm_servicebus_namespace.ns1"));
        assert_eq!(lock_map(&locks.locks).len(), 1);

        drop(other);
        assert!(lock_map(&locks.locks).is_empty());
    }

    #[test]
    fn queued_waiter_keeps_the_entry() {
        let locks = NameLocks::new();
        let first = task::spawn(locks.by_name("ns1", "azurerm_servicebus_namespace")).poll();
        let first = assert_ready!(first);

        let mut second = task::spawn(locks.by_name("ns1", "azurerm_servicebus_namespace"));
        assert_pending!(second.poll());

        drop(first);
        assert_eq!(lock_map(&locks.locks).len(), 1);

        let second = assert_ready!(second.poll());
        drop(second);
        assert!(lock_map(&locks.locks).is_empty());
    }
}
