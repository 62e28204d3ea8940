use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError, Weak},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-name mutual exclusion for volume creation.
///
/// An entry only lives as long as somebody holds or waits for its lock.
#[derive(Debug, Default)]
pub(crate) struct CreateLocks {
  entries: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl CreateLocks {
  pub(crate) fn new() -> Self {
    CreateLocks::default()
  }

  pub(crate) async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
    let mutex = {
      let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
      entries.retain(|_, entry| entry.strong_count() > 0);

      match entries.get(name).and_then(Weak::upgrade) {
        Some(mutex) => mutex,
        None => {
          let mutex = Arc::new(AsyncMutex::new(()));
          entries.insert(name.to_owned(), Arc::downgrade(&mutex));
          mutex
        }
      }
    };

    mutex.lock_owned().await
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.values().filter(|e| e.strong_count() > 0).count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn same_name_is_exclusive() {
    let locks = Arc::new(CreateLocks::new());
    let guard = locks.lock("pvc-1").await;

    let waiter = {
      let locks = locks.clone();
      tokio::spawn(async move {
        let _guard = locks.lock("pvc-1").await;
      })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(guard);
    waiter.await.unwrap();
  }

  #[tokio::test]
  async fn different_names_do_not_block() {
    let locks = CreateLocks::new();
    let _a = locks.lock("pvc-1").await;
    let _b = locks.lock("pvc-2").await;
    assert_eq!(locks.len(), 2);
  }

  #[tokio::test]
  async fn released_entries_are_dropped() {
    let locks = CreateLocks::new();
    drop(locks.lock("pvc-1").await);
    assert_eq!(locks.len(), 0);
  }
}
