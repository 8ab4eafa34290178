//! Mutual exclusion per key, used by the pessimistic repository strategy.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, RwLock};

use crate::error::{Error, Result};

/// A lock that can be held across calls, unlike a `MutexGuard` tied to the
/// data it protects.
#[derive(Default)]
pub struct KeyLock {
    held: Mutex<bool>,
    wake: Condvar,
}

impl KeyLock {
    /// Blocks until the lock is free, then takes it.
    pub fn lock(&self) -> Result<()> {
        let mut held = self.held.lock().map_err(|_| Error::LockPoisoned("key lock"))?;
        while *held {
            held = self
                .wake
                .wait(held)
                .map_err(|_| Error::LockPoisoned("key lock"))?;
        }
        *held = true;
        Ok(())
    }

    pub fn try_lock(&self) -> Result<bool> {
        let mut held = self.held.lock().map_err(|_| Error::LockPoisoned("key lock"))?;
        if *held {
            return Ok(false);
        }
        *held = true;
        Ok(true)
    }

    pub fn unlock(&self) -> Result<()> {
        let mut held = self.held.lock().map_err(|_| Error::LockPoisoned("key unlock"))?;
        if *held {
            *held = false;
            self.wake.notify_one();
        }
        Ok(())
    }
}

/// Lazily created lock per key. Locks are kept for the life of the map.
#[derive(Default)]
pub struct KeyLocks {
    locks: RwLock<HashMap<String, Arc<KeyLock>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `key`; repeated calls return the same `Arc`.
    pub fn get(&self, key: &str) -> Result<Arc<KeyLock>> {
        {
            let locks = self.locks.read().map_err(|_| Error::LockPoisoned("lock map"))?;
            if let Some(lock) = locks.get(key) {
                return Ok(Arc::clone(lock));
            }
        }
        let mut locks = self.locks.write().map_err(|_| Error::LockPoisoned("lock map"))?;
        Ok(Arc::clone(locks.entry(key.to_string()).or_default()))
    }

    /// Takes the lock for `key` until the guard is dropped.
    pub fn acquire(&self, key: &str) -> Result<KeyGuard> {
        let lock = self.get(key)?;
        lock.lock()?;
        Ok(KeyGuard { lock })
    }
}

/// Releases its key lock on drop.
pub struct KeyGuard {
    lock: Arc<KeyLock>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        if let Err(err) = self.lock.unlock() {
            tracing::error!(%err, "releasing key lock failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn lock_and_try_lock() {
        let lock = KeyLock::default();
        assert!(lock.try_lock().unwrap());
        assert!(!lock.try_lock().unwrap());
        lock.unlock().unwrap();
        lock.lock().unwrap();
        assert!(!lock.try_lock().unwrap());
        lock.unlock().unwrap();
    }

    #[test]
    fn same_key_same_lock() {
        let locks = KeyLocks::new();
        let a = locks.get("r-1").unwrap();
        let b = locks.get("r-1").unwrap();
        let c = locks.get("r-2").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn guard_releases_on_drop() {
        let locks = KeyLocks::new();
        {
            let _guard = locks.acquire("r-1").unwrap();
            assert!(!locks.get("r-1").unwrap().try_lock().unwrap());
        }
        assert!(locks.get("r-1").unwrap().try_lock().unwrap());
    }

    #[test]
    fn guards_serialize_critical_sections() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                thread::spawn(move || {
                    let _guard = locks.acquire("hot").unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
