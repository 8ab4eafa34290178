use std::sync::{Arc, Mutex, MutexGuard};

use super::{Aggregate, Command, Root};
use crate::error::{Error, Result};

/// Shared reference to a [`Root`].
///
/// Clones point at the same instance. Without the identity cache every load
/// hands out a new instance, so the caller is its only holder; with the cache
/// all holders of an id observe each other's saves.
pub struct Handle<A: Aggregate> {
    inner: Arc<Mutex<Root<A>>>,
}

impl<A: Aggregate> Clone for Handle<A> {
    fn clone(&self) -> Self {
        Handle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Aggregate> Handle<A> {
    pub fn new(root: Root<A>) -> Self {
        Handle {
            inner: Arc::new(Mutex::new(root)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Root<A>>> {
        self.inner
            .lock()
            .map_err(|_| Error::LockPoisoned("aggregate access"))
    }

    /// Dispatches `command` and returns how many events it buffered.
    pub fn dispatch<C: Command>(&self, command: C) -> Result<usize> {
        let mut root = self.lock()?;
        Ok(root.dispatch(command)?.len())
    }

    pub fn read<R>(&self, f: impl FnOnce(&Root<A>) -> R) -> Result<R> {
        let root = self.lock()?;
        Ok(f(&root))
    }

    pub fn id(&self) -> Result<String> {
        self.read(|root| root.id().to_string())
    }

    pub fn version(&self) -> Result<u64> {
        self.read(|root| root.version())
    }

    /// True when both handles point at the same instance.
    pub fn same(&self, other: &Handle<A>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A: Aggregate> From<Root<A>> for Handle<A> {
    fn from(root: Root<A>) -> Self {
        Handle::new(root)
    }
}
