use std::collections::HashMap;
use std::sync::Mutex;

use crate::aggregate::{Aggregate, Handle};
use crate::error::{Error, Result};

/// Identity map of saved instances. An id is written once and never replaced.
pub(crate) struct IdentityCache<A: Aggregate> {
    entries: Mutex<HashMap<String, Handle<A>>>,
}

impl<A: Aggregate> IdentityCache<A> {
    pub(crate) fn new() -> Self {
        IdentityCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, id: &str) -> Result<Option<Handle<A>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::LockPoisoned("identity cache read"))?;
        Ok(entries.get(id).cloned())
    }

    /// Keeps the first instance stored under `id`.
    pub(crate) fn insert(&self, id: &str, handle: &Handle<A>) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::LockPoisoned("identity cache write"))?;
        entries
            .entry(id.to_string())
            .or_insert_with(|| handle.clone());
        Ok(())
    }
}
