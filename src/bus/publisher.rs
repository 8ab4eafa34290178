use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use super::{Message, Subscriber, SubscriberId};
use crate::error::{Error, Result};
use crate::store::{Event, Header};

type Registry = BTreeMap<SubscriberId, Subscriber>;

/// Registry of subscribers. Publishing walks all of them under one lock.
///
/// A handler must not subscribe or unsubscribe from inside a delivery; the
/// registry lock is held for the whole fan-out. A panicking handler is
/// logged and skipped, the others still get the batch.
#[derive(Default)]
pub struct Publisher {
    subscribers: Mutex<Registry>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every update of the map is a single insert or remove, so a poisoned
    /// guard still holds a consistent registry.
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, subscriber: &Subscriber) -> Result<()> {
        let mut subscribers = self.registry();
        if subscribers.contains_key(&subscriber.id()) {
            return Err(Error::AlreadySubscribed);
        }
        subscribers.insert(subscriber.id(), subscriber.clone());
        debug!(total = subscribers.len(), "subscriber registered");
        Ok(())
    }

    pub fn unsubscribe(&self, subscriber: &Subscriber) -> Result<()> {
        let mut subscribers = self.registry();
        if subscribers.remove(&subscriber.id()).is_none() {
            return Err(Error::NotSubscribed);
        }
        debug!(total = subscribers.len(), "subscriber deregistered");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds one [`Message`] per event and hands the batch to every
    /// subscriber before returning.
    ///
    /// The events are already committed, so a failing handler never fails
    /// the append that triggered it.
    pub fn publish(&self, header: &Header, meta: &[u8], events: &[Event]) {
        if events.is_empty() {
            return;
        }
        let batch: Vec<Message> = events
            .iter()
            .map(|event| Message::new(header, meta, event))
            .collect();

        let subscribers = self.registry();
        for subscriber in subscribers.values() {
            match catch_unwind(AssertUnwindSafe(|| subscriber.deliver(&batch))) {
                Ok(delivered) => debug!(subscriber = ?subscriber.id(), delivered, "fan-out"),
                Err(_) => error!(
                    subscriber = ?subscriber.id(),
                    stream = %header.id,
                    version = header.version,
                    "subscriber panicked, batch skipped for it"
                ),
            }
        }
    }
}
