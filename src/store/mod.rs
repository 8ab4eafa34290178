//! The event log: storage backends and the [`EventStore`] front.

mod file;
mod memory;
mod model;
mod storage;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use model::{Event, Header, Record, Snapshot, Stream};
pub use storage::{version_key, Storage};

pub(crate) use model::base64_bytes;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::bus::{Publisher, Subscriber};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};

/// A [`Storage`] backend plus the fan-out that hears about every append.
///
/// Cheap to clone; clones share the backend and the subscriber registry.
#[derive(Clone)]
pub struct EventStore {
    storage: Arc<dyn Storage>,
    publisher: Arc<Publisher>,
    clock: Arc<dyn Clock>,
}

impl EventStore {
    pub fn new(storage: impl Storage + 'static) -> Self {
        EventStore {
            storage: Arc::new(storage),
            publisher: Arc::new(Publisher::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Opens (or creates) a redb file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(FileStorage::open(path)?))
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Appends a stream in one transaction, then fans the new events out.
    ///
    /// Records without an id get a fresh UUID. See [`Storage::append`] for
    /// the meaning of `expected`.
    pub fn append(&self, mut stream: Stream, expected: Option<u64>) -> Result<(Header, Vec<Event>)> {
        for record in stream.events.iter_mut().filter(|r| r.id.is_empty()) {
            record.id = uuid::Uuid::new_v4().to_string();
        }

        let (header, events) = self.storage.append(&stream, expected, self.clock.now())?;
        debug!(
            stream = %header.id,
            kind = %header.kind,
            version = header.version,
            events = events.len(),
            "appended"
        );

        self.publisher.publish(&header, &stream.meta, &events);
        Ok((header, events))
    }

    pub fn header(&self, id: &str) -> Result<Header> {
        self.storage
            .header(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn events_from(&self, id: &str, from: u64) -> Result<Vec<Event>> {
        self.storage.events_from(id, from)
    }

    /// Header and complete event list of a stream.
    pub fn stream(&self, id: &str) -> Result<(Header, Vec<Event>)> {
        let header = self.header(id)?;
        let mut events = self.storage.events_from(id, 0)?;
        events.retain(|event| event.version <= header.version);
        Ok((header, events))
    }

    pub fn snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        self.storage.snapshot(id)
    }

    pub fn put_snapshot(&self, id: &str, version: u64, data: &[u8]) -> Result<Snapshot> {
        self.storage.put_snapshot(id, version, data)
    }

    pub fn candidates_for_snapshot(&self, kind: &str, min_delta: u64) -> Result<Vec<Header>> {
        self.storage.candidates_for_snapshot(kind, min_delta)
    }

    pub fn subscribe(&self, subscriber: &Subscriber) -> Result<()> {
        self.publisher.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, subscriber: &Subscriber) -> Result<()> {
        self.publisher.unsubscribe(subscriber)
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("subscribers", &self.publisher.len())
            .finish_non_exhaustive()
    }
}
