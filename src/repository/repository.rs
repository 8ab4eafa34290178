use std::sync::Arc;

use tracing::{debug, info};

use super::builder::IdGenerator;
use super::cache::IdentityCache;
use super::{Core, Listener, Locking, Replay, RepositoryBuilder};
use crate::aggregate::{Aggregate, Command, Handle, PendingEvent, Root};
use crate::error::Result;
use crate::lock::KeyLocks;
use crate::snapshot::{Snapshotter, SnapshotterStats, SnapshotterThread};
use crate::store::{Event, EventStore, Header, Record, Stream};

/// What `persist` did, handed to the unlocked half of a save.
enum Saved {
    Unchanged { id: String, version: u64 },
    Appended {
        header: Header,
        events: Vec<Event>,
        domain: Vec<PendingEvent>,
    },
}

/// Outcome of a save or a send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub id: String,
    pub version: u64,
    /// Events persisted by this call.
    pub events: usize,
}

/// Event-sourced repository for aggregate `A`.
///
/// `save` persists the pending events of an instance with an optimistic
/// version check; `load` rebuilds an instance from its snapshot and events.
pub struct Repository<A: Aggregate> {
    pub(super) core: Arc<Core<A>>,
    pub(super) cache: Option<IdentityCache<A>>,
    pub(super) listeners: Vec<Arc<dyn Listener>>,
    pub(super) ids: IdGenerator,
    pub(super) locking: Locking,
    pub(super) locks: KeyLocks,
    pub(super) frequency: Option<u64>,
    pub(super) worker: Option<SnapshotterThread>,
}

impl<A: Aggregate> Repository<A> {
    pub fn builder(store: EventStore) -> RepositoryBuilder<A> {
        RepositoryBuilder::new(store)
    }

    /// A repository with default settings: no cache, tolerant replay,
    /// optimistic locking, no snapshots.
    pub fn new(store: EventStore) -> Result<Self> {
        Self::builder(store).build()
    }

    pub fn store(&self) -> &EventStore {
        &self.core.store
    }

    /// A fresh instance; it gets an id on its first save.
    pub fn create(&self) -> Handle<A> {
        Handle::new(self.core.fresh())
    }

    /// A fresh instance that will be saved under `id`.
    pub fn create_with_id(&self, id: impl Into<String>) -> Handle<A> {
        Handle::new(self.core.fresh().at(id, 0))
    }

    // ========================================================================
    // save
    // ========================================================================

    /// Persists the pending events of `handle`.
    ///
    /// The storage append checks that the stored version still equals the
    /// instance's version; otherwise nothing is written and the error is
    /// [`Error::Conflict`](crate::Error::Conflict). On success the events are
    /// applied to the instance, which adopts the new id and version.
    pub fn save(&self, handle: &Handle<A>) -> Result<Response> {
        let mut root = handle.lock()?;
        let saved = self.persist(&mut root)?;
        drop(root);
        self.publish(handle, saved)
    }

    /// Appends the pending buffer of `root` and commits it. The caller holds
    /// the instance lock for the whole call.
    fn persist(&self, root: &mut Root<A>) -> Result<Saved> {
        if root.pending().is_empty() {
            return Ok(Saved::Unchanged {
                id: root.id().to_string(),
                version: root.version(),
            });
        }

        let stream = self.stream_of(root)?;
        let (header, events) = self.core.store.append(stream, Some(root.version()))?;
        let domain = root.commit(&header.id, header.version);
        debug!(
            aggregate = A::TYPE,
            id = %header.id,
            version = header.version,
            events = events.len(),
            "saved"
        );
        Ok(Saved::Appended {
            header,
            events,
            domain,
        })
    }

    /// Cache and listener side of a save, run after the instance lock is
    /// released.
    fn publish(&self, handle: &Handle<A>, saved: Saved) -> Result<Response> {
        let (header, events, domain) = match saved {
            Saved::Unchanged { id, version } => {
                return Ok(Response {
                    id,
                    version,
                    events: 0,
                })
            }
            Saved::Appended {
                header,
                events,
                domain,
            } => (header, events, domain),
        };

        if let Some(cache) = &self.cache {
            cache.insert(&header.id, handle)?;
        }
        for listener in &self.listeners {
            listener.saved(&header, &events, &domain);
        }

        Ok(Response {
            id: header.id,
            version: header.version,
            events: events.len(),
        })
    }

    fn stream_of(&self, root: &Root<A>) -> Result<Stream> {
        let id = if root.is_new() {
            (self.ids)()
        } else {
            root.id().to_string()
        };
        let registry = self.core.handlers.registry();

        let mut stream = Stream::new(id, A::TYPE);
        for event in root.pending() {
            stream.events.push(Record {
                id: String::new(),
                name: event.name().to_string(),
                data: registry.marshal(event.name(), event.value())?,
            });
        }
        Ok(stream)
    }

    // ========================================================================
    // load
    // ========================================================================

    pub fn load(&self, id: &str) -> Result<Handle<A>> {
        self.load_with_replay(id).map(|(handle, _)| handle)
    }

    /// Like [`load`](Self::load), also reporting how the instance was rebuilt.
    pub fn load_with_replay(&self, id: &str) -> Result<(Handle<A>, Replay)> {
        if let Some(cache) = &self.cache {
            if let Some(handle) = cache.get(id)? {
                return Ok((
                    handle,
                    Replay {
                        cached: true,
                        ..Replay::default()
                    },
                ));
            }
        }

        let header = self.core.store.header(id)?;
        let (root, replay) = self.core.rebuild(&header)?;
        debug!(
            aggregate = A::TYPE,
            id,
            version = header.version,
            snapshot = replay.snapshot_version,
            replayed = replay.events,
            "loaded"
        );
        Ok((Handle::new(root), replay))
    }

    // ========================================================================
    // send
    // ========================================================================

    /// Loads `id` (or creates a fresh instance for `None`), dispatches
    /// `command` and saves.
    ///
    /// The instance stays locked from dispatch to save. A failed save drops
    /// only the events this command produced; events other holders of a
    /// cached instance buffered before are kept.
    pub fn send<C: Command>(&self, id: Option<&str>, command: C) -> Result<Response> {
        let _guard = match (self.locking, id) {
            (Locking::Pessimistic, Some(id)) => Some(self.locks.acquire(id)?),
            _ => None,
        };

        let handle = match id {
            Some(id) => self.load(id)?,
            None => self.create(),
        };

        let mut root = handle.lock()?;
        let mark = root.pending().len();
        root.dispatch(command)?;
        let saved = match self.persist(&mut root) {
            Ok(saved) => saved,
            Err(err) => {
                root.truncate_pending(mark);
                return Err(err);
            }
        };
        drop(root);
        self.publish(&handle, saved)
    }

    // ========================================================================
    // snapshots
    // ========================================================================

    /// A snapshotter over this repository's store, when snapshots are enabled.
    pub fn snapshotter(&self) -> Option<Snapshotter<A>> {
        self.frequency
            .map(|frequency| Snapshotter::new(Arc::clone(&self.core), frequency))
    }

    /// Stops the background snapshotter, if one runs, and returns its stats.
    pub fn shutdown(mut self) -> Option<SnapshotterStats> {
        let stats = self.worker.take().map(SnapshotterThread::stop);
        if let Some(stats) = &stats {
            info!(aggregate = A::TYPE, passes = stats.passes, "snapshotter stopped");
        }
        stats
    }
}
