use std::sync::Arc;
use std::time::Duration;

use super::cache::IdentityCache;
use super::{Core, Listener, Repository};
use crate::aggregate::{Aggregate, Handlers, ReplayPolicy, SnapshotCodec, Snapshottable};
use crate::error::{Error, Result};
use crate::lock::KeyLocks;
use crate::snapshot::{Snapshotter, SnapshotterThread};
use crate::store::EventStore;

/// How `Repository::send` guards the load-dispatch-save span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locking {
    /// Rely on the version check inside the storage append.
    #[default]
    Optimistic,
    /// Additionally hold a per-id lock, so concurrent sends on one id queue
    /// instead of conflicting.
    Pessimistic,
}

/// Snapshot compaction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSettings {
    /// Minimum number of unsnapshotted events before a stream is compacted.
    pub frequency: u64,
    /// Pause between background passes. `None` runs no background thread;
    /// passes are then triggered through `Repository::snapshotter`.
    pub interval: Option<Duration>,
}

impl SnapshotSettings {
    pub fn every(frequency: u64, interval: Duration) -> Self {
        SnapshotSettings {
            frequency,
            interval: Some(interval),
        }
    }

    pub fn manual(frequency: u64) -> Self {
        SnapshotSettings {
            frequency,
            interval: None,
        }
    }
}

pub(crate) type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

type CodecFactory<A> = fn() -> Result<SnapshotCodec<A>>;

/// Configures a [`Repository`].
///
/// ```ignore
/// let repo = Repository::<Restaurant>::builder(store)
///     .cache(true)
///     .replay(ReplayPolicy::Strict)
///     .snapshots(SnapshotSettings::every(10, Duration::from_secs(5)))
///     .build()?;
/// ```
pub struct RepositoryBuilder<A: Aggregate> {
    store: EventStore,
    cache: bool,
    policy: ReplayPolicy,
    locking: Locking,
    listeners: Vec<Arc<dyn Listener>>,
    ids: Option<IdGenerator>,
    snapshots: Option<(SnapshotSettings, CodecFactory<A>)>,
}

impl<A: Aggregate> RepositoryBuilder<A> {
    pub(crate) fn new(store: EventStore) -> Self {
        RepositoryBuilder {
            store,
            cache: false,
            policy: ReplayPolicy::default(),
            locking: Locking::default(),
            listeners: Vec::new(),
            ids: None,
            snapshots: None,
        }
    }

    /// Share saved instances by id instead of rebuilding them on load.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn replay(mut self, policy: ReplayPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn locking(mut self, locking: Locking) -> Self {
        self.locking = locking;
        self
    }

    pub fn listener(mut self, listener: impl Listener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Id generator for fresh aggregates. Defaults to UUID v4.
    pub fn ids(mut self, ids: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    pub fn build(self) -> Result<Repository<A>> {
        let handlers = Arc::new(Handlers::<A>::build()?);

        let (settings, codec) = match self.snapshots {
            Some((settings, factory)) => {
                if settings.frequency == 0 {
                    return Err(Error::Config("snapshot frequency must be at least 1".into()));
                }
                (Some(settings), Some(factory()?))
            }
            None => (None, None),
        };

        let core = Arc::new(Core {
            store: self.store,
            handlers,
            policy: self.policy,
            snapshots: codec,
        });

        let worker = match settings {
            Some(SnapshotSettings {
                frequency,
                interval: Some(interval),
            }) => Some(SnapshotterThread::spawn(
                Snapshotter::new(Arc::clone(&core), frequency),
                interval,
            )),
            _ => None,
        };

        Ok(Repository {
            core,
            cache: self.cache.then(IdentityCache::new),
            listeners: self.listeners,
            ids: self
                .ids
                .unwrap_or_else(|| Arc::new(|| uuid::Uuid::new_v4().to_string())),
            locking: self.locking,
            locks: KeyLocks::new(),
            frequency: settings.map(|s| s.frequency),
            worker,
        })
    }
}

impl<A: Snapshottable> RepositoryBuilder<A> {
    /// Enables snapshot-aware loads and the compactor.
    pub fn snapshots(mut self, settings: SnapshotSettings) -> Self {
        self.snapshots = Some((settings, SnapshotCodec::<A>::new));
        self
    }
}
