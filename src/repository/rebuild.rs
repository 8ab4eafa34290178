use std::sync::Arc;

use crate::aggregate::{Aggregate, Handlers, ReplayPolicy, Root, SnapshotCodec};
use crate::error::Result;
use crate::store::{EventStore, Header};

/// What a load had to do to rebuild an instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Replay {
    /// Version restored from a snapshot, 0 when replay started from scratch.
    pub snapshot_version: u64,
    /// Number of stored events replayed on top of it.
    pub events: usize,
    /// Served from the identity cache without touching storage.
    pub cached: bool,
}

/// The parts of a repository the snapshotter shares: store, handler tables
/// and the rebuild path.
pub(crate) struct Core<A: Aggregate> {
    pub(crate) store: EventStore,
    pub(crate) handlers: Arc<Handlers<A>>,
    pub(crate) policy: ReplayPolicy,
    pub(crate) snapshots: Option<SnapshotCodec<A>>,
}

impl<A: Aggregate> Core<A> {
    pub(crate) fn fresh(&self) -> Root<A> {
        Root::with_handlers(Arc::clone(&self.handlers), self.policy)
    }

    /// Rebuilds the instance described by `header`: latest snapshot first
    /// (when snapshots are enabled), then the events after it up to
    /// `header.version`.
    pub(crate) fn rebuild(&self, header: &Header) -> Result<(Root<A>, Replay)> {
        let mut root = self.fresh().at(header.id.as_str(), 0);
        let mut replay = Replay::default();

        if let Some(codec) = &self.snapshots {
            if let Some(snapshot) = self.store.snapshot(&header.id)? {
                if snapshot.version > 0 && snapshot.version <= header.version {
                    codec.restore(&mut root, snapshot.version, &snapshot.data)?;
                    replay.snapshot_version = snapshot.version;
                }
            }
        }

        let events = self.store.events_from(&header.id, replay.snapshot_version)?;
        for event in events.iter().take_while(|e| e.version <= header.version) {
            root.replay(event)?;
            replay.events += 1;
        }
        root.set_version(header.version);

        Ok((root, replay))
    }
}
