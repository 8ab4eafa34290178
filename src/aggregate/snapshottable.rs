use super::{Aggregate, Root};
use crate::error::Result;
use crate::registry::{Named, Payload, Registry};

/// Opt-in trait for aggregates whose state can be captured and restored,
/// letting loads skip the events the snapshot already covers.
///
/// `restore_snapshot` must leave the state exactly as replaying every event
/// up to the snapshot version would.
pub trait Snapshottable: Aggregate {
    type Snapshot: Payload;

    fn take_snapshot(&self) -> Self::Snapshot;

    fn restore_snapshot(&mut self, snapshot: Self::Snapshot) -> Result<()>;
}

/// Type-erased snapshot hooks for one aggregate type.
///
/// Lets the repository and the snapshotter stay generic over any
/// [`Aggregate`] while only snapshottable ones carry a codec.
pub struct SnapshotCodec<A> {
    registry: Registry,
    name: &'static str,
    take: fn(&A, &Registry) -> Result<Vec<u8>>,
    restore: fn(&mut A, &Registry, &[u8]) -> Result<()>,
}

fn take<A: Snapshottable>(state: &A, registry: &Registry) -> Result<Vec<u8>> {
    registry.marshal(<A::Snapshot as Named>::NAME, &state.take_snapshot())
}

fn restore<A: Snapshottable>(state: &mut A, registry: &Registry, bytes: &[u8]) -> Result<()> {
    let snapshot = registry.unmarshal_as::<A::Snapshot>(bytes)?;
    state.restore_snapshot(snapshot)
}

impl<A: Aggregate> SnapshotCodec<A> {
    pub fn new() -> Result<Self>
    where
        A: Snapshottable,
    {
        let mut registry = Registry::new();
        registry.register::<A::Snapshot>()?;
        Ok(SnapshotCodec {
            registry,
            name: <A::Snapshot as Named>::NAME,
            take: take::<A>,
            restore: restore::<A>,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn take(&self, root: &Root<A>) -> Result<Vec<u8>> {
        (self.take)(root.state(), &self.registry)
    }

    /// Replaces the root's state with the snapshot and moves it to `version`.
    pub fn restore(&self, root: &mut Root<A>, version: u64, bytes: &[u8]) -> Result<()> {
        (self.restore)(root.state_mut(), &self.registry, bytes)?;
        root.set_version(version);
        Ok(())
    }
}
