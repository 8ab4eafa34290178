//! Snapshot compaction.
//!
//! A pass asks the store for streams that are `frequency` or more events
//! ahead of their snapshot, rebuilds each one and stores a fresh snapshot at
//! the version it was rebuilt to. Loads then replay at most `frequency`
//! events past that snapshot, as long as passes keep up with writers.

mod thread;

pub use thread::{SnapshotterStats, SnapshotterThread};

use std::sync::Arc;

use tracing::{error, info};

use crate::aggregate::Aggregate;
use crate::error::{Error, Result};
use crate::repository::Core;
use crate::store::{Header, Snapshot};

/// Result of one compaction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub candidates: usize,
    pub taken: usize,
    pub failed: usize,
}

/// Compacts streams of aggregate `A`. Obtained from `Repository::snapshotter`.
pub struct Snapshotter<A: Aggregate> {
    core: Arc<Core<A>>,
    frequency: u64,
}

impl<A: Aggregate> Snapshotter<A> {
    pub(crate) fn new(core: Arc<Core<A>>, frequency: u64) -> Self {
        Snapshotter { core, frequency }
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Runs one pass. A failing stream is logged and skipped; only failing
    /// to list candidates fails the pass.
    pub fn run_once(&self) -> Result<Pass> {
        let candidates = self
            .core
            .store
            .candidates_for_snapshot(A::TYPE, self.frequency)?;
        let mut pass = Pass {
            candidates: candidates.len(),
            ..Pass::default()
        };

        for header in &candidates {
            match self.take(header) {
                Ok(_) => pass.taken += 1,
                Err(err) => {
                    pass.failed += 1;
                    error!(aggregate = A::TYPE, id = %header.id, %err, "snapshot failed");
                }
            }
        }

        if pass.candidates > 0 {
            info!(
                aggregate = A::TYPE,
                candidates = pass.candidates,
                taken = pass.taken,
                failed = pass.failed,
                "snapshot pass"
            );
        }
        Ok(pass)
    }

    fn take(&self, header: &Header) -> Result<Snapshot> {
        let codec = self
            .core
            .snapshots
            .as_ref()
            .ok_or_else(|| Error::Config(format!("{} has no snapshot codec", A::TYPE)))?;
        let (root, _) = self.core.rebuild(header)?;
        let data = codec.take(&root)?;
        self.core.store.put_snapshot(&header.id, header.version, &data)
    }
}
