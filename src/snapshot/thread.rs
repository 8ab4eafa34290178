use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::error;

use super::Snapshotter;
use crate::aggregate::Aggregate;

/// Statistics from the snapshotter thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotterStats {
    pub passes: usize,
    pub taken: usize,
    pub failed: usize,
}

/// Runs a [`Snapshotter`] pass every `interval` on a background thread.
///
/// ```ignore
/// let worker = SnapshotterThread::spawn(repo.snapshotter().unwrap(), Duration::from_secs(5));
/// // ...
/// let stats = worker.stop();
/// ```
pub struct SnapshotterThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<SnapshotterStats>>,
}

impl SnapshotterThread {
    pub fn spawn<A: Aggregate>(snapshotter: Snapshotter<A>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = SnapshotterStats::default();
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                stats.passes += 1;
                match snapshotter.run_once() {
                    Ok(pass) => {
                        stats.taken += pass.taken;
                        stats.failed += pass.failed;
                    }
                    Err(err) => {
                        error!(aggregate = A::TYPE, %err, "listing snapshot candidates failed")
                    }
                }
            }
            stats
        });

        SnapshotterThread {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stops the thread and waits for the running pass to finish.
    pub fn stop(mut self) -> SnapshotterStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => SnapshotterStats::default(),
        }
    }
}

impl Drop for SnapshotterThread {
    fn drop(&mut self) {
        // Signal only; the thread exits after its current pass.
        let _ = self.stop_tx.send(());
    }
}
