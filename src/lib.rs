//! Event sourcing for Rust.
//!
//! Aggregates change only by emitting events. A [`Repository`] appends them
//! to an [`EventStore`] with an optimistic version check, rebuilds instances
//! from snapshots plus the events after them, and a background
//! [`Snapshotter`] keeps that replay short. Every append is fanned out to
//! [`Subscriber`]s.
//!
//! ```ignore
//! let store = EventStore::open("/var/lib/app/events.redb")?;
//! let restaurants = Repository::<Restaurant>::builder(store.clone())
//!     .snapshots(SnapshotSettings::every(50, Duration::from_secs(10)))
//!     .build()?;
//!
//! let created = restaurants.send(None, Create { name: "R".into(), menu })?;
//! restaurants.send(Some(&created.id), SelectMeal { person: "Tom".into(), meal: "A".into() })?;
//! ```

pub mod aggregate;
pub mod bus;
pub mod clock;
mod error;
pub mod lock;
pub mod registry;
pub mod repository;
pub mod snapshot;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

pub use aggregate::{
    Aggregate, Command, Handle, Handlers, PendingEvent, ReplayPolicy, Root, Snapshottable,
};
pub use bus::{Message, Publisher, Rule, Subscriber};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use registry::{Named, Payload, Registry};
pub use repository::{Listener, Locking, Replay, Repository, Response, SnapshotSettings};
pub use snapshot::{Pass, Snapshotter, SnapshotterStats, SnapshotterThread};
pub use store::{
    Event, EventStore, FileStorage, Header, MemoryStorage, Record, Snapshot, Storage, Stream,
};
