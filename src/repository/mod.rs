//! Loading and saving aggregates against an [`EventStore`](crate::EventStore).

mod builder;
mod cache;
mod listener;
mod rebuild;
mod repository;

pub use builder::{Locking, RepositoryBuilder, SnapshotSettings};
pub use listener::Listener;
pub use rebuild::Replay;
pub use repository::{Repository, Response};

pub(crate) use rebuild::Core;
