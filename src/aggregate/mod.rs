mod handle;
mod handlers;
mod root;
mod snapshottable;

pub use handle::Handle;
pub use handlers::{Handlers, PendingEvent};
pub use root::Root;
pub use snapshottable::{SnapshotCodec, Snapshottable};

use crate::error::Result;
use crate::registry::Named;

/// Trait for domain state that is rebuilt from events.
///
/// The implementing type is plain state. Behaviour is wired once through
/// [`Aggregate::register`]: command handlers read the state and return new
/// events, event handlers are the only place the state changes.
pub trait Aggregate: Default + Send + Sync + 'static {
    /// Stream type recorded in every header of this aggregate.
    const TYPE: &'static str;

    fn register(handlers: &mut Handlers<Self>) -> Result<()>;
}

/// An intent to change an aggregate. Looked up by its [`Named::NAME`].
pub trait Command: Named + Send + 'static {}

impl<T> Command for T where T: Named + Send + 'static {}

/// What to do when replay meets an event no handler knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayPolicy {
    /// Log and skip the event. Lets older binaries read newer streams.
    #[default]
    Tolerant,
    /// Fail the apply with `UnregisteredType` or `MissingHandler`.
    Strict,
}
