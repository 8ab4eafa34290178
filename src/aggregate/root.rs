use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::{error, warn};

use super::{Aggregate, Command, Handlers, PendingEvent, ReplayPolicy};
use crate::error::{Error, Result};
use crate::store::Event;

/// Runtime instance of an aggregate: identity, version, state and the
/// buffer of events dispatched since the last save.
///
/// A root without an id is fresh; the repository assigns one on the first
/// successful save.
pub struct Root<A: Aggregate> {
    id: String,
    version: u64,
    state: A,
    pending: Vec<PendingEvent>,
    handlers: Arc<Handlers<A>>,
    policy: ReplayPolicy,
}

impl<A: Aggregate> Root<A> {
    /// A fresh root with its own handler tables and tolerant replay.
    pub fn new() -> Result<Self> {
        Ok(Self::with_handlers(
            Arc::new(Handlers::build()?),
            ReplayPolicy::default(),
        ))
    }

    pub fn with_handlers(handlers: Arc<Handlers<A>>, policy: ReplayPolicy) -> Self {
        Root {
            id: String::new(),
            version: 0,
            state: A::default(),
            pending: Vec::new(),
            handlers,
            policy,
        }
    }

    pub(crate) fn at(mut self, id: impl Into<String>, version: u64) -> Self {
        self.id = id.into();
        self.version = version;
        self
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut A {
        &mut self.state
    }

    pub fn pending(&self) -> &[PendingEvent] {
        &self.pending
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.policy
    }

    /// Drops buffered events that will not be saved.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Drops the events buffered after the first `len`.
    pub(crate) fn truncate_pending(&mut self, len: usize) {
        self.pending.truncate(len);
    }

    /// Runs the handler registered for `C` against the current state.
    ///
    /// The produced events are buffered, not applied. State only moves once
    /// they are persisted (see `Repository::save`) or replayed.
    pub fn dispatch<C: Command>(&mut self, command: C) -> Result<&[PendingEvent]> {
        let events = self
            .handlers
            .handle(&self.state, C::NAME, &command as &dyn Any)?;
        let start = self.pending.len();
        self.pending.extend(events);
        Ok(&self.pending[start..])
    }

    /// Folds one event into the state through its registered handler.
    pub fn apply(&mut self, name: &str, event: &dyn Any) -> Result<()> {
        self.handlers.apply(&mut self.state, name, event, self.policy)
    }

    /// Decodes a stored event and applies it, moving the version forward.
    pub(crate) fn replay(&mut self, event: &Event) -> Result<()> {
        match self.handlers.registry().unmarshal(&event.name, &event.data) {
            Ok(value) => self.apply(&event.name, &*value)?,
            Err(Error::UnregisteredType(name)) if self.policy == ReplayPolicy::Tolerant => {
                warn!(
                    aggregate = A::TYPE,
                    event = %name,
                    version = event.version,
                    "unknown stored event, skipped"
                );
            }
            Err(err) => return Err(err),
        }
        self.version = event.version;
        Ok(())
    }

    /// Marks the pending buffer as persisted: applies it, adopts the stored
    /// identity and hands the domain values back for listeners.
    pub(crate) fn commit(&mut self, id: &str, version: u64) -> Vec<PendingEvent> {
        let pending = std::mem::take(&mut self.pending);
        for event in &pending {
            if let Err(err) =
                self.handlers
                    .apply(&mut self.state, event.name(), event.value(), self.policy)
            {
                error!(aggregate = A::TYPE, event = event.name(), %err, "apply after save failed");
            }
        }
        self.id = id.to_string();
        self.version = version;
        pending
    }
}

impl<A: Aggregate + fmt::Debug> fmt::Debug for Root<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .finish()
    }
}

impl<A: Aggregate> fmt::Display for Root<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.#{}.v{}", A::TYPE, self.id, self.version)
    }
}
