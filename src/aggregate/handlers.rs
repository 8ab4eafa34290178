use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use super::{Aggregate, Command, ReplayPolicy};
use crate::error::{Error, Result};
use crate::registry::{Payload, Registry};

/// A domain event produced by a command handler and not yet persisted.
pub struct PendingEvent {
    name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl PendingEvent {
    pub fn new<E: Payload>(event: E) -> Self {
        PendingEvent {
            name: E::NAME,
            value: Box::new(event),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> &(dyn Any + Send + Sync) {
        self.value.as_ref()
    }

    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.value.downcast_ref::<E>()
    }
}

impl fmt::Debug for PendingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEvent").field("name", &self.name).finish()
    }
}

type CommandFn<A> = Box<dyn Fn(&A, &dyn Any) -> Result<Vec<PendingEvent>> + Send + Sync>;
type EventFn<A> = Box<dyn Fn(&mut A, &dyn Any) -> Result<()> + Send + Sync>;

/// Command and event tables of one aggregate type, keyed by type name.
///
/// Built once through [`Aggregate::register`] and shared by every instance.
/// Registering an event type also records it in the event [`Registry`] so
/// stored records can be decoded back into it.
pub struct Handlers<A> {
    commands: HashMap<&'static str, CommandFn<A>>,
    events: HashMap<&'static str, Option<EventFn<A>>>,
    registry: Registry,
}

impl<A: Aggregate> Handlers<A> {
    pub fn build() -> Result<Self> {
        let mut handlers = Handlers {
            commands: HashMap::new(),
            events: HashMap::new(),
            registry: Registry::new(),
        };
        A::register(&mut handlers)?;
        Ok(handlers)
    }

    /// Registers the single handler for command `C`.
    pub fn command<C, F>(&mut self, handler: F) -> Result<&mut Self>
    where
        C: Command,
        F: Fn(&A, &C) -> Result<Vec<PendingEvent>> + Send + Sync + 'static,
    {
        if self.commands.contains_key(C::NAME) {
            return Err(Error::AlreadyRegistered(C::NAME.to_string()));
        }
        self.commands.insert(
            C::NAME,
            Box::new(move |state: &A, command: &dyn Any| {
                let command = command
                    .downcast_ref::<C>()
                    .ok_or_else(|| Error::MissingHandler(C::NAME.to_string()))?;
                handler(state, command)
            }),
        );
        Ok(self)
    }

    /// Registers event `E` and the mutator that folds it into the state.
    pub fn event<E, F>(&mut self, handler: F) -> Result<&mut Self>
    where
        E: Payload,
        F: Fn(&mut A, &E) + Send + Sync + 'static,
    {
        self.registry.register::<E>()?;
        self.events.insert(
            E::NAME,
            Some(Box::new(move |state: &mut A, event: &dyn Any| {
                let event = event.downcast_ref::<E>().ok_or_else(|| {
                    Error::Encoding(format!("event {} has an unexpected type", E::NAME))
                })?;
                handler(state, event);
                Ok(())
            })),
        );
        Ok(self)
    }

    /// Registers event `E` without a mutator. Applying it changes nothing.
    pub fn event_type<E: Payload>(&mut self) -> Result<&mut Self> {
        self.registry.register::<E>()?;
        self.events.insert(E::NAME, None);
        Ok(self)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn handles(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }

    pub(crate) fn handle(
        &self,
        state: &A,
        name: &str,
        command: &dyn Any,
    ) -> Result<Vec<PendingEvent>> {
        let handler = self
            .commands
            .get(name)
            .ok_or_else(|| Error::MissingHandler(name.to_string()))?;
        handler(state, command)
    }

    pub(crate) fn apply(
        &self,
        state: &mut A,
        name: &str,
        event: &dyn Any,
        policy: ReplayPolicy,
    ) -> Result<()> {
        match self.events.get(name) {
            Some(Some(handler)) => handler(state, event),
            Some(None) => Ok(()),
            None => match policy {
                ReplayPolicy::Strict => Err(Error::UnregisteredType(name.to_string())),
                ReplayPolicy::Tolerant => {
                    warn!(aggregate = A::TYPE, event = name, "no handler, event skipped");
                    Ok(())
                }
            },
        }
    }
}

impl<A> fmt::Debug for Handlers<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("events", &self.registry)
            .finish()
    }
}
