use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Message;

/// Selects messages by stream type and, optionally, event names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rule {
    /// Stream type to follow. Empty follows every stream.
    #[serde(default)]
    pub stream: String,
    /// Event names to keep. Empty keeps every event of the stream.
    #[serde(default)]
    pub events: Vec<String>,
    /// Messages at or below this version are not delivered.
    #[serde(default)]
    pub from_version: u64,
}

impl Rule {
    pub fn stream(stream: impl Into<String>) -> Self {
        Rule {
            stream: stream.into(),
            ..Default::default()
        }
    }

    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_version(mut self, version: u64) -> Self {
        self.from_version = version;
        self
    }

    pub fn matches(&self, message: &Message) -> bool {
        if !self.stream.is_empty() && self.stream != message.topic_name {
            return false;
        }
        if message.version <= self.from_version {
            return false;
        }
        self.events.is_empty() || self.events.iter().any(|e| *e == message.event_name)
    }
}

/// Identity of a subscriber inside a [`Publisher`](super::Publisher).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type Handler = dyn Fn(&[Message]) + Send + Sync;

/// A handler plus the rules deciding what it receives.
///
/// Clones share identity, so a clone can be used to unsubscribe.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    rules: Arc<Vec<Rule>>,
    handler: Arc<Handler>,
}

impl Subscriber {
    pub fn new(handler: impl Fn(&[Message]) + Send + Sync + 'static) -> Self {
        Self::with_rules(Vec::new(), handler)
    }

    pub fn with_rules(
        rules: Vec<Rule>,
        handler: impl Fn(&[Message]) + Send + Sync + 'static,
    ) -> Self {
        Subscriber {
            id: SubscriberId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            rules: Arc::new(rules),
            handler: Arc::new(handler),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// No rules means everything; otherwise at least one rule must match.
    pub fn accepts(&self, message: &Message) -> bool {
        self.rules.is_empty() || self.rules.iter().any(|rule| rule.matches(message))
    }

    /// Hands the accepted part of `batch` to the handler, if any is left.
    pub(crate) fn deliver(&self, batch: &[Message]) -> usize {
        let accepted: Vec<Message> = batch
            .iter()
            .filter(|message| self.accepts(message))
            .cloned()
            .collect();
        if !accepted.is_empty() {
            (self.handler)(&accepted);
        }
        accepted.len()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("rules", &self.rules)
            .finish()
    }
}
