use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};

use crate::bus::{Rule, Subscriber};
use crate::error::{Error, Result};
use crate::store::{EventStore, Stream};

/// Per-connection protocol, independent of the socket.
///
/// `receive` gets every text frame; anything to send back goes through the
/// outbound channel the session was built with. Dropping the session is its
/// close.
pub trait Session: Send + 'static {
    fn receive(&mut self, text: &str) -> Result<()>;
}

pub const OK: &str = "OK";

/// `/stream`: each frame is a JSON [`Stream`] appended without a version
/// check. Replies `OK` or `{"error": ...}`.
pub struct Ingest {
    store: EventStore,
    outbound: UnboundedSender<String>,
}

impl Ingest {
    pub fn new(store: EventStore, outbound: UnboundedSender<String>) -> Self {
        Ingest { store, outbound }
    }

    fn append(&self, text: &str) -> Result<u64> {
        let stream: Stream = serde_json::from_str(text)?;
        let (header, _) = self.store.append(stream, None)?;
        Ok(header.version)
    }
}

impl Session for Ingest {
    fn receive(&mut self, text: &str) -> Result<()> {
        let reply = match self.append(text) {
            Ok(version) => {
                debug!(version, "stream received");
                OK.to_string()
            }
            Err(err) => {
                error!(%err, "stream rejected");
                serde_json::json!({ "error": err.to_string() }).to_string()
            }
        };
        self.outbound
            .send(reply)
            .map_err(|_| Error::Transport("connection closed".into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Control {
    name: String,
    #[serde(default)]
    subscriptions: Vec<Rule>,
}

/// `/subscribe`: a `subscription` control frame (re)subscribes the connection
/// with the given rules. Batches go out as JSON arrays of messages.
pub struct Subscription {
    store: EventStore,
    outbound: UnboundedSender<String>,
    current: Option<Subscriber>,
}

impl Subscription {
    pub fn new(store: EventStore, outbound: UnboundedSender<String>) -> Self {
        Subscription {
            store,
            outbound,
            current: None,
        }
    }

    pub fn subscriber(&self) -> Option<&Subscriber> {
        self.current.as_ref()
    }

    fn resubscribe(&mut self, rules: Vec<Rule>) -> Result<()> {
        if let Some(previous) = self.current.take() {
            self.store.unsubscribe(&previous)?;
        }

        let outbound = self.outbound.clone();
        let subscriber = Subscriber::with_rules(rules, move |batch| {
            match serde_json::to_string(batch) {
                Ok(json) => {
                    // A closed connection is cleaned up by its reader loop.
                    let _ = outbound.send(json);
                }
                Err(err) => error!(%err, "encoding batch failed"),
            }
        });
        self.store.subscribe(&subscriber)?;
        debug!(rules = subscriber.rules().len(), "subscribed");
        self.current = Some(subscriber);
        Ok(())
    }
}

impl Session for Subscription {
    fn receive(&mut self, text: &str) -> Result<()> {
        let control: Control = serde_json::from_str(text)?;
        match control.name.as_str() {
            "subscription" => self.resubscribe(control.subscriptions),
            other => {
                debug!(action = other, "unknown control message ignored");
                Ok(())
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscriber) = self.current.take() {
            if let Err(err) = self.store.unsubscribe(&subscriber) {
                error!(%err, "unsubscribe on close failed");
            }
        }
    }
}
