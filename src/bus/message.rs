use serde::{Deserialize, Serialize};

use crate::store::{base64_bytes, Event, Header};

/// One persisted event as seen by subscribers and written to sockets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(rename = "EventID")]
    pub event_id: String,
    pub event_name: String,
    #[serde(rename = "TopicID")]
    pub topic_id: String,
    pub topic_name: String,
    /// Stream version after the append that produced this event.
    pub version: u64,
    #[serde(default, with = "base64_bytes")]
    pub meta: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(header: &Header, meta: &[u8], event: &Event) -> Self {
        Message {
            event_id: event.id.clone(),
            event_name: event.name.clone(),
            topic_id: header.id.clone(),
            topic_name: header.kind.clone(),
            version: header.version,
            meta: meta.to_vec(),
            data: event.data.clone(),
        }
    }
}
