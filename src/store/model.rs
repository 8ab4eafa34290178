use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A batch of new records for one stream, as written by the repository or
/// received on the ingest socket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stream {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(default, with = "base64_bytes")]
    pub meta: Vec<u8>,
    #[serde(default)]
    pub events: Vec<Record>,
}

impl Stream {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Stream {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn record(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.events.push(Record {
            id: String::new(),
            name: name.into(),
            data,
        });
        self
    }
}

/// One not yet versioned event inside a [`Stream`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Record {
    #[serde(rename = "ID", default)]
    pub id: String,
    pub name: String,
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Per-stream bookkeeping. `version` is the number of events ever appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub id: String,
    pub kind: String,
    pub version: u64,
    pub meta: Vec<u8>,
}

/// A persisted event. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub data: Vec<u8>,
    pub version: u64,
    pub created: DateTime<Utc>,
}

/// The single retained snapshot of a stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub version: u64,
    pub data: Vec<u8>,
}

/// Byte payloads travel as base64 strings in JSON.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
