use chrono::{DateTime, Utc};

use super::{Event, Header, Snapshot, Stream};
use crate::error::{Error, Result};

/// Contract of an embedded, transactional event log.
///
/// Every method runs as one atomic transaction. `append` is the only writer
/// of events and the only place the expected version is checked.
pub trait Storage: Send + Sync {
    /// Appends `stream.events` after the current header version.
    ///
    /// With `expected = Some(v)` the whole append is rejected with
    /// [`Error::Conflict`] unless the stored version is `v` (a missing header
    /// counts as version 0). All new events share `created`.
    fn append(
        &self,
        stream: &Stream,
        expected: Option<u64>,
        created: DateTime<Utc>,
    ) -> Result<(Header, Vec<Event>)>;

    fn header(&self, id: &str) -> Result<Option<Header>>;

    /// Events with a version strictly greater than `from`, ascending.
    fn events_from(&self, id: &str, from: u64) -> Result<Vec<Event>>;

    fn snapshot(&self, id: &str) -> Result<Option<Snapshot>>;

    /// Replaces the stream's snapshot. The header is read in the same
    /// transaction and a `version` above it is refused.
    fn put_snapshot(&self, id: &str, version: u64, data: &[u8]) -> Result<Snapshot>;

    /// Headers of type `kind` that are at least `min_delta` versions ahead of
    /// their snapshot (or of version 0 when there is none).
    fn candidates_for_snapshot(&self, kind: &str, min_delta: u64) -> Result<Vec<Header>>;
}

/// Fixed width big-endian key, so byte order matches version order.
pub fn version_key(version: u64) -> [u8; 8] {
    version.to_be_bytes()
}

/// Builds the header and events an append would write on top of `current`.
pub(crate) fn stage(
    stream: &Stream,
    current: Option<Header>,
    expected: Option<u64>,
    created: DateTime<Utc>,
) -> Result<(Header, Vec<Event>)> {
    if stream.id.is_empty() {
        return Err(Error::validation("stream id is empty"));
    }

    let mut header = match current {
        Some(header) => header,
        None if stream.name.is_empty() => {
            return Err(Error::validation(format!("stream {} has no name", stream.id)))
        }
        None => Header {
            id: stream.id.clone(),
            kind: stream.name.clone(),
            version: 0,
            meta: stream.meta.clone(),
        },
    };

    if let Some(expected) = expected {
        if header.version != expected {
            return Err(Error::Conflict {
                stream: format!("{}.#{}", header.kind, header.id),
                expected,
                actual: header.version,
            });
        }
    }

    let mut events = Vec::with_capacity(stream.events.len());
    for record in &stream.events {
        header.version += 1;
        events.push(Event {
            id: record.id.clone(),
            name: record.name.clone(),
            data: record.data.clone(),
            version: header.version,
            created,
        });
    }
    if !stream.meta.is_empty() {
        header.meta = stream.meta.clone();
    }

    Ok((header, events))
}

/// Whether a stream with `header` is due for a snapshot.
pub(crate) fn is_candidate(header: &Header, kind: &str, snapshot: u64, min_delta: u64) -> bool {
    header.kind == kind && header.version.saturating_sub(snapshot) >= min_delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_keys_sort_numerically() {
        let mut keys = vec![version_key(256), version_key(2), version_key(1), version_key(65536)];
        keys.sort();
        assert_eq!(
            keys,
            vec![version_key(1), version_key(2), version_key(256), version_key(65536)]
        );
    }

    #[test]
    fn stage_assigns_contiguous_versions() {
        let stream = Stream::new("s", "kind")
            .record("A", vec![])
            .record("B", vec![]);
        let current = Header {
            id: "s".into(),
            kind: "kind".into(),
            version: 4,
            meta: vec![],
        };
        let created = Utc::now();
        let (header, events) = stage(&stream, Some(current), Some(4), created).unwrap();
        assert_eq!(header.version, 6);
        assert_eq!(events.iter().map(|e| e.version).collect::<Vec<_>>(), vec![5, 6]);
        assert!(events.iter().all(|e| e.created == created));
    }

    #[test]
    fn stage_rejects_stale_expectation() {
        let stream = Stream::new("s", "kind").record("A", vec![]);
        let err = stage(&stream, None, Some(3), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            Error::Conflict {
                stream: "kind.#s".into(),
                expected: 3,
                actual: 0
            }
        );
    }
}
