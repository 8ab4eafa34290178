use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::storage::{is_candidate, stage, version_key};
use super::{Event, Header, Snapshot, Storage, Stream};
use crate::error::{Error, Result};

#[derive(Default)]
struct Tables {
    headers: BTreeMap<String, Header>,
    events: HashMap<String, BTreeMap<[u8; 8], Event>>,
    snapshots: HashMap<String, Snapshot>,
}

/// In-memory storage. One lock guards all keyspaces, so each call is a
/// transaction.
///
/// Clones share the same underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn append(
        &self,
        stream: &Stream,
        expected: Option<u64>,
        created: DateTime<Utc>,
    ) -> Result<(Header, Vec<Event>)> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| Error::LockPoisoned("append"))?;

        let current = tables.headers.get(&stream.id).cloned();
        let (header, events) = stage(stream, current, expected, created)?;

        let log = tables.events.entry(stream.id.clone()).or_default();
        for event in &events {
            log.insert(version_key(event.version), event.clone());
        }
        tables.headers.insert(stream.id.clone(), header.clone());

        Ok((header, events))
    }

    fn header(&self, id: &str) -> Result<Option<Header>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| Error::LockPoisoned("header"))?;
        Ok(tables.headers.get(id).cloned())
    }

    fn events_from(&self, id: &str, from: u64) -> Result<Vec<Event>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| Error::LockPoisoned("events"))?;
        if !tables.headers.contains_key(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        let (Some(log), Some(start)) = (tables.events.get(id), from.checked_add(1)) else {
            return Ok(Vec::new());
        };
        Ok(log.range(version_key(start)..).map(|(_, e)| e.clone()).collect())
    }

    fn snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| Error::LockPoisoned("snapshot"))?;
        Ok(tables.snapshots.get(id).cloned())
    }

    fn put_snapshot(&self, id: &str, version: u64, data: &[u8]) -> Result<Snapshot> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| Error::LockPoisoned("put snapshot"))?;
        let header = tables
            .headers
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if version > header.version {
            return Err(Error::Conflict {
                stream: format!("{}.#{}", header.kind, header.id),
                expected: version,
                actual: header.version,
            });
        }
        let snapshot = Snapshot {
            id: id.to_string(),
            version,
            data: data.to_vec(),
        };
        tables.snapshots.insert(id.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    fn candidates_for_snapshot(&self, kind: &str, min_delta: u64) -> Result<Vec<Header>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| Error::LockPoisoned("candidates"))?;
        Ok(tables
            .headers
            .values()
            .filter(|header| {
                let snapshot = tables.snapshots.get(&header.id).map_or(0, |s| s.version);
                is_candidate(header, kind, snapshot, min_delta)
            })
            .cloned()
            .collect())
    }
}
