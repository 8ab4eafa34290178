use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use tracing::debug;

use super::storage::{is_candidate, stage, version_key};
use super::{Event, Header, Snapshot, Storage, Stream};
use crate::error::{Error, Result};

const HEADERS: TableDefinition<&str, &[u8]> = TableDefinition::new("headers");
const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Each stream keeps its events in a table of its own.
fn events_table(id: &str) -> String {
    format!("events/{id}")
}

fn storage<E: Into<redb::Error>>(err: E) -> Error {
    Error::from(err.into())
}

/// Durable storage in a single redb file.
///
/// Records are `bitcode` encoded. Event tables are keyed by the big-endian
/// version, so a range scan yields ascending versions.
pub struct FileStorage {
    db: Database,
    path: PathBuf,
}

impl FileStorage {
    /// Opens or creates the database at `path`.
    ///
    /// Failing here is [`Error::StorageFatal`]: nothing can run without it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fatal = |err: redb::Error| Error::StorageFatal(format!("{}: {err}", path.display()));

        let db = Database::create(&path).map_err(|e| fatal(e.into()))?;
        let txn = db.begin_write().map_err(|e| fatal(e.into()))?;
        {
            txn.open_table(HEADERS).map_err(|e| fatal(e.into()))?;
            txn.open_table(SNAPSHOTS).map_err(|e| fatal(e.into()))?;
        }
        txn.commit().map_err(|e| fatal(e.into()))?;

        debug!(path = %path.display(), "storage opened");
        Ok(FileStorage { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn append(
        &self,
        stream: &Stream,
        expected: Option<u64>,
        created: DateTime<Utc>,
    ) -> Result<(Header, Vec<Event>)> {
        let txn = self.db.begin_write().map_err(storage)?;
        let staged = {
            let mut headers = txn.open_table(HEADERS).map_err(storage)?;
            let current = match headers.get(stream.id.as_str()).map_err(storage)? {
                Some(bytes) => Some(bitcode::deserialize::<Header>(bytes.value())?),
                None => None,
            };
            let (header, events) = stage(stream, current, expected, created)?;

            let name = events_table(&stream.id);
            let mut log = txn
                .open_table(TableDefinition::<&[u8], &[u8]>::new(&name))
                .map_err(storage)?;
            for event in &events {
                let value = bitcode::serialize(event)?;
                log.insert(version_key(event.version).as_slice(), value.as_slice())
                    .map_err(storage)?;
            }
            let value = bitcode::serialize(&header)?;
            headers
                .insert(stream.id.as_str(), value.as_slice())
                .map_err(storage)?;
            (header, events)
        };
        txn.commit().map_err(storage)?;
        Ok(staged)
    }

    fn header(&self, id: &str) -> Result<Option<Header>> {
        let txn = self.db.begin_read().map_err(storage)?;
        let headers = txn.open_table(HEADERS).map_err(storage)?;
        let header = match headers.get(id).map_err(storage)? {
            Some(bytes) => Some(bitcode::deserialize::<Header>(bytes.value())?),
            None => None,
        };
        Ok(header)
    }

    fn events_from(&self, id: &str, from: u64) -> Result<Vec<Event>> {
        let txn = self.db.begin_read().map_err(storage)?;
        let headers = txn.open_table(HEADERS).map_err(storage)?;
        if headers.get(id).map_err(storage)?.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }

        let name = events_table(id);
        let log = match txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name)) {
            Ok(log) => log,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(storage(err)),
        };
        let Some(start) = from.checked_add(1) else {
            return Ok(Vec::new());
        };
        let start = version_key(start);

        let mut events = Vec::new();
        for entry in log.range(start.as_slice()..).map_err(storage)? {
            let (_, value) = entry.map_err(storage)?;
            events.push(bitcode::deserialize::<Event>(value.value())?);
        }
        Ok(events)
    }

    fn snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        let txn = self.db.begin_read().map_err(storage)?;
        let snapshots = txn.open_table(SNAPSHOTS).map_err(storage)?;
        let snapshot = match snapshots.get(id).map_err(storage)? {
            Some(bytes) => Some(bitcode::deserialize::<Snapshot>(bytes.value())?),
            None => None,
        };
        Ok(snapshot)
    }

    fn put_snapshot(&self, id: &str, version: u64, data: &[u8]) -> Result<Snapshot> {
        let txn = self.db.begin_write().map_err(storage)?;
        let snapshot = {
            let headers = txn.open_table(HEADERS).map_err(storage)?;
            let header = match headers.get(id).map_err(storage)? {
                Some(bytes) => bitcode::deserialize::<Header>(bytes.value())?,
                None => return Err(Error::NotFound(id.to_string())),
            };
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
            let value = bitcode::serialize(&snapshot)?;
            let mut snapshots = txn.open_table(SNAPSHOTS).map_err(storage)?;
            snapshots.insert(id, value.as_slice()).map_err(storage)?;
            snapshot
        };
        txn.commit().map_err(storage)?;
        Ok(snapshot)
    }

    fn candidates_for_snapshot(&self, kind: &str, min_delta: u64) -> Result<Vec<Header>> {
        let txn = self.db.begin_read().map_err(storage)?;
        let headers = txn.open_table(HEADERS).map_err(storage)?;
        let snapshots = txn.open_table(SNAPSHOTS).map_err(storage)?;

        let mut candidates = Vec::new();
        for entry in headers.iter().map_err(storage)? {
            let (_, value) = entry.map_err(storage)?;
            let header = bitcode::deserialize::<Header>(value.value())?;
            if header.kind != kind {
                continue;
            }
            let snapshot = match snapshots.get(header.id.as_str()).map_err(storage)? {
                Some(bytes) => bitcode::deserialize::<Snapshot>(bytes.value())?.version,
                None => 0,
            };
            if is_candidate(&header, kind, snapshot, min_delta) {
                candidates.push(header);
            }
        }
        Ok(candidates)
    }
}
