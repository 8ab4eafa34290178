use chrono::{TimeZone, Utc};
use sourced_es::{Error, EventStore, FileStorage, FixedClock, MemoryStorage, Storage, Stream};
use tempfile::TempDir;

fn order(id: &str, names: &[&str]) -> Stream {
    names.iter().fold(Stream::new(id, "order"), |stream, name| {
        stream.record(*name, format!(r#"{{"step":"{name}"}}"#).into_bytes())
    })
}

/// Runs `check` against every backend.
fn each_backend(check: impl Fn(EventStore)) {
    check(EventStore::new(MemoryStorage::new()));

    let dir = TempDir::new().unwrap();
    let file = FileStorage::open(dir.path().join("events.redb")).unwrap();
    check(EventStore::new(file));
}

#[test]
fn append_assigns_contiguous_versions() {
    each_backend(|store| {
        let (header, events) = store.append(order("o-1", &["Placed", "Paid"]), Some(0)).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.kind, "order");
        assert_eq!(events.iter().map(|e| e.version).collect::<Vec<_>>(), [1, 2]);

        let (header, events) = store.append(order("o-1", &["Shipped"]), Some(2)).unwrap();
        assert_eq!(header.version, 3);
        assert_eq!(events[0].version, 3);
        assert!(!events[0].id.is_empty());
    });
}

#[test]
fn events_from_is_ordered_and_exclusive() {
    each_backend(|store| {
        let names: Vec<String> = (1..=300).map(|n| format!("E{n}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        store.append(order("o-1", &refs), None).unwrap();

        let all = store.events_from("o-1", 0).unwrap();
        assert_eq!(all.len(), 300);
        assert!(all.windows(2).all(|w| w[0].version + 1 == w[1].version));

        let tail = store.events_from("o-1", 255).unwrap();
        assert_eq!(tail.first().unwrap().version, 256);
        assert_eq!(tail.first().unwrap().name, "E256");
        assert_eq!(tail.len(), 45);

        assert!(store.events_from("o-1", 300).unwrap().is_empty());
        assert!(store.events_from("o-1", u64::MAX).unwrap().is_empty());
    });
}

#[test]
fn unknown_streams_are_not_found() {
    each_backend(|store| {
        assert_eq!(store.header("missing"), Err(Error::NotFound("missing".into())));
        assert!(store.events_from("missing", 0).unwrap_err().is_not_found());
        assert!(store.snapshot("missing").unwrap().is_none());
    });
}

#[test]
fn stale_expected_version_writes_nothing() {
    each_backend(|store| {
        store.append(order("o-1", &["Placed"]), Some(0)).unwrap();

        let err = store.append(order("o-1", &["Paid", "Shipped"]), Some(0)).unwrap_err();
        assert_eq!(
            err,
            Error::Conflict {
                stream: "order.#o-1".into(),
                expected: 0,
                actual: 1,
            }
        );
        assert!(err
            .to_string()
            .contains("transaction failed, current version is 0, but stored is 1"));

        assert_eq!(store.header("o-1").unwrap().version, 1);
        assert_eq!(store.events_from("o-1", 0).unwrap().len(), 1);
    });
}

#[test]
fn new_streams_need_an_id_and_a_name() {
    each_backend(|store| {
        assert!(store.append(order("", &["Placed"]), None).unwrap_err().is_validation());

        let nameless = Stream::new("o-1", "").record("Placed", vec![]);
        assert!(store.append(nameless.clone(), None).unwrap_err().is_validation());

        store.append(order("o-1", &["Placed"]), None).unwrap();
        // Known streams keep their type.
        let (header, _) = store.append(nameless, None).unwrap();
        assert_eq!(header.kind, "order");
        assert_eq!(header.version, 2);
    });
}

#[test]
fn events_of_one_append_share_the_clock_time() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let store = EventStore::in_memory().with_clock(FixedClock(at));

    let (_, events) = store.append(order("o-1", &["Placed", "Paid"]), None).unwrap();
    assert!(events.iter().all(|e| e.created == at));
    assert_eq!(store.events_from("o-1", 0).unwrap()[1].created, at);
}

#[test]
fn snapshots_cannot_run_ahead_of_the_stream() {
    each_backend(|store| {
        assert!(store.put_snapshot("o-1", 1, b"s").unwrap_err().is_not_found());

        store.append(order("o-1", &["Placed", "Paid"]), None).unwrap();
        assert!(store.put_snapshot("o-1", 3, b"s").unwrap_err().is_conflict());

        store.put_snapshot("o-1", 1, b"first").unwrap();
        store.put_snapshot("o-1", 2, b"second").unwrap();
        let snapshot = store.snapshot("o-1").unwrap().unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.data, b"second");
    });
}

#[test]
fn candidates_are_filtered_by_type_and_delta() {
    each_backend(|store| {
        store.append(order("o-1", &["A", "B", "C"]), None).unwrap();
        store.append(order("o-2", &["A"]), None).unwrap();
        store
            .append(Stream::new("u-1", "user").record("A", vec![]).record("B", vec![]), None)
            .unwrap();

        let ids = |min: u64| -> Vec<String> {
            let mut ids: Vec<String> = store
                .candidates_for_snapshot("order", min)
                .unwrap()
                .into_iter()
                .map(|h| h.id)
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(1), ["o-1", "o-2"]);
        assert_eq!(ids(2), ["o-1"]);

        store.put_snapshot("o-1", 2, b"s").unwrap();
        assert_eq!(ids(2), Vec::<String>::new());
        assert_eq!(ids(1), ["o-1", "o-2"]);
    });
}

#[test]
fn file_storage_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.redb");

    {
        let store = EventStore::open(&path).unwrap();
        let mut stream = order("o-1", &["Placed", "Paid"]);
        stream.meta = b"m".to_vec();
        store.append(stream, None).unwrap();
        store.put_snapshot("o-1", 1, b"snap").unwrap();
    }

    let store = EventStore::open(&path).unwrap();
    let (header, events) = store.stream("o-1").unwrap();
    assert_eq!(header.version, 2);
    assert_eq!(header.meta, b"m");
    assert_eq!(events[1].name, "Paid");
    assert_eq!(events[1].data, br#"{"step":"Paid"}"#);
    assert_eq!(store.snapshot("o-1").unwrap().unwrap().data, b"snap");

    let (header, _) = store.append(order("o-1", &["Shipped"]), Some(2)).unwrap();
    assert_eq!(header.version, 3);
}

#[test]
fn unopenable_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    match FileStorage::open(dir.path()) {
        Err(Error::StorageFatal(_)) => {}
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("opened a directory as a database"),
    }
}

#[test]
fn storage_trait_is_object_safe() {
    let storage: Box<dyn Storage> = Box::new(MemoryStorage::new());
    assert!(storage.header("o-1").unwrap().is_none());
}
