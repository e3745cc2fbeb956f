// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use registry_core::{NewRecord, Record, RecordPatch, RecordStore, StoreConfig, StoreError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn ivan() -> NewRecord {
    NewRecord {
        firstname: "Ivan".into(),
        lastname: "Petrenko".into(),
        middlename: None,
        address: "Kyiv".into(),
        idnumber: "123".into(),
        photo: None,
    }
}

fn person(n: usize) -> NewRecord {
    NewRecord {
        firstname: format!("First{}", n),
        lastname: format!("Last{}", n),
        middlename: if n % 2 == 0 { Some(format!("Middle{}", n)) } else { None },
        address: format!("Street {}", n),
        idnumber: format!("{:06}", n),
        photo: Some(format!("data:image/png;base64,UE5H{}", n)),
    }
}

#[derive(Deserialize)]
struct TreeFile {
    #[serde(default)]
    record: Vec<Record>,
}

fn tree_on_disk(store: &RecordStore) -> Vec<Record> {
    let xml = std::fs::read_to_string(store.writer().tree_path()).unwrap();
    quick_xml::de::from_str::<TreeFile>(&xml).unwrap().record
}

fn staging(path: &std::path::Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn primary_on_disk(store: &RecordStore) -> Vec<Record> {
    let bytes = std::fs::read(store.writer().primary_path()).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap();

    let created = store.create(ivan()).await.unwrap();
    assert!(!created.id.is_empty());
    assert_eq!(created.middlename, "");
    assert_eq!(created.firstname, "Ivan");

    let patch = RecordPatch {
        address: Some("Lviv".into()),
        ..Default::default()
    };
    let updated = store.update(created.id.as_str(), patch).await.unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.address, "Lviv");
    assert_eq!(updated.firstname, "Ivan");
    assert_eq!(updated.lastname, "Petrenko");
    assert_eq!(updated.idnumber, "123");

    store.delete(created.id.as_str()).await.unwrap();
    assert!(store.list().await.is_empty());
    assert!(primary_on_disk(&store).is_empty());
    assert!(tree_on_disk(&store).is_empty());
}

#[tokio::test]
async fn test_update_ignores_id_in_body() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap();
    let created = store.create(ivan()).await.unwrap();

    let patch: RecordPatch = serde_json::from_value(serde_json::json!({
        "id": "hijacked",
        "lastname": "Shevchuk",
    }))
    .unwrap();
    let updated = store.update(created.id.as_str(), patch).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.lastname, "Shevchuk");
    assert_eq!(updated.address, "Kyiv");
    assert!(matches!(
        store.update("hijacked", RecordPatch::default()).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_unknown_is_noop_but_update_unknown_fails() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap();
    let kept = store.create(ivan()).await.unwrap();

    store.delete("never-created").await.unwrap();
    assert_eq!(store.list().await, vec![kept.clone()]);

    let err = store
        .update("never-created", RecordPatch::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // second delete of the same id is also fine
    store.delete(kept.id.as_str()).await.unwrap();
    store.delete(kept.id.as_str()).await.unwrap();
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_replayed_sequence_matches_model() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap();
    let mut model: Vec<Record> = Vec::new();

    for step in 0..30usize {
        match step % 5 {
            0 | 1 | 2 => {
                let rec = store.create(person(step)).await.unwrap();
                assert!(model.iter().all(|r| r.id != rec.id));
                model.push(rec);
            }
            3 if !model.is_empty() => {
                let target = model[step % model.len()].id.clone();
                let patch = RecordPatch {
                    address: Some(format!("Moved at {}", step)),
                    photo: Some(String::new()),
                    ..Default::default()
                };
                let rec = store.update(target.as_str(), patch).await.unwrap();
                let slot = model.iter_mut().find(|r| r.id == target).unwrap();
                *slot = rec;
            }
            _ if !model.is_empty() => {
                let target = model[0].id.clone();
                store.delete(target.as_str()).await.unwrap();
                model.retain(|r| r.id != target);
            }
            _ => {}
        }

        assert_eq!(store.list().await, model);
        assert_eq!(primary_on_disk(&store), model);
        assert_eq!(tree_on_disk(&store), model);
    }

    let ids: HashSet<_> = model.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), model.len());
}

#[tokio::test]
async fn test_restart_reproduces_collection() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig::in_dir(dir.path());

    let before = {
        let store = RecordStore::open(cfg.clone()).await.unwrap();
        for n in 0..5 {
            store.create(person(n)).await.unwrap();
        }
        let second = store.list().await[1].id.clone();
        store.delete(second.as_str()).await.unwrap();
        store.list().await
    };

    let reopened = RecordStore::open(cfg).await.unwrap();
    assert_eq!(reopened.list().await, before);
    assert_eq!(reopened.recovery().records_loaded, 4);
    assert!(!reopened.recovery().created);
}

#[tokio::test]
async fn test_failed_writes_leave_memory_unchanged() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = RecordStore::open(StoreConfig::in_dir(&data)).await.unwrap();
    let a = store.create(person(1)).await.unwrap();
    let b = store.create(person(2)).await.unwrap();
    let snapshot = store.list().await;

    std::fs::remove_dir_all(&data).unwrap();

    let err = store.create(person(3)).await.unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert_eq!(store.list().await, snapshot);

    let err = store.delete(a.id.as_str()).await.unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert_eq!(store.list().await, snapshot);

    let patch = RecordPatch {
        firstname: Some("Nope".into()),
        ..Default::default()
    };
    let err = store.update(b.id.as_str(), patch).await.unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert_eq!(store.list().await, snapshot);

    // storage comes back, the next mutation persists the full collection
    std::fs::create_dir_all(&data).unwrap();
    let c = store.create(person(4)).await.unwrap();
    assert_eq!(primary_on_disk(&store), vec![a, b, c]);
    assert_eq!(tree_on_disk(&store), store.list().await);
}

#[tokio::test]
async fn test_failed_primary_rename_keeps_encodings_in_step() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap();
    let a = store.create(person(1)).await.unwrap();
    let primary = store.writer().primary_path().to_path_buf();

    // the tree rename succeeds, the primary rename cannot replace a
    // non-empty directory
    std::fs::remove_file(&primary).unwrap();
    std::fs::create_dir(&primary).unwrap();
    std::fs::write(primary.join("occupied"), b"").unwrap();

    let err = store.create(person(2)).await.unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert_eq!(store.list().await, vec![a.clone()]);
    assert_eq!(tree_on_disk(&store), vec![a]);
    assert!(!staging(&primary).exists());
    assert!(!staging(store.writer().tree_path()).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_mutations_still_match_disk() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap();
    let photo = format!("data:image/png;base64,{}", "A".repeat(8 * 1024 * 1024));

    for micros in [0u64, 50, 500, 5_000] {
        let mut big = person(micros as usize);
        big.photo = Some(photo.clone());
        let _ = tokio::time::timeout(Duration::from_micros(micros), store.create(big)).await;

        // waits for any commit still running
        let all = store.list().await;
        assert_eq!(primary_on_disk(&store), all);
        assert_eq!(tree_on_disk(&store), all);
    }

    if let Some(first) = store.list().await.first().cloned() {
        let patch = RecordPatch {
            photo: Some(String::new()),
            ..Default::default()
        };
        let _ = tokio::time::timeout(
            Duration::from_micros(50),
            store.update(first.id.as_str(), patch),
        )
        .await;
        let _ = tokio::time::timeout(Duration::from_micros(50), store.delete(first.id.as_str())).await;

        let all = store.list().await;
        assert_eq!(primary_on_disk(&store), all);
        assert_eq!(tree_on_disk(&store), all);
    }
}

#[tokio::test]
async fn test_control_characters_never_reach_disk() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap();

    let mut bad = ivan();
    bad.middlename = Some("\u{7}".into());
    let err = store.create(bad).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidField { field: "middlename", .. }));

    // tab, newline and non-Latin text are fine
    let mut ok = ivan();
    ok.address = "вул. Хрещатик, 1\n\tкв. 2".into();
    let rec = store.create(ok).await.unwrap();

    assert_eq!(store.list().await, vec![rec.clone()]);
    assert_eq!(primary_on_disk(&store), vec![rec]);
    assert_eq!(tree_on_disk(&store), primary_on_disk(&store));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates() {
    const N: usize = 32;
    let dir = tempdir().unwrap();
    let store = Arc::new(RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap());

    let mut handles = Vec::with_capacity(N);
    for n in 0..N {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.create(person(n)).await }));
    }

    let mut ids = HashSet::new();
    for h in handles {
        let rec = h.await.unwrap().unwrap();
        ids.insert(rec.id);
    }

    assert_eq!(ids.len(), N);
    let all = store.list().await;
    assert_eq!(all.len(), N);
    assert_eq!(primary_on_disk(&store), all);
    assert_eq!(tree_on_disk(&store), all);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_snapshots() {
    let dir = tempdir().unwrap();
    let store = Arc::new(RecordStore::open(StoreConfig::in_dir(dir.path())).await.unwrap());

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for n in 0..20 {
                store.create(person(n)).await.unwrap();
            }
        })
    };

    let mut last = 0;
    while !writer.is_finished() {
        let seen = store.list().await;
        assert!(seen.len() >= last);
        for (i, rec) in seen.iter().enumerate() {
            assert_eq!(rec.firstname, format!("First{}", i));
        }
        last = seen.len();
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();
    assert_eq!(store.len().await, 20);
}

#[tokio::test]
async fn test_open_rejects_duplicate_ids() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig::in_dir(dir.path());
    let dup = serde_json::json!([
        {"id": "x", "firstname": "A", "lastname": "B", "middlename": "", "address": "C", "idnumber": "1", "photo": ""},
        {"id": "x", "firstname": "D", "lastname": "E", "middlename": "", "address": "F", "idnumber": "2", "photo": ""}
    ]);
    std::fs::write(cfg.primary_path(), serde_json::to_vec(&dup).unwrap()).unwrap();

    let res = RecordStore::open(cfg).await;
    assert!(matches!(res, Err(StoreError::InvalidFormat(_))));
}
