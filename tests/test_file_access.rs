use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pathguard::Error;
use pathguard::fs::{AccessMode, FileAccess, LockManager};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Settings {
    name: String,
    retries: u32,
    tags: Vec<String>,
}

fn access() -> FileAccess {
    FileAccess::new(LockManager::new())
}

#[tokio::test]
async fn test_save_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.txt");
    let fs = access();

    fs.save_file(&path, b"first").await.unwrap();
    fs.save_file(&path, b"second").await.unwrap();

    assert_eq!(fs.read_file(&path).await.unwrap(), b"second");
    assert_eq!(fs.locks().active_keys(), 0);
}

#[tokio::test]
async fn test_read_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.txt");
    let fs = access();

    let err = fs.read_file(&path).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { path: p } if p == path));

    // Lock released even though the operation failed.
    fs.save_file(&path, b"x").await.unwrap();
}

#[tokio::test]
async fn test_structured_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let fs = access();
    let settings = Settings {
        name: "primary".to_string(),
        retries: 3,
        tags: vec!["a".to_string(), "b".to_string()],
    };

    fs.write_structured(&path, &settings).await.unwrap();
    let back: Settings = fs.read_structured(&path).await.unwrap();
    assert_eq!(back, settings);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.ends_with("}\n"));
    assert!(raw.contains("\n  \"retries\": 3"));
}

#[tokio::test]
async fn test_structured_read_of_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = access().read_structured::<Settings>(&path).await.unwrap_err();
    assert!(matches!(err, Error::Structured { .. }));
}

#[tokio::test]
async fn test_concurrent_appends_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let fs = access();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let (fs, path) = (fs.clone(), path.clone());
        tasks.push(tokio::spawn(async move {
            let block = format!("{}\n", i.to_string().repeat(512));
            fs.append_file(&path, block).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let text = String::from_utf8(fs.read_file(&path).await.unwrap()).unwrap();
    let mut lines: Vec<_> = text.lines().collect();
    lines.sort();
    let mut expected: Vec<_> = (0..16).map(|i| i.to_string().repeat(512)).collect();
    expected.sort();
    assert_eq!(lines, expected);
}

#[tokio::test]
async fn test_exists_never_fails() {
    let dir = tempfile::tempdir().unwrap();
    let fs = access();

    assert!(fs.exists(dir.path()).await);
    assert!(!fs.exists(dir.path().join("nope")).await);
    assert!(!fs.exists(dir.path().join("nope/deeper/still")).await);
}

#[tokio::test]
async fn test_access_modes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "a").unwrap();
    let fs = access();

    assert_eq!(fs.access(&path, AccessMode::Exists).await.unwrap(), path);
    assert_eq!(fs.access_read(&path).await.unwrap(), path);
    assert_eq!(fs.access(&path, AccessMode::Write).await.unwrap(), path);

    let missing = dir.path().join("b.txt");
    let err = fs.access(&missing, AccessMode::Read).await.unwrap_err();
    assert!(err.is_missing_or_denied());
}

#[tokio::test]
async fn test_make_and_list_directory() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("sub");
    let fs = access();

    fs.make_directory(&sub).await.unwrap();
    fs.save_file(sub.join("b.txt"), b"b").await.unwrap();
    fs.save_file(sub.join("a.txt"), b"a").await.unwrap();
    fs.make_directory(sub.join("c")).await.unwrap();

    assert_eq!(fs.list_directory(&sub).await.unwrap(), vec!["a.txt", "b.txt", "c"]);

    let err = fs.make_directory(&sub).await.unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[tokio::test]
async fn test_list_directory_is_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let fs = access();
    let order = Arc::new(Mutex::new(Vec::new()));

    // A reader holds the directory path; the listing must wait for it, and a
    // reader arriving after the listing must wait for the listing.
    let reader = fs.locks().acquire_shared(dir.path()).await.unwrap();

    let listing = tokio::spawn({
        let (fs, path, order) = (fs.clone(), dir.path().to_path_buf(), Arc::clone(&order));
        async move {
            fs.list_directory(&path).await.unwrap();
            order.lock().push("list");
        }
    });
    sleep(Duration::from_millis(50)).await;

    let probe = tokio::spawn({
        let (fs, path, order) = (fs.clone(), dir.path().to_path_buf(), Arc::clone(&order));
        async move {
            assert!(fs.exists(&path).await);
            order.lock().push("exists");
        }
    });
    sleep(Duration::from_millis(50)).await;
    assert!(order.lock().is_empty());

    drop(reader);
    listing.await.unwrap();
    probe.await.unwrap();
    assert_eq!(*order.lock(), vec!["list", "exists"]);
}

#[tokio::test]
async fn test_read_waits_for_write_on_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    std::fs::write(&path, "old").unwrap();
    let fs = access();

    let writer = fs.locks().acquire_exclusive(&path).await.unwrap();
    let read = tokio::spawn({
        let (fs, path) = (fs.clone(), path.clone());
        async move { fs.read_file(&path).await.unwrap() }
    });
    sleep(Duration::from_millis(50)).await;
    assert!(!read.is_finished());

    std::fs::write(&path, "new").unwrap();
    drop(writer);
    assert_eq!(read.await.unwrap(), b"new");
}
