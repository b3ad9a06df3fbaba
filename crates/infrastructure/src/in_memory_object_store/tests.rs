use coffer_application::ObjectStore;
use coffer_core::AppError;

use super::InMemoryObjectStore;

#[tokio::test]
async fn write_then_read_returns_same_bytes() {
    let store = InMemoryObjectStore::new();

    let written = store.write_bytes("files/alice/a.bin", &[0, 1, 2, 255]).await;
    assert!(written.is_ok());

    let read = store.read_bytes("files/alice/a.bin").await;
    assert_eq!(read.unwrap_or_default(), vec![0, 1, 2, 255]);
    assert!(matches!(store.exists("files/alice/a.bin").await, Ok(true)));
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let store = InMemoryObjectStore::new();

    assert!(matches!(store.exists("audit/alice.csv").await, Ok(false)));
    assert!(matches!(
        store.read_bytes("audit/alice.csv").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn append_creates_then_extends() {
    let store = InMemoryObjectStore::new();

    assert!(store.append_string("audit/alice.csv", "header\n").await.is_ok());
    assert!(store.append_string("audit/alice.csv", "row\n").await.is_ok());

    let text = store.read_string("audit/alice.csv").await;
    assert_eq!(text.unwrap_or_default(), "header\nrow\n");
}

#[tokio::test]
async fn list_is_recursive_sorted_and_prefix_bounded() {
    let store = InMemoryObjectStore::new();
    for path in [
        "audit/bob.csv",
        "audit/alice.csv",
        "audit/archive/old.csv",
        "auditor/notes.txt",
        "files/alice/x",
    ] {
        assert!(store.write_string(path, "").await.is_ok());
    }

    let listed = store.list("audit").await.unwrap_or_default();

    assert_eq!(
        listed,
        vec![
            "audit/alice.csv".to_owned(),
            "audit/archive/old.csv".to_owned(),
            "audit/bob.csv".to_owned(),
        ]
    );
    assert_eq!(store.list("").await.unwrap_or_default().len(), 5);
}

#[tokio::test]
async fn unsafe_paths_are_rejected() {
    let store = InMemoryObjectStore::new();

    for path in ["/etc/passwd", "files/../audit/alice.csv", "files//a", ""] {
        assert!(
            matches!(store.write_bytes(path, b"x").await, Err(AppError::Validation(_))),
            "path {path:?} should be rejected"
        );
    }
}
