use attachment_binding::store::{AttachmentStore, LocalStore, StoreError};
use bytes::Bytes;

#[tokio::test]
async fn test_local_store_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let data = Bytes::from("%PDF-1.7");
    store.put("cert-7-100.pdf", data.clone()).await.unwrap();

    let retrieved = store.get("cert-7-100.pdf").await.unwrap();
    assert_eq!(retrieved, data);
}

#[tokio::test]
async fn test_local_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    assert!(!store.exists("missing.pdf").await.unwrap());

    store.put("present.pdf", Bytes::from("data")).await.unwrap();
    assert!(store.exists("present.pdf").await.unwrap());
}

#[tokio::test]
async fn test_local_store_remove() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("to-remove.png", Bytes::from("data")).await.unwrap();
    assert!(store.exists("to-remove.png").await.unwrap());

    store.remove("to-remove.png").await.unwrap();
    assert!(!store.exists("to-remove.png").await.unwrap());
}

#[tokio::test]
async fn test_local_store_remove_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.remove("nonexistent.pdf").await;
    assert!(matches!(result, Err(StoreError::NotFound(name)) if name == "nonexistent.pdf"));
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.get("missing.pdf").await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("key.pdf", Bytes::from("first")).await.unwrap();
    let result = store.put("key.pdf", Bytes::from("second")).await;
    assert!(matches!(result, Err(StoreError::AlreadyExists(_))));

    let data = store.get("key.pdf").await.unwrap();
    assert_eq!(data, Bytes::from("first"));
}

#[tokio::test]
async fn test_local_store_list_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("cert-9-2.pdf", Bytes::from("b")).await.unwrap();
    store.put("cert-7-1.pdf", Bytes::from("a")).await.unwrap();
    std::fs::write(dir.path().join(".DS_Store"), b"finder").unwrap();
    std::fs::write(dir.path().join(".gitignore"), b"*").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();

    let names = store.list().await.unwrap();
    assert_eq!(names, vec!["cert-7-1.pdf", "cert-9-2.pdf"]);
}

#[tokio::test]
async fn test_local_store_list_is_restartable() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();
    store.put("a.pdf", Bytes::from("a")).await.unwrap();

    assert_eq!(store.list().await.unwrap(), store.list().await.unwrap());
}

#[tokio::test]
async fn test_local_store_rejects_path_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("certificates")).unwrap();

    for name in ["../escape.pdf", "a/b.pdf", "..", ".", ""] {
        let result = store.put(name, Bytes::from("x")).await;
        assert!(
            matches!(result, Err(StoreError::InvalidName(_))),
            "{name:?} should be rejected"
        );
    }
    assert!(!dir.path().join("escape.pdf").exists());
}

#[tokio::test]
async fn test_local_store_modified_time() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let before = chrono::Utc::now() - chrono::Duration::seconds(5);
    store.put("fresh.png", Bytes::from("x")).await.unwrap();

    let modified = store.modified("fresh.png").await.unwrap();
    assert!(modified >= before);
    assert!(matches!(
        store.modified("gone.png").await,
        Err(StoreError::NotFound(_))
    ));
}
