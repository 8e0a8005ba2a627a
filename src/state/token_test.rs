use super::*;

// =============================================================================
// MemoryTokenStore
// =============================================================================

#[test]
fn memory_starts_empty() {
    let store = MemoryTokenStore::new();
    assert_eq!(store.get(), None);
    assert!(!store.exists());
}

#[test]
fn memory_set_overwrites() {
    let store = MemoryTokenStore::with_token("old");
    store.set("new");
    assert_eq!(store.get().as_deref(), Some("new"));
}

#[test]
fn memory_blank_set_clears() {
    let store = MemoryTokenStore::with_token("tok");
    store.set("   ");
    assert!(!store.exists());
    assert!(!MemoryTokenStore::with_token("").exists());
}

#[test]
fn memory_clear_is_idempotent() {
    let store = MemoryTokenStore::with_token("tok");
    store.clear();
    store.clear();
    assert!(!store.exists());
}

// =============================================================================
// NullTokenStore
// =============================================================================

#[test]
fn null_store_never_holds_a_token() {
    let store = NullTokenStore;
    store.set("tok");
    assert_eq!(store.get(), None);
    assert!(!store.exists());
    store.clear();
}

// =============================================================================
// FileTokenStore
// =============================================================================

#[test]
fn file_missing_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("auth_token"));
    assert_eq!(store.get(), None);
}

#[test]
fn file_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("auth_token"));
    store.set("tok1");
    assert_eq!(store.get().as_deref(), Some("tok1"));
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "tok1");
}

#[test]
fn file_set_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("nested").join("deeper").join("auth_token"));
    store.set("tok");
    assert!(store.exists());
}

#[test]
fn file_set_overwrites_longer_token() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("auth_token"));
    store.set("a-much-longer-token-value");
    store.set("short");
    assert_eq!(store.get().as_deref(), Some("short"));
}

#[test]
fn file_round_trips_token_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("auth_token"));
    let memory = MemoryTokenStore::new();
    for token in [" t ", "tok\n"] {
        store.set(token);
        memory.set(token);
        assert_eq!(store.get().as_deref(), Some(token));
        assert_eq!(store.get(), memory.get());
    }
}

#[test]
fn file_blank_set_clears_and_blank_file_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth_token");
    let store = FileTokenStore::new(&path);
    store.set("tok");
    store.set("   ");
    assert!(!store.exists());
    assert!(!path.exists());
    std::fs::write(&path, "\n").unwrap();
    assert_eq!(store.get(), None);
}

#[test]
fn file_clear_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("auth_token"));
    store.set("tok");
    store.clear();
    store.clear();
    assert!(!store.exists());
    assert!(!store.path().exists());
}

#[test]
fn file_unreadable_path_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be: read fails with a non-NotFound error.
    let store = FileTokenStore::new(dir.path());
    assert_eq!(store.get(), None);
    store.set("tok");
    assert_eq!(store.get(), None);
}

#[cfg(unix)]
#[test]
fn file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("auth_token"));
    store.set("tok");
    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn store_is_usable_as_trait_object() {
    let store: std::sync::Arc<dyn TokenStore> = std::sync::Arc::new(MemoryTokenStore::new());
    store.set("t");
    assert!(store.exists());
}
