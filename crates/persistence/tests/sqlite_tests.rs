//! SQLite rule store integration tests.

use searchgate_persistence::backends::sqlite::SqliteLimitStore;
use searchgate_persistence::core::FieldLimitStore;

fn create_store() -> SqliteLimitStore {
    let store = SqliteLimitStore::in_memory().expect("Failed to create SQLite store");
    store.init_schema().expect("Failed to initialize schema");
    store
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_lookup_returns_only_requested_fields() {
    let store = create_store();
    store.insert_limit("9", "full", Some("bibstem:apj")).unwrap();
    store.insert_limit("9", "body", Some("bibstem:mnras")).unwrap();

    let rules = store.limits_for("9", &fields(&["full"])).await.unwrap();

    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].field, "full");
    assert_eq!(rules[0].filter.as_deref(), Some("bibstem:apj"));
}

#[tokio::test]
async fn test_lookup_preserves_insertion_order() {
    let store = create_store();
    store.insert_limit("9", "full", Some("bibstem:apj")).unwrap();
    store.insert_limit("9", "bar", Some("bibstem:apr")).unwrap();

    let rules = store
        .limits_for("9", &fields(&["bar", "full"]))
        .await
        .unwrap();

    let filters: Vec<_> = rules.iter().filter_map(|r| r.filter.clone()).collect();
    assert_eq!(filters, vec!["bibstem:apj", "bibstem:apr"]);
}

#[tokio::test]
async fn test_user_id_is_case_sensitive() {
    let store = create_store();
    store.insert_limit("Alice", "full", Some("bibstem:apj")).unwrap();

    assert!(
        store
            .limits_for("alice", &fields(&["full"]))
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        store
            .limits_for("Alice", &fields(&["full"]))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_rule_without_filter_is_returned_but_inert() {
    let store = create_store();
    store.insert_limit("9", "full", None).unwrap();

    let rules = store.limits_for("9", &fields(&["full"])).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert!(!rules[0].grants_access());
}

#[tokio::test]
async fn test_file_store_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("limits.db");

    {
        let store = SqliteLimitStore::open(&path).unwrap();
        store.init_schema().unwrap();
        store.insert_limit("9", "full", Some("bibstem:apj")).unwrap();
    }

    let store = SqliteLimitStore::open(&path).unwrap();
    store.init_schema().unwrap();
    assert!(!store.is_memory());
    let rules = store.limits_for("9", &fields(&["full"])).await.unwrap();
    assert_eq!(rules.len(), 1);
}
