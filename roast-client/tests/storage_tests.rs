use std::env;
use std::sync::Arc;

use roast_client::{
    ClientConfig, DrainPolicy, FileStore, LocalStore, LocalStoreExt, MemoryStore,
    OfflineRequestQueue, RequestOptions, RoastClient, PENDING_REQUESTS_KEY,
};
use roast_diagnostics::DiagnosticsContext;
use serde_json::json;
use serial_test::serial;

fn round_trip(store: &dyn LocalStore) {
    assert_eq!(store.get("roast:1").unwrap(), None);

    store.set("roast:1", "first").unwrap();
    store.set("roast:1", "second").unwrap();
    assert_eq!(store.get("roast:1").unwrap().as_deref(), Some("second"));

    store.remove("roast:1").unwrap();
    assert_eq!(store.get("roast:1").unwrap(), None);
    store.remove("roast:1").unwrap();
}

#[test]
fn test_memory_store_round_trip() {
    round_trip(&MemoryStore::new());
}

#[test]
fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    round_trip(&FileStore::open(dir.path(), "roast").unwrap());
}

#[test]
fn test_file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileStore::open(dir.path(), "roast").unwrap();
        store
            .set_json("roast:42", &json!({ "origin": "Kenya", "charge_f": 410 }))
            .unwrap();
    }

    let reopened = FileStore::open(dir.path(), "roast").unwrap();
    let value: serde_json::Value = reopened.get_json("roast:42").unwrap().unwrap();
    assert_eq!(value["origin"], "Kenya");
}

#[test]
fn test_scopes_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let a = FileStore::open(dir.path(), "shop-a").unwrap();
    let b = FileStore::open(dir.path(), "shop-b").unwrap();

    a.set("profile", "a").unwrap();
    assert_eq!(b.get("profile").unwrap(), None);
    assert_eq!(a.dir().file_name().and_then(|n| n.to_str()), Some("shop-a"));
}

#[tokio::test]
async fn test_offline_queue_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let offline = Arc::new(|| false);
    let transport = Arc::new(roast_client::ReqwestTransport::new());

    {
        let store = Arc::new(FileStore::open(dir.path(), "roast").unwrap());
        let queue = OfflineRequestQueue::new(
            store,
            transport.clone(),
            offline.clone(),
            DiagnosticsContext::disabled(),
        );
        queue
            .submit("/roasts", RequestOptions::post_json(json!({ "bean": "Sidamo" })))
            .await
            .unwrap();
        queue
            .submit("/roasts/7", RequestOptions::delete())
            .await
            .unwrap();
    }

    let store = Arc::new(FileStore::open(dir.path(), "roast").unwrap());
    assert!(store.get(PENDING_REQUESTS_KEY).unwrap().is_some());
    let queue = OfflineRequestQueue::new(
        store,
        transport,
        offline,
        DiagnosticsContext::disabled(),
    );
    let pending = queue.pending().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].options.body, Some(json!({ "bean": "Sidamo" })));
    assert_eq!(pending[1].url, "/roasts/7");
}

fn clear_env() {
    for name in [
        "ROAST_API_BASE_URL",
        "ROAST_API_TOKEN",
        "ROAST_STORE_DIR",
        "ROAST_STORE_SCOPE",
        "ROAST_FETCH_TIMEOUT_MS",
        "ROAST_DRAIN_POLICY",
        "ROAST_MAX_REPLAY_ATTEMPTS",
        "ROAST_SYNC_INTERVAL_MS",
    ] {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_config_from_env() {
    clear_env();
    env::set_var("ROAST_DRAIN_POLICY", "retry-failed");
    env::set_var("ROAST_MAX_REPLAY_ATTEMPTS", "4");
    env::set_var("ROAST_STORE_SCOPE", "lab");

    let config = ClientConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.drain_policy, DrainPolicy::RetryFailed { max_attempts: 4 });
    assert_eq!(config.store_scope, "lab");
    assert_eq!(config.api_base_url, "http://localhost:8080");
}

#[test]
#[serial]
fn test_config_from_env_rejects_garbage() {
    clear_env();
    env::set_var("ROAST_MAX_REPLAY_ATTEMPTS", "many");

    let result = ClientConfig::from_env();
    clear_env();

    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn test_client_create_opens_store_under_configured_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig {
        store_dir: dir.path().to_path_buf(),
        store_scope: "bench".to_string(),
        ..ClientConfig::default()
    };

    let mut client = RoastClient::create(config, false).unwrap();
    client.start_sync();
    client
        .queue()
        .submit("/roasts", RequestOptions::post_json(json!({ "batch": 1 })))
        .await
        .unwrap();

    assert!(dir.path().join("bench").is_dir());
    assert_eq!(client.queue().pending_len().await.unwrap(), 1);

    let diagnostics = client.shutdown();
    assert!(diagnostics.iter().any(|e| e.subsystem == "offline_queue"));
}
