//! End-to-end consent flows
//!
//! Cross-crate tests wiring the factory, the HTTP client, the sled
//! storage adapter, and the state store together against a wiremock
//! backend: first visit, saved decision surviving a "page reload",
//! offline degradation with replay, and factory instance reuse.

use consent_client::{
    C15tOptions, CallbackSet, ClientConfig, ClientFactory, ClientOptions, ConsentClient,
    FetchOptions, HttpConsentClient, RetryConfig,
};
use consent_state::{ConsentStore, StoreConfig};
use serde_json::json;
use std::sync::Arc;
use storage::{ConsentDecision, ConsentStorage, KvConfig, KvStore, SledConsentStorage};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sled_storage(temp_dir: &TempDir) -> Arc<SledConsentStorage> {
    let db_path = temp_dir.path().join("consent_kv.db");
    let kv = KvStore::new(KvConfig::new(db_path.to_string_lossy())).unwrap();
    Arc::new(SledConsentStorage::new(Arc::new(kv)))
}

#[tokio::test]
async fn test_first_visit_then_saved_decision_survives_reload() {
    init_tracing();
    let mock_server = MockServer::start().await;

    // The banner check must happen exactly once across both "loads".
    Mock::given(method("GET"))
        .and(path("/show-consent-banner"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "showConsentBanner": true,
            "jurisdiction": {"code": "GDPR", "message": "EU visitor"},
            "location": {"countryCode": "DE", "regionCode": null}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/consent/set"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"consentId": "c-1"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let storage = sled_storage(&temp_dir);

    let factory = ClientFactory::new();
    let client = factory.configure(
        ClientOptions::C15t(C15tOptions::new(mock_server.uri())),
        CallbackSet::new(),
        Arc::clone(&storage) as Arc<dyn ConsentStorage>,
    );

    // First visit: the banner is requested and shown.
    {
        let store = ConsentStore::new(
            StoreConfig::new("example.com"),
            Arc::clone(&client),
            Arc::clone(&storage) as Arc<dyn ConsentStorage>,
        );

        let banner = store.fetch_consent_banner_info().await.unwrap();
        assert!(banner.show_consent_banner);
        assert!(store.should_show_banner());

        store.set_consent("marketing", true);
        let ctx = store.save_consents(ConsentDecision::Custom).await;
        assert!(ctx.ok);
        assert!(!store.should_show_banner());
    }

    // "Reload": a fresh store over the same storage finds the decision
    // and never asks the backend about the banner again.
    {
        let store = ConsentStore::new(
            StoreConfig::new("example.com"),
            Arc::clone(&client),
            Arc::clone(&storage) as Arc<dyn ConsentStorage>,
        );

        assert!(store.fetch_consent_banner_info().await.is_none());
        assert!(!store.should_show_banner());
        assert!(store.has_consent_for("marketing"));
        assert!(store.has_consent_for("necessary"));
        assert!(!store.has_consent_for("measurement"));
    }
}

#[tokio::test]
async fn test_offline_decision_is_kept_and_replayed_later() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let storage = sled_storage(&temp_dir);

    // First "page load": nothing listens on this address.
    {
        let config = ClientConfig::new("http://127.0.0.1:9").with_retry(RetryConfig::none());
        let client = Arc::new(HttpConsentClient::new(
            config,
            Arc::clone(&storage) as Arc<dyn ConsentStorage>,
        ));
        let store = ConsentStore::new(
            StoreConfig::new("example.com"),
            client,
            Arc::clone(&storage) as Arc<dyn ConsentStorage>,
        );

        let ctx = store.save_consents(ConsentDecision::All).await;
        assert!(ctx.ok, "offline fallback reports success to the UI");
        assert_eq!(storage.load_queue().unwrap().len(), 1);
        assert!(storage.load_record().unwrap().is_some());
    }

    // Next "page load": the backend is reachable again and the queued
    // write drains.
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/consent/set"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"consentId": "c-replayed"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpConsentClient::new(
        ClientConfig::new(mock_server.uri()),
        Arc::clone(&storage) as Arc<dyn ConsentStorage>,
    );
    client.replay_pending_queue().await;

    assert!(storage.load_queue().unwrap().is_empty());
    assert!(storage.load_record().unwrap().is_some(), "the record outlives the queue");
}

#[tokio::test]
async fn test_factory_hands_page_components_the_same_client() {
    let temp_dir = TempDir::new().unwrap();
    let storage = sled_storage(&temp_dir);
    let factory = ClientFactory::new();

    let banner_widget = factory.configure(
        ClientOptions::C15t(C15tOptions::new("https://consent.example.com")),
        CallbackSet::new(),
        Arc::clone(&storage) as Arc<dyn ConsentStorage>,
    );
    let preferences_dialog = factory.configure(
        ClientOptions::C15t(C15tOptions::new("https://consent.example.com")),
        CallbackSet::new(),
        Arc::clone(&storage) as Arc<dyn ConsentStorage>,
    );
    let other_tenant = factory.configure(
        ClientOptions::C15t(C15tOptions::new("https://consent.other.com")),
        CallbackSet::new(),
        Arc::clone(&storage) as Arc<dyn ConsentStorage>,
    );

    assert!(Arc::ptr_eq(&banner_widget, &preferences_dialog));
    assert!(!Arc::ptr_eq(&banner_widget, &other_tenant));
    assert_eq!(factory.len(), 2);
}

#[tokio::test]
async fn test_offline_mode_never_shows_banner_after_a_decision() {
    let temp_dir = TempDir::new().unwrap();
    let storage = sled_storage(&temp_dir);
    let factory = ClientFactory::new();

    let client = factory.configure(
        ClientOptions::Offline,
        CallbackSet::new(),
        Arc::clone(&storage) as Arc<dyn ConsentStorage>,
    );

    // No record yet: the offline strategy says show.
    let ctx = client.show_consent_banner(FetchOptions::default()).await;
    assert!(ctx.ok);
    assert!(ctx.data.unwrap().show_consent_banner);

    let store = ConsentStore::new(
        StoreConfig::new("example.com"),
        Arc::clone(&client),
        Arc::clone(&storage) as Arc<dyn ConsentStorage>,
    );
    store.save_consents(ConsentDecision::Necessary).await;

    let ctx = client.show_consent_banner(FetchOptions::default()).await;
    assert!(!ctx.data.unwrap().show_consent_banner);
}
