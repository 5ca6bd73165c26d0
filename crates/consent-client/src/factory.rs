//! Client factory and instance cache
//!
//! One client per distinct configuration: repeated configuration calls
//! with the same mode, backend URL, and header set reuse the cached
//! instance, so request de-duplication and the pending queue keep
//! working across re-renders. Later calls only rebind the callback
//! cell and never construct a second network client.

use crate::custom::{CustomConsentClient, CustomHandlers};
use crate::http::{ClientConfig, CorsMode, HttpConsentClient};
use crate::interface::{CallbackSet, ConsentClient};
use crate::offline::OfflineConsentClient;
use crate::retry::RetryConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use storage::ConsentStorage;

/// Options for the network (`c15t`) mode
#[derive(Debug, Clone)]
pub struct C15tOptions {
    /// Backend base URL
    pub backend_url: String,
    /// Default headers for every request
    pub headers: HashMap<String, String>,
    /// Client-wide retry policy
    pub retry: RetryConfig,
    /// CORS mode
    pub cors: CorsMode,
    /// Include credentials (cookies) on requests
    pub include_credentials: bool,
}

impl C15tOptions {
    /// Network-mode options with defaults
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            headers: HashMap::new(),
            retry: RetryConfig::default(),
            cors: CorsMode::default(),
            include_credentials: true,
        }
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Which client strategy to construct
pub enum ClientOptions {
    /// Talk to the compliance backend
    C15t(C15tOptions),
    /// Local-only behavior, no network
    Offline,
    /// Delegate to host-supplied handlers
    Custom(CustomHandlers),
}

impl ClientOptions {
    /// Cache key: mode + backend URL + sorted header set, or mode +
    /// handler-registry identity
    fn cache_key(&self) -> String {
        match self {
            ClientOptions::C15t(options) => {
                let mut headers: Vec<_> = options
                    .headers
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                headers.sort();
                format!("c15t|{}|{}", options.backend_url, headers.join(","))
            }
            ClientOptions::Offline => "offline".to_string(),
            ClientOptions::Custom(handlers) => {
                format!("custom|{:x}", handlers.registry_id())
            }
        }
    }
}

/// Memoizing client factory
///
/// Safe to call from any task; the cache lives for the process
/// lifetime unless [`ClientFactory::clear`] is invoked.
#[derive(Default)]
pub struct ClientFactory {
    cache: Mutex<HashMap<String, Arc<dyn ConsentClient>>>,
}

impl ClientFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide factory instance
    pub fn global() -> &'static ClientFactory {
        static GLOBAL: OnceLock<ClientFactory> = OnceLock::new();
        GLOBAL.get_or_init(ClientFactory::new)
    }

    /// Construct or reuse the client for this configuration
    ///
    /// A cache hit rebinds the callback cell and returns the existing
    /// instance, so stale closures from earlier configuration calls
    /// are never invoked and in-flight state is preserved.
    pub fn configure(
        &self,
        options: ClientOptions,
        callbacks: CallbackSet,
        storage: Arc<dyn ConsentStorage>,
    ) -> Arc<dyn ConsentClient> {
        let key = options.cache_key();
        let mut cache = self.cache.lock();

        if let Some(client) = cache.get(&key) {
            tracing::debug!(key = %key, "reusing cached consent client");
            client.callbacks().replace(callbacks);
            return Arc::clone(client);
        }

        let client: Arc<dyn ConsentClient> = match options {
            ClientOptions::C15t(options) => {
                let config = ClientConfig {
                    backend_url: options.backend_url,
                    headers: options.headers,
                    retry: options.retry,
                    cors: options.cors,
                    include_credentials: options.include_credentials,
                };
                Arc::new(HttpConsentClient::new(config, storage))
            }
            ClientOptions::Offline => Arc::new(OfflineConsentClient::new(storage)),
            ClientOptions::Custom(handlers) => Arc::new(CustomConsentClient::new(handlers)),
        };

        client.callbacks().replace(callbacks);
        cache.insert(key, Arc::clone(&client));
        client
    }

    /// Drop every cached instance (test isolation hook)
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Number of cached instances
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::MemoryConsentStorage;

    fn storage() -> Arc<dyn ConsentStorage> {
        Arc::new(MemoryConsentStorage::new())
    }

    #[tokio::test]
    async fn test_identical_options_reuse_the_instance() {
        let factory = ClientFactory::new();

        let a = factory.configure(
            ClientOptions::C15t(C15tOptions::new("https://api.example.com")),
            CallbackSet::new(),
            storage(),
        );
        let b = factory.configure(
            ClientOptions::C15t(C15tOptions::new("https://api.example.com")),
            CallbackSet::new(),
            storage(),
        );

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_configurations_get_distinct_instances() {
        let factory = ClientFactory::new();

        let a = factory.configure(
            ClientOptions::C15t(C15tOptions::new("https://api.example.com")),
            CallbackSet::new(),
            storage(),
        );
        let b = factory.configure(
            ClientOptions::C15t(C15tOptions::new("https://other.example.com")),
            CallbackSet::new(),
            storage(),
        );
        let c = factory.configure(
            ClientOptions::C15t(
                C15tOptions::new("https://api.example.com").with_header("X-Api-Key", "k"),
            ),
            CallbackSet::new(),
            storage(),
        );

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(factory.len(), 3);
    }

    #[tokio::test]
    async fn test_header_order_does_not_change_the_key() {
        let factory = ClientFactory::new();

        let a = factory.configure(
            ClientOptions::C15t(
                C15tOptions::new("https://api.example.com")
                    .with_header("A", "1")
                    .with_header("B", "2"),
            ),
            CallbackSet::new(),
            storage(),
        );
        let b = factory.configure(
            ClientOptions::C15t(
                C15tOptions::new("https://api.example.com")
                    .with_header("B", "2")
                    .with_header("A", "1"),
            ),
            CallbackSet::new(),
            storage(),
        );

        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_cache_hit_rebinds_callbacks() {
        let factory = ClientFactory::new();
        let stale = Arc::new(AtomicUsize::new(0));
        let fresh = Arc::new(AtomicUsize::new(0));

        let s = Arc::clone(&stale);
        let client = factory.configure(
            ClientOptions::Offline,
            CallbackSet::new().on_error(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            }),
            storage(),
        );

        let f = Arc::clone(&fresh);
        let reused = factory.configure(
            ClientOptions::Offline,
            CallbackSet::new().on_error(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            }),
            storage(),
        );

        assert!(Arc::ptr_eq(&client, &reused));
        reused.callbacks().fire_error(&ResponseError::network("offline"));

        assert_eq!(stale.load(Ordering::SeqCst), 0, "stale closure must not run");
        assert_eq!(fresh.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_mode_keys_on_registry_identity() {
        let factory = ClientFactory::new();
        let handlers = CustomHandlers::new();

        let a = factory.configure(
            ClientOptions::Custom(handlers.clone()),
            CallbackSet::new(),
            storage(),
        );
        let b = factory.configure(
            ClientOptions::Custom(handlers),
            CallbackSet::new(),
            storage(),
        );
        let c = factory.configure(
            ClientOptions::Custom(CustomHandlers::new()),
            CallbackSet::new(),
            storage(),
        );

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_clear_forces_fresh_instances() {
        let factory = ClientFactory::new();

        let a = factory.configure(ClientOptions::Offline, CallbackSet::new(), storage());
        factory.clear();
        assert!(factory.is_empty());

        let b = factory.configure(ClientOptions::Offline, CallbackSet::new(), storage());
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
