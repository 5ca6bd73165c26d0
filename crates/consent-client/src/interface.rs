//! Shared client contract
//!
//! The network, offline, and custom strategies all implement
//! [`ConsentClient`], so the store and UI never branch on which one is
//! active. Callbacks live in a [`CallbackCell`] the client reads at
//! call time; rebinding the cell on a cached instance replaces stale
//! closures without constructing a second client.

use crate::endpoints::{
    SetConsentRequest, SetConsentResponse, ShowConsentBannerResponse, VerifyConsentRequest,
    VerifyConsentResponse,
};
use crate::response::{ResponseContext, ResponseError};
use crate::retry::RetryConfig;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// HTTP method for the `fetch_raw` escape hatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Per-call error hook, fired in addition to the client-wide one
pub type ErrorHook = Arc<dyn Fn(&ResponseError) + Send + Sync>;

/// Per-request options
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Extra headers merged over the client defaults
    pub headers: HashMap<String, String>,
    /// Retry policy override for this request only
    pub retry_override: Option<RetryConfig>,
    /// Suppress offline degradation so error paths stay observable
    pub disable_fallback: bool,
    /// Method for `fetch_raw` (the three named operations fix their own)
    pub method: Option<HttpMethod>,
    /// Body for `fetch_raw`
    pub body: Option<serde_json::Value>,
    /// Per-call error hook
    pub on_error: Option<ErrorHook>,
}

impl std::fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOptions")
            .field("headers", &self.headers)
            .field("retry_override", &self.retry_override)
            .field("disable_fallback", &self.disable_fallback)
            .field("method", &self.method)
            .field("body", &self.body)
            .field("on_error", &self.on_error.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl FetchOptions {
    /// Add a request header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Override the retry policy for this request
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_override = Some(config);
        self
    }

    /// Disable the offline fallback (testing hook)
    pub fn disable_fallback(mut self) -> Self {
        self.disable_fallback = true;
        self
    }

    /// Set the method for `fetch_raw`
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the JSON body for `fetch_raw`
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the per-call error hook
    pub fn on_error(mut self, f: impl Fn(&ResponseError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

type ErrorCallback = Box<dyn Fn(&ResponseError) + Send + Sync>;
type BannerCallback = Box<dyn Fn(&ShowConsentBannerResponse) + Send + Sync>;
type ConsentSetCallback = Box<dyn Fn(&SetConsentResponse) + Send + Sync>;
type ConsentVerifiedCallback = Box<dyn Fn(&VerifyConsentResponse) + Send + Sync>;

/// Host-supplied event hooks
#[derive(Default)]
pub struct CallbackSet {
    /// Invoked for every finalized error
    pub on_error: Option<ErrorCallback>,
    /// Invoked when a banner check resolves successfully
    pub on_consent_banner_fetched: Option<BannerCallback>,
    /// Invoked when a consent write resolves successfully
    pub on_consent_set: Option<ConsentSetCallback>,
    /// Invoked when a verification resolves successfully
    pub on_consent_verified: Option<ConsentVerifiedCallback>,
}

impl CallbackSet {
    /// Empty callback set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the error hook
    pub fn on_error(mut self, f: impl Fn(&ResponseError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Set the banner-fetched hook
    pub fn on_consent_banner_fetched(
        mut self,
        f: impl Fn(&ShowConsentBannerResponse) + Send + Sync + 'static,
    ) -> Self {
        self.on_consent_banner_fetched = Some(Box::new(f));
        self
    }

    /// Set the consent-set hook
    pub fn on_consent_set(
        mut self,
        f: impl Fn(&SetConsentResponse) + Send + Sync + 'static,
    ) -> Self {
        self.on_consent_set = Some(Box::new(f));
        self
    }

    /// Set the consent-verified hook
    pub fn on_consent_verified(
        mut self,
        f: impl Fn(&VerifyConsentResponse) + Send + Sync + 'static,
    ) -> Self {
        self.on_consent_verified = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSet")
            .field("on_error", &self.on_error.is_some())
            .field(
                "on_consent_banner_fetched",
                &self.on_consent_banner_fetched.is_some(),
            )
            .field("on_consent_set", &self.on_consent_set.is_some())
            .field("on_consent_verified", &self.on_consent_verified.is_some())
            .finish()
    }
}

/// "Current callbacks" indirection cell
///
/// Clients read the cell at call time, so replacing its contents on a
/// cached instance rebinds callbacks from later configuration calls
/// without the risk of invoking stale closures.
#[derive(Default)]
pub struct CallbackCell {
    inner: RwLock<CallbackSet>,
}

impl CallbackCell {
    /// Create a cell holding the given set
    pub fn new(set: CallbackSet) -> Self {
        Self { inner: RwLock::new(set) }
    }

    /// Replace the current callback set
    pub fn replace(&self, set: CallbackSet) {
        *self.inner.write() = set;
    }

    /// Fire the error hook
    pub fn fire_error(&self, error: &ResponseError) {
        if let Some(f) = &self.inner.read().on_error {
            f(error);
        }
    }

    /// Fire the banner-fetched hook
    pub fn fire_banner_fetched(&self, response: &ShowConsentBannerResponse) {
        if let Some(f) = &self.inner.read().on_consent_banner_fetched {
            f(response);
        }
    }

    /// Fire the consent-set hook
    pub fn fire_consent_set(&self, response: &SetConsentResponse) {
        if let Some(f) = &self.inner.read().on_consent_set {
            f(response);
        }
    }

    /// Fire the consent-verified hook
    pub fn fire_consent_verified(&self, response: &VerifyConsentResponse) {
        if let Some(f) = &self.inner.read().on_consent_verified {
            f(response);
        }
    }
}

/// The shared contract all client strategies implement
///
/// Operations resolve to a [`ResponseContext`] and never return a hard
/// error; callers that want one use `into_result()`.
#[async_trait]
pub trait ConsentClient: Send + Sync {
    /// Decide whether a banner must be shown for this visitor
    async fn show_consent_banner(
        &self,
        options: FetchOptions,
    ) -> ResponseContext<ShowConsentBannerResponse>;

    /// Record a consent decision
    async fn set_consent(
        &self,
        request: SetConsentRequest,
        options: FetchOptions,
    ) -> ResponseContext<SetConsentResponse>;

    /// Check whether previously stored consent is still valid
    async fn verify_consent(
        &self,
        request: VerifyConsentRequest,
        options: FetchOptions,
    ) -> ResponseContext<VerifyConsentResponse>;

    /// Escape hatch for arbitrary paths with the same semantics
    async fn fetch_raw(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> ResponseContext<serde_json::Value>;

    /// The callback indirection cell this client reads at call time
    fn callbacks(&self) -> Arc<CallbackCell>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callback_cell_fires_current_set() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cell = CallbackCell::default();

        let c = Arc::clone(&counter);
        cell.replace(CallbackSet::new().on_error(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        let error = ResponseError::new(ErrorCode::ApiError, 500, "boom");
        cell.fire_error(&error);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_cell_rebind_drops_stale_closure() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let cell = CallbackCell::default();

        let f = Arc::clone(&first);
        cell.replace(CallbackSet::new().on_error(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        }));

        let s = Arc::clone(&second);
        cell.replace(CallbackSet::new().on_error(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        }));

        cell.fire_error(&ResponseError::network("offline"));
        assert_eq!(first.load(Ordering::SeqCst), 0, "stale closure must not run");
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_options_builder() {
        let options = FetchOptions::default()
            .header("X-Api-Key", "k")
            .disable_fallback()
            .method(HttpMethod::Post)
            .body(serde_json::json!({"a": 1}));

        assert_eq!(options.headers.get("X-Api-Key").map(String::as_str), Some("k"));
        assert!(options.disable_fallback);
        assert_eq!(options.method, Some(HttpMethod::Post));
        assert!(options.body.is_some());
    }
}
