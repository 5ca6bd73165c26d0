//! Resilient HTTP client for the compliance backend
//!
//! Applies the retry policy per request, degrades to locally-computed
//! answers when the backend stays unreachable, and queues failed
//! consent writes for replay on a later page load. A consent SDK must
//! never break the host page: terminal errors surface only when the
//! caller disables the fallback.

use crate::endpoints::{
    JurisdictionInfo, LocationInfo, SetConsentRequest, SetConsentResponse,
    ShowConsentBannerResponse, VerifyConsentRequest, VerifyConsentResponse,
    SET_CONSENT_PATH, SHOW_CONSENT_BANNER_PATH, VERIFY_CONSENT_PATH,
};
use crate::interface::{CallbackCell, ConsentClient, FetchOptions, HttpMethod};
use crate::response::{ErrorCode, ResponseContext, ResponseError};
use crate::retry::{RetryConfig, RetryContext};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use storage::{ConsentInfo, ConsentStorage, QueuedSubmission, StoredConsentRecord};
use uuid::Uuid;

/// Correlation header attached to every attempt
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Delay before the first replay round, letting the page settle
const REPLAY_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Replay rounds per process lifetime before giving up silently
const REPLAY_ROUNDS: usize = 3;

/// Browser fetch CORS mode, preserved as host configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorsMode {
    /// Cross-origin requests allowed (default)
    #[default]
    Cors,
    /// Opaque cross-origin requests
    NoCors,
    /// Same-origin requests only
    SameOrigin,
}

impl CorsMode {
    /// Mode name as configured
    pub fn as_str(&self) -> &'static str {
        match self {
            CorsMode::Cors => "cors",
            CorsMode::NoCors => "no-cors",
            CorsMode::SameOrigin => "same-origin",
        }
    }
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, absolute or relative to the configured origin
    pub backend_url: String,
    /// Default headers sent on every request
    pub headers: HashMap<String, String>,
    /// Client-wide retry policy
    pub retry: RetryConfig,
    /// CORS mode
    pub cors: CorsMode,
    /// Include credentials (cookies) on requests
    pub include_credentials: bool,
}

impl ClientConfig {
    /// Create a config with a backend URL and defaults elsewhere
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

    /// Set the CORS mode
    pub fn with_cors(mut self, cors: CorsMode) -> Self {
        self.cors = cors;
        self
    }
}

/// Join a base URL and a path with exactly one separator
fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// One attempt, before retry classification
enum AttemptOutcome<T> {
    /// 2xx with a parseable or empty body
    Success(ResponseContext<T>),
    /// Non-2xx with a parseable or absent body
    Http(ResponseError),
    /// Transport-level failure (DNS, connection, timeout)
    Network(ResponseError),
    /// Unparseable body; never retried
    Parse(ResponseError),
}

/// Network strategy of the [`ConsentClient`] contract
#[derive(Clone)]
pub struct HttpConsentClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    storage: Arc<dyn ConsentStorage>,
    callbacks: Arc<CallbackCell>,
}

impl HttpConsentClient {
    /// Create a client and schedule replay of any queued submissions
    pub fn new(config: ClientConfig, storage: Arc<dyn ConsentStorage>) -> Self {
        let mut builder = reqwest::Client::builder();
        if config.include_credentials {
            builder = builder.cookie_store(true);
        }
        let http = builder.build().expect("Failed to build HTTP client");

        let client = Self {
            http,
            config: Arc::new(config),
            storage,
            callbacks: Arc::new(CallbackCell::default()),
        };
        client.schedule_pending_replay();
        client
    }

    /// The client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute a single attempt; no retry state lives here
    async fn execute_once<T>(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&serde_json::Value>,
        options: &FetchOptions,
    ) -> AttemptOutcome<T>
    where
        T: DeserializeOwned,
    {
        let mut req = match method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
        };

        // Defaults first, per-request headers win.
        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }
        for (key, value) in &options.headers {
            req = req.header(key, value);
        }

        // Fresh correlation id per attempt, not per call.
        req = req.header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());

        if let Some(body) = body {
            req = req.header("Content-Type", "application/json").json(body);
        }

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                return AttemptOutcome::Network(ResponseError::network(format!(
                    "Request failed: {e}"
                )));
            }
        };

        let status = response.status().as_u16();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return AttemptOutcome::Network(ResponseError::network(format!(
                    "Failed to read response body: {e}"
                )));
            }
        };

        if (200..300).contains(&status) {
            // 204 and zero-length bodies are valid empty successes.
            if status == 204 || bytes.is_empty() {
                return AttemptOutcome::Success(ResponseContext::success(None, Some(status)));
            }
            return match serde_json::from_slice::<T>(&bytes) {
                Ok(data) => {
                    AttemptOutcome::Success(ResponseContext::success(Some(data), Some(status)))
                }
                Err(e) => AttemptOutcome::Parse(ResponseError::new(
                    ErrorCode::ParseError,
                    status,
                    format!("Failed to parse response body: {e}"),
                )),
            };
        }

        if bytes.is_empty() {
            return AttemptOutcome::Http(ResponseError::new(
                ErrorCode::ApiError,
                status,
                format!("HTTP {status}"),
            ));
        }

        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => {
                let message = value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .or_else(|| value.get("error").and_then(|m| m.as_str()))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("HTTP {status}"));
                AttemptOutcome::Http(
                    ResponseError::new(ErrorCode::ApiError, status, message).with_details(value),
                )
            }
            Err(e) => AttemptOutcome::Parse(ResponseError::new(
                ErrorCode::ParseError,
                status,
                format!("Failed to parse error body: {e}"),
            )),
        }
    }

    /// Full request with retry/backoff; the envelope never throws
    async fn request<T>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&serde_json::Value>,
        options: &FetchOptions,
    ) -> ResponseContext<T>
    where
        T: DeserializeOwned,
    {
        let retry = options.retry_override.as_ref().unwrap_or(&self.config.retry);
        let url = join_url(&self.config.backend_url, path);
        let mut attempts_made: u32 = 0;

        loop {
            let outcome = self.execute_once(method, &url, body, options).await;

            let (error, retryable) = match outcome {
                AttemptOutcome::Success(ctx) => return ctx,
                AttemptOutcome::Parse(error) => (error, false),
                AttemptOutcome::Http(error) => {
                    let ctx = RetryContext {
                        status: Some(error.status),
                        attempts_made,
                        url: url.clone(),
                        method: method.as_str().to_string(),
                    };
                    let retryable = retry.is_retryable_response(error.status, &ctx);
                    (error, retryable)
                }
                AttemptOutcome::Network(error) => {
                    let ctx = RetryContext {
                        status: None,
                        attempts_made,
                        url: url.clone(),
                        method: method.as_str().to_string(),
                    };
                    let retryable = retry.is_retryable_network_error(&ctx);
                    (error, retryable)
                }
            };

            if !retryable || attempts_made >= retry.max_retries {
                tracing::debug!(
                    url = %url,
                    code = %error.code,
                    status = error.status,
                    attempts = attempts_made + 1,
                    "request finalized with error"
                );
                self.fire_error(&error, options);
                return ResponseContext::failure(error);
            }

            attempts_made += 1;
            let delay = retry.delay_before_retry(attempts_made);
            tracing::debug!(url = %url, retry = attempts_made, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }
    }

    fn fire_error(&self, error: &ResponseError, options: &FetchOptions) {
        if let Some(hook) = &options.on_error {
            hook(error);
        }
        self.callbacks.fire_error(error);
    }

    /// Locally-computed banner answer for when the backend is unreachable
    ///
    /// A stored record means no banner is needed; no record means one
    /// is. When storage is unavailable the banner stays hidden to
    /// avoid repeated failed prompts.
    fn fallback_banner_response(&self) -> ShowConsentBannerResponse {
        let show = match self.storage.load_record() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(error = %e, "storage unavailable during banner fallback");
                false
            }
        };
        ShowConsentBannerResponse {
            show_consent_banner: show,
            jurisdiction: JurisdictionInfo::unknown(),
            location: LocationInfo::default(),
        }
    }

    fn schedule_pending_replay(&self) {
        let pending = match self.storage.load_queue() {
            Ok(queue) => queue.len(),
            Err(_) => return,
        };
        if pending == 0 {
            return;
        }
        // Replay only runs inside a runtime; library construction
        // outside one simply leaves the queue for the next session.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        tracing::debug!(pending, "scheduling pending consent replay");
        let client = self.clone();
        handle.spawn(async move {
            tokio::time::sleep(REPLAY_SETTLE_DELAY).await;
            client.replay_pending_queue().await;
        });
    }

    /// Attempt every queued submission, bounded rounds, silent give-up
    ///
    /// Each round tries every item once, drops successes, and persists
    /// the remainder; whatever survives the round budget stays queued
    /// for the next page load.
    pub async fn replay_pending_queue(&self) {
        for round in 0..REPLAY_ROUNDS {
            let queue = match self.storage.load_queue() {
                Ok(queue) => queue,
                Err(e) => {
                    tracing::warn!(error = %e, "storage unavailable during replay");
                    return;
                }
            };
            if queue.is_empty() {
                return;
            }

            tracing::debug!(round, pending = queue.len(), "replaying queued consent writes");
            let mut remaining = Vec::new();
            for item in queue {
                let options = FetchOptions::default()
                    .disable_fallback()
                    .retry(RetryConfig::none());
                let ctx: ResponseContext<SetConsentResponse> = self
                    .request(HttpMethod::Post, SET_CONSENT_PATH, Some(&item.payload), &options)
                    .await;
                if !ctx.ok {
                    remaining.push(item);
                }
            }

            let drained = remaining.is_empty();
            if self.storage.save_queue(&remaining).is_err() {
                return;
            }
            if drained {
                tracing::debug!("pending consent queue drained");
                return;
            }
        }
        tracing::debug!("replay budget exhausted; queue left for the next page load");
    }
}

#[async_trait]
impl ConsentClient for HttpConsentClient {
    async fn show_consent_banner(
        &self,
        options: FetchOptions,
    ) -> ResponseContext<ShowConsentBannerResponse> {
        let ctx = self
            .request::<ShowConsentBannerResponse>(
                HttpMethod::Get,
                SHOW_CONSENT_BANNER_PATH,
                None,
                &options,
            )
            .await;

        if ctx.ok {
            if let Some(data) = &ctx.data {
                self.callbacks.fire_banner_fetched(data);
            }
            return ctx;
        }
        if options.disable_fallback {
            return ctx;
        }

        tracing::warn!("banner check failed after retries; serving offline fallback");
        let fallback = self.fallback_banner_response();
        self.callbacks.fire_banner_fetched(&fallback);
        ResponseContext::success(Some(fallback), None)
    }

    async fn set_consent(
        &self,
        request: SetConsentRequest,
        options: FetchOptions,
    ) -> ResponseContext<SetConsentResponse> {
        let body = match serde_json::to_value(&request) {
            Ok(body) => body,
            Err(e) => {
                let error = ResponseError::new(
                    ErrorCode::ParseError,
                    0,
                    format!("Failed to serialize consent payload: {e}"),
                );
                self.fire_error(&error, &options);
                return ResponseContext::failure(error);
            }
        };

        let ctx = self
            .request::<SetConsentResponse>(HttpMethod::Post, SET_CONSENT_PATH, Some(&body), &options)
            .await;

        if ctx.ok {
            if let Some(data) = &ctx.data {
                self.callbacks.fire_consent_set(data);
            }
            return ctx;
        }
        if options.disable_fallback {
            return ctx;
        }

        // The UI proceeds optimistically: persist the decision locally
        // and queue the payload for replay on a later page load.
        let record = StoredConsentRecord {
            consents: request.preferences.clone(),
            consent_info: Some(ConsentInfo::now(request.decision_type)),
        };
        if let Err(e) = self.storage.save_record(&record) {
            tracing::warn!(error = %e, "could not persist consent record during fallback");
        }
        match self.storage.enqueue(QueuedSubmission::new(body)) {
            Ok(true) => tracing::warn!("consent write failed; payload queued for replay"),
            Ok(false) => tracing::debug!("consent write failed; identical payload already queued"),
            Err(e) => tracing::warn!(error = %e, "could not queue failed consent write"),
        }

        ResponseContext::success(Some(SetConsentResponse::default()), None)
    }

    async fn verify_consent(
        &self,
        request: VerifyConsentRequest,
        options: FetchOptions,
    ) -> ResponseContext<VerifyConsentResponse> {
        let body = match serde_json::to_value(&request) {
            Ok(body) => body,
            Err(e) => {
                let error = ResponseError::new(
                    ErrorCode::ParseError,
                    0,
                    format!("Failed to serialize verification payload: {e}"),
                );
                self.fire_error(&error, &options);
                return ResponseContext::failure(error);
            }
        };

        let ctx = self
            .request::<VerifyConsentResponse>(
                HttpMethod::Post,
                VERIFY_CONSENT_PATH,
                Some(&body),
                &options,
            )
            .await;

        if let Some(data) = &ctx.data {
            self.callbacks.fire_consent_verified(data);
        }
        ctx
    }

    async fn fetch_raw(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> ResponseContext<serde_json::Value> {
        let method = options.method.unwrap_or(HttpMethod::Get);
        let body = options.body.clone();
        self.request(method, path, body.as_ref(), &options).await
    }

    fn callbacks(&self) -> Arc<CallbackCell> {
        Arc::clone(&self.callbacks)
    }
}
