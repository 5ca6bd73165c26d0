//! Custom-handler client strategy
//!
//! Delegates every operation to host-supplied handler functions,
//! keyed by path. Handlers can be registered at any time; a missing
//! handler yields a structured `ENDPOINT_NOT_FOUND` error instead of
//! a panic.

use crate::endpoints::{
    SetConsentRequest, SetConsentResponse, ShowConsentBannerResponse, VerifyConsentRequest,
    VerifyConsentResponse, SET_CONSENT_PATH, SHOW_CONSENT_BANNER_PATH, VERIFY_CONSENT_PATH,
};
use crate::interface::{CallbackCell, ConsentClient, FetchOptions};
use crate::response::{ErrorCode, ResponseContext, ResponseError};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future a handler returns
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value, String>> + Send>>;

/// A host-supplied operation handler
///
/// Receives the JSON request payload (None for GET-style operations)
/// and resolves to a JSON response or an error message.
pub type Handler = Arc<dyn Fn(Option<serde_json::Value>) -> HandlerFuture + Send + Sync>;

/// Registry of path-keyed handlers, shareable across clients
#[derive(Clone, Default)]
pub struct CustomHandlers {
    inner: Arc<RwLock<HashMap<String, Handler>>>,
}

impl CustomHandlers {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a path, replacing any existing one
    pub fn register(
        &self,
        path: impl Into<String>,
        handler: impl Fn(Option<serde_json::Value>) -> HandlerFuture + Send + Sync + 'static,
    ) {
        self.inner.write().insert(path.into(), Arc::new(handler));
    }

    /// Remove a handler; returns true when one was registered
    pub fn unregister(&self, path: &str) -> bool {
        self.inner.write().remove(path).is_some()
    }

    /// Look up the handler for a path
    pub fn get(&self, path: &str) -> Option<Handler> {
        self.inner.read().get(path).cloned()
    }

    /// Identity of the underlying registry, used as a cache key part
    pub fn registry_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

/// Custom strategy of the [`ConsentClient`] contract
pub struct CustomConsentClient {
    handlers: CustomHandlers,
    callbacks: Arc<CallbackCell>,
}

impl CustomConsentClient {
    /// Create a client over a handler registry
    pub fn new(handlers: CustomHandlers) -> Self {
        Self { handlers, callbacks: Arc::new(CallbackCell::default()) }
    }

    /// The handler registry, for runtime registration
    pub fn handlers(&self) -> &CustomHandlers {
        &self.handlers
    }

    async fn dispatch<T>(
        &self,
        path: &str,
        payload: Option<serde_json::Value>,
        options: &FetchOptions,
    ) -> ResponseContext<T>
    where
        T: DeserializeOwned,
    {
        let Some(handler) = self.handlers.get(path) else {
            let error = ResponseError::new(
                ErrorCode::EndpointNotFound,
                0,
                format!("No handler registered for {path}"),
            );
            self.fire_error(&error, options);
            return ResponseContext::failure(error);
        };

        match handler(payload).await {
            Ok(value) => match serde_json::from_value::<T>(value) {
                Ok(data) => ResponseContext::success(Some(data), None),
                Err(e) => {
                    let error = ResponseError::new(
                        ErrorCode::ParseError,
                        0,
                        format!("Handler for {path} returned an unexpected shape: {e}"),
                    );
                    self.fire_error(&error, options);
                    ResponseContext::failure(error)
                }
            },
            Err(message) => {
                let error = ResponseError::new(ErrorCode::HandlerError, 0, message);
                self.fire_error(&error, options);
                ResponseContext::failure(error)
            }
        }
    }

    fn fire_error(&self, error: &ResponseError, options: &FetchOptions) {
        if let Some(hook) = &options.on_error {
            hook(error);
        }
        self.callbacks.fire_error(error);
    }
}

#[async_trait]
impl ConsentClient for CustomConsentClient {
    async fn show_consent_banner(
        &self,
        options: FetchOptions,
    ) -> ResponseContext<ShowConsentBannerResponse> {
        let ctx = self.dispatch(SHOW_CONSENT_BANNER_PATH, None, &options).await;
        if let Some(data) = &ctx.data {
            self.callbacks.fire_banner_fetched(data);
        }
        ctx
    }

    async fn set_consent(
        &self,
        request: SetConsentRequest,
        options: FetchOptions,
    ) -> ResponseContext<SetConsentResponse> {
        let payload = match serde_json::to_value(&request) {
            Ok(payload) => payload,
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

        let ctx = self.dispatch(SET_CONSENT_PATH, Some(payload), &options).await;
        if let Some(data) = &ctx.data {
            self.callbacks.fire_consent_set(data);
        }
        ctx
    }

    async fn verify_consent(
        &self,
        request: VerifyConsentRequest,
        options: FetchOptions,
    ) -> ResponseContext<VerifyConsentResponse> {
        let payload = match serde_json::to_value(&request) {
            Ok(payload) => payload,
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

        let ctx = self.dispatch(VERIFY_CONSENT_PATH, Some(payload), &options).await;
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
        let body = options.body.clone();
        self.dispatch(path, body, &options).await
    }

    fn callbacks(&self) -> Arc<CallbackCell> {
        Arc::clone(&self.callbacks)
    }
}
