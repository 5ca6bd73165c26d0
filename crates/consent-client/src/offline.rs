//! Offline client strategy
//!
//! Same contract, no network. Used for testing and air-gapped
//! deployments: banner decisions come from the local record, consent
//! writes persist locally, and verification always reports valid.

use crate::endpoints::{
    JurisdictionInfo, LocationInfo, SetConsentRequest, SetConsentResponse,
    ShowConsentBannerResponse, VerifyConsentRequest, VerifyConsentResponse,
};
use crate::interface::{CallbackCell, ConsentClient, FetchOptions};
use crate::response::{ErrorCode, ResponseContext, ResponseError};
use async_trait::async_trait;
use std::sync::Arc;
use storage::{ConsentInfo, ConsentStorage, StoredConsentRecord};

/// Offline strategy of the [`ConsentClient`] contract
pub struct OfflineConsentClient {
    storage: Arc<dyn ConsentStorage>,
    callbacks: Arc<CallbackCell>,
}

impl OfflineConsentClient {
    /// Create an offline client over the given storage adapter
    pub fn new(storage: Arc<dyn ConsentStorage>) -> Self {
        Self { storage, callbacks: Arc::new(CallbackCell::default()) }
    }
}

#[async_trait]
impl ConsentClient for OfflineConsentClient {
    async fn show_consent_banner(
        &self,
        _options: FetchOptions,
    ) -> ResponseContext<ShowConsentBannerResponse> {
        // Unavailable storage defaults to NOT showing the banner, so a
        // broken private-browsing session doesn't prompt on every load.
        let show = match self.storage.load_record() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(error = %e, "storage unavailable; suppressing banner");
                false
            }
        };

        let response = ShowConsentBannerResponse {
            show_consent_banner: show,
            jurisdiction: JurisdictionInfo::unknown(),
            location: LocationInfo::default(),
        };
        self.callbacks.fire_banner_fetched(&response);
        ResponseContext::success(Some(response), None)
    }

    async fn set_consent(
        &self,
        request: SetConsentRequest,
        _options: FetchOptions,
    ) -> ResponseContext<SetConsentResponse> {
        let record = StoredConsentRecord {
            consents: request.preferences.clone(),
            consent_info: Some(ConsentInfo::now(request.decision_type)),
        };
        if let Err(e) = self.storage.save_record(&record) {
            tracing::warn!(error = %e, "could not persist consent record offline");
        }

        let response = SetConsentResponse::default();
        self.callbacks.fire_consent_set(&response);
        ResponseContext::success(Some(response), None)
    }

    async fn verify_consent(
        &self,
        _request: VerifyConsentRequest,
        _options: FetchOptions,
    ) -> ResponseContext<VerifyConsentResponse> {
        let response = VerifyConsentResponse { is_valid: true, reasons: Vec::new() };
        self.callbacks.fire_consent_verified(&response);
        ResponseContext::success(Some(response), None)
    }

    async fn fetch_raw(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> ResponseContext<serde_json::Value> {
        let error = ResponseError::new(
            ErrorCode::EndpointNotFound,
            0,
            format!("Offline client has no handler for {path}"),
        );
        if let Some(hook) = &options.on_error {
            hook(&error);
        }
        self.callbacks.fire_error(&error);
        ResponseContext::failure(error)
    }

    fn callbacks(&self) -> Arc<CallbackCell> {
        Arc::clone(&self.callbacks)
    }
}
