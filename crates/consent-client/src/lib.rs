//! Consent delivery clients
//!
//! This crate implements the network side of the consent SDK: a
//! retrying HTTP client for the compliance backend, an offline client
//! for air-gapped deployments, a custom-handler client for
//! host-supplied logic, and a factory that caches one client instance
//! per distinct configuration.
//!
//! All three strategies implement the [`ConsentClient`] trait, so the
//! state store never branches on which one is active. Errors are never
//! thrown across the public API; every outcome is funneled into a
//! [`ResponseContext`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod custom;
pub mod endpoints;
pub mod factory;
pub mod http;
pub mod interface;
pub mod offline;
pub mod response;
pub mod retry;

pub use custom::{CustomConsentClient, CustomHandlers};
pub use endpoints::{
    JurisdictionInfo, LocationInfo, SetConsentRequest, SetConsentResponse,
    ShowConsentBannerResponse, VerifyConsentRequest, VerifyConsentResponse,
};
pub use factory::{ClientFactory, ClientOptions, C15tOptions};
pub use http::{ClientConfig, CorsMode, HttpConsentClient};
pub use interface::{CallbackCell, CallbackSet, ConsentClient, FetchOptions, HttpMethod};
pub use offline::OfflineConsentClient;
pub use response::{ErrorCode, ResponseContext, ResponseError};
pub use retry::{RetryConfig, RetryContext};
