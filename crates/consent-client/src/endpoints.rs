//! Wire types for the compliance backend
//!
//! JSON over HTTPS, camelCase field names. Three operations:
//!
//! | Operation    | Method | Path                   |
//! |--------------|--------|------------------------|
//! | Banner check | GET    | `/show-consent-banner` |
//! | Set consent  | POST   | `/consent/set`         |
//! | Verify       | POST   | `/consent/verify`      |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storage::ConsentDecision;

/// Path of the banner-check operation
pub const SHOW_CONSENT_BANNER_PATH: &str = "/show-consent-banner";

/// Path of the set-consent operation
pub const SET_CONSENT_PATH: &str = "/consent/set";

/// Path of the verify-consent operation
pub const VERIFY_CONSENT_PATH: &str = "/consent/verify";

/// Regulatory regime determined for the visitor's location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisdictionInfo {
    /// Regime code, e.g. "GDPR", "CCPA", or "UNKNOWN"
    pub code: String,
    /// Human-readable explanation
    #[serde(default)]
    pub message: Option<String>,
}

impl JurisdictionInfo {
    /// Jurisdiction when the backend could not be reached
    pub fn unknown() -> Self {
        Self {
            code: "UNKNOWN".to_string(),
            message: Some("Backend unreachable; jurisdiction unknown".to_string()),
        }
    }
}

/// Geolocation resolved by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    /// ISO country code
    #[serde(default)]
    pub country_code: Option<String>,
    /// Region/state code within the country
    #[serde(default)]
    pub region_code: Option<String>,
}

/// Success payload of the banner check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowConsentBannerResponse {
    /// Whether a banner must be shown for this visitor
    pub show_consent_banner: bool,
    /// Applicable regulatory regime
    pub jurisdiction: JurisdictionInfo,
    /// Resolved visitor location
    #[serde(default)]
    pub location: LocationInfo,
}

/// Body of the set-consent operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConsentRequest {
    /// How the decision was made
    #[serde(rename = "type")]
    pub decision_type: ConsentDecision,
    /// Host page domain the decision applies to
    pub domain: String,
    /// Category name to granted/denied
    pub preferences: BTreeMap<String, bool>,
    /// Optional host-supplied metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Success payload of the set-consent operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConsentResponse {
    /// Backend-assigned identifier for the recorded decision
    #[serde(default)]
    pub consent_id: Option<String>,
    /// Backend timestamp, epoch milliseconds
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Body of the verify-consent operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyConsentRequest {
    /// How the decision was made
    #[serde(rename = "type")]
    pub decision_type: ConsentDecision,
    /// Host page domain the decision applies to
    pub domain: String,
    /// Category name to granted/denied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<BTreeMap<String, bool>>,
    /// Alternative: verify against a published policy version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

/// Success payload of the verify-consent operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyConsentResponse {
    /// Whether the stored consent is still valid
    pub is_valid: bool,
    /// Why validation failed, when it did
    #[serde(default)]
    pub reasons: Vec<String>,
}
