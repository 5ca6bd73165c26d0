//! Persisted consent record and pending-submission layouts
//!
//! Two fixed keys hold everything the SDK persists: the visitor's
//! consent record (category decisions plus decision metadata) and the
//! queue of consent writes that never reached the backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage key for the consent record
pub const RECORD_KEY: &str = "consent:record";

/// Storage key for the pending-submission queue
pub const QUEUE_KEY: &str = "consent:pending";

/// Current time as epoch milliseconds
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// How the visitor's decision was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDecision {
    /// Every category accepted
    All,
    /// Per-category choices
    Custom,
    /// Only non-optional categories accepted
    Necessary,
}

impl std::fmt::Display for ConsentDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsentDecision::All => write!(f, "all"),
            ConsentDecision::Custom => write!(f, "custom"),
            ConsentDecision::Necessary => write!(f, "necessary"),
        }
    }
}

/// Metadata for a recorded consent decision
///
/// Absence of a `ConsentInfo` means no decision exists yet and the
/// banner should be offered. Overwritten on every save, cleared on
/// reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentInfo {
    /// When the decision was made, epoch milliseconds
    pub time: i64,
    /// How the decision was made
    #[serde(rename = "type")]
    pub decision_type: ConsentDecision,
}

impl ConsentInfo {
    /// Stamp a decision with the current time
    pub fn now(decision_type: ConsentDecision) -> Self {
        Self { time: epoch_millis(), decision_type }
    }
}

/// The persisted consent record
///
/// One JSON document under [`RECORD_KEY`] holding the category map and
/// the decision metadata. A best-effort mirror of the in-memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConsentRecord {
    /// Category name to granted/denied
    pub consents: BTreeMap<String, bool>,
    /// Decision metadata, None when no decision exists
    #[serde(default)]
    pub consent_info: Option<ConsentInfo>,
}

/// One failed consent write awaiting replay
///
/// Queue entries are deduplicated by payload equality; `queued_at` is
/// informational and does not participate in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSubmission {
    /// The raw request payload that failed to send
    pub payload: serde_json::Value,
    /// When the payload was queued, epoch milliseconds
    pub queued_at: i64,
}

impl QueuedSubmission {
    /// Queue a payload stamped with the current time
    pub fn new(payload: serde_json::Value) -> Self {
        Self { payload, queued_at: epoch_millis() }
    }
}

impl PartialEq for QueuedSubmission {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_consent_decision_wire_format() {
        assert_eq!(serde_json::to_string(&ConsentDecision::All).unwrap(), "\"all\"");
        assert_eq!(
            serde_json::to_string(&ConsentDecision::Necessary).unwrap(),
            "\"necessary\""
        );

        let parsed: ConsentDecision = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(parsed, ConsentDecision::Custom);
    }

    #[test]
    fn test_consent_info_serialization() {
        let info = ConsentInfo { time: 1_700_000_000_000, decision_type: ConsentDecision::All };
        let value = serde_json::to_value(info).unwrap();

        assert_eq!(value, json!({"time": 1_700_000_000_000i64, "type": "all"}));
    }

    #[test]
    fn test_record_round_trip() {
        let mut consents = BTreeMap::new();
        consents.insert("necessary".to_string(), true);
        consents.insert("marketing".to_string(), false);

        let record = StoredConsentRecord {
            consents,
            consent_info: Some(ConsentInfo::now(ConsentDecision::Custom)),
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: StoredConsentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_missing_info_defaults_to_none() {
        let parsed: StoredConsentRecord =
            serde_json::from_str(r#"{"consents": {"necessary": true}}"#).unwrap();
        assert!(parsed.consent_info.is_none());
    }

    #[test]
    fn test_queued_submission_equality_ignores_timestamp() {
        let a = QueuedSubmission { payload: json!({"type": "all"}), queued_at: 1 };
        let b = QueuedSubmission { payload: json!({"type": "all"}), queued_at: 2 };
        let c = QueuedSubmission { payload: json!({"type": "custom"}), queued_at: 1 };

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
