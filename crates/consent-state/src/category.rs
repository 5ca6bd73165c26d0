//! Consent categories and compliance regimes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category name to granted/denied, always exactly the declared set
pub type ConsentState = BTreeMap<String, bool>;

/// One consent category declared at store construction
///
/// The category set is immutable once the store exists; `disabled`
/// categories (strictly necessary processing) can never be flipped by
/// the visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentCategory {
    /// Stable identifier, e.g. "marketing"
    pub name: String,
    /// Value seeded when no persisted decision exists
    pub default_value: bool,
    /// Whether the visitor can change this category
    pub disabled: bool,
    /// Human-readable label for banner UIs
    pub display: String,
    /// GDPR purpose number, when one applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr_type: Option<u32>,
}

impl ConsentCategory {
    /// A visitor-changeable category, denied by default
    pub fn new(name: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: false,
            disabled: false,
            display: display.into(),
            gdpr_type: None,
        }
    }

    /// Set the default value
    pub fn default_value(mut self, value: bool) -> Self {
        self.default_value = value;
        self
    }

    /// Mark the category as not visitor-changeable
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Set the GDPR purpose number
    pub fn gdpr_type(mut self, purpose: u32) -> Self {
        self.gdpr_type = Some(purpose);
        self
    }
}

/// The five stock categories
///
/// `necessary` is granted and locked; everything else is denied until
/// the visitor decides.
pub fn default_categories() -> Vec<ConsentCategory> {
    vec![
        ConsentCategory::new("necessary", "Necessary")
            .default_value(true)
            .disabled()
            .gdpr_type(1),
        ConsentCategory::new("functionality", "Functionality").gdpr_type(2),
        ConsentCategory::new("experience", "Experience").gdpr_type(3),
        ConsentCategory::new("marketing", "Marketing").gdpr_type(4),
        ConsentCategory::new("measurement", "Measurement").gdpr_type(5),
    ]
}

/// Regulatory regime a deployment may need to honor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplianceRegion {
    /// EU General Data Protection Regulation
    Gdpr,
    /// California Consumer Privacy Act
    Ccpa,
    /// Brazilian Lei Geral de Proteção de Dados
    Lgpd,
    /// Other US state privacy laws
    UsStatePrivacy,
}

/// Per-regime toggle set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSettings {
    /// Whether the regime is honored at all
    pub enabled: bool,
    /// Apply the regime regardless of visitor location
    pub applies_globally: bool,
    /// Resolved applicability for this visitor, once known
    #[serde(default)]
    pub applies: Option<bool>,
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self { enabled: true, applies_globally: false, applies: None }
    }
}

/// Default per-regime settings: GDPR applied globally, the rest
/// location-gated
pub fn default_compliance() -> BTreeMap<ComplianceRegion, ComplianceSettings> {
    BTreeMap::from([
        (
            ComplianceRegion::Gdpr,
            ComplianceSettings { enabled: true, applies_globally: true, applies: None },
        ),
        (ComplianceRegion::Ccpa, ComplianceSettings::default()),
        (ComplianceRegion::Lgpd, ComplianceSettings::default()),
        (ComplianceRegion::UsStatePrivacy, ComplianceSettings::default()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_categories_lock_necessary_only() {
        let categories = default_categories();
        assert_eq!(categories.len(), 5);

        let necessary = categories.iter().find(|c| c.name == "necessary").unwrap();
        assert!(necessary.disabled);
        assert!(necessary.default_value);

        for category in categories.iter().filter(|c| c.name != "necessary") {
            assert!(!category.disabled, "{} must be visitor-changeable", category.name);
            assert!(!category.default_value, "{} must be denied by default", category.name);
        }
    }

    #[test]
    fn test_category_wire_format() {
        let category = ConsentCategory::new("marketing", "Marketing").gdpr_type(4);
        let value = serde_json::to_value(&category).unwrap();

        assert_eq!(value["name"], "marketing");
        assert_eq!(value["defaultValue"], false);
        assert_eq!(value["gdprType"], 4);
    }

    #[test]
    fn test_compliance_region_serialization() {
        assert_eq!(
            serde_json::to_value(ComplianceRegion::UsStatePrivacy).unwrap(),
            "usStatePrivacy"
        );
        assert_eq!(serde_json::to_value(ComplianceRegion::Gdpr).unwrap(), "gdpr");
    }

    #[test]
    fn test_default_compliance_applies_gdpr_globally() {
        let compliance = default_compliance();
        assert!(compliance[&ComplianceRegion::Gdpr].applies_globally);
        assert!(!compliance[&ComplianceRegion::Ccpa].applies_globally);
    }
}
