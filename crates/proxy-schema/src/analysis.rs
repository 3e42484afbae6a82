//! Analysis types - output of the complexity scorer.

use edgeshift_common::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target recorded for policies without a known equivalent.
pub const MANUAL_MIGRATION_REQUIRED: &str = "Manual Migration Required";

/// Weight accumulated for a policy missing from the mapping table.
///
/// Deliberately above the complex tier: an unknown policy is harder than any
/// known one.
pub const UNKNOWN_POLICY_WEIGHT: f64 = 75.0;

/// Difficulty bucket of a known policy mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityTier {
    /// Score weight contributed by one policy of this tier.
    pub fn weight(&self) -> f64 {
        match self {
            ComplexityTier::Simple => 10.0,
            ComplexityTier::Moderate => 25.0,
            ComplexityTier::Complex => 50.0,
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplexityTier::Simple => write!(f, "simple"),
            ComplexityTier::Moderate => write!(f, "moderate"),
            ComplexityTier::Complex => write!(f, "complex"),
        }
    }
}

/// Qualitative level of a whole proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityLevel {
    /// Bucket a 0-100 score: below 30 is simple, below 70 moderate.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            ComplexityLevel::Simple
        } else if score < 70.0 {
            ComplexityLevel::Moderate
        } else {
            ComplexityLevel::Complex
        }
    }

    /// Effort estimate used when the oracle offers none.
    pub fn default_effort(&self) -> &'static str {
        match self {
            ComplexityLevel::Simple => "1-2 hours",
            ComplexityLevel::Moderate => "4-8 hours",
            ComplexityLevel::Complex => "1-3 days",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplexityLevel::Simple => write!(f, "simple"),
            ComplexityLevel::Moderate => write!(f, "moderate"),
            ComplexityLevel::Complex => write!(f, "complex"),
        }
    }
}

/// Mapping of one source policy to its target-platform equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMapping {
    pub source_policy: String,
    pub target_equivalent: String,
    pub complexity_tier: ComplexityTier,
    pub notes: String,
    pub requires_custom_code: bool,
}

impl PolicyMapping {
    /// Mapping for a policy the table does not know.
    pub fn manual(source_policy: impl Into<String>) -> Self {
        Self {
            source_policy: source_policy.into(),
            target_equivalent: MANUAL_MIGRATION_REQUIRED.to_string(),
            complexity_tier: ComplexityTier::Complex,
            notes: "Custom policy requires manual analysis and migration".to_string(),
            requires_custom_code: true,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.target_equivalent == MANUAL_MIGRATION_REQUIRED
    }
}

/// Scored result of an analysis, without identity or persistence fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    pub proxy_name: String,
    /// 0-100 inclusive.
    pub complexity_score: f64,
    pub complexity_level: ComplexityLevel,
    pub policy_count: usize,
    /// Policies without a known equivalent.
    pub custom_policies: Vec<String>,
    pub policy_mappings: Vec<PolicyMapping>,
    /// Target server names the proxy depends on.
    pub dependencies: Vec<String>,
    pub migration_effort: String,
    pub recommendations: String,
}

/// Lifecycle of an analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
}

/// A persisted analysis. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    /// Id of the analysed proxy upload.
    pub proxy_id: String,
    #[serde(flatten)]
    pub assessment: ComplexityAssessment,
    pub status: AnalysisStatus,
    pub analyzed_at: Timestamp,
}

impl Analysis {
    /// Wrap a completed assessment into a new record.
    pub fn completed(proxy_id: impl Into<String>, assessment: ComplexityAssessment) -> Self {
        Self {
            id: edgeshift_common::new_id(),
            proxy_id: proxy_id.into(),
            assessment,
            status: AnalysisStatus::Completed,
            analyzed_at: Timestamp::now(),
        }
    }

    pub fn proxy_name(&self) -> &str {
        &self.assessment.proxy_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_thresholds_are_exact() {
        assert_eq!(ComplexityLevel::from_score(0.0), ComplexityLevel::Simple);
        assert_eq!(ComplexityLevel::from_score(29.9), ComplexityLevel::Simple);
        assert_eq!(ComplexityLevel::from_score(30.0), ComplexityLevel::Moderate);
        assert_eq!(ComplexityLevel::from_score(69.9), ComplexityLevel::Moderate);
        assert_eq!(ComplexityLevel::from_score(70.0), ComplexityLevel::Complex);
        assert_eq!(ComplexityLevel::from_score(100.0), ComplexityLevel::Complex);
    }

    #[test]
    fn test_default_effort() {
        assert_eq!(ComplexityLevel::Simple.default_effort(), "1-2 hours");
        assert_eq!(ComplexityLevel::Moderate.default_effort(), "4-8 hours");
        assert_eq!(ComplexityLevel::Complex.default_effort(), "1-3 days");
    }

    #[test]
    fn test_tier_weights() {
        assert_eq!(ComplexityTier::Simple.weight(), 10.0);
        assert_eq!(ComplexityTier::Moderate.weight(), 25.0);
        assert_eq!(ComplexityTier::Complex.weight(), 50.0);
        assert!(UNKNOWN_POLICY_WEIGHT > ComplexityTier::Complex.weight());
    }

    #[test]
    fn test_manual_mapping() {
        let mapping = PolicyMapping::manual("CustomThing");
        assert!(mapping.is_manual());
        assert!(mapping.requires_custom_code);
        assert_eq!(mapping.complexity_tier, ComplexityTier::Complex);
    }

    #[test]
    fn test_analysis_flattens_assessment() {
        let analysis = Analysis::completed(
            "proxy-1",
            ComplexityAssessment {
                proxy_name: "weather".to_string(),
                complexity_score: 10.0,
                complexity_level: ComplexityLevel::Simple,
                policy_count: 0,
                custom_policies: vec![],
                policy_mappings: vec![],
                dependencies: vec![],
                migration_effort: "1-2 hours".to_string(),
                recommendations: "None".to_string(),
            },
        );

        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["proxy_name"], "weather");
        assert_eq!(value["complexity_level"], "simple");
        assert_eq!(value["status"], "completed");

        let parsed: Analysis = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, analysis);
    }
}
