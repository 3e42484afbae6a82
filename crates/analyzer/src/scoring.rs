//! Complexity scoring of a policy set.

use crate::extraction::PolicySet;
use crate::mapping::MappingTable;
use crate::oracle::{OracleReply, TextOracle};
use crate::prompt::PromptRenderer;
use edgeshift_schema::{
    ComplexityAssessment, ComplexityLevel, PolicyMapping, ProxyMetadata, UNKNOWN_POLICY_WEIGHT,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mappings and accumulated weight of a policy set.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedPolicies {
    pub mappings: Vec<PolicyMapping>,
    pub custom_policies: Vec<String>,
    pub total_weight: f64,
}

impl MappedPolicies {
    /// `min(100, total / count)`, or 0 for an empty set.
    pub fn base_score(&self) -> f64 {
        if self.mappings.is_empty() {
            return 0.0;
        }
        (self.total_weight / self.mappings.len() as f64).min(100.0)
    }
}

/// Scores policy sets against the mapping table and the oracle's opinion.
pub struct ComplexityScorer {
    table: MappingTable,
    oracle: Arc<dyn TextOracle>,
    prompts: PromptRenderer,
}

impl ComplexityScorer {
    pub fn new(table: MappingTable, oracle: Arc<dyn TextOracle>, prompts: PromptRenderer) -> Self {
        Self {
            table,
            oracle,
            prompts,
        }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// One mapping per policy, in set order.
    pub fn map_policies(&self, policies: &PolicySet) -> MappedPolicies {
        let mut mapped = MappedPolicies {
            mappings: Vec::with_capacity(policies.len()),
            custom_policies: Vec::new(),
            total_weight: 0.0,
        };

        for policy in policies.iter() {
            match self.table.lookup(policy) {
                Some(entry) => {
                    mapped.total_weight += entry.tier.weight();
                    mapped.mappings.push(entry.to_mapping());
                }
                None => {
                    mapped.total_weight += UNKNOWN_POLICY_WEIGHT;
                    mapped.custom_policies.push(policy.to_string());
                    mapped.mappings.push(PolicyMapping::manual(policy));
                }
            }
        }

        mapped
    }

    /// Ask the oracle for its opinion; never fails.
    pub async fn request_opinion(&self, policies: &PolicySet, descriptor: &str) -> OracleReply {
        let request = match self.prompts.scoring_request(&policies.to_vec(), descriptor) {
            Ok(request) => request,
            Err(e) => {
                warn!("Could not render scoring prompt: {}", e);
                return OracleReply::Failed(e.to_string());
            }
        };

        OracleReply::interpret(self.oracle.generate(&request).await)
    }

    /// Score a policy set, consulting the oracle.
    pub async fn score(
        &self,
        policies: &PolicySet,
        metadata: &ProxyMetadata,
        descriptor: &str,
    ) -> ComplexityAssessment {
        let reply = self.request_opinion(policies, descriptor).await;
        self.assess(policies, metadata, &reply)
    }

    /// Merge the mapping-table score with an oracle reply.
    pub fn assess(
        &self,
        policies: &PolicySet,
        metadata: &ProxyMetadata,
        reply: &OracleReply,
    ) -> ComplexityAssessment {
        let mapped = self.map_policies(policies);
        let base = mapped.base_score();
        let opinion = reply.opinion();

        let complexity_score = match opinion.complexity_score.filter(|s| s.is_finite()) {
            Some(oracle_score) => (base + oracle_score.clamp(0.0, 100.0)) / 2.0,
            None => base,
        };
        let complexity_level = ComplexityLevel::from_score(complexity_score);

        let migration_effort = opinion
            .migration_effort
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| complexity_level.default_effort().to_string());

        debug!(
            "Base score {:.2}, oracle {:?}, final {:.2}",
            base, opinion.complexity_score, complexity_score
        );
        info!(
            "Scored {}: {} policies, {} custom, {:.1} ({})",
            metadata.name,
            policies.len(),
            mapped.custom_policies.len(),
            complexity_score,
            complexity_level
        );

        ComplexityAssessment {
            proxy_name: metadata.name.clone(),
            complexity_score,
            complexity_level,
            policy_count: mapped.mappings.len(),
            custom_policies: mapped.custom_policies,
            policy_mappings: mapped.mappings,
            dependencies: metadata.target_servers.clone(),
            migration_effort,
            recommendations: opinion.recommendations,
        }
    }
}
