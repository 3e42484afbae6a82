//! EdgeShift Analyzer - parse proxy uploads and score their migration complexity.

pub mod bundle;
pub mod extraction;
pub mod mapping;
pub mod oracle;
pub mod prompt;
pub mod scoring;
pub mod xml;

pub use bundle::{
    ingest_upload, ingest_upload_with_limits, parse_bundle, parse_bundle_as,
    parse_bundle_with_limits, ArchiveLimits,
};
pub use extraction::{extract_metadata, ExtractionStrategy, PolicyExtractor, PolicySet};
pub use mapping::{MappingEntry, MappingTable};
pub use oracle::{
    oracle_from_config, DisabledOracle, OpenAiOracle, OracleConfig, OracleError, OracleOpinion,
    OracleReply, OracleRequest, TextOracle,
};
pub use prompt::PromptRenderer;
pub use scoring::ComplexityScorer;

use edgeshift_common::Result;
use edgeshift_schema::{Analysis, CanonicalBundle, ComplexityAssessment, ProxyFile};
use std::sync::Arc;
use tracing::info;

/// Runs extraction and scoring over canonical bundles.
pub struct Analyzer {
    extractor: PolicyExtractor,
    scorer: ComplexityScorer,
}

impl Analyzer {
    /// Analyzer with the default strategies and mapping table.
    pub fn new(oracle: Arc<dyn TextOracle>) -> Result<Self> {
        Ok(Self::with_parts(
            PolicyExtractor::default(),
            ComplexityScorer::new(MappingTable::default(), oracle, PromptRenderer::new()?),
        ))
    }

    pub fn with_parts(extractor: PolicyExtractor, scorer: ComplexityScorer) -> Self {
        Self { extractor, scorer }
    }

    pub fn mapping_table(&self) -> &MappingTable {
        self.scorer.table()
    }

    /// Analyze a bundle, sending its own descriptor text to the oracle.
    pub async fn analyze(&self, bundle: &CanonicalBundle) -> ComplexityAssessment {
        self.analyze_with_descriptor(bundle, bundle.descriptor_text())
            .await
    }

    /// Analyze a bundle with explicit descriptor text for the oracle.
    pub async fn analyze_with_descriptor(
        &self,
        bundle: &CanonicalBundle,
        descriptor: &str,
    ) -> ComplexityAssessment {
        let (policies, metadata) = self.extractor.extract(bundle);
        info!(
            "Extracted {} policies from {} ({} policy documents, {} resources)",
            policies.len(),
            metadata.name,
            metadata.policy_document_count,
            metadata.resource_count
        );
        self.scorer.score(&policies, &metadata, descriptor).await
    }

    /// Analyze an uploaded proxy into a new analysis record.
    pub async fn analyze_proxy(&self, proxy: &ProxyFile) -> Analysis {
        let assessment = self.analyze(&proxy.bundle).await;
        Analysis::completed(&proxy.id, assessment)
    }
}
