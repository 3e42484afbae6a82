//! Bundle generation step.

use async_trait::async_trait;
use edgeshift_analyzer::{PromptRenderer, TextOracle};
use edgeshift_common::{Error, Result};
use edgeshift_schema::PolicyMapping;
use std::sync::Arc;
use tracing::{debug, warn};

const XML_DECLARATION: &str = "<?xml";
const PROXY_CLOSING_TAG: &str = "</APIProxy>";

/// Produces a target-format descriptor from the source descriptor.
#[async_trait]
pub trait BundleConverter: Send + Sync {
    async fn convert(&self, descriptor: &str, mappings: &[PolicyMapping]) -> Result<String>;
}

/// Converter backed by the text oracle.
///
/// Oracle failures degrade to the unmodified source descriptor; malformed
/// mappings fail the step.
pub struct OracleConverter {
    oracle: Arc<dyn TextOracle>,
    prompts: PromptRenderer,
}

impl OracleConverter {
    pub fn new(oracle: Arc<dyn TextOracle>) -> Result<Self> {
        Ok(Self {
            oracle,
            prompts: PromptRenderer::new()?,
        })
    }
}

#[async_trait]
impl BundleConverter for OracleConverter {
    async fn convert(&self, descriptor: &str, mappings: &[PolicyMapping]) -> Result<String> {
        validate_mappings(mappings)?;
        let request = self.prompts.conversion_request(descriptor, mappings)?;

        match self.oracle.generate(&request).await {
            Ok(reply) => {
                debug!("Oracle conversion returned {} chars", reply.len());
                Ok(extract_descriptor(&reply))
            }
            Err(e) => {
                warn!("AI conversion failed, keeping original descriptor: {}", e);
                Ok(descriptor.to_string())
            }
        }
    }
}

/// Reject mappings that cannot be sent for conversion.
pub fn validate_mappings(mappings: &[PolicyMapping]) -> Result<()> {
    for (index, mapping) in mappings.iter().enumerate() {
        if mapping.source_policy.trim().is_empty() {
            return Err(Error::InvalidMapping(format!(
                "mapping {} has no source policy",
                index
            )));
        }
        if mapping.target_equivalent.trim().is_empty() {
            return Err(Error::InvalidMapping(format!(
                "mapping for {} has no target equivalent",
                mapping.source_policy
            )));
        }
    }
    Ok(())
}

/// Cut the XML document out of an oracle reply, or keep the whole reply.
pub fn extract_descriptor(reply: &str) -> String {
    if let (Some(start), Some(close)) = (reply.find(XML_DECLARATION), reply.rfind(PROXY_CLOSING_TAG)) {
        let end = close + PROXY_CLOSING_TAG.len();
        if end > start {
            return reply[start..end].to_string();
        }
    }
    reply.to_string()
}
