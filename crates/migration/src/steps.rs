//! Side effects of the simulated pipeline steps.

use async_trait::async_trait;
use edgeshift_common::Result;
use edgeshift_schema::MigrationStep;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Performs the work of a pipeline step other than bundle generation.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: MigrationStep) -> Result<()>;
}

/// Per-step delays standing in for real validation and deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDelays {
    pub validate_source_ms: u64,
    pub convert_policies_ms: u64,
    pub validate_bundle_ms: u64,
    pub deploy_ms: u64,
}

impl Default for StepDelays {
    fn default() -> Self {
        Self {
            validate_source_ms: 2000,
            convert_policies_ms: 3000,
            validate_bundle_ms: 2000,
            deploy_ms: 3000,
        }
    }
}

impl StepDelays {
    pub fn for_step(&self, step: MigrationStep) -> Duration {
        let millis = match step {
            MigrationStep::ValidateSource => self.validate_source_ms,
            MigrationStep::ConvertPolicies => self.convert_policies_ms,
            MigrationStep::GenerateBundle => 0,
            MigrationStep::ValidateBundle => self.validate_bundle_ms,
            MigrationStep::Deploy => self.deploy_ms,
        };
        Duration::from_millis(millis)
    }
}

/// Sleeps for the configured delay of each step.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSteps {
    delays: StepDelays,
}

impl SimulatedSteps {
    pub fn new(delays: StepDelays) -> Self {
        Self { delays }
    }
}

#[async_trait]
impl StepExecutor for SimulatedSteps {
    async fn execute(&self, step: MigrationStep) -> Result<()> {
        let delay = self.delays.for_step(step);
        debug!("Simulating {} for {:?}", step, delay);
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

/// Completes every step immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSteps;

#[async_trait]
impl StepExecutor for InstantSteps {
    async fn execute(&self, _step: MigrationStep) -> Result<()> {
        Ok(())
    }
}
