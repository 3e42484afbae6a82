//! The migration pipeline driving one execution to a terminal state.

use crate::convert::BundleConverter;
use crate::steps::StepExecutor;
use crate::store::{ExecutionStore, RecordStore};
use edgeshift_common::{Error, Result};
use edgeshift_schema::{MigrationExecution, MigrationStep, Transition};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Deployment target used to build the reference of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub deployment_org: String,
    pub deployment_env: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deployment_org: "demo-org".to_string(),
            deployment_env: "dev".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn deployment_url(&self, proxy_name: &str) -> String {
        format!(
            "https://apigee.google.com/organizations/{}/environments/{}/apis/{}",
            self.deployment_org, self.deployment_env, proxy_name
        )
    }
}

/// Runs the fixed step sequence against the stores.
pub struct MigrationPipeline {
    records: Arc<dyn RecordStore>,
    executions: Arc<dyn ExecutionStore>,
    steps: Arc<dyn StepExecutor>,
    converter: Arc<dyn BundleConverter>,
    config: PipelineConfig,
}

impl MigrationPipeline {
    pub fn new(
        records: Arc<dyn RecordStore>,
        executions: Arc<dyn ExecutionStore>,
        steps: Arc<dyn StepExecutor>,
        converter: Arc<dyn BundleConverter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            records,
            executions,
            steps,
            converter,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Drive an execution until it is completed or failed.
    ///
    /// Never returns an error: every failure ends up on the record, and a
    /// write rejected because the record already went terminal (a cancel)
    /// just stops the run.
    pub async fn run(&self, execution_id: &str) {
        match self.drive(execution_id).await {
            Ok(()) => {}
            Err(Error::StepFailed { step, reason }) => {
                warn!("Migration {} failed at '{}': {}", execution_id, step, reason);
            }
            Err(e @ Error::Terminal { .. }) | Err(e @ Error::NotCancellable { .. }) => {
                info!("Migration {} stopped: {}", execution_id, e);
            }
            Err(e) if e.is_not_found() => {
                warn!("Migration {} cannot run: {}", execution_id, e);
            }
            Err(e) => {
                warn!("Migration {} failed: {}", execution_id, e);
                let fail = Transition::Fail {
                    error: e.to_string(),
                };
                if let Err(write_err) = self.executions.apply(execution_id, fail).await {
                    warn!(
                        "Could not record failure of migration {}: {}",
                        execution_id, write_err
                    );
                }
            }
        }
    }

    async fn drive(&self, id: &str) -> Result<()> {
        let execution = self.executions.get_execution(id).await?;

        let analysis = match self.records.get_analysis(&execution.analysis_id).await {
            Ok(analysis) => analysis,
            Err(e) if e.is_not_found() => return self.fail_early(id, "Analysis not found").await,
            Err(e) => return Err(e),
        };
        let proxy = match self.records.get_proxy(&analysis.proxy_id).await {
            Ok(proxy) => proxy,
            Err(e) if e.is_not_found() => return self.fail_early(id, "Proxy file not found").await,
            Err(e) => return Err(e),
        };

        self.executions.apply(id, Transition::Begin).await?;
        info!("Migration {} started for {}", id, execution.proxy_name);

        self.simulated_step(id, MigrationStep::ValidateSource).await?;
        self.advance(id, MigrationStep::ValidateSource).await?;

        self.simulated_step(id, MigrationStep::ConvertPolicies).await?;
        self.advance(id, MigrationStep::ConvertPolicies).await?;

        let descriptor = proxy.bundle.descriptor_text();
        let mappings = &analysis.assessment.policy_mappings;
        let bundle = self
            .run_step(
                id,
                MigrationStep::GenerateBundle,
                self.converter.convert(descriptor, mappings),
            )
            .await?;
        self.executions
            .apply(id, Transition::BundleConverted { bundle })
            .await?;

        self.simulated_step(id, MigrationStep::ValidateBundle).await?;
        self.advance(id, MigrationStep::ValidateBundle).await?;

        self.simulated_step(id, MigrationStep::Deploy).await?;
        let done = self
            .executions
            .apply(
                id,
                Transition::Complete {
                    deployment_url: self.config.deployment_url(&execution.proxy_name),
                },
            )
            .await?;
        info!(
            "Migration {} completed: {}",
            id,
            done.deployment_reference.as_deref().unwrap_or_default()
        );
        Ok(())
    }

    async fn fail_early(&self, id: &str, reason: &str) -> Result<()> {
        warn!("Migration {} cannot start: {}", id, reason);
        self.executions
            .apply(
                id,
                Transition::Fail {
                    error: reason.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// Record the start of a step, await its work, then record the outcome.
    async fn run_step<T, F>(&self, id: &str, step: MigrationStep, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.executions.apply(id, Transition::StepStarted(step)).await?;
        debug!("Migration {}: {}", id, step);

        match work.await {
            Ok(value) => {
                self.executions
                    .apply(id, Transition::StepCompleted(step))
                    .await?;
                Ok(value)
            }
            Err(e) => {
                let reason = e.to_string();
                self.executions
                    .apply(
                        id,
                        Transition::StepFailed {
                            step,
                            error: reason.clone(),
                        },
                    )
                    .await?;
                Err(Error::StepFailed {
                    step: step.label().to_string(),
                    reason,
                })
            }
        }
    }

    async fn simulated_step(&self, id: &str, step: MigrationStep) -> Result<()> {
        self.run_step(id, step, self.steps.execute(step)).await
    }

    async fn advance(&self, id: &str, step: MigrationStep) -> Result<MigrationExecution> {
        self.executions
            .apply(
                id,
                Transition::Advance {
                    progress: step.progress_after(),
                    status: step.status_after(),
                },
            )
            .await
    }
}
