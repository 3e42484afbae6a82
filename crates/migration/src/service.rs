//! Entry points for starting, observing and cancelling migrations.

use crate::convert::BundleConverter;
use crate::pipeline::{MigrationPipeline, PipelineConfig};
use crate::steps::StepExecutor;
use crate::store::{ExecutionStore, RecordStore};
use edgeshift_common::{Error, Result};
use edgeshift_schema::{Analysis, Credentials, MigrationExecution, MigrationRequest, Transition};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A started migration running in the background.
#[derive(Debug)]
pub struct MigrationHandle {
    /// Snapshot taken when the execution was queued.
    pub execution: MigrationExecution,
    task: JoinHandle<()>,
}

impl MigrationHandle {
    pub fn id(&self) -> &str {
        &self.execution.id
    }

    /// Wait for the pipeline task to finish.
    pub async fn wait(self) -> Result<()> {
        let id = self.execution.id;
        self.task
            .await
            .map_err(|e| Error::Other(format!("migration task {} aborted: {}", id, e)))
    }
}

/// Starts pipelines and answers status queries.
pub struct MigrationService {
    records: Arc<dyn RecordStore>,
    executions: Arc<dyn ExecutionStore>,
    pipeline: Arc<MigrationPipeline>,
}

impl MigrationService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        executions: Arc<dyn ExecutionStore>,
        steps: Arc<dyn StepExecutor>,
        converter: Arc<dyn BundleConverter>,
        config: PipelineConfig,
    ) -> Self {
        let pipeline = MigrationPipeline::new(
            records.clone(),
            executions.clone(),
            steps,
            converter,
            config,
        );
        Self {
            records,
            executions,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Queue an execution for the analysis and run it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start_migration(
        &self,
        analysis: &Analysis,
        credentials: &Credentials,
    ) -> Result<MigrationHandle> {
        let execution =
            MigrationExecution::new(&analysis.id, analysis.proxy_name(), &credentials.id);
        self.executions.insert_execution(execution.clone()).await?;
        info!(
            "Queued migration {} for {} ({})",
            execution.id,
            execution.proxy_name,
            analysis.id
        );

        let pipeline = self.pipeline.clone();
        let id = execution.id.clone();
        let task = tokio::spawn(async move { pipeline.run(&id).await });

        Ok(MigrationHandle { execution, task })
    }

    /// Start one migration per known analysis in the request.
    ///
    /// Unknown credentials fail the whole request; unknown analyses are
    /// skipped.
    pub async fn start_migrations(
        &self,
        request: &MigrationRequest,
    ) -> Result<Vec<MigrationHandle>> {
        let credentials = self.records.get_credentials(&request.credentials_id).await?;

        let mut handles = Vec::with_capacity(request.analysis_ids.len());
        for analysis_id in &request.analysis_ids {
            match self.records.get_analysis(analysis_id).await {
                Ok(analysis) => handles.push(self.start_migration(&analysis, &credentials).await?),
                Err(e) if e.is_not_found() => {
                    warn!("Skipping migration of unknown analysis {}", analysis_id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(handles)
    }

    pub async fn get_execution(&self, id: &str) -> Result<MigrationExecution> {
        self.executions.get_execution(id).await
    }

    /// All executions, newest first.
    pub async fn list_executions(&self) -> Result<Vec<MigrationExecution>> {
        let mut executions = self.executions.list_executions().await?;
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(executions)
    }

    /// Cancel an execution that has not reached deployment yet.
    pub async fn cancel(&self, id: &str) -> Result<MigrationExecution> {
        let execution = self.executions.apply(id, Transition::Cancel).await?;
        info!("Migration {} cancelled", id);
        Ok(execution)
    }
}
