//! Record persistence.
//!
//! Execution records are only ever mutated through [`ExecutionStore::apply`],
//! which runs the state machine and commits the result as one update.

use async_trait::async_trait;
use edgeshift_common::{Error, RecordKind, Result};
use edgeshift_schema::{
    Analysis, Credentials, CredentialsSummary, MigrationExecution, ProxyFile, Transition,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::trace;

/// Storage for uploads, analyses and credentials.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_proxy(&self, proxy: ProxyFile) -> Result<()>;

    async fn get_proxy(&self, id: &str) -> Result<ProxyFile>;

    async fn put_analysis(&self, analysis: Analysis) -> Result<()>;

    async fn get_analysis(&self, id: &str) -> Result<Analysis>;

    async fn put_credentials(&self, credentials: Credentials) -> Result<()>;

    async fn get_credentials(&self, id: &str) -> Result<Credentials>;

    async fn list_credentials(&self) -> Result<Vec<CredentialsSummary>>;
}

/// Storage for migration executions.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert_execution(&self, execution: MigrationExecution) -> Result<()>;

    async fn get_execution(&self, id: &str) -> Result<MigrationExecution>;

    async fn list_executions(&self) -> Result<Vec<MigrationExecution>>;

    /// Apply a transition and persist the result atomically.
    ///
    /// A rejected transition leaves the stored record untouched.
    async fn apply(&self, id: &str, transition: Transition) -> Result<MigrationExecution>;
}

/// In-process store backed by locked maps.
#[derive(Default)]
pub struct MemoryStore {
    proxies: RwLock<HashMap<String, ProxyFile>>,
    analyses: RwLock<HashMap<String, Analysis>>,
    credentials: RwLock<HashMap<String, Credentials>>,
    executions: RwLock<HashMap<String, MigrationExecution>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put_proxy(&self, proxy: ProxyFile) -> Result<()> {
        self.proxies.write().await.insert(proxy.id.clone(), proxy);
        Ok(())
    }

    async fn get_proxy(&self, id: &str) -> Result<ProxyFile> {
        self.proxies
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(RecordKind::Proxy, id))
    }

    async fn put_analysis(&self, analysis: Analysis) -> Result<()> {
        let mut analyses = self.analyses.write().await;
        if analyses.contains_key(&analysis.id) {
            return Err(Error::Store(format!(
                "Analysis {} already exists",
                analysis.id
            )));
        }
        analyses.insert(analysis.id.clone(), analysis);
        Ok(())
    }

    async fn get_analysis(&self, id: &str) -> Result<Analysis> {
        self.analyses
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(RecordKind::Analysis, id))
    }

    async fn put_credentials(&self, credentials: Credentials) -> Result<()> {
        self.credentials
            .write()
            .await
            .insert(credentials.id.clone(), credentials);
        Ok(())
    }

    async fn get_credentials(&self, id: &str) -> Result<Credentials> {
        self.credentials
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(RecordKind::Credentials, id))
    }

    async fn list_credentials(&self) -> Result<Vec<CredentialsSummary>> {
        let mut summaries: Vec<CredentialsSummary> = self
            .credentials
            .read()
            .await
            .values()
            .map(CredentialsSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn insert_execution(&self, execution: MigrationExecution) -> Result<()> {
        let mut executions = self.executions.write().await;
        if executions.contains_key(&execution.id) {
            return Err(Error::Store(format!(
                "Migration {} already exists",
                execution.id
            )));
        }
        executions.insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<MigrationExecution> {
        self.executions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(RecordKind::Execution, id))
    }

    async fn list_executions(&self) -> Result<Vec<MigrationExecution>> {
        Ok(self.executions.read().await.values().cloned().collect())
    }

    async fn apply(&self, id: &str, transition: Transition) -> Result<MigrationExecution> {
        let mut executions = self.executions.write().await;
        let stored = executions
            .get_mut(id)
            .ok_or_else(|| Error::not_found(RecordKind::Execution, id))?;

        let mut updated = stored.clone();
        updated.apply(transition).map_err(|e| e.into_error(id))?;
        *stored = updated.clone();

        trace!(
            "Migration {} now {} at {}%",
            id,
            updated.status,
            updated.progress
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeshift_schema::{ExecutionStatus, MigrationStep};

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let store = MemoryStore::new();
        assert!(store.get_analysis("nope").await.unwrap_err().is_not_found());
        assert!(store.get_proxy("nope").await.unwrap_err().is_not_found());
        assert!(store.get_credentials("nope").await.unwrap_err().is_not_found());
        assert!(store.get_execution("nope").await.unwrap_err().is_not_found());
        assert!(store
            .apply("nope", Transition::Begin)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_rejected_transition_leaves_record_untouched() {
        let store = MemoryStore::new();
        let execution = MigrationExecution::new("a1", "weather", "c1");
        let id = execution.id.clone();
        store.insert_execution(execution.clone()).await.unwrap();

        // Steps are not allowed while pending.
        let err = store
            .apply(&id, Transition::StepStarted(MigrationStep::ValidateSource))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
        assert_eq!(store.get_execution(&id).await.unwrap(), execution);

        let begun = store.apply(&id, Transition::Begin).await.unwrap();
        assert_eq!(begun.status, ExecutionStatus::Preparing);
        assert_eq!(store.get_execution(&id).await.unwrap(), begun);
    }

    #[tokio::test]
    async fn test_late_write_after_cancel_is_rejected() {
        let store = MemoryStore::new();
        let execution = MigrationExecution::new("a1", "weather", "c1");
        let id = execution.id.clone();
        store.insert_execution(execution).await.unwrap();
        store.apply(&id, Transition::Begin).await.unwrap();
        store.apply(&id, Transition::Cancel).await.unwrap();

        let err = store
            .apply(
                &id,
                Transition::Advance {
                    progress: 25,
                    status: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Terminal { .. }));

        let err = store.apply(&id, Transition::Cancel).await.unwrap_err();
        assert!(matches!(err, Error::NotCancellable { .. }));
    }
}
