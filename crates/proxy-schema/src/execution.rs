//! Migration execution record and its state machine.
//!
//! Every mutation of a [`MigrationExecution`] goes through
//! [`MigrationExecution::apply`], so a store can run the whole
//! read-modify-write cycle of one step as a single atomic update.

use edgeshift_common::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error message recorded when a user cancels an execution.
pub const CANCELLED_MESSAGE: &str = "Migration cancelled by user";

/// `current_step` of a freshly created execution.
pub const QUEUED_STEP_MESSAGE: &str = "Queued for migration";

/// `current_step` once the execution completed.
pub const COMPLETED_STEP_MESSAGE: &str = "Migration completed successfully";

/// Progress recorded when the execution leaves `pending`.
pub const PREPARING_PROGRESS: u8 = 10;

/// Execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Preparing,
    Converting,
    Validating,
    Deploying,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// Statuses from which a user may cancel.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Pending
                | ExecutionStatus::Preparing
                | ExecutionStatus::Converting
                | ExecutionStatus::Validating
        )
    }

    /// Position along the happy path.
    fn rank(&self) -> u8 {
        match self {
            ExecutionStatus::Pending => 0,
            ExecutionStatus::Preparing => 1,
            ExecutionStatus::Converting => 2,
            ExecutionStatus::Validating => 3,
            ExecutionStatus::Deploying => 4,
            ExecutionStatus::Completed => 5,
            ExecutionStatus::Failed => 6,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Preparing => "preparing",
            ExecutionStatus::Converting => "converting",
            ExecutionStatus::Validating => "validating",
            ExecutionStatus::Deploying => "deploying",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// The fixed migration step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStep {
    ValidateSource,
    ConvertPolicies,
    GenerateBundle,
    ValidateBundle,
    Deploy,
}

impl MigrationStep {
    /// All steps in execution order.
    pub const SEQUENCE: [MigrationStep; 5] = [
        MigrationStep::ValidateSource,
        MigrationStep::ConvertPolicies,
        MigrationStep::GenerateBundle,
        MigrationStep::ValidateBundle,
        MigrationStep::Deploy,
    ];

    /// Name recorded in logs and step lists.
    pub fn label(&self) -> &'static str {
        match self {
            MigrationStep::ValidateSource => "Validating source proxy",
            MigrationStep::ConvertPolicies => "Converting policies to Apigee X format",
            MigrationStep::GenerateBundle => "Generating Apigee X bundle with AI",
            MigrationStep::ValidateBundle => "Validating Apigee X bundle",
            MigrationStep::Deploy => "Deploying to Apigee X (Demo Mode)",
        }
    }

    /// Progress checkpoint reached once the step completed.
    pub fn progress_after(&self) -> u8 {
        match self {
            MigrationStep::ValidateSource => 25,
            MigrationStep::ConvertPolicies => 50,
            MigrationStep::GenerateBundle => 70,
            MigrationStep::ValidateBundle => 85,
            MigrationStep::Deploy => 100,
        }
    }

    /// Status entered once the step completed, if any.
    pub fn status_after(&self) -> Option<ExecutionStatus> {
        match self {
            MigrationStep::ConvertPolicies => Some(ExecutionStatus::Converting),
            MigrationStep::ValidateBundle => Some(ExecutionStatus::Validating),
            MigrationStep::Deploy => Some(ExecutionStatus::Completed),
            _ => None,
        }
    }

    /// Status entered when the step starts, if any.
    pub fn status_on_start(&self) -> Option<ExecutionStatus> {
        match self {
            MigrationStep::Deploy => Some(ExecutionStatus::Deploying),
            _ => None,
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A timestamped execution log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: Timestamp,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at, self.message)
    }
}

/// A single change to an execution record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Leave `pending`: status preparing, progress 10, started_at set.
    Begin,
    StepStarted(MigrationStep),
    StepCompleted(MigrationStep),
    /// Record the failed step and terminate the execution.
    StepFailed { step: MigrationStep, error: String },
    /// Move to a progress checkpoint, optionally entering a new status.
    Advance {
        progress: u8,
        status: Option<ExecutionStatus>,
    },
    /// Store the converted bundle; requires the generation step to be done.
    BundleConverted { bundle: String },
    /// Finish a run; only accepted while `deploying`.
    Complete { deployment_url: String },
    Fail { error: String },
    Cancel,
}

impl Transition {
    fn name(&self) -> &'static str {
        match self {
            Transition::Begin => "begin",
            Transition::StepStarted(_) => "step_started",
            Transition::StepCompleted(_) => "step_completed",
            Transition::StepFailed { .. } => "step_failed",
            Transition::Advance { .. } => "advance",
            Transition::BundleConverted { .. } => "bundle_converted",
            Transition::Complete { .. } => "complete",
            Transition::Fail { .. } => "fail",
            Transition::Cancel => "cancel",
        }
    }
}

/// Rejected transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("execution is already {0}")]
    Terminal(ExecutionStatus),

    #[error("execution cannot be cancelled while {0}")]
    NotCancellable(ExecutionStatus),

    #[error("cannot apply {transition} while {from}")]
    InvalidTransition {
        from: ExecutionStatus,
        transition: &'static str,
    },

    #[error("progress cannot move from {current} to {requested}")]
    InvalidProgress { current: u8, requested: u8 },

    #[error("status cannot go back from {from} to {to}")]
    StatusRegression {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("converted bundle recorded before the generation step completed")]
    ConversionNotCompleted,
}

impl TransitionError {
    /// Convert into the common error for the given execution.
    pub fn into_error(self, id: &str) -> edgeshift_common::Error {
        match self {
            TransitionError::Terminal(status) => edgeshift_common::Error::Terminal {
                id: id.to_string(),
                status: status.to_string(),
            },
            TransitionError::NotCancellable(status) => edgeshift_common::Error::NotCancellable {
                id: id.to_string(),
                status: status.to_string(),
            },
            other => edgeshift_common::Error::InvalidTransition(format!("{}: {}", id, other)),
        }
    }
}

/// One run of the migration pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationExecution {
    pub id: String,
    pub analysis_id: String,
    pub proxy_name: String,
    pub credentials_id: String,
    pub status: ExecutionStatus,
    /// 0-100, never decreasing.
    pub progress: u8,
    pub current_step: String,
    pub steps_completed: Vec<String>,
    pub steps_failed: Vec<String>,
    /// Append-only.
    pub log: Vec<LogEntry>,
    pub converted_bundle: Option<String>,
    pub deployment_reference: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl MigrationExecution {
    /// Create a queued execution.
    pub fn new(
        analysis_id: impl Into<String>,
        proxy_name: impl Into<String>,
        credentials_id: impl Into<String>,
    ) -> Self {
        Self {
            id: edgeshift_common::new_id(),
            analysis_id: analysis_id.into(),
            proxy_name: proxy_name.into(),
            credentials_id: credentials_id.into(),
            status: ExecutionStatus::Pending,
            progress: 0,
            current_step: QUEUED_STEP_MESSAGE.to_string(),
            steps_completed: Vec::new(),
            steps_failed: Vec::new(),
            log: Vec::new(),
            converted_bundle: None,
            deployment_reference: None,
            error_message: None,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a transition. On error the record is left untouched.
    pub fn apply(&mut self, transition: Transition) -> Result<(), TransitionError> {
        let cancel = transition == Transition::Cancel;
        if self.status.is_terminal() && !cancel {
            return Err(TransitionError::Terminal(self.status));
        }
        if self.status == ExecutionStatus::Pending
            && !matches!(
                transition,
                Transition::Begin | Transition::Fail { .. } | Transition::Cancel
            )
        {
            return Err(self.invalid(&transition));
        }

        match transition {
            Transition::Begin => {
                if self.status != ExecutionStatus::Pending {
                    return Err(self.invalid(&transition));
                }
                self.status = ExecutionStatus::Preparing;
                self.progress = PREPARING_PROGRESS;
                self.started_at = Some(Timestamp::now());
            }
            Transition::StepStarted(step) => {
                if let Some(status) = step.status_on_start() {
                    self.check_status(status)?;
                    self.status = status;
                }
                self.current_step = step.label().to_string();
                self.push_log(format!("Starting: {}", step));
            }
            Transition::StepCompleted(step) => {
                self.steps_completed.push(step.label().to_string());
                self.push_log(format!("Completed: {}", step));
            }
            Transition::StepFailed { step, error } => {
                self.steps_failed.push(step.label().to_string());
                self.push_log(format!("Failed: {} - {}", step, error));
                self.fail(error);
            }
            Transition::Advance { progress, status } => {
                self.check_progress(progress)?;
                if let Some(status) = status {
                    if status.is_terminal() {
                        return Err(self.invalid(&transition));
                    }
                    self.check_status(status)?;
                    self.status = status;
                }
                self.progress = progress;
            }
            Transition::BundleConverted { bundle } => {
                let generated = MigrationStep::GenerateBundle.label();
                if !self.steps_completed.iter().any(|s| s == generated) {
                    return Err(TransitionError::ConversionNotCompleted);
                }
                let progress = MigrationStep::GenerateBundle.progress_after();
                self.check_progress(progress)?;
                self.converted_bundle = Some(bundle);
                self.progress = progress;
            }
            Transition::Complete { deployment_url } => {
                if self.status != ExecutionStatus::Deploying {
                    return Err(TransitionError::InvalidTransition {
                        from: self.status,
                        transition: "complete",
                    });
                }
                self.status = ExecutionStatus::Completed;
                self.progress = 100;
                self.current_step = COMPLETED_STEP_MESSAGE.to_string();
                self.deployment_reference = Some(deployment_url);
                self.completed_at = Some(Timestamp::now());
                self.push_log("Migration completed successfully!".to_string());
            }
            Transition::Fail { error } => self.fail(error),
            Transition::Cancel => {
                if !self.status.is_cancellable() {
                    return Err(TransitionError::NotCancellable(self.status));
                }
                self.fail(CANCELLED_MESSAGE.to_string());
            }
        }
        Ok(())
    }

    fn fail(&mut self, error: String) {
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(error);
        self.completed_at = Some(Timestamp::now());
    }

    fn push_log(&mut self, message: String) {
        self.log.push(LogEntry {
            at: Timestamp::now(),
            message,
        });
    }

    fn check_progress(&self, requested: u8) -> Result<(), TransitionError> {
        if requested < self.progress || requested > 100 {
            return Err(TransitionError::InvalidProgress {
                current: self.progress,
                requested,
            });
        }
        Ok(())
    }

    fn check_status(&self, to: ExecutionStatus) -> Result<(), TransitionError> {
        if to.rank() < self.status.rank() {
            return Err(TransitionError::StatusRegression {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn invalid(&self, transition: &Transition) -> TransitionError {
        TransitionError::InvalidTransition {
            from: self.status,
            transition: transition.name(),
        }
    }
}

/// Request to migrate several analysed proxies with one credential set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub analysis_ids: Vec<String>,
    pub credentials_id: String,
    #[serde(default = "default_target_environment")]
    pub target_environment: String,
    #[serde(default)]
    pub auto_deploy: bool,
}

fn default_target_environment() -> String {
    "development".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn started() -> MigrationExecution {
        let mut exec = MigrationExecution::new("analysis-1", "weather", "creds-1");
        exec.apply(Transition::Begin).unwrap();
        exec
    }

    fn run_step(exec: &mut MigrationExecution, step: MigrationStep) {
        exec.apply(Transition::StepStarted(step)).unwrap();
        exec.apply(Transition::StepCompleted(step)).unwrap();
    }

    #[test]
    fn test_new_execution_is_queued() {
        let exec = MigrationExecution::new("a", "p", "c");
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert_eq!(exec.progress, 0);
        assert_eq!(exec.current_step, QUEUED_STEP_MESSAGE);
        assert!(exec.started_at.is_none());
    }

    #[test]
    fn test_begin_sets_preparing() {
        let exec = started();
        assert_eq!(exec.status, ExecutionStatus::Preparing);
        assert_eq!(exec.progress, PREPARING_PROGRESS);
        assert!(exec.started_at.is_some());
    }

    #[test]
    fn test_pending_only_accepts_begin_or_fail() {
        let mut exec = MigrationExecution::new("a", "p", "c");
        let err = exec
            .apply(Transition::StepStarted(MigrationStep::ValidateSource))
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));

        exec.apply(Transition::Fail {
            error: "Analysis not found".to_string(),
        })
        .unwrap();
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert!(exec.started_at.is_none());
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn test_step_logging() {
        let mut exec = started();
        run_step(&mut exec, MigrationStep::ValidateSource);

        let messages: Vec<&str> = exec.log.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Starting: Validating source proxy",
                "Completed: Validating source proxy"
            ]
        );
        assert_eq!(exec.current_step, "Validating source proxy");
        assert_eq!(exec.steps_completed, vec!["Validating source proxy"]);
    }

    #[test]
    fn test_step_failure_terminates() {
        let mut exec = started();
        exec.apply(Transition::StepStarted(MigrationStep::ValidateSource))
            .unwrap();
        exec.apply(Transition::StepFailed {
            step: MigrationStep::ValidateSource,
            error: "boom".to_string(),
        })
        .unwrap();

        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.steps_failed, vec!["Validating source proxy"]);
        assert_eq!(exec.error_message.as_deref(), Some("boom"));
        assert_eq!(
            exec.log.last().unwrap().message,
            "Failed: Validating source proxy - boom"
        );
    }

    #[test]
    fn test_terminal_rejects_mutation() {
        let mut exec = started();
        exec.apply(Transition::Fail {
            error: "x".to_string(),
        })
        .unwrap();
        let snapshot = exec.clone();

        let err = exec
            .apply(Transition::Advance {
                progress: 25,
                status: None,
            })
            .unwrap_err();
        assert_eq!(err, TransitionError::Terminal(ExecutionStatus::Failed));
        assert_eq!(exec, snapshot);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut exec = started();
        exec.apply(Transition::Advance {
            progress: 50,
            status: Some(ExecutionStatus::Converting),
        })
        .unwrap();

        let err = exec
            .apply(Transition::Advance {
                progress: 25,
                status: None,
            })
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidProgress { .. }));
        assert_eq!(exec.progress, 50);

        let err = exec
            .apply(Transition::Advance {
                progress: 60,
                status: Some(ExecutionStatus::Preparing),
            })
            .unwrap_err();
        assert!(matches!(err, TransitionError::StatusRegression { .. }));
        assert_eq!(exec.status, ExecutionStatus::Converting);
    }

    #[test]
    fn test_bundle_requires_generation_step() {
        let mut exec = started();
        let err = exec
            .apply(Transition::BundleConverted {
                bundle: "<APIProxy/>".to_string(),
            })
            .unwrap_err();
        assert_eq!(err, TransitionError::ConversionNotCompleted);
        assert!(exec.converted_bundle.is_none());

        run_step(&mut exec, MigrationStep::GenerateBundle);
        exec.apply(Transition::BundleConverted {
            bundle: "<APIProxy/>".to_string(),
        })
        .unwrap();
        assert_eq!(exec.progress, 70);
        assert_eq!(exec.converted_bundle.as_deref(), Some("<APIProxy/>"));
    }

    #[test]
    fn test_deploy_start_enters_deploying() {
        let mut exec = started();
        exec.apply(Transition::StepStarted(MigrationStep::Deploy))
            .unwrap();
        assert_eq!(exec.status, ExecutionStatus::Deploying);
        assert_eq!(
            exec.apply(Transition::Cancel).unwrap_err(),
            TransitionError::NotCancellable(ExecutionStatus::Deploying)
        );
    }

    #[test]
    fn test_complete_requires_deploying() {
        let mut exec = started();
        let err = exec
            .apply(Transition::Complete {
                deployment_url: "https://example.test/apis/weather".to_string(),
            })
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: ExecutionStatus::Preparing,
                transition: "complete",
            }
        );
        assert_eq!(exec.status, ExecutionStatus::Preparing);
        assert!(exec.deployment_reference.is_none());
    }

    #[test]
    fn test_complete() {
        let mut exec = started();
        run_step(&mut exec, MigrationStep::Deploy);
        exec.apply(Transition::Complete {
            deployment_url: "https://example.test/apis/weather".to_string(),
        })
        .unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.progress, 100);
        assert_eq!(exec.current_step, COMPLETED_STEP_MESSAGE);
        assert!(exec.completed_at.is_some());
        assert_eq!(
            exec.log.last().unwrap().message,
            "Migration completed successfully!"
        );
    }

    #[test]
    fn test_cancel_rules() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Preparing,
            ExecutionStatus::Converting,
            ExecutionStatus::Validating,
        ] {
            let mut exec = MigrationExecution::new("a", "p", "c");
            exec.status = status;
            exec.apply(Transition::Cancel).unwrap();
            assert_eq!(exec.status, ExecutionStatus::Failed);
            assert_eq!(exec.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        }

        for status in [ExecutionStatus::Completed, ExecutionStatus::Failed] {
            let mut exec = MigrationExecution::new("a", "p", "c");
            exec.status = status;
            assert_eq!(
                exec.apply(Transition::Cancel).unwrap_err(),
                TransitionError::NotCancellable(status)
            );
        }
    }

    #[test]
    fn test_step_checkpoints() {
        let progress: Vec<u8> = MigrationStep::SEQUENCE
            .iter()
            .map(|s| s.progress_after())
            .collect();
        assert_eq!(progress, vec![25, 50, 70, 85, 100]);
    }

    #[test]
    fn test_transition_error_mapping() {
        let err = TransitionError::NotCancellable(ExecutionStatus::Completed).into_error("e1");
        assert!(matches!(err, edgeshift_common::Error::NotCancellable { .. }));
        let err = TransitionError::Terminal(ExecutionStatus::Failed).into_error("e1");
        assert!(matches!(err, edgeshift_common::Error::Terminal { .. }));
    }

    #[test]
    fn test_migration_request_defaults() {
        let request: MigrationRequest = serde_json::from_str(
            r#"{"analysis_ids": ["a1"], "credentials_id": "c1"}"#,
        )
        .unwrap();
        assert_eq!(request.target_environment, "development");
        assert!(!request.auto_deploy);
    }
}
