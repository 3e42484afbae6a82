//! Record definitions for edgeshift.
//!
//! This crate defines the canonical proxy bundle, the analysis record and
//! the migration execution state machine, together with the JSON schemas
//! any persistence layer is expected to honour.

pub mod analysis;
pub mod bundle;
pub mod credentials;
pub mod execution;
pub mod schema;
pub mod validation;

pub use analysis::{
    Analysis, AnalysisStatus, ComplexityAssessment, ComplexityLevel, ComplexityTier,
    PolicyMapping, MANUAL_MIGRATION_REQUIRED, UNKNOWN_POLICY_WEIGHT,
};
pub use bundle::{
    CanonicalBundle, ProxyFile, ProxyMetadata, ResourceDescriptor, ResourceKind,
    BINARY_FILE_MARKER,
};
pub use credentials::{Credentials, CredentialsSummary};
pub use execution::{
    ExecutionStatus, LogEntry, MigrationExecution, MigrationRequest, MigrationStep, Transition,
    TransitionError, CANCELLED_MESSAGE, COMPLETED_STEP_MESSAGE, PREPARING_PROGRESS,
    QUEUED_STEP_MESSAGE,
};
pub use validation::{validate_analysis, validate_execution, ValidationError, ValidationResult};
