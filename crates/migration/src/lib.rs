//! EdgeShift Migration - run analysed proxies through the migration pipeline.
//!
//! The pipeline walks a fixed sequence of steps and records every change on
//! the execution through [`ExecutionStore::apply`], so a cancel issued while a
//! step is running wins over the step's late writes.

pub mod convert;
pub mod pipeline;
pub mod service;
pub mod steps;
pub mod store;

pub use convert::{extract_descriptor, validate_mappings, BundleConverter, OracleConverter};
pub use pipeline::{MigrationPipeline, PipelineConfig};
pub use service::{MigrationHandle, MigrationService};
pub use steps::{InstantSteps, SimulatedSteps, StepDelays, StepExecutor};
pub use store::{ExecutionStore, MemoryStore, RecordStore};
