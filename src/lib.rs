// src/lib.rs
//
// =============================================================================
// CTAPROD: LIBRARY ROOT
// =============================================================================
//
// This file declares the module tree and exports public types.

// 1. Declare Modules
pub mod catalog;
pub mod config;
pub mod core;
pub mod cwl;
pub mod dataset;
pub mod error;
pub mod job;
pub mod transformation;
pub mod workflow;

// 2. Re-exports (The Public API)

pub use crate::core::{JobType, MetaQuery, TransformationRecord, WorkflowStepResult};
pub use catalog::TransformationCatalog;
pub use config::SubmitConfig;
pub use cwl::{CommandLineSynthesizer, FakeFileStager, InputResolver, ToolDescription};
pub use dataset::{DatasetQuery, DatasetRegistry};
pub use job::ProductionJob;
pub use transformation::{
    JobSubmissionAdapter, SubmissionRequest, Transformation, TransformationClient,
};
pub use workflow::{AssembledJob, SearchPath, WorkflowAssembler, WorkflowShape, WorkflowStep};
