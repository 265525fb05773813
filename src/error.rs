// src/error.rs
//
// =============================================================================
// CTAPROD: ERROR TAXONOMY
// =============================================================================
//
// One error type per failure domain so callers can tell a missing CWL input
// apart from a filesystem fault or a rejected submission.
//
// - CwlError:          tool / input document loading and command-line binding.
// - ResolutionError:   a required input has no value, no default, no null.
// - StagingError:      placeholder file creation or removal failed.
// - StepError:         everything that can abort one WorkflowStep.
// - AssemblyError:     a step failed while assembling a workflow shape.
// - SubmissionFailure: the transformation service answered "not OK".
// - DatasetError:      the dataset metadata query failed.
// - SubmitError:       everything the submission adapter can return.
// - UsageError:        the CLI positional arguments are unusable.

use crate::core::JobType;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// 1. CWL DOCUMENTS
// ============================================================================

#[derive(Debug, Error)]
pub enum CwlError {
    #[error("I/O error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid CWL document: {0}")]
    Invalid(String),

    #[error("unsupported CWL construct: {0}")]
    Unsupported(String),

    /// A File input was bound but nothing exists at its staged path.
    #[error("input file not found at {0}")]
    MissingFile(PathBuf),
}

// ============================================================================
// 2. RESOLUTION & STAGING
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("missing required input `{id}`")]
    MissingInput { id: String },
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("invalid staging location '{location}': {reason}")]
    InvalidLocation {
        location: String,
        reason: &'static str,
    },

    #[error("staging I/O error for '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// 3. STEPS & ASSEMBLY
// ============================================================================

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Cwl(#[from] CwlError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("command line of step '{0}' was already rewritten")]
    AlreadyRewritten(String),
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("failed to build step {step}: {source}")]
    Step {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("workflow steps contain a dependency cycle at '{0}'")]
    Cycle(String),
}

// ============================================================================
// 4. SUBMISSION
// ============================================================================

/// The structured "not OK" answer of a transformation service.
/// Returned, never raised; the message is passed through untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SubmissionFailure {
    pub message: String,
}

impl SubmissionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("unknown dataset '{0}'")]
    Unknown(String),

    #[error("I/O error while reading dataset registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse dataset registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rejected(SubmissionFailure),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("{0} transformations require a dataset name and a group size")]
    MissingInputDataset(JobType),

    #[error("failed to serialize the job workflow: {0}")]
    Body(String),
}

// ============================================================================
// 5. CLI
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("expected 2 or 4 positional arguments, got {0}")]
    ArgumentCount(usize),

    #[error("unknown transformation type '{0}' (expected MCSimulation or Processing)")]
    UnknownJobType(String),

    #[error("group size must be a positive integer, got '{0}'")]
    InvalidGroupSize(String),

    #[error("Processing transformations need <DatasetName> and <GroupSize>")]
    MissingDataset,
}
