// src/core.rs
//
// =============================================================================
// CTAPROD: CORE SCHEMA AUTHORITY (v 0.3)
// =============================================================================
//
// The data contracts shared between the CWL layer, the assembler and the
// transformation service.
//
// Design Principles:
// 1. Closed enums for everything the remote system spells as a string
//    (job type, status, agent type). Parsed once, at the boundary.
// 2. Step results are plain data: once assembled they are never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::UsageError;

/// Identifier handed out by the transformation service.
pub type TransformationId = i64;

// ============================================================================
// 1. JOB TYPES
// ============================================================================

/// Which workflow shape (and transformation type) a submission uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Corsika + sim_telarray simulation, one run number per job.
    MCSimulation,
    /// ctapipe processing over an input dataset.
    Processing,
}

impl JobType {
    /// The transformation type string the remote system expects.
    pub fn transformation_type(&self) -> &'static str {
        match self {
            JobType::MCSimulation => "MCSimulation",
            JobType::Processing => "DataReprocessing",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::MCSimulation => write!(f, "MCSimulation"),
            JobType::Processing => write!(f, "Processing"),
        }
    }
}

impl FromStr for JobType {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mcsimulation" => Ok(JobType::MCSimulation),
            "processing" => Ok(JobType::Processing),
            _ => Err(UsageError::UnknownJobType(s.to_string())),
        }
    }
}

// ============================================================================
// 2. TRANSFORMATION LIFECYCLE FLAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformationStatus {
    New,
    Active,
}

impl TransformationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationStatus::New => "New",
            TransformationStatus::Active => "Active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentType {
    Manual,
    Automatic,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Manual => "Manual",
            AgentType::Automatic => "Automatic",
        }
    }
}

// ============================================================================
// 3. DATASET SELECTION
// ============================================================================

/// Metadata selection query identifying the input files of a processing
/// transformation (e.g. `{"MCCampaign": "PROD5b", "particle": "gamma"}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaQuery(pub BTreeMap<String, Value>);

impl MetaQuery {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// 4. STEP & TRANSFORMATION RECORDS
// ============================================================================

/// One assembled execution step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStepResult {
    /// `Step<N>_<ShortName>`, 1-based.
    pub name: String,
    pub descr_short: String,
    pub log_file: String,
    pub command_line: String,
}

/// What the transformation service holds once a submission is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRecord {
    pub id: TransformationId,
    pub name: String,
    pub transformation_type: String,
    pub description: String,
    pub status: TransformationStatus,
    pub agent_type: AgentType,
    #[serde(default)]
    pub group_size: Option<u32>,
    #[serde(default)]
    pub input_meta_query: Option<MetaQuery>,
    pub body_hash: String,
    pub created_at: DateTime<Utc>,
}
