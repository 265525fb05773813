// src/transformation.rs
//
// =============================================================================
// CTAPROD: JOB SUBMISSION ADAPTER (v 0.3)
// =============================================================================
//
// The Port.
//
// Responsibilities:
// 1. Parse the positional submission request (name, type, dataset, group size).
// 2. Turn an assembled job into a Transformation (template + XML body).
// 3. Hand it to a `TransformationClient`; the answer is passed back untouched.
//
// The client is a trait so the remote service and the local SQLite catalog
// are interchangeable (and tests can inject a rejecting client).

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::core::{
    AgentType, JobType, MetaQuery, TransformationId, TransformationRecord, TransformationStatus,
};
use crate::dataset::DatasetQuery;
use crate::error::{SubmissionFailure, SubmitError, UsageError};
use crate::job::ProductionJob;
use crate::workflow::AssembledJob;

// ============================================================================
// 1. TRANSFORMATION
// ============================================================================

/// A job template as the transformation service stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    name: String,
    transformation_type: String,
    description: String,
    long_description: String,
    body: String,
    status: TransformationStatus,
    agent_type: AgentType,
    group_size: Option<u32>,
    input_meta_query: Option<MetaQuery>,
}

impl Default for Transformation {
    fn default() -> Self {
        Self {
            name: String::new(),
            transformation_type: String::new(),
            description: String::new(),
            long_description: String::new(),
            body: String::new(),
            status: TransformationStatus::New,
            agent_type: AgentType::Manual,
            group_size: None,
            input_meta_query: None,
        }
    }
}

impl Transformation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transformation_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_type(&mut self, transformation_type: impl Into<String>) {
        self.transformation_type = transformation_type.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_long_description(&mut self, text: impl Into<String>) {
        self.long_description = text.into();
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn set_status(&mut self, status: TransformationStatus) {
        self.status = status;
    }

    pub fn set_agent_type(&mut self, agent_type: AgentType) {
        self.agent_type = agent_type;
    }

    pub fn set_group_size(&mut self, group_size: u32) {
        self.group_size = Some(group_size);
    }

    pub fn set_input_meta_query(&mut self, query: MetaQuery) {
        self.input_meta_query = Some(query);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transformation_type(&self) -> &str {
        &self.transformation_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn long_description(&self) -> &str {
        &self.long_description
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn status(&self) -> TransformationStatus {
        self.status
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    pub fn group_size(&self) -> Option<u32> {
        self.group_size
    }

    pub fn input_meta_query(&self) -> Option<&MetaQuery> {
        self.input_meta_query.as_ref()
    }

    /// SHA-256 of the body, hex encoded.
    pub fn body_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.body.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The record a service holds after accepting this transformation as `id`.
    pub fn to_record(&self, id: TransformationId) -> TransformationRecord {
        TransformationRecord {
            id,
            name: self.name.clone(),
            transformation_type: self.transformation_type.clone(),
            description: self.description.clone(),
            status: self.status,
            agent_type: self.agent_type,
            group_size: self.group_size,
            input_meta_query: self.input_meta_query.clone(),
            body_hash: self.body_hash(),
            created_at: Utc::now(),
        }
    }
}

/// The transformation service contract.
pub trait TransformationClient {
    /// Registers `transformation`. A refusal is a value, not a panic.
    fn add_transformation(
        &mut self,
        transformation: &Transformation,
    ) -> Result<TransformationId, SubmissionFailure>;
}

// ============================================================================
// 2. REQUEST (positional CLI arguments)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDataset {
    pub name: String,
    pub group_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub name: String,
    pub job_type: JobType,
    pub input: Option<InputDataset>,
}

impl SubmissionRequest {
    /// `<TransformationName> <TransformationType> [<DatasetName> <GroupSize>]`
    pub fn from_args(args: &[String]) -> Result<Self, UsageError> {
        if args.len() != 2 && args.len() != 4 {
            return Err(UsageError::ArgumentCount(args.len()));
        }

        let name = args[0].clone();
        let job_type: JobType = args[1].parse()?;

        let input = match args.get(2..4) {
            Some([dataset, group_size]) => {
                let group_size = parse_group_size(group_size)?;
                match job_type {
                    JobType::Processing => Some(InputDataset {
                        name: dataset.clone(),
                        group_size,
                    }),
                    JobType::MCSimulation => {
                        log::warn!(
                            "MCSimulation takes no input dataset; ignoring '{}' and group size {}",
                            dataset,
                            group_size
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        if job_type == JobType::Processing && input.is_none() {
            return Err(UsageError::MissingDataset);
        }

        Ok(Self {
            name,
            job_type,
            input,
        })
    }
}

fn parse_group_size(raw: &str) -> Result<u32, UsageError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(UsageError::InvalidGroupSize(raw.to_string())),
    }
}

// ============================================================================
// 3. ADAPTER
// ============================================================================

pub struct JobSubmissionAdapter<'a> {
    client: &'a mut dyn TransformationClient,
    datasets: &'a dyn DatasetQuery,
}

impl<'a> JobSubmissionAdapter<'a> {
    pub fn new(client: &'a mut dyn TransformationClient, datasets: &'a dyn DatasetQuery) -> Self {
        Self { client, datasets }
    }

    /// Builds the transformation without submitting it.
    pub fn prepare(
        &self,
        job: ProductionJob,
        assembled: &AssembledJob,
        request: &SubmissionRequest,
    ) -> Result<Transformation, SubmitError> {
        prepare_transformation(job, assembled, request, self.datasets)
    }

    /// One submission, no retry.
    pub fn submit(
        &mut self,
        job: ProductionJob,
        assembled: &AssembledJob,
        request: &SubmissionRequest,
    ) -> Result<TransformationRecord, SubmitError> {
        let transformation = self.prepare(job, assembled, request)?;

        log::info!(
            "📤 Submitting transformation '{}' ({})",
            transformation.name(),
            transformation.transformation_type()
        );

        let id = self
            .client
            .add_transformation(&transformation)
            .map_err(SubmitError::Rejected)?;

        Ok(transformation.to_record(id))
    }
}

/// Fills `job` from `assembled` and wraps it as a transformation.
pub fn prepare_transformation(
    mut job: ProductionJob,
    assembled: &AssembledJob,
    request: &SubmissionRequest,
    datasets: &dyn DatasetQuery,
) -> Result<Transformation, SubmitError> {
    assembled.apply_to(&mut job);
    let body = job.to_xml().map_err(|e| SubmitError::Body(e.to_string()))?;

    let mut t = Transformation::new();
    t.set_transformation_name(&request.name);
    t.set_type(request.job_type.transformation_type());
    t.set_description(describe(request.job_type));
    t.set_long_description(long_description(request, assembled));
    t.set_body(body);
    t.set_status(TransformationStatus::Active);
    t.set_agent_type(AgentType::Automatic);

    if request.job_type == JobType::Processing {
        let input = request
            .input
            .as_ref()
            .ok_or(SubmitError::MissingInputDataset(request.job_type))?;
        let query = datasets.get_dataset_mq(&input.name)?;
        log::info!("Input dataset '{}' -> {:?}", input.name, query.0);
        t.set_input_meta_query(query);
        t.set_group_size(input.group_size);
    }

    Ok(t)
}

fn describe(job_type: JobType) -> &'static str {
    match job_type {
        JobType::MCSimulation => "MC production using CWL workflow",
        JobType::Processing => "ctapipe processing using CWL workflow",
    }
}

fn long_description(request: &SubmissionRequest, assembled: &AssembledJob) -> String {
    let steps = assembled
        .steps
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    match &request.input {
        Some(input) => format!(
            "{} transformation '{}' over dataset '{}' (group size {}); steps: {}",
            request.job_type, request.name, input.name, input.group_size, steps
        ),
        None => format!(
            "{} transformation '{}'; steps: {}",
            request.job_type, request.name, steps
        ),
    }
}
