use std::path::{Path, PathBuf};

use ctaprod::core::{AgentType, TransformationId, TransformationStatus};
use ctaprod::error::{DatasetError, SubmissionFailure, SubmitError, UsageError};
use ctaprod::job::show_count_env;
use ctaprod::transformation::{InputDataset, Transformation, TransformationClient};
use ctaprod::workflow::{SearchPath, StepContext, StepFiles};
use ctaprod::{
    AssembledJob, DatasetRegistry, JobSubmissionAdapter, JobType, ProductionJob,
    SubmissionRequest, TransformationCatalog, WorkflowAssembler, WorkflowShape,
};
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn pair(stem: &str) -> StepFiles {
    StepFiles::new(format!("{stem}.cwl"), format!("{stem}.yml"))
}

fn assemble(job: &ProductionJob, staging: &TempDir) -> AssembledJob {
    let shape = match job.job_type() {
        JobType::MCSimulation => WorkflowShape::simulation(
            pair("setup-software"),
            pair("dirac_prod_run"),
            pair("cta-user-managedata"),
        ),
        JobType::Processing => WorkflowShape::processing(
            pair("setup-software"),
            pair("dirac_ctapipe-process_wrapper"),
            pair("cta-user-managedata"),
        ),
    };
    WorkflowAssembler::new(StepContext::new(fixtures().join("workflows"), staging.path()))
        .with_search_path(SearchPath::default())
        .with_execution_env(show_count_env(10))
        .assemble(&shape, job)
        .expect("Assembly failed")
}

fn registry() -> DatasetRegistry {
    DatasetRegistry::load(fixtures().join("datasets.yml")).expect("Failed to load datasets")
}

/// Records what it is given; answers with a fixed result.
struct MockClient {
    answer: Result<TransformationId, SubmissionFailure>,
    seen: Vec<Transformation>,
}

impl TransformationClient for MockClient {
    fn add_transformation(
        &mut self,
        transformation: &Transformation,
    ) -> Result<TransformationId, SubmissionFailure> {
        self.seen.push(transformation.clone());
        self.answer.clone()
    }
}

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

#[test]
fn test_request_argument_rules() {
    let sim = SubmissionRequest::from_args(&args(&["Prod_MC", "mcsimulation"])).unwrap();
    assert_eq!(sim.job_type, JobType::MCSimulation);
    assert_eq!(sim.input, None);

    // Extras are ignored for simulations.
    let sim4 =
        SubmissionRequest::from_args(&args(&["Prod_MC", "MCSimulation", "ds", "5"])).unwrap();
    assert_eq!(sim4.input, None);

    let proc4 =
        SubmissionRequest::from_args(&args(&["Prod_P", "Processing", "Prod5b_LaPalma_gamma", "5"]))
            .unwrap();
    assert_eq!(
        proc4.input,
        Some(InputDataset {
            name: "Prod5b_LaPalma_gamma".into(),
            group_size: 5
        })
    );

    let err = |raw: &[&str]| SubmissionRequest::from_args(&args(raw)).unwrap_err();
    assert_eq!(err(&["only"]), UsageError::ArgumentCount(1));
    assert_eq!(err(&["a", "MCSimulation", "ds"]), UsageError::ArgumentCount(3));
    assert_eq!(err(&["a", "Reco"]), UsageError::UnknownJobType("Reco".into()));
    assert_eq!(err(&["a", "Processing"]), UsageError::MissingDataset);
    assert_eq!(
        err(&["a", "Processing", "ds", "0"]),
        UsageError::InvalidGroupSize("0".into())
    );
    assert_eq!(
        err(&["a", "Processing", "ds", "five"]),
        UsageError::InvalidGroupSize("five".into())
    );
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[test]
fn test_simulation_submission_sets_template_fields() {
    let staging = TempDir::new().unwrap();
    let request = SubmissionRequest::from_args(&args(&["Prod_MC", "MCSimulation"])).unwrap();
    let job = ProductionJob::new(&request.name, request.job_type);
    let assembled = assemble(&job, &staging);

    let mut client = MockClient {
        answer: Ok(17),
        seen: Vec::new(),
    };
    let datasets = DatasetRegistry::default();
    let record = JobSubmissionAdapter::new(&mut client, &datasets)
        .submit(job, &assembled, &request)
        .expect("Submission failed");

    assert_eq!(record.id, 17);
    assert_eq!(record.name, "Prod_MC");
    assert_eq!(record.transformation_type, "MCSimulation");
    assert_eq!(record.status, TransformationStatus::Active);
    assert_eq!(record.agent_type, AgentType::Automatic);
    assert_eq!(record.group_size, None);

    let sent = &client.seen[0];
    assert!(sent.body().contains("Step2_CorsikaSimtel"));
    assert!(sent.body().contains("--run @{JOB_ID}"));
    assert_eq!(record.body_hash, sent.body_hash());
    assert_eq!(record.body_hash.len(), 64);
}

#[test]
fn test_processing_submission_resolves_dataset() {
    let staging = TempDir::new().unwrap();
    let request =
        SubmissionRequest::from_args(&args(&["Prod_P", "Processing", "Prod5b_LaPalma_gamma", "5"]))
            .unwrap();
    let job = ProductionJob::new(&request.name, request.job_type);
    let assembled = assemble(&job, &staging);

    let mut client = MockClient {
        answer: Ok(3),
        seen: Vec::new(),
    };
    let datasets = registry();
    let record = JobSubmissionAdapter::new(&mut client, &datasets)
        .submit(job, &assembled, &request)
        .unwrap();

    assert_eq!(record.transformation_type, "DataReprocessing");
    assert_eq!(record.group_size, Some(5));
    let query = record.input_meta_query.expect("meta query not set");
    assert_eq!(query.0.get("particle"), Some(&serde_json::json!("gamma")));
    assert_eq!(query.0.get("thetaP"), Some(&serde_json::json!(20)));
}

#[test]
fn test_unknown_dataset_is_a_submit_error() {
    let staging = TempDir::new().unwrap();
    let request =
        SubmissionRequest::from_args(&args(&["Prod_P", "Processing", "nope", "5"])).unwrap();
    let job = ProductionJob::new(&request.name, request.job_type);
    let assembled = assemble(&job, &staging);

    let mut client = MockClient {
        answer: Ok(1),
        seen: Vec::new(),
    };
    let datasets = registry();
    let err = JobSubmissionAdapter::new(&mut client, &datasets)
        .submit(job, &assembled, &request)
        .unwrap_err();

    assert!(matches!(err, SubmitError::Dataset(DatasetError::Unknown(ref name)) if name == "nope"));
    assert!(client.seen.is_empty(), "nothing may be submitted");
}

#[test]
fn test_rejection_is_passed_through_untouched() {
    let staging = TempDir::new().unwrap();
    let request = SubmissionRequest::from_args(&args(&["Prod_MC", "MCSimulation"])).unwrap();
    let job = ProductionJob::new(&request.name, request.job_type);
    let assembled = assemble(&job, &staging);

    let failure = SubmissionFailure::new("Transformation Prod_MC: duplicate name");
    let mut client = MockClient {
        answer: Err(failure.clone()),
        seen: Vec::new(),
    };
    let datasets = DatasetRegistry::default();
    let err = JobSubmissionAdapter::new(&mut client, &datasets)
        .submit(job, &assembled, &request)
        .unwrap_err();

    match err {
        SubmitError::Rejected(f) => assert_eq!(f, failure),
        other => panic!("unexpected error: {other}"),
    }
    // Exactly one attempt.
    assert_eq!(client.seen.len(), 1);
}

// ---------------------------------------------------------------------------
// SQLite catalog
// ---------------------------------------------------------------------------

#[test]
fn test_catalog_assigns_ids_and_refuses_duplicate_names() {
    let dir = TempDir::new().unwrap();
    let mut catalog = TransformationCatalog::open(dir.path().join("t.db")).unwrap();

    let mut t = Transformation::new();
    t.set_transformation_name("Prod_MC");
    t.set_type("MCSimulation");
    t.set_body("<Workflow/>");
    t.set_status(TransformationStatus::Active);
    t.set_agent_type(AgentType::Automatic);

    let first = catalog.add_transformation(&t).expect("first insert refused");

    let refused = catalog.add_transformation(&t).unwrap_err();
    assert!(refused.message.contains("duplicate name"));

    t.set_transformation_name("Prod_MC_2");
    let second = catalog.add_transformation(&t).unwrap();
    assert!(second > first);
    assert_eq!(catalog.count().unwrap(), 2);

    let stored = catalog.get(first).unwrap().expect("record missing");
    assert_eq!(stored.name, "Prod_MC");
    assert_eq!(stored.status, TransformationStatus::Active);
    assert_eq!(stored.agent_type, AgentType::Automatic);
    assert_eq!(stored.body_hash, t.body_hash());
    assert_eq!(catalog.body(first).unwrap().as_deref(), Some("<Workflow/>"));
}

#[test]
fn test_catalog_round_trips_processing_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.db");

    let mut t = Transformation::new();
    t.set_transformation_name("Prod_P");
    t.set_type("DataReprocessing");
    t.set_body("<Workflow/>");
    t.set_group_size(5);
    t.set_input_meta_query(
        ctaprod::dataset::DatasetQuery::get_dataset_mq(&registry(), "Prod5b_LaPalma_gamma")
            .unwrap(),
    );

    let id = {
        let mut catalog = TransformationCatalog::open(&path).unwrap();
        catalog.add_transformation(&t).unwrap()
    };

    // Reopen: the schema is reused, the record survives.
    let catalog = TransformationCatalog::open(&path).unwrap();
    let stored = catalog.find_by_name("Prod_P").unwrap().expect("record missing");
    assert_eq!(stored.id, id);
    assert_eq!(stored.group_size, Some(5));
    assert_eq!(stored.input_meta_query.as_ref(), t.input_meta_query());
    assert_eq!(stored.status, TransformationStatus::New);
    assert!(catalog.find_by_name("Prod_X").unwrap().is_none());
}
