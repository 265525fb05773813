// src/main.rs
//
// =============================================================================
// CTAPROD: SUBMITTER ENTRY POINT (v 0.3)
// =============================================================================
//
// The wiring center.
//
// Flow:
// 1. Parse positional arguments into a SubmissionRequest (usage -> exit 2).
// 2. Load config (or defaults), assemble the three-step workflow.
// 3. --dry-run: print the XML body. Otherwise submit to the catalog.
// 4. A refused submission is logged and exits 1; success logs the new ID.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use ctaprod::error::SubmitError;
use ctaprod::transformation::prepare_transformation;
use ctaprod::{
    DatasetRegistry, JobSubmissionAdapter, ProductionJob, SubmissionRequest, SubmitConfig,
    TransformationCatalog,
};

// ============================================================================
// 1. CLI DEFINITION
// ============================================================================

#[derive(Parser)]
#[command(
    name = "cta-prod-submit",
    version,
    about = "Submit a CWL-described CTA production workflow as a transformation"
)]
struct Cli {
    /// YAML settings file (workflow dir, catalog, datasets, step files).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the job XML instead of submitting it.
    #[arg(long)]
    dry_run: bool,

    /// <TransformationName> <TransformationType> [<DatasetName>] [<GroupSize>]
    #[arg(value_name = "ARGS", num_args = 0..)]
    args: Vec<String>,
}

const USAGE_EXIT: u8 = 2;

// ============================================================================
// 2. ENTRY POINT
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let request = match SubmissionRequest::from_args(&cli.args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("{}", Cli::command().render_usage());
            eprintln!("  <TransformationType>: MCSimulation | Processing");
            return ExitCode::from(USAGE_EXIT);
        }
    };

    match run_submit(&cli, &request) {
        Ok(code) => code,
        Err(e) => {
            log::error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// 3. SUBMISSION
// ============================================================================

fn run_submit(cli: &Cli, request: &SubmissionRequest) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => SubmitConfig::load(path)?,
        None => SubmitConfig::default(),
    };

    log::info!(
        "🚀 {} transformation '{}' from {}",
        request.job_type,
        request.name,
        config.workflow_dir.display()
    );

    let job = ProductionJob::new(&request.name, request.job_type)
        .with_run_number(&config.run_number_token);
    let shape = config.shape(request.job_type);
    let assembled = config
        .assembler()?
        .assemble(&shape, &job)
        .context("Workflow assembly failed")?;

    let datasets = match &request.input {
        Some(_) => DatasetRegistry::load(&config.datasets)?,
        None => DatasetRegistry::default(),
    };

    if cli.dry_run {
        let transformation = prepare_transformation(job, &assembled, request, &datasets)?;
        println!("{}", transformation.body());
        return Ok(ExitCode::SUCCESS);
    }

    let mut catalog = TransformationCatalog::open(&config.catalog)
        .with_context(|| format!("Cannot open catalog {}", config.catalog.display()))?;
    let mut adapter = JobSubmissionAdapter::new(&mut catalog, &datasets);

    match adapter.submit(job, &assembled, request) {
        Ok(record) => {
            log::info!(
                "✅ Transformation '{}' created with ID {}",
                record.name,
                record.id
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(SubmitError::Rejected(failure)) => {
            log::error!("❌ Transformation submission failed: {}", failure.message);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
