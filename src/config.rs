// src/config.rs
//
// Submission settings. Everything has a default, so running without
// `--config` works from a directory holding the CWL/YAML pairs.
//
// ```yaml
// workflow_dir: workflows
// catalog: prod.db
// show_count: 20
// processing:
//   run:
//     tool: ctapipe_process.cwl
//     inputs: ctapipe_process.yml
// ```
//
// Relative paths are taken relative to the config file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::JobType;
use crate::cwl::resolve_relative;
use crate::job::{show_count_env, DEFAULT_OUTPUT_SANDBOX, DEFAULT_RUN_NUMBER, DEFAULT_SHOW_COUNT};
use crate::workflow::{StepContext, StepFiles, WorkflowAssembler, WorkflowShape};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitConfig {
    #[serde(default = "default_dir")]
    pub workflow_dir: PathBuf,
    #[serde(default = "default_dir")]
    pub staging_root: PathBuf,
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
    #[serde(default = "default_datasets")]
    pub datasets: PathBuf,
    #[serde(default = "default_run_number")]
    pub run_number_token: String,
    #[serde(default = "default_show_count")]
    pub show_count: u32,
    #[serde(default = "default_output_sandbox")]
    pub output_sandbox: Vec<String>,
    #[serde(default = "ShapeFiles::simulation")]
    pub simulation: ShapeFiles,
    #[serde(default = "ShapeFiles::processing")]
    pub processing: ShapeFiles,
}

/// Tool/input pairs of the three steps of one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeFiles {
    #[serde(default = "setup_files")]
    pub setup: StepFiles,
    pub run: StepFiles,
    #[serde(default = "data_management_files")]
    pub data_management: StepFiles,
}

impl ShapeFiles {
    pub fn simulation() -> Self {
        Self {
            setup: setup_files(),
            run: pair("dirac_prod_run"),
            data_management: data_management_files(),
        }
    }

    pub fn processing() -> Self {
        Self {
            setup: setup_files(),
            run: pair("dirac_ctapipe-process_wrapper"),
            data_management: data_management_files(),
        }
    }
}

fn pair(stem: &str) -> StepFiles {
    StepFiles::new(format!("{stem}.cwl"), format!("{stem}.yml"))
}

fn setup_files() -> StepFiles {
    pair("setup-software")
}

fn data_management_files() -> StepFiles {
    pair("cta-user-managedata")
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_catalog() -> PathBuf {
    PathBuf::from("transformations.db")
}
fn default_datasets() -> PathBuf {
    PathBuf::from("datasets.yml")
}
fn default_run_number() -> String {
    DEFAULT_RUN_NUMBER.to_string()
}
fn default_show_count() -> u32 {
    DEFAULT_SHOW_COUNT
}
fn default_output_sandbox() -> Vec<String> {
    vec![DEFAULT_OUTPUT_SANDBOX.to_string()]
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            workflow_dir: default_dir(),
            staging_root: default_dir(),
            catalog: default_catalog(),
            datasets: default_datasets(),
            run_number_token: default_run_number(),
            show_count: default_show_count(),
            output_sandbox: default_output_sandbox(),
            simulation: ShapeFiles::simulation(),
            processing: ShapeFiles::processing(),
        }
    }
}

impl SubmitConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.rebase(base);
        Ok(config)
    }

    /// Makes the top-level paths relative to `base`.
    /// Step files stay relative to `workflow_dir`.
    pub fn rebase(&mut self, base: &Path) {
        for p in [
            &mut self.workflow_dir,
            &mut self.staging_root,
            &mut self.catalog,
            &mut self.datasets,
        ] {
            *p = resolve_relative(base, p);
        }
    }

    pub fn shape(&self, job_type: JobType) -> WorkflowShape {
        match job_type {
            JobType::MCSimulation => {
                let f = &self.simulation;
                WorkflowShape::simulation(f.setup.clone(), f.run.clone(), f.data_management.clone())
            }
            JobType::Processing => {
                let f = &self.processing;
                WorkflowShape::processing(f.setup.clone(), f.run.clone(), f.data_management.clone())
            }
        }
    }

    /// Step context with an absolute staging root.
    pub fn step_context(&self) -> Result<StepContext> {
        let staging_root = if self.staging_root.is_absolute() {
            self.staging_root.clone()
        } else {
            std::env::current_dir()
                .context("Cannot determine the working directory")?
                .join(&self.staging_root)
        };
        Ok(StepContext::new(&self.workflow_dir, staging_root))
    }

    /// Assembler wired with this configuration's environment and sandbox.
    pub fn assembler(&self) -> Result<WorkflowAssembler> {
        Ok(WorkflowAssembler::new(self.step_context()?)
            .with_execution_env(show_count_env(self.show_count))
            .with_output_sandbox(self.output_sandbox.clone()))
    }
}
