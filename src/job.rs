// src/job.rs
//
// =============================================================================
// CTAPROD: PRODUCTION JOB DESCRIPTION (v 0.3)
// =============================================================================
//
// The job template handed to the transformation service as its body.
//
// Responsibilities:
// 1. Collect executable steps in order (`set_executable`).
// 2. Carry job-level settings: run-number token, output sandbox, environment.
// 3. Serialize to the XML workflow body (quick-xml + serde).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::JobType;

/// Token the remote system substitutes with the job ID at instantiation.
pub const DEFAULT_RUN_NUMBER: &str = "@{JOB_ID}";

/// Every step log ends up in the output sandbox.
pub const DEFAULT_OUTPUT_SANDBOX: &str = "*Log.txt";

/// Environment variable carrying the show count to the run step.
pub const SHOW_COUNT_VAR: &str = "NSHOW";

pub const DEFAULT_SHOW_COUNT: u32 = 10;

/// Execution environment exposing `show_count` as `NSHOW`.
pub fn show_count_env(show_count: u32) -> BTreeMap<String, String> {
    BTreeMap::from([(SHOW_COUNT_VAR.to_string(), show_count.to_string())])
}

// ============================================================================
// 1. STEPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStep {
    pub name: String,
    pub descr_short: String,
    pub executable: String,
    pub log_file: String,
}

// ============================================================================
// 2. JOB
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionJob {
    name: String,
    job_type: JobType,
    run_number: String,
    steps: Vec<ExecutionStep>,
    output_sandbox: Vec<String>,
    execution_env: BTreeMap<String, String>,
}

impl ProductionJob {
    pub fn new(name: impl Into<String>, job_type: JobType) -> Self {
        Self {
            name: name.into(),
            job_type,
            run_number: DEFAULT_RUN_NUMBER.to_string(),
            steps: Vec::new(),
            output_sandbox: Vec::new(),
            execution_env: BTreeMap::new(),
        }
    }

    pub fn with_run_number(mut self, token: impl Into<String>) -> Self {
        self.run_number = token.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn run_number(&self) -> &str {
        &self.run_number
    }

    /// Appends a step running `command_line`; returns it for naming.
    pub fn set_executable(&mut self, command_line: &str, log_file: &str) -> &mut ExecutionStep {
        let number = self.steps.len() + 1;
        self.steps.push(ExecutionStep {
            name: format!("Step{number}"),
            descr_short: String::new(),
            executable: command_line.to_string(),
            log_file: log_file.to_string(),
        });
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    pub fn set_output_sandbox(&mut self, globs: Vec<String>) {
        self.output_sandbox = globs;
    }

    pub fn set_execution_env(&mut self, env: BTreeMap<String, String>) {
        self.execution_env = env;
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn output_sandbox(&self) -> &[String] {
        &self.output_sandbox
    }

    pub fn execution_env(&self) -> &BTreeMap<String, String> {
        &self.execution_env
    }

    /// The XML workflow body.
    pub fn to_xml(&self) -> Result<String, quick_xml::de::DeError> {
        let mut parameters = vec![
            XmlParameter {
                name: "JobType",
                value: self.job_type.to_string(),
            },
            XmlParameter {
                name: "RunNumber",
                value: self.run_number.clone(),
            },
        ];
        if !self.output_sandbox.is_empty() {
            parameters.push(XmlParameter {
                name: "OutputSandbox",
                value: self.output_sandbox.join(";"),
            });
        }
        if !self.execution_env.is_empty() {
            let env = self
                .execution_env
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(";");
            parameters.push(XmlParameter {
                name: "ExecutionEnvironment",
                value: env,
            });
        }

        let doc = XmlWorkflow {
            name: &self.name,
            job_type: self.job_type.transformation_type(),
            parameters,
            steps: self
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| XmlStep {
                    name: &s.name,
                    descr_short: &s.descr_short,
                    number: i + 1,
                    executable: &s.executable,
                    log_file: &s.log_file,
                })
                .collect(),
        };

        quick_xml::se::to_string(&doc)
    }
}

// ============================================================================
// 3. XML LAYOUT
// ============================================================================

#[derive(Serialize)]
#[serde(rename = "Workflow")]
struct XmlWorkflow<'a> {
    #[serde(rename = "@name")]
    name: &'a str,
    #[serde(rename = "@type")]
    job_type: &'static str,
    #[serde(rename = "Parameter")]
    parameters: Vec<XmlParameter>,
    #[serde(rename = "StepInstance")]
    steps: Vec<XmlStep<'a>>,
}

#[derive(Serialize)]
struct XmlParameter {
    #[serde(rename = "@name")]
    name: &'static str,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Serialize)]
struct XmlStep<'a> {
    #[serde(rename = "@name")]
    name: &'a str,
    #[serde(rename = "@descr_short")]
    descr_short: &'a str,
    #[serde(rename = "@number")]
    number: usize,
    #[serde(rename = "Executable")]
    executable: &'a str,
    #[serde(rename = "LogFile")]
    log_file: &'a str,
}
