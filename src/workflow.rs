// src/workflow.rs
//
// =============================================================================
// CTAPROD: WORKFLOW ASSEMBLER (v 0.3)
// =============================================================================
//
// The Step Brain.
//
// Responsibilities:
// 1. Lay out the fixed three-step shapes as a DAG (setup -> run -> data mgmt).
// 2. Build every step in dependency order; the first failure aborts.
// 3. Finish the run step: `./` for local scripts, late-bound run number.
// 4. Name steps `Step<N>_<ShortName>` and attach log files / descriptions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::core::{JobType, WorkflowStepResult};
use crate::cwl::quote;
use crate::error::{AssemblyError, StepError};
use crate::job::{ProductionJob, DEFAULT_OUTPUT_SANDBOX};

pub mod late_bound;
pub mod step;

pub use late_bound::{BoundToken, LateBoundParameter};
pub use step::{BuiltStep, StepContext, StepFiles, WorkflowStep};

// ============================================================================
// 1. SHAPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRole {
    Setup,
    Run,
    DataManagement,
}

#[derive(Debug, Clone)]
pub struct ShapeNode {
    pub role: StepRole,
    pub step: WorkflowStep,
}

/// One of the two supported three-step workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowShape {
    job_type: JobType,
    setup: StepFiles,
    run: StepFiles,
    data_management: StepFiles,
}

impl WorkflowShape {
    pub fn simulation(setup: StepFiles, run: StepFiles, data_management: StepFiles) -> Self {
        Self {
            job_type: JobType::MCSimulation,
            setup,
            run,
            data_management,
        }
    }

    pub fn processing(setup: StepFiles, run: StepFiles, data_management: StepFiles) -> Self {
        Self {
            job_type: JobType::Processing,
            setup,
            run,
            data_management,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    /// Steps as nodes, "must run before" as edges.
    pub fn dependency_graph(&self) -> DiGraph<ShapeNode, ()> {
        let (run_name, run_descr) = match self.job_type {
            JobType::MCSimulation => ("CorsikaSimtel", "Corsika+sim_telarray simulation"),
            JobType::Processing => ("CtapipeProcessing", "ctapipe processing"),
        };

        let mut graph = DiGraph::new();
        let setup = graph.add_node(ShapeNode {
            role: StepRole::Setup,
            step: WorkflowStep::new("SetupSoftware", "Setup software", self.setup.clone()),
        });
        let run = graph.add_node(ShapeNode {
            role: StepRole::Run,
            step: WorkflowStep::new(run_name, run_descr, self.run.clone()),
        });
        let data_management = graph.add_node(ShapeNode {
            role: StepRole::DataManagement,
            step: WorkflowStep::new(
                "DataManagement",
                "Data management",
                self.data_management.clone(),
            ),
        });

        graph.add_edge(setup, run, ());
        graph.add_edge(run, data_management, ());
        graph
    }
}

// ============================================================================
// 2. EXECUTABLE LOOKUP
// ============================================================================

/// Directories searched for a bare program name (PATH by default).
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn from_env() -> Self {
        let dirs = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        Self { dirs }
    }

    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// True for explicit paths and for names found executable on the path.
    pub fn contains_program(&self, program: &str) -> bool {
        if program.contains('/') {
            return true;
        }
        self.dirs.iter().any(|d| is_executable(&d.join(program)))
    }
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

// ============================================================================
// 3. ASSEMBLED JOB
// ============================================================================

/// Ordered steps plus the job-level settings that travel with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledJob {
    pub job_type: JobType,
    pub steps: Vec<WorkflowStepResult>,
    pub execution_env: BTreeMap<String, String>,
    pub output_sandbox: Vec<String>,
}

impl AssembledJob {
    /// Copies steps and settings onto the job object that gets serialized.
    pub fn apply_to(&self, job: &mut ProductionJob) {
        for step in &self.steps {
            let exec = job.set_executable(&step.command_line, &step.log_file);
            exec.name = step.name.clone();
            exec.descr_short = step.descr_short.clone();
        }
        job.set_output_sandbox(self.output_sandbox.clone());
        job.set_execution_env(self.execution_env.clone());
    }
}

// ============================================================================
// 4. THE ASSEMBLER
// ============================================================================

pub struct WorkflowAssembler {
    context: StepContext,
    search_path: SearchPath,
    run_number: LateBoundParameter,
    execution_env: BTreeMap<String, String>,
    output_sandbox: Vec<String>,
}

impl WorkflowAssembler {
    pub fn new(context: StepContext) -> Self {
        Self {
            context,
            search_path: SearchPath::from_env(),
            run_number: LateBoundParameter::run_number(),
            execution_env: BTreeMap::new(),
            output_sandbox: vec![DEFAULT_OUTPUT_SANDBOX.to_string()],
        }
    }

    pub fn with_search_path(mut self, search_path: SearchPath) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_execution_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.execution_env = env;
        self
    }

    pub fn with_output_sandbox(mut self, globs: Vec<String>) -> Self {
        self.output_sandbox = globs;
        self
    }

    /// Builds all steps of `shape` for `job`. No partial result on failure.
    pub fn assemble(
        &self,
        shape: &WorkflowShape,
        job: &ProductionJob,
    ) -> Result<AssembledJob, AssemblyError> {
        let graph = shape.dependency_graph();
        let order = toposort(&graph, None).map_err(|cycle| {
            AssemblyError::Cycle(graph[cycle.node_id()].step.short_name().to_string())
        })?;

        log::info!(
            "🧩 Assembling {} workflow ({} steps)",
            shape.job_type(),
            order.len()
        );

        let mut steps = Vec::with_capacity(order.len());
        for (i, idx) in order.into_iter().enumerate() {
            let node = &graph[idx];
            let short_name = node.step.short_name();
            let step_err = |source: StepError| AssemblyError::Step {
                step: short_name.to_string(),
                source,
            };

            let mut built = node.step.build(&self.context).map_err(step_err)?;
            if node.role == StepRole::Run {
                self.finish_run_step(&mut built, shape.job_type(), job.run_number())
                    .map_err(step_err)?;
            }

            let name = format!("Step{}_{}", i + 1, short_name);
            log::info!("   {} : {}", name, built.command_line());

            steps.push(WorkflowStepResult {
                log_file: format!("{name}_Log.txt"),
                name,
                descr_short: built.description().to_string(),
                command_line: built.command_line().to_string(),
            });
        }

        Ok(AssembledJob {
            job_type: shape.job_type(),
            steps,
            execution_env: self.execution_env.clone(),
            output_sandbox: self.output_sandbox.clone(),
        })
    }

    /// `./` prefix and run-number binding, applied as the step's one rewrite.
    fn finish_run_step(
        &self,
        built: &mut BuiltStep,
        job_type: JobType,
        run_number: &str,
    ) -> Result<(), StepError> {
        let local = built
            .executable()
            .is_some_and(|exe| !self.search_path.contains_program(exe));
        let bind_run = job_type == JobType::MCSimulation;

        if !local && !bind_run {
            return Ok(());
        }

        let param = &self.run_number;
        built.rewrite(|tokens| {
            let mut tokens = tokens.to_vec();
            // The executable is the first baseCommand token.
            if let Some(exe) = tokens.first_mut().filter(|_| local) {
                exe.insert_str(0, "./");
            }
            if bind_run {
                match param.bind(&tokens, run_number) {
                    Some(bound) => return bound.render(),
                    None => log::warn!(
                        "Run step has no '{} <N>' placeholder; run number left unbound",
                        param.flag()
                    ),
                }
            }
            quote::join(&tokens)
        })
    }
}
