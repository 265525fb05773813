// src/workflow/step.rs
//
// One CWL tool + one input document -> one command line.
//
// State: WorkflowStep (not built) --build--> BuiltStep (built).
// A BuiltStep accepts a single rewrite; everything else is read-only.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cwl::{
    quote, resolve_relative, CommandLineSynthesizer, FakeFileStager, InputDocument,
    InputResolver, ToolDescription,
};
use crate::error::StepError;

/// The tool description and input document of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFiles {
    pub tool: PathBuf,
    pub inputs: PathBuf,
}

impl StepFiles {
    pub fn new(tool: impl Into<PathBuf>, inputs: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            inputs: inputs.into(),
        }
    }
}

/// Where steps find their files and stage their placeholders.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub workflow_dir: PathBuf,
    pub stager: FakeFileStager,
}

impl StepContext {
    pub fn new(workflow_dir: impl Into<PathBuf>, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            workflow_dir: workflow_dir.into(),
            stager: FakeFileStager::new(staging_root),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        resolve_relative(&self.workflow_dir, path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    short_name: String,
    description: String,
    files: StepFiles,
}

impl WorkflowStep {
    pub fn new(
        short_name: impl Into<String>,
        description: impl Into<String>,
        files: StepFiles,
    ) -> Self {
        Self {
            short_name: short_name.into(),
            description: description.into(),
            files,
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn files(&self) -> &StepFiles {
        &self.files
    }

    /// Load, resolve, synthesize.
    pub fn build(&self, ctx: &StepContext) -> Result<BuiltStep, StepError> {
        let tool = ToolDescription::load(ctx.resolve(&self.files.tool))?;
        let raw = InputDocument::load(ctx.resolve(&self.files.inputs))?;
        let resolved = InputResolver::resolve(&tool, &raw)?;
        let tokens = CommandLineSynthesizer::new(&ctx.stager).tokens(&tool, &resolved)?;
        let command_line = quote::join(&tokens);

        log::debug!("{} -> {}", self.short_name, command_line);

        Ok(BuiltStep {
            short_name: self.short_name.clone(),
            description: self.description.clone(),
            executable: tool.executable().map(str::to_string),
            tokens,
            command_line,
            rewritten: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltStep {
    short_name: String,
    description: String,
    executable: Option<String>,
    tokens: Vec<String>,
    command_line: String,
    rewritten: bool,
}

impl BuiltStep {
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// First token of `baseCommand`, if the tool has one.
    pub fn executable(&self) -> Option<&str> {
        self.executable.as_deref()
    }

    /// Unquoted argument tokens as bound, before any rewrite.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn is_rewritten(&self) -> bool {
        self.rewritten
    }

    /// Replaces the command line with `f(tokens)`. Allowed once.
    pub fn rewrite<F>(&mut self, f: F) -> Result<(), StepError>
    where
        F: FnOnce(&[String]) -> String,
    {
        if self.rewritten {
            return Err(StepError::AlreadyRewritten(self.short_name.clone()));
        }
        self.command_line = f(&self.tokens);
        self.rewritten = true;
        Ok(())
    }
}
