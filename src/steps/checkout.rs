//! Checkout runner.
//!
//! The agent runs in an existing working copy, so `self` needs no work,
//! `none` is a skip, and other repositories are not fetched.

use super::StepRunner;
use crate::error::Result;
use crate::pipeline::{Job, Stage, Step, StepKind};
use crate::runner::{PipelineRunContext, StatusType};

#[derive(Debug, Clone)]
pub struct CheckoutRunner {
    repository: String,
}

impl CheckoutRunner {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
        }
    }

    /// Constructor for `checkout` steps.
    pub fn for_step(step: &Step) -> Option<Box<dyn StepRunner>> {
        match &step.kind {
            StepKind::Checkout { repository } => Some(Box::new(Self::new(repository.as_str()))),
            _ => None,
        }
    }
}

impl StepRunner for CheckoutRunner {
    fn run(
        &mut self,
        ctx: &mut PipelineRunContext,
        _stage: &Stage,
        _job: &Job,
    ) -> Result<StatusType> {
        match self.repository.to_lowercase().as_str() {
            "self" => {
                let sources = ctx
                    .render("Build.SourcesDirectory")
                    .unwrap_or_else(|| ctx.work_dir().display().to_string());
                ctx.log_info(&format!("Using sources in {}", sources));
                Ok(StatusType::Complete)
            }
            "none" => {
                ctx.log_info("Checkout disabled");
                Ok(StatusType::Skipped)
            }
            other => {
                ctx.log_warn(&format!("Checkout of repository '{}' is not supported", other));
                Ok(StatusType::Warning)
            }
        }
    }
}
