//! Pipeline file loading.
//!
//! Parses a YAML pipeline file and resolves every element to its model kind.
//! A file that declares `jobs:` or `steps:` at the top level instead of
//! `stages:` is wrapped into an implicit stage (and job).

use std::fs;
use std::path::Path;

use super::model::{Job, JobSpec, Pipeline, Stage, Step, StepKind, TemplateReference};
use super::schema::{JobConfig, PipelineConfig, StageConfig, StepConfig};
use crate::error::{ConveyorError, Result};
use crate::variables::Variable;

/// Load a pipeline file.
pub fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConveyorError::PipelineNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConveyorError::Io(e)
        }
    })?;

    parse_pipeline(&content, path)
}

/// Parse YAML content into a [`Pipeline`].
///
/// `source_path` is only used for error reporting.
///
/// # Example
///
/// ```
/// use conveyor::pipeline::parse_pipeline;
/// use std::path::Path;
///
/// let pipeline = parse_pipeline(
///     "steps:\n  - script: echo hello\n",
///     Path::new("inline.yml"),
/// )
/// .unwrap();
///
/// assert_eq!(pipeline.stages.len(), 1);
/// assert_eq!(pipeline.stages[0].jobs.len(), 1);
/// ```
pub fn parse_pipeline(content: &str, source_path: &Path) -> Result<Pipeline> {
    let config: PipelineConfig =
        serde_yaml::from_str(content).map_err(|e| ConveyorError::PipelineParse {
            path: source_path.to_path_buf(),
            message: e.to_string(),
        })?;

    convert_pipeline(config)
}

/// Resolve a parsed file into the model.
pub fn convert_pipeline(config: PipelineConfig) -> Result<Pipeline> {
    let declared = [
        !config.stages.is_empty(),
        !config.jobs.is_empty(),
        !config.steps.is_empty(),
    ];
    if declared.iter().filter(|d| **d).count() > 1 {
        return Err(invalid(
            "a pipeline may declare only one of 'stages', 'jobs' or 'steps'",
        ));
    }

    let stages = if !config.stages.is_empty() {
        config
            .stages
            .into_iter()
            .map(convert_stage)
            .collect::<Result<Vec<_>>>()?
    } else if !config.jobs.is_empty() {
        vec![Stage {
            jobs: convert_jobs(config.jobs)?,
            ..Default::default()
        }]
    } else if !config.steps.is_empty() {
        let job = JobSpec {
            steps: convert_steps(config.steps)?,
            ..Default::default()
        };
        vec![Stage {
            jobs: vec![Job::Standard(job)],
            ..Default::default()
        }]
    } else {
        Vec::new()
    };

    Ok(Pipeline {
        name: config.name,
        variables: variables(config.variables),
        stages,
    })
}

fn convert_stage(stage: StageConfig) -> Result<Stage> {
    if let Some(template) = stage.template {
        return Err(invalid(format!(
            "stage template '{}' must be expanded before the pipeline is run",
            template
        )));
    }

    Ok(Stage {
        name: stage.stage,
        display_name: stage.display_name,
        variables: variables(stage.variables),
        jobs: convert_jobs(stage.jobs)?,
    })
}

fn convert_jobs(jobs: Vec<JobConfig>) -> Result<Vec<Job>> {
    jobs.into_iter().map(convert_job).collect()
}

fn convert_job(job: JobConfig) -> Result<Job> {
    if job.job.is_some() && job.deployment.is_some() {
        return Err(invalid("a job cannot be both 'job' and 'deployment'"));
    }

    if let Some(template) = job.template {
        if job.job.is_some() || job.deployment.is_some() {
            return Err(invalid(format!(
                "job template '{}' cannot also declare a job name",
                template
            )));
        }
        return Ok(Job::Template(TemplateReference {
            template,
            parameters: job.parameters,
        }));
    }

    let is_deployment = job.deployment.is_some();
    let mut steps = job.steps;
    if let Some(deploy) = job
        .strategy
        .and_then(|s| s.run_once)
        .and_then(|r| r.deploy)
    {
        steps.extend(deploy.steps);
    }

    let spec = JobSpec {
        name: job.job.or(job.deployment),
        display_name: job.display_name,
        depends_on: job.depends_on.map(|d| d.into_vec()).unwrap_or_default(),
        continue_on_error: job.continue_on_error,
        variables: variables(job.variables),
        steps: convert_steps(steps)?,
    };

    if is_deployment {
        let environment = job
            .environment
            .map(|e| e.name().to_string())
            .unwrap_or_default();
        Ok(Job::Deployment { spec, environment })
    } else {
        Ok(Job::Standard(spec))
    }
}

fn convert_steps(steps: Vec<StepConfig>) -> Result<Vec<Step>> {
    steps.into_iter().map(convert_step).collect()
}

fn convert_step(step: StepConfig) -> Result<Step> {
    let mut kinds: Vec<StepKind> = Vec::new();

    for (interpreter, script) in [
        ("script", step.script),
        ("bash", step.bash),
        ("pwsh", step.pwsh),
        ("powershell", step.powershell),
    ] {
        if let Some(script) = script {
            kinds.push(StepKind::Script {
                script,
                interpreter: interpreter.to_string(),
            });
        }
    }
    if let Some(task) = step.task {
        kinds.push(StepKind::Task {
            task,
            inputs: step.inputs,
        });
    }
    if let Some(repository) = step.checkout {
        kinds.push(StepKind::Checkout { repository });
    }
    if let Some(template) = step.template {
        kinds.push(StepKind::Template(TemplateReference {
            template,
            parameters: step.parameters,
        }));
    }

    if kinds.len() != 1 {
        let label = step
            .display_name
            .or(step.name)
            .unwrap_or_else(|| "<unnamed>".to_string());
        return Err(invalid(format!(
            "step '{}' must declare exactly one of script, bash, pwsh, powershell, task, checkout or template",
            label
        )));
    }

    let env = step
        .env
        .into_iter()
        .map(|(name, value)| Variable::Simple { name, value })
        .collect();

    Ok(Step {
        name: step.name,
        display_name: step.display_name,
        enabled: step.enabled.unwrap_or(true),
        env,
        kind: kinds.remove(0),
    })
}

fn variables(config: Option<super::schema::VariablesConfig>) -> Vec<Variable> {
    config.map(|v| v.into_variables()).unwrap_or_default()
}

fn invalid(message: impl Into<String>) -> ConveyorError {
    ConveyorError::InvalidPipeline {
        message: message.into(),
    }
}
