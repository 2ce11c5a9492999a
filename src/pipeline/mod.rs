//! Pipeline input model, loading and validation.
//!
//! - [`model`] - The object graph the scheduler walks
//! - [`schema`] - Serde shapes of the YAML file format
//! - [`loader`] - Reads a file and resolves it to the model
//! - [`validate`] - Static checks for `conveyor check`

pub mod loader;
pub mod model;
pub mod schema;
pub mod validate;

pub use loader::{load_pipeline, parse_pipeline};
pub use model::{Job, JobSpec, Pipeline, Stage, Step, StepKind, TemplateReference};
pub use validate::{validate, Diagnostic, Severity};
