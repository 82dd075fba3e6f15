//! Error types for the deployment pipeline.
//!
//! `DeployError` is what every public operation returns. Failures inside a
//! fanned-out task never surface directly; they are recorded in the
//! `BuildState` as a `TaskError` and come back out as
//! `DeployError::Reported` at the next barrier.

use std::path::PathBuf;

use thiserror::Error;

use crate::build::parse::ParseError;
use crate::build::state::TaskError;
use crate::infrastructure::ExecError;
use crate::registry::RegistryError;
use crate::template::TemplateError;

/// Errors that can occur while provisioning a test network.
#[derive(Debug, Error)]
pub enum DeployError {
    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------
    /// A configuration or deployment file could not be read.
    #[error("cannot read '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration or deployment file is not valid YAML for its type.
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    // ---------------------------------------------------------------------
    // Local artifacts
    // ---------------------------------------------------------------------
    /// Reading or writing a transient local artifact failed.
    #[error("artifact '{path}': {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be serialised to JSON.
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Rendering the genesis template failed.
    #[error("template: {0}")]
    Template(#[from] TemplateError),

    /// Two allocation entries share the same address.
    #[error("duplicate genesis allocation for {0}")]
    DuplicateAllocation(String),

    // ---------------------------------------------------------------------
    // Remote work
    // ---------------------------------------------------------------------
    /// A remote command or copy failed.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Remote output did not match the expected grammar.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A node returned an empty keystore.
    #[error("node {0} returned an empty keystore")]
    EmptyKeystore(usize),

    /// A phase finished without a result for a node and without an error.
    #[error("node {0} produced no result")]
    MissingResult(usize),

    /// One or more fanned-out tasks failed during a phase.
    #[error("{count} task(s) failed during '{stage}', first: {first}")]
    Reported {
        stage: String,
        count: usize,
        first: TaskError,
    },

    /// The build was cancelled while waiting for a concurrency slot.
    #[error("build cancelled")]
    Cancelled,

    // ---------------------------------------------------------------------
    // Everything else
    // ---------------------------------------------------------------------
    /// The node registry rejected an operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The operation is declared but not implemented.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}
