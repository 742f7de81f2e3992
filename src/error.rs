//! Error types shared by the `cook-plan` and `tag-stack` binaries.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the plan renamer. Every variant is fatal for the run.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("The file at {} does not exist.", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode JSON - {0}")]
    Parse(#[source] serde_json::Error),

    #[error("'ImportedResource' key not found in the JSON file.")]
    MissingImportedResource,

    #[error("Unexpected plan layout: {0}")]
    InvalidShape(String),

    #[error("{} resource(s) do not have a 'Name' tag", .0.len())]
    MissingNameTags(Vec<String>),

    #[error("Failed to serialize cooked plan: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type PlanResult<T> = Result<T, PlanError>;

impl PlanError {
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }
}

/// Failures of the stack tagger.
///
/// Only `Config` and `Aws` abort a run. The per-resource variants end up in
/// the untagged bucket of the report.
#[derive(Error, Debug)]
pub enum TaggerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AWS operation failed: {0}")]
    Aws(String),

    #[error("Error fetching ARN for resource {resource_id}: {message}")]
    ArnLookup {
        resource_id: String,
        message: String,
    },

    #[error("Resource does not support tagging: {arn}")]
    TaggingUnsupported { arn: String },

    #[error("Error tagging resource {arn}: {message}")]
    TagRejected { arn: String, message: String },
}

pub type TaggerResult<T> = Result<T, TaggerError>;

impl TaggerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn aws(msg: impl Into<String>) -> Self {
        Self::Aws(msg.into())
    }

    pub fn arn_lookup(resource_id: &str, message: impl Into<String>) -> Self {
        Self::ArnLookup {
            resource_id: resource_id.to_string(),
            message: message.into(),
        }
    }
}
