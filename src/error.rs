//! Typed failures that decide how the process reports and exits.

use crate::types::Level;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum QtdlError {
    #[error("Malformed version '{0}': expected major.minor.patch (e.g. 5.15.2)")]
    MalformedVersion(String),

    #[error("Unknown {level} '{value}'. Valid values: {}", format_alternatives(.alternatives))]
    UnknownValue {
        level: Level,
        value: String,
        alternatives: Vec<String>,
    },

    #[error("No package matching '{pattern}' found in {url}")]
    PackageNotFound { pattern: String, url: String },

    #[error("Extraction of {archive} failed: {reason}\nHint: {hint}")]
    ExtractionFailed {
        archive: String,
        reason: String,
        hint: String,
    },

    #[error("Interrupted by user")]
    Interrupted,

    #[error("{url} was not found (404)")]
    NotFound { url: String },

    #[error("Request to {url} failed: {status}")]
    RequestFailed { url: String, status: StatusCode },
}

fn format_alternatives(alternatives: &[String]) -> String {
    if alternatives.is_empty() {
        "(none)".to_string()
    } else {
        alternatives.join(", ")
    }
}

impl QtdlError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            QtdlError::Interrupted => 130,
            _ => 1,
        }
    }
}

/// Find a typed failure anywhere in an `anyhow` chain.
pub fn find_qtdl_error(err: &anyhow::Error) -> Option<&QtdlError> {
    err.chain().find_map(|cause| cause.downcast_ref::<QtdlError>())
}
