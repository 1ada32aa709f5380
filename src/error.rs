//! Error taxonomy for catalog and run operations.
//!
//! Functions return `anyhow::Result`; these values travel inside the
//! `anyhow::Error` so callers can `downcast_ref::<CatalogError>()` to branch on
//! the failure kind while still getting path context on I/O errors.
use crate::objects::ObjectKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// No definition exists under the given name.
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: ObjectKind, name: String },

    /// A definition already exists and overwrite was not requested.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ObjectKind, name: String },

    /// The object is standard or referenced by a higher-level object.
    #[error("{kind} '{name}' cannot be modified: {reason}")]
    InUse {
        kind: ObjectKind,
        name: String,
        reason: String,
        used_by: Vec<String>,
    },

    /// The definition is malformed or inconsistent with the catalog.
    #[error("invalid {kind} '{name}': {message}")]
    Validation {
        kind: ObjectKind,
        name: String,
        message: String,
    },

    /// A simulator exited non-zero or did not produce its expected output.
    #[error("{simulator} simulator failed in {work_dir}: {detail}")]
    ExternalProcessFailure {
        simulator: String,
        work_dir: String,
        detail: String,
    },

    /// One or more scenarios in a batch failed; every item was attempted.
    #[error("{} scenario(s) failed: {}", failed.len(), format_failures(failed))]
    PartialBatchFailure { failed: Vec<(String, String)> },

    /// An analysis was started before its prerequisites were satisfied.
    #[error("{kind} '{name}' is not ready to run: {reason}")]
    NotReady {
        kind: ObjectKind,
        name: String,
        reason: String,
    },
}

impl CatalogError {
    pub fn not_found(kind: ObjectKind, name: &str) -> Self {
        CatalogError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    pub fn validation(kind: ObjectKind, name: &str, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            kind,
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Names of the objects blocking an in-use failure, empty otherwise.
    pub fn used_by(&self) -> &[String] {
        match self {
            CatalogError::InUse { used_by, .. } => used_by,
            _ => &[],
        }
    }

    /// Names of the failed scenarios in a batch failure, empty otherwise.
    pub fn failed_names(&self) -> Vec<&str> {
        match self {
            CatalogError::PartialBatchFailure { failed } => {
                failed.iter().map(|(name, _)| name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn format_failures(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(name, reason)| format!("{name} ({reason})"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Find the `CatalogError` carried by an `anyhow::Error`, if any.
pub fn catalog_error(err: &anyhow::Error) -> Option<&CatalogError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CatalogError>())
}
