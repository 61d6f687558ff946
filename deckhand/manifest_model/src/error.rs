//! Error types for manifest loading and validation.

use thiserror::Error;

use deckhand_shared_types::DeckhandError;

/// Result type for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;

/// Errors that can occur while loading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// I/O error reading the manifest file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well-formed YAML/JSON or does not match the
    /// manifest wire format. Duplicate mapping keys are rejected here.
    #[error("Manifest parse error: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// The document parsed but violates manifest invariants.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<ManifestError> for DeckhandError {
    fn from(err: ManifestError) -> Self {
        DeckhandError::Validation(err.to_string())
    }
}

/// Aggregate of every invariant violation found in one validation pass.
///
/// Validation walks the whole manifest before failing so the operator sees
/// all problems at once rather than one per run.
#[derive(Error, Debug)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} manifest issue(s): ", self.issues.len())?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

/// A single manifest invariant violation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("container '{container}' references unknown image '{image}'")]
    UnknownImage { container: String, image: String },

    #[error("cluster '{cluster}' lists unknown container '{container}'")]
    UnknownContainerInCluster { cluster: String, container: String },

    #[error("cluster '{cluster}' lists container '{container}' more than once")]
    DuplicateClusterMember { cluster: String, container: String },

    #[error("cluster '{cluster}' references unknown group '{group}'")]
    UnknownGroup { cluster: String, group: String },

    #[error("group '{group}' overrides unknown container '{container}'")]
    UnknownContainerInGroup { group: String, container: String },

    #[error("container '{container}' depends on itself")]
    SelfDependency { container: String },

    #[error("container '{container}' depends on unknown container '{target}'")]
    UnknownDependencyTarget { container: String, target: String },

    #[error(
        "container '{container}' in cluster '{cluster}' depends on '{target}', \
         which is not part of that cluster's launch set"
    )]
    DependencyOutsideCluster {
        cluster: String,
        container: String,
        target: String,
    },

    #[error("container '{container}': malformed {field} entry '{entry}': {reason}")]
    MalformedEntry {
        container: String,
        field: &'static str,
        entry: String,
        reason: String,
    },
}
