//! Scenario error types.

use thiserror::Error;

/// Errors from scenario validation, resolution, and execution.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Definition-time schema violation. Fatal at load, never raised for a
    /// tree that passed validation.
    #[error("invalid scenario at \"{path}\": {reason}")]
    Validation { path: String, reason: String },

    /// A deferred call referenced a name missing from the capability table.
    /// Fatal for the turn it occurs in.
    #[error("unknown capability \"{0}\"")]
    UnknownCapability(String),

    /// A capability invocation failed.
    #[error("capability \"{name}\" failed: {source}")]
    Capability {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A path segment did not match any child of the node reached so far.
    #[error("cannot find scenario \"{segment}\" in \"{path}\"")]
    PathNotFound { segment: String, path: String },
}

impl ScenarioError {
    pub(crate) fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ScenarioError::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
