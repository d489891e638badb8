//! Error types for the provisioner.
//!
//! Errors fall into four families that the engine treats differently:
//! fatal initialization failures, validation failures collected before any
//! work starts, per-deployment failures aggregated after the run joins, and
//! output-assembly failures aggregated the same way.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the provisioner.
#[derive(Debug, Error)]
pub enum ProvisionerError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Deployment API errors.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The remote inventory could not be fetched. Nothing may proceed.
    #[error("Initialization failed while fetching {resource}: {source}")]
    Init {
        /// Which inventory fetch failed.
        resource: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<ProvisionerError>,
    },

    /// A single deployment failed at a single stage.
    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// Several independent failures drained from an error sink.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("{}", validation_message(.message, .field.as_deref()))]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate deployment definition.
    #[error("Duplicate deployment name: {name}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },
}

fn validation_message(message: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("Validation failed for '{field}': {message}"),
        None => format!("Validation failed: {message}"),
    }
}

/// Deployment API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Remote resource not found.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of resource.
        resource: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Network error.
    #[error("network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// A remote job finished in a failed state.
    #[error("recipe {recipe_id} failed with status '{status}'")]
    RecipeFailed {
        /// Recipe identifier.
        recipe_id: String,
        /// Terminal status reported by the backend.
        status: String,
    },

    /// Timeout waiting for a remote job.
    #[error("timed out after {waited_secs}s waiting for recipe {recipe_id} to complete")]
    Timeout {
        /// Recipe identifier.
        recipe_id: String,
        /// How long the poller waited.
        waited_secs: u64,
    },
}

/// Stage of the deployer state machine at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Resolving references against the inventory.
    Resolving,
    /// Issuing the create or update call.
    Mutating,
    /// Waiting for the backend to converge.
    Polling,
    /// Applying tags.
    Tagging,
    /// Granting team roles.
    TeamGranting,
    /// Deleting a deployment.
    Deleting,
    /// Assembling connection records.
    Output,
    /// The task stopped before reaching a terminal state.
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolving => "resolving",
            Self::Mutating => "mutating",
            Self::Polling => "polling",
            Self::Tagging => "tagging",
            Self::TeamGranting => "team granting",
            Self::Deleting => "deleting",
            Self::Output => "output",
            Self::Aborted => "task execution",
        };
        write!(f, "{s}")
    }
}

/// A failure attributed to exactly one deployment and one stage.
#[derive(Debug, Error)]
#[error("deployment '{deployment}' failed during {stage}: {source}")]
pub struct DeployError {
    /// Logical deployment name.
    pub deployment: String,
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying failure.
    #[source]
    pub source: Box<ProvisionerError>,
}

/// Every error drained from an error sink, in arrival order.
#[derive(Debug)]
pub struct AggregateError {
    /// The individual errors. Never empty.
    pub errors: Vec<ProvisionerError>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred:", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  * {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Result type alias for provisioner operations.
pub type Result<T> = std::result::Result<T, ProvisionerError>;

impl ProvisionerError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wraps an inventory fetch failure.
    #[must_use]
    pub fn init(resource: &'static str, source: Self) -> Self {
        Self::Init {
            resource,
            source: Box::new(source),
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::RateLimited { .. } | ApiError::NetworkError { .. })
        )
    }

    /// Returns the delay the server asked for before retrying, if any.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Api(ApiError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Returns true if this error, or the error it wraps, is a polling timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Api(ApiError::Timeout { .. }) => true,
            Self::Deploy(err) => err.source.is_timeout(),
            _ => false,
        }
    }

    /// Returns the deployment-level failure, if this is one.
    #[must_use]
    pub const fn as_deploy(&self) -> Option<&DeployError> {
        match self {
            Self::Deploy(err) => Some(err),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

impl DeployError {
    /// Attributes a failure to a deployment and stage.
    #[must_use]
    pub fn new(deployment: impl Into<String>, stage: Stage, source: ProvisionerError) -> Self {
        Self {
            deployment: deployment.into(),
            stage,
            source: Box::new(source),
        }
    }
}

impl AggregateError {
    /// Names of the deployments that failed, in arrival order.
    #[must_use]
    pub fn failed_deployments(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter_map(ProvisionerError::as_deploy)
            .map(|e| e.deployment.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_error_names_deployment_and_stage() {
        let err = DeployError::new(
            "cache1",
            Stage::Mutating,
            ApiError::api_error(422, "bad scaling").into(),
        );
        let text = err.to_string();
        assert!(text.contains("cache1"));
        assert!(text.contains("mutating"));
        assert!(text.contains("bad scaling"));
    }

    #[test]
    fn test_aggregate_keeps_identical_messages() {
        let agg = AggregateError {
            errors: vec![
                ProvisionerError::internal("same"),
                ProvisionerError::internal("same"),
            ],
        };
        assert_eq!(agg.to_string().matches("Internal error: same").count(), 2);
    }

    #[test]
    fn test_timeout_detection_through_deploy_error() {
        let timeout = ApiError::Timeout {
            recipe_id: String::from("r1"),
            waited_secs: 10,
        };
        let err: ProvisionerError =
            DeployError::new("db", Stage::Polling, timeout.into()).into();
        assert!(err.is_timeout());
        assert!(!ProvisionerError::internal("x").is_timeout());
    }
}
