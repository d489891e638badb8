//! Validation of raw deployment records.
//!
//! Turns [`RawDeployment`] records into [`DeploymentDescriptor`]s, checking
//! placement, storage engine, scaling and team-role rules against the
//! datacenters the account can use. Every problem found in a run is
//! collected before anything is provisioned.

use crate::error::{AggregateError, ConfigError, ProvisionerError, Result};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::debug;

use super::spec::{
    CONFIG_VERSION, DeploymentDescriptor, Placement, RawDeployment, ResourceType, TeamRole,
};

/// Validator for deployment records.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Datacenter slugs deployments may be placed in.
    datacenters: HashSet<String>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn push(&mut self, field: String, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field,
            message: message.into(),
        });
    }

    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    fn into_error(self) -> ProvisionerError {
        let mut errors: Vec<ProvisionerError> = self
            .errors
            .into_iter()
            .map(|e| ConfigError::validation(e.message, e.field).into())
            .collect();

        if errors.len() == 1 {
            if let Some(only) = errors.pop() {
                return only;
            }
        }
        AggregateError { errors }.into()
    }
}

impl ConfigValidator {
    /// Creates a validator accepting the given datacenter slugs.
    #[must_use]
    pub fn new<I, S>(datacenters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            datacenters: datacenters.into_iter().map(Into::into).collect(),
        }
    }

    /// Validates a single record.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or an aggregate of them when the record
    /// breaks several rules.
    pub fn validate(&self, raw: &RawDeployment) -> Result<DeploymentDescriptor> {
        let mut result = ValidationResult::default();
        match self.check(raw, &label(raw, 0), &mut result) {
            Some(descriptor) if result.is_valid() => Ok(descriptor),
            _ => Err(result.into_error()),
        }
    }

    /// Validates every record of a run, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns every validation error found across all records.
    pub fn validate_all(&self, raws: &[RawDeployment]) -> Result<Vec<DeploymentDescriptor>> {
        let mut result = ValidationResult::default();
        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(raws.len());

        for (index, raw) in raws.iter().enumerate() {
            let label = label(raw, index);
            if !raw.name.is_empty() && !seen.insert(raw.name.as_str()) {
                result.push(
                    format!("{label}.name"),
                    ConfigError::DuplicateName {
                        name: raw.name.clone(),
                    }
                    .to_string(),
                );
            }
            if let Some(descriptor) = self.check(raw, &label, &mut result) {
                descriptors.push(descriptor);
            }
        }

        if result.is_valid() {
            debug!("Validated {} deployment(s)", descriptors.len());
            Ok(descriptors)
        } else {
            Err(result.into_error())
        }
    }

    /// Checks one record, returning a descriptor only if it added no errors.
    fn check(
        &self,
        raw: &RawDeployment,
        label: &str,
        result: &mut ValidationResult,
    ) -> Option<DeploymentDescriptor> {
        let before = result.error_count();

        if raw.config_version != CONFIG_VERSION {
            result.push(
                format!("{label}.config_version"),
                format!(
                    "unsupported config_version {}, expected {CONFIG_VERSION}",
                    raw.config_version
                ),
            );
        }

        if raw.name.trim().is_empty() {
            result.push(format!("{label}.name"), "name cannot be empty");
        }

        let resource_type = match raw.deployment_type.parse::<ResourceType>() {
            Ok(t) => Some(t),
            Err(message) => {
                result.push(format!("{label}.type"), message);
                None
            }
        };

        let placement = self.check_placement(raw, resource_type, label, result);
        let timeout = check_timeout(raw.timeout, label, result);
        let team_roles = check_teams(raw, label, result);

        if result.error_count() != before {
            return None;
        }

        Some(DeploymentDescriptor {
            name: raw.name.clone(),
            resource_type: resource_type?,
            placement: placement?,
            version: raw.version.clone().filter(|v| !v.is_empty()),
            ssl: raw.ssl,
            timeout,
            tags: raw.tags.clone(),
            team_roles,
            notes: raw.notes.clone(),
        })
    }

    fn check_placement(
        &self,
        raw: &RawDeployment,
        resource_type: Option<ResourceType>,
        label: &str,
        result: &mut ValidationResult,
    ) -> Option<Placement> {
        match (&raw.cluster, &raw.datacenter) {
            (Some(_), Some(_)) | (None, None) => {
                result.push(
                    format!("{label}.placement"),
                    "exactly one of 'cluster' or 'datacenter' must be set",
                );
                None
            }
            (Some(cluster), None) => {
                if !is_valid_cluster_name(cluster) {
                    result.push(
                        format!("{label}.cluster"),
                        format!(
                            "cluster name '{cluster}' is invalid, only [a-z0-9-] is allowed"
                        ),
                    );
                }
                if raw.scaling.is_some() {
                    result.push(
                        format!("{label}.scaling"),
                        "scaling requires a datacenter placement",
                    );
                }
                if raw.wired_tiger {
                    result.push(
                        format!("{label}.wired_tiger"),
                        "wired_tiger requires a datacenter placement",
                    );
                }
                Some(Placement::Cluster {
                    name: cluster.clone(),
                })
            }
            (None, Some(datacenter)) => {
                if !self.datacenters.contains(datacenter) {
                    result.push(
                        format!("{label}.datacenter"),
                        format!("unknown datacenter '{datacenter}'"),
                    );
                }
                if raw.scaling == Some(0) {
                    result.push(format!("{label}.scaling"), "scaling must be at least 1");
                }
                let unsupported = resource_type.filter(|t| !t.supports_storage_engine());
                if let (true, Some(t)) = (raw.wired_tiger, unsupported) {
                    result.push(
                        format!("{label}.wired_tiger"),
                        format!("wired_tiger is not supported for type '{t}'"),
                    );
                }
                Some(Placement::Datacenter {
                    slug: datacenter.clone(),
                    scaling: raw.scaling,
                    wired_tiger: raw.wired_tiger,
                })
            }
        }
    }
}

fn check_timeout(
    timeout: Option<f64>,
    label: &str,
    result: &mut ValidationResult,
) -> Option<Duration> {
    let secs = timeout?;
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Some(duration),
        _ => {
            result.push(
                format!("{label}.timeout"),
                "timeout must be a positive number of seconds",
            );
            None
        }
    }
}

fn check_teams(
    raw: &RawDeployment,
    label: &str,
    result: &mut ValidationResult,
) -> BTreeMap<String, TeamRole> {
    let mut roles = BTreeMap::new();

    for (index, team) in raw.teams.iter().enumerate() {
        let field = format!("{label}.teams[{index}]");
        if team.id.is_empty() {
            result.push(format!("{field}.id"), "team id cannot be empty");
            continue;
        }
        match team.role.parse::<TeamRole>() {
            Ok(role) => {
                if roles.insert(team.id.clone(), role).is_some() {
                    result.push(
                        format!("{field}.id"),
                        format!("team '{}' is assigned more than one role", team.id),
                    );
                }
            }
            Err(message) => result.push(format!("{field}.role"), message),
        }
    }

    roles
}

/// Identifies a record in error paths by name, or by position when unnamed.
fn label(raw: &RawDeployment, index: usize) -> String {
    if raw.name.is_empty() {
        format!("deployments[{index}]")
    } else {
        raw.name.clone()
    }
}

/// Checks that a cluster name only uses lowercase letters, digits and hyphens.
fn is_valid_cluster_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
