//! Deployment API types and data structures.
//!
//! This module defines the types exchanged with the hosted database API.
//! List endpoints wrap their payload in a HAL-style `_embedded` object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Account owning the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// A pre-existing cluster deployments can be placed into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster identifier.
    pub id: String,
    /// Cluster name.
    pub name: String,
}

/// A datacenter deployments can be placed into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datacenter {
    /// Provider:region slug, e.g. `aws:us-east-1`.
    pub slug: String,
    /// Region name.
    #[serde(default)]
    pub region: String,
    /// Provider name.
    #[serde(default)]
    pub provider: String,
}

/// A remote deployment as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment identifier.
    pub id: String,
    /// Deployment name.
    pub name: String,
    /// Resource type (e.g. `redis`).
    #[serde(rename = "type")]
    pub deployment_type: String,
    /// Current version.
    #[serde(default)]
    pub version: Option<String>,
    /// Current tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Recipe tracking the initial provisioning, present on creation.
    #[serde(default)]
    pub provision_recipe_id: Option<String>,
    /// Connection strings, present on detail reads.
    #[serde(default)]
    pub connection_strings: Option<ConnectionStrings>,
}

/// Connection strings for a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStrings {
    /// Direct driver connection URIs.
    #[serde(default)]
    pub direct: Vec<String>,
    /// Command-line client invocations.
    #[serde(default)]
    pub cli: Vec<String>,
}

/// Resource allocation of a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scalings {
    /// Units currently allocated.
    pub allocated_units: u32,
    /// Units currently in use.
    #[serde(default)]
    pub used_units: u32,
}

/// A team role and the teams holding it on a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRoleEntry {
    /// Role name.
    pub name: String,
    /// Teams holding this role.
    #[serde(default)]
    pub teams: Vec<Team>,
}

/// A team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Team identifier.
    pub id: String,
    /// Team name.
    #[serde(default)]
    pub name: String,
}

/// An asynchronous remote job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Recipe identifier.
    pub id: String,
    /// Current status.
    #[serde(default)]
    pub status: RecipeStatus,
    /// Deployment the recipe acts on.
    #[serde(default)]
    pub deployment_id: Option<String>,
}

/// Recipe status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecipeStatus {
    /// Not started yet.
    #[default]
    Waiting,
    /// In progress.
    Running,
    /// Finished successfully.
    Complete,
    /// Finished unsuccessfully.
    Failed,
    /// Any status this client does not recognize.
    #[serde(other)]
    Unknown,
}

/// Request to create a new deployment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateDeploymentRequest {
    /// Owning account.
    pub account_id: String,
    /// Deployment name.
    pub name: String,
    /// Resource type.
    #[serde(rename = "type")]
    pub deployment_type: String,
    /// Datacenter slug, mutually exclusive with `cluster_id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    /// Cluster identifier, mutually exclusive with `datacenter`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    /// Requested version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Initial scaling units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<u32>,
    /// Enable SSL.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ssl: bool,
    /// Use the alternate storage engine.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub wired_tiger: bool,
    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// HAL `_embedded` envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Embedded<T> {
    #[serde(rename = "_embedded")]
    pub embedded: T,
}

/// Role names held per team identifier.
pub type TeamRoles = BTreeMap<String, Vec<String>>;

impl TeamRoleEntry {
    /// Flattens role entries into `team id -> roles` form.
    #[must_use]
    pub fn by_team(entries: &[Self]) -> TeamRoles {
        let mut roles = TeamRoles::new();
        for entry in entries {
            for team in &entry.teams {
                roles
                    .entry(team.id.clone())
                    .or_default()
                    .push(entry.name.clone());
            }
        }
        roles
    }
}

impl fmt::Display for RecipeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        write!(f, "{status}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_roles_by_team() {
        let entries = vec![
            TeamRoleEntry {
                name: String::from("admin"),
                teams: vec![Team {
                    id: String::from("t1"),
                    name: String::new(),
                }],
            },
            TeamRoleEntry {
                name: String::from("developer"),
                teams: vec![
                    Team {
                        id: String::from("t1"),
                        name: String::new(),
                    },
                    Team {
                        id: String::from("t2"),
                        name: String::new(),
                    },
                ],
            },
        ];

        let roles = TeamRoleEntry::by_team(&entries);
        assert_eq!(roles["t1"], vec!["admin", "developer"]);
        assert_eq!(roles["t2"], vec!["developer"]);
    }

    #[test]
    fn test_create_request_skips_unset_fields() {
        let request = CreateDeploymentRequest {
            account_id: String::from("acct"),
            name: String::from("cache1"),
            deployment_type: String::from("redis"),
            datacenter: Some(String::from("aws:us-east-1")),
            cluster_id: None,
            version: None,
            units: Some(2),
            ssl: false,
            wired_tiger: false,
            notes: None,
        };

        let json = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(json["type"], "redis");
        assert_eq!(json["units"], 2);
        assert!(json.get("cluster_id").is_none());
        assert!(json.get("ssl").is_none());
    }

    #[test]
    fn test_recipe_status_parse() {
        let recipe: Recipe = serde_json::from_str(r#"{"id":"r1","status":"complete"}"#)
            .expect("recipe should parse");
        assert_eq!(recipe.status, RecipeStatus::Complete);
    }

    #[test]
    fn test_unrecognized_recipe_status_still_parses() {
        let recipe: Recipe = serde_json::from_str(r#"{"id":"r1","status":"paused"}"#)
            .expect("recipe should parse");
        assert_eq!(recipe.status, RecipeStatus::Unknown);
    }
}
