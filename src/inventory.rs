//! Remote inventory resolver.
//!
//! Fetches the account's current state once, before any deployment work
//! starts, and answers read-only lookups from every concurrent deployer.
//! A failure here is fatal to the whole run.

use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::dbaas::{Deployment, DeploymentApi, TeamRoleEntry, TeamRoles};
use crate::error::{ProvisionerError, Result};

/// Current state of a deployment that already exists remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingDeployment {
    /// Remote identifier.
    pub id: String,
    /// Resource type.
    pub deployment_type: String,
    /// Current version.
    pub version: Option<String>,
    /// Allocated scaling units.
    pub scaling: Option<u32>,
    /// Current tags.
    pub tags: Vec<String>,
    /// Roles currently granted, per team.
    pub team_roles: TeamRoles,
}

impl ExistingDeployment {
    /// Returns true if `team_id` already holds `role`.
    #[must_use]
    pub fn has_role(&self, team_id: &str, role: &str) -> bool {
        self.team_roles
            .get(team_id)
            .is_some_and(|roles| roles.iter().any(|r| r == role))
    }
}

/// Snapshot of the account taken at startup.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    account_id: String,
    clusters: HashMap<String, String>,
    datacenters: HashSet<String>,
    deployments: HashMap<String, ExistingDeployment>,
}

impl Inventory {
    /// Fetches account, clusters, datacenters and deployments, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionerError::Init`] naming the first fetch that failed.
    pub async fn init(api: &dyn DeploymentApi) -> Result<Self> {
        info!("Fetching account inventory");

        let account = api
            .account()
            .await
            .map_err(|e| ProvisionerError::init("account", e))?;
        let clusters = api
            .list_clusters()
            .await
            .map_err(|e| ProvisionerError::init("clusters", e))?;
        let datacenters = api
            .list_datacenters()
            .await
            .map_err(|e| ProvisionerError::init("datacenters", e))?;
        let deployments = api
            .list_deployments()
            .await
            .map_err(|e| ProvisionerError::init("deployments", e))?;

        let existing = try_join_all(deployments.into_iter().map(|d| Self::describe(api, d)))
            .await
            .map_err(|e| ProvisionerError::init("deployments", e))?;

        let inventory = Self {
            account_id: account.id,
            clusters: clusters.into_iter().map(|c| (c.name, c.id)).collect(),
            datacenters: datacenters.into_iter().map(|d| d.slug).collect(),
            deployments: existing.into_iter().collect(),
        };

        info!(
            "Inventory: {} cluster(s), {} datacenter(s), {} deployment(s)",
            inventory.clusters.len(),
            inventory.datacenters.len(),
            inventory.deployments.len()
        );
        Ok(inventory)
    }

    /// Completes a listed deployment with its scaling and team roles.
    async fn describe(
        api: &dyn DeploymentApi,
        deployment: Deployment,
    ) -> Result<(String, ExistingDeployment)> {
        let scalings = api.get_scalings(&deployment.id).await?;
        let roles = api.list_team_roles(&deployment.id).await?;
        debug!(
            "Existing deployment {} ({}) at {} unit(s)",
            deployment.name, deployment.id, scalings.allocated_units
        );

        Ok((
            deployment.name,
            ExistingDeployment {
                id: deployment.id,
                deployment_type: deployment.deployment_type,
                version: deployment.version,
                scaling: Some(scalings.allocated_units),
                tags: deployment.tags,
                team_roles: TeamRoleEntry::by_team(&roles),
            },
        ))
    }

    /// Account identifier.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Looks up a cluster identifier by name.
    #[must_use]
    pub fn cluster_id(&self, name: &str) -> Option<&str> {
        self.clusters.get(name).map(String::as_str)
    }

    /// Returns true if deployments may be placed in `slug`.
    #[must_use]
    pub fn has_datacenter(&self, slug: &str) -> bool {
        self.datacenters.contains(slug)
    }

    /// Valid datacenter slugs.
    pub fn datacenters(&self) -> impl Iterator<Item = &str> {
        self.datacenters.iter().map(String::as_str)
    }

    /// Looks up an existing deployment by name.
    #[must_use]
    pub fn deployment(&self, name: &str) -> Option<&ExistingDeployment> {
        self.deployments.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbaas::fake::{FakeApi, FakeDeployment};

    #[tokio::test]
    async fn test_init_populates_lookups() {
        let api = FakeApi::new();
        let mut existing = FakeDeployment::new("dep-9", "docs", "mongodb", 3);
        existing.tags = vec![String::from("prod")];
        existing
            .team_roles
            .insert(String::from("team-a"), vec![String::from("admin")]);
        api.seed_deployment(existing);

        let inventory = Inventory::init(&api).await.expect("init should succeed");

        assert_eq!(inventory.account_id(), "account-1");
        assert_eq!(inventory.cluster_id("shared"), Some("cluster-1"));
        assert!(inventory.has_datacenter("aws:us-east-1"));
        assert!(!inventory.has_datacenter("gcp:mars-1"));

        let docs = inventory.deployment("docs").expect("docs should exist");
        assert_eq!(docs.id, "dep-9");
        assert_eq!(docs.scaling, Some(3));
        assert_eq!(docs.tags, vec!["prod"]);
        assert!(docs.has_role("team-a", "admin"));
        assert!(!docs.has_role("team-a", "developer"));
    }

    #[tokio::test]
    async fn test_init_failure_is_fatal_and_named() {
        for resource in ["account", "clusters", "datacenters", "deployments"] {
            let api = FakeApi::new();
            api.fail_fetch(resource);

            let err = Inventory::init(&api).await.expect_err("init should fail");
            match err {
                ProvisionerError::Init { resource: failed, .. } => assert_eq!(failed, resource),
                other => panic!("expected init error, got {other}"),
            }
        }
    }
}
