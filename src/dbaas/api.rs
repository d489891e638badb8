//! Deployment API trait definition.
//!
//! This module defines the interface the provisioning engine uses to talk to
//! the hosted database backend. [`super::DbaasClient`] implements it over
//! HTTP; tests implement it in memory.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{
    Account, Cluster, CreateDeploymentRequest, Datacenter, Deployment, Recipe, Scalings,
    TeamRoleEntry,
};

/// Operations the provisioning engine needs from the backend.
///
/// Every mutating call returns the [`Recipe`] tracking the remote job, or
/// the created [`Deployment`] carrying its provisioning recipe id.
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    /// Fetches the account the credential belongs to.
    async fn account(&self) -> Result<Account>;

    /// Lists clusters available to the account.
    async fn list_clusters(&self) -> Result<Vec<Cluster>>;

    /// Lists datacenters deployments may be placed in.
    async fn list_datacenters(&self) -> Result<Vec<Datacenter>>;

    /// Lists existing deployments.
    async fn list_deployments(&self) -> Result<Vec<Deployment>>;

    /// Gets a single deployment, including its connection strings.
    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment>;

    /// Gets the current resource allocation of a deployment.
    async fn get_scalings(&self, deployment_id: &str) -> Result<Scalings>;

    /// Lists team roles granted on a deployment.
    async fn list_team_roles(&self, deployment_id: &str) -> Result<Vec<TeamRoleEntry>>;

    /// Creates a deployment.
    async fn create_deployment(&self, request: &CreateDeploymentRequest) -> Result<Deployment>;

    /// Changes the version of a deployment.
    async fn update_version(&self, deployment_id: &str, version: &str) -> Result<Recipe>;

    /// Changes the resource allocation of a deployment.
    async fn set_scalings(&self, deployment_id: &str, units: u32) -> Result<Recipe>;

    /// Replaces the tags of a deployment.
    async fn update_tags(&self, deployment_id: &str, tags: &[String]) -> Result<()>;

    /// Grants a role on a deployment to a team.
    async fn grant_team_role(&self, deployment_id: &str, team_id: &str, role: &str)
    -> Result<()>;

    /// Gets the status of a remote job.
    async fn get_recipe(&self, recipe_id: &str) -> Result<Recipe>;

    /// Deletes a deployment.
    async fn delete_deployment(&self, deployment_id: &str) -> Result<Recipe>;
}
