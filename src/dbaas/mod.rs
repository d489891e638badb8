//! Hosted database API integration module.
//!
//! This module provides the trait the provisioning engine talks through,
//! the HTTP client implementing it, and the wire types.

mod api;
mod client;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::DeploymentApi;
pub use client::{CAPTURE_TARGET, DEFAULT_API_URL, DbaasClient};
pub use types::{
    Account, Cluster, ConnectionStrings, CreateDeploymentRequest, Datacenter, Deployment, Recipe,
    RecipeStatus, Scalings, Team, TeamRoleEntry, TeamRoles,
};
