//! In-memory backend used by unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{ApiError, Result};

use super::api::DeploymentApi;
use super::types::{
    Account, Cluster, ConnectionStrings, CreateDeploymentRequest, Datacenter, Deployment, Recipe,
    RecipeStatus, Scalings, Team, TeamRoleEntry, TeamRoles,
};

/// A mutating call observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    UpdateVersion(String, String),
    SetScalings(String, u32),
    UpdateTags(String, Vec<String>),
    GrantTeamRole(String, String, String),
    Delete(String),
}

#[derive(Debug, Clone)]
pub struct FakeDeployment {
    pub id: String,
    pub name: String,
    pub deployment_type: String,
    pub version: Option<String>,
    pub units: u32,
    pub tags: Vec<String>,
    pub team_roles: TeamRoles,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u32,
    clusters: Vec<Cluster>,
    datacenters: Vec<String>,
    deployments: BTreeMap<String, FakeDeployment>,
    fail_create: HashSet<String>,
    fail_recipe: HashSet<String>,
    stuck: HashSet<String>,
    panic_create: HashSet<String>,
    unrecognized_once: HashSet<String>,
    polled: HashSet<String>,
    fail_fetch: Option<&'static str>,
    recipe_owner: HashMap<String, String>,
    calls: Vec<Call>,
}

/// Backend fake. Recipes complete on their first poll unless the owning
/// deployment was marked stuck or failing.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        {
            let mut state = api.lock();
            state.datacenters = vec![
                String::from("aws:us-east-1"),
                String::from("softlayer:dallas-1"),
            ];
            state.clusters = vec![Cluster {
                id: String::from("cluster-1"),
                name: String::from("shared"),
            }];
        }
        api
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }

    pub fn seed_deployment(&self, deployment: FakeDeployment) {
        let mut state = self.lock();
        state.deployments.insert(deployment.id.clone(), deployment);
    }

    pub fn fail_create_for(&self, name: &str) {
        self.lock().fail_create.insert(name.to_string());
    }

    pub fn fail_recipe_for(&self, name: &str) {
        self.lock().fail_recipe.insert(name.to_string());
    }

    pub fn never_complete(&self, name: &str) {
        self.lock().stuck.insert(name.to_string());
    }

    pub fn panic_on_create(&self, name: &str) {
        self.lock().panic_create.insert(name.to_string());
    }

    /// The first poll of each recipe owned by `name` reports a status the
    /// client does not know.
    pub fn unrecognized_status_once(&self, name: &str) {
        self.lock().unrecognized_once.insert(name.to_string());
    }

    pub fn fail_fetch(&self, resource: &'static str) {
        self.lock().fail_fetch = Some(resource);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn deployment_by_name(&self, name: &str) -> Option<FakeDeployment> {
        self.lock()
            .deployments
            .values()
            .find(|d| d.name == name)
            .cloned()
    }

    fn check_fetch(&self, resource: &'static str) -> Result<()> {
        if self.lock().fail_fetch == Some(resource) {
            return Err(ApiError::api_error(500, format!("{resource} unavailable")).into());
        }
        Ok(())
    }

    fn new_recipe(state: &mut FakeState, deployment_id: &str) -> Recipe {
        state.next_id += 1;
        let id = format!("recipe-{}", state.next_id);
        state
            .recipe_owner
            .insert(id.clone(), deployment_id.to_string());
        Recipe {
            id,
            status: RecipeStatus::Running,
            deployment_id: Some(deployment_id.to_string()),
        }
    }

    fn to_deployment(d: &FakeDeployment) -> Deployment {
        Deployment {
            id: d.id.clone(),
            name: d.name.clone(),
            deployment_type: d.deployment_type.clone(),
            version: d.version.clone(),
            tags: d.tags.clone(),
            provision_recipe_id: None,
            connection_strings: Some(ConnectionStrings {
                direct: vec![format!(
                    "{}://admin:secret@{}.example.com:10000,{}-2.example.com:10001/db",
                    d.deployment_type, d.name, d.name
                )],
                cli: Vec::new(),
            }),
        }
    }

    fn missing(id: &str) -> crate::error::ProvisionerError {
        ApiError::NotFound {
            resource: "deployment",
            id: id.to_string(),
        }
        .into()
    }
}

impl FakeDeployment {
    pub fn new(id: &str, name: &str, deployment_type: &str, units: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            deployment_type: deployment_type.to_string(),
            version: Some(String::from("3.2.0")),
            units,
            tags: Vec::new(),
            team_roles: TeamRoles::new(),
        }
    }
}

#[async_trait]
impl DeploymentApi for FakeApi {
    async fn account(&self) -> Result<Account> {
        self.check_fetch("account")?;
        Ok(Account {
            id: String::from("account-1"),
            name: String::from("test"),
        })
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        self.check_fetch("clusters")?;
        Ok(self.lock().clusters.clone())
    }

    async fn list_datacenters(&self) -> Result<Vec<Datacenter>> {
        self.check_fetch("datacenters")?;
        Ok(self
            .lock()
            .datacenters
            .iter()
            .map(|slug| Datacenter {
                slug: slug.clone(),
                region: String::new(),
                provider: String::new(),
            })
            .collect())
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        self.check_fetch("deployments")?;
        Ok(self
            .lock()
            .deployments
            .values()
            .map(Self::to_deployment)
            .collect())
    }

    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment> {
        self.lock()
            .deployments
            .get(deployment_id)
            .map(Self::to_deployment)
            .ok_or_else(|| Self::missing(deployment_id))
    }

    async fn get_scalings(&self, deployment_id: &str) -> Result<Scalings> {
        self.lock()
            .deployments
            .get(deployment_id)
            .map(|d| Scalings {
                allocated_units: d.units,
                used_units: 0,
            })
            .ok_or_else(|| Self::missing(deployment_id))
    }

    async fn list_team_roles(&self, deployment_id: &str) -> Result<Vec<TeamRoleEntry>> {
        let state = self.lock();
        let deployment = state
            .deployments
            .get(deployment_id)
            .ok_or_else(|| Self::missing(deployment_id))?;

        let mut by_role: BTreeMap<String, Vec<Team>> = BTreeMap::new();
        for (team, roles) in &deployment.team_roles {
            for role in roles {
                by_role.entry(role.clone()).or_default().push(Team {
                    id: team.clone(),
                    name: String::new(),
                });
            }
        }
        Ok(by_role
            .into_iter()
            .map(|(name, teams)| TeamRoleEntry { name, teams })
            .collect())
    }

    async fn create_deployment(&self, request: &CreateDeploymentRequest) -> Result<Deployment> {
        let panics = self.lock().panic_create.contains(&request.name);
        assert!(!panics, "backend exploded creating {}", request.name);

        let mut state = self.lock();
        state.calls.push(Call::Create(request.name.clone()));
        if state.fail_create.contains(&request.name) {
            return Err(ApiError::api_error(422, format!("cannot create {}", request.name)).into());
        }

        state.next_id += 1;
        let id = format!("dep-{}", state.next_id);
        let deployment = FakeDeployment {
            id: id.clone(),
            name: request.name.clone(),
            deployment_type: request.deployment_type.clone(),
            version: request.version.clone().or_else(|| Some(String::from("3.2.0"))),
            units: request.units.unwrap_or(1),
            tags: Vec::new(),
            team_roles: TeamRoles::new(),
        };
        state.deployments.insert(id.clone(), deployment.clone());

        let recipe = Self::new_recipe(&mut state, &id);
        let mut created = Self::to_deployment(&deployment);
        created.provision_recipe_id = Some(recipe.id);
        Ok(created)
    }

    async fn update_version(&self, deployment_id: &str, version: &str) -> Result<Recipe> {
        let mut state = self.lock();
        state.calls.push(Call::UpdateVersion(
            deployment_id.to_string(),
            version.to_string(),
        ));
        let deployment = state
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| Self::missing(deployment_id))?;
        deployment.version = Some(version.to_string());
        Ok(Self::new_recipe(&mut state, deployment_id))
    }

    async fn set_scalings(&self, deployment_id: &str, units: u32) -> Result<Recipe> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::SetScalings(deployment_id.to_string(), units));
        let deployment = state
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| Self::missing(deployment_id))?;
        deployment.units = units;
        Ok(Self::new_recipe(&mut state, deployment_id))
    }

    async fn update_tags(&self, deployment_id: &str, tags: &[String]) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::UpdateTags(deployment_id.to_string(), tags.to_vec()));
        let deployment = state
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| Self::missing(deployment_id))?;
        deployment.tags = tags.to_vec();
        Ok(())
    }

    async fn grant_team_role(
        &self,
        deployment_id: &str,
        team_id: &str,
        role: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::GrantTeamRole(
            deployment_id.to_string(),
            team_id.to_string(),
            role.to_string(),
        ));
        let deployment = state
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| Self::missing(deployment_id))?;
        deployment
            .team_roles
            .entry(team_id.to_string())
            .or_default()
            .push(role.to_string());
        Ok(())
    }

    async fn get_recipe(&self, recipe_id: &str) -> Result<Recipe> {
        let mut state = self.lock();
        let owner = state
            .recipe_owner
            .get(recipe_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                resource: "recipe",
                id: recipe_id.to_string(),
            })?;
        let owner_name = state
            .deployments
            .get(&owner)
            .map(|d| d.name.clone())
            .unwrap_or_default();

        let first_poll = state.polled.insert(recipe_id.to_string());

        let status = if first_poll && state.unrecognized_once.contains(&owner_name) {
            RecipeStatus::Unknown
        } else if state.stuck.contains(&owner_name) {
            RecipeStatus::Running
        } else if state.fail_recipe.contains(&owner_name) {
            RecipeStatus::Failed
        } else {
            RecipeStatus::Complete
        };

        Ok(Recipe {
            id: recipe_id.to_string(),
            status,
            deployment_id: Some(owner),
        })
    }

    async fn delete_deployment(&self, deployment_id: &str) -> Result<Recipe> {
        let mut state = self.lock();
        state.calls.push(Call::Delete(deployment_id.to_string()));
        let recipe = Self::new_recipe(&mut state, deployment_id);
        state
            .deployments
            .remove(deployment_id)
            .ok_or_else(|| Self::missing(deployment_id))?;
        Ok(recipe)
    }
}
