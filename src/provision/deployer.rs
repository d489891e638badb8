//! Per-deployment units of concurrent work.
//!
//! A [`Deployer`] drives one descriptor through
//! `Resolving -> Mutating -> Polling -> Tagging -> TeamGranting -> Done`.
//! A [`Remover`] deletes one deployment. Both report failures through an
//! [`ErrorSender`] and never retry.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::{DeploymentDescriptor, Placement};
use crate::dbaas::{CreateDeploymentRequest, DeploymentApi, RecipeStatus};
use crate::error::{ApiError, ConfigError, DeployError, ProvisionerError, Result, Stage};
use crate::inventory::{ExistingDeployment, Inventory};

use super::error_sink::ErrorSender;
use super::orchestrator::ProvisionOptions;
use super::progress::ProgressTracker;
use super::registry::Registry;

/// What a deployer decided to do, resolved once against the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The deployment does not exist yet.
    Create(CreateDeploymentRequest),
    /// The deployment exists but differs.
    Update {
        /// Existing deployment id.
        id: String,
        /// New version, if it changes.
        version: Option<String>,
        /// New scaling, if it changes.
        scaling: Option<u32>,
    },
    /// The deployment exists and matches.
    NoOp {
        /// Existing deployment id.
        id: String,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(request) => {
                write!(f, "create {} deployment", request.deployment_type)?;
                match (&request.datacenter, &request.cluster_id) {
                    (Some(dc), _) => write!(f, " in datacenter {dc}")?,
                    (None, Some(cluster)) => write!(f, " in cluster {cluster}")?,
                    (None, None) => {}
                }
                if let Some(units) = request.units {
                    write!(f, " with {units} unit(s)")?;
                }
                Ok(())
            }
            Self::Update {
                id,
                version,
                scaling,
            } => {
                write!(f, "update {id}")?;
                if let Some(version) = version {
                    write!(f, " to version {version}")?;
                }
                if let Some(units) = scaling {
                    write!(f, " to {units} unit(s)")?;
                }
                Ok(())
            }
            Self::NoOp { id } => write!(f, "leave {id} unchanged"),
        }
    }
}

/// Terminal state of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new deployment was created.
    Created {
        /// New deployment id.
        id: String,
    },
    /// An existing deployment was changed.
    Updated {
        /// Deployment id.
        id: String,
    },
    /// Nothing needed to change.
    Unchanged {
        /// Deployment id.
        id: String,
    },
    /// The deployment was deleted.
    Deleted {
        /// Former deployment id.
        id: String,
    },
    /// Nothing to delete.
    Absent,
    /// Dry run: the action was only logged.
    DryRun {
        /// Human-readable plan.
        plan: String,
    },
    /// The task failed; the error went to the sink.
    Failed {
        /// Stage that failed.
        stage: Stage,
    },
}

impl Outcome {
    /// Returns true unless the task failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Outcome of one task, keyed by deployment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Logical deployment name.
    pub name: String,
    /// How the task ended.
    pub outcome: Outcome,
}

/// Shared, read-mostly state handed to every task of a run.
#[derive(Clone)]
pub struct TaskContext {
    pub(crate) api: Arc<dyn DeploymentApi>,
    pub(crate) inventory: Arc<Inventory>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) progress: Arc<dyn ProgressTracker>,
    pub(crate) options: ProvisionOptions,
}

impl TaskContext {
    /// Polls a recipe until it completes, fails, or `timeout` elapses.
    ///
    /// Every poll pulses the progress tracker for `name`.
    async fn await_recipe(&self, name: &str, recipe_id: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();

        loop {
            let recipe = self.api.get_recipe(recipe_id).await?;
            self.progress.refresh(name);

            match recipe.status {
                RecipeStatus::Complete => {
                    debug!("Recipe {recipe_id} for {name} completed");
                    return Ok(());
                }
                RecipeStatus::Failed => {
                    return Err(ApiError::RecipeFailed {
                        recipe_id: recipe_id.to_string(),
                        status: recipe.status.to_string(),
                    }
                    .into());
                }
                RecipeStatus::Unknown => {
                    debug!("Recipe {recipe_id} for {name} reported an unrecognized status");
                }
                RecipeStatus::Waiting | RecipeStatus::Running => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ApiError::Timeout {
                    recipe_id: recipe_id.to_string(),
                    waited_secs: elapsed.as_secs(),
                }
                .into());
            }

            let remaining = timeout.saturating_sub(elapsed);
            tokio::time::sleep(self.options.polling_interval.min(remaining)).await;
        }
    }

    /// Closes out a task: signals progress and routes any failure to the sink.
    fn settle(
        &self,
        name: String,
        result: std::result::Result<Outcome, DeployError>,
        errors: &ErrorSender,
    ) -> TaskReport {
        let outcome = match result {
            Ok(outcome) => {
                self.progress.finish(&name, true);
                outcome
            }
            Err(err) => {
                error!("{err}");
                self.progress.finish(&name, false);
                let stage = err.stage;
                errors.enqueue(err);
                Outcome::Failed { stage }
            }
        };
        TaskReport { name, outcome }
    }
}

/// Brings one deployment in line with its descriptor.
pub struct Deployer {
    descriptor: DeploymentDescriptor,
    ctx: TaskContext,
}

impl Deployer {
    /// Creates a deployer for one descriptor.
    #[must_use]
    pub const fn new(descriptor: DeploymentDescriptor, ctx: TaskContext) -> Self {
        Self { descriptor, ctx }
    }

    /// Runs every stage, reporting a failure to `errors` exactly once.
    pub async fn run(self, errors: ErrorSender) -> TaskReport {
        let result = self.execute().await;
        self.ctx.settle(self.descriptor.name.clone(), result, &errors)
    }

    async fn execute(&self) -> std::result::Result<Outcome, DeployError> {
        let action = self.resolve().map_err(|e| self.fail(Stage::Resolving, e))?;

        if self.ctx.options.dry_run {
            let plan = action.to_string();
            info!("[dry-run] {}: {plan}", self.descriptor.name);
            return Ok(Outcome::DryRun { plan });
        }

        let created = matches!(action, Action::Create(_));
        let mut changed = !matches!(action, Action::NoOp { .. });

        let id = self.mutate(action).await?;
        changed |= self
            .apply_tags(&id)
            .await
            .map_err(|e| self.fail(Stage::Tagging, e))?;
        changed |= self
            .grant_teams(&id)
            .await
            .map_err(|e| self.fail(Stage::TeamGranting, e))?;

        if created {
            self.ctx.registry.register(&self.descriptor.name, &id);
            info!("Deployment {} created as {id}", self.descriptor.name);
            Ok(Outcome::Created { id })
        } else if changed {
            info!("Deployment {} ({id}) updated", self.descriptor.name);
            Ok(Outcome::Updated { id })
        } else {
            info!("Deployment {} ({id}) is up to date", self.descriptor.name);
            Ok(Outcome::Unchanged { id })
        }
    }

    fn fail(&self, stage: Stage, error: ProvisionerError) -> DeployError {
        DeployError::new(&self.descriptor.name, stage, error)
    }

    fn existing(&self) -> Option<&ExistingDeployment> {
        self.ctx.inventory.deployment(&self.descriptor.name)
    }

    fn timeout(&self) -> Duration {
        self.descriptor
            .timeout
            .unwrap_or(self.ctx.options.default_timeout)
    }

    /// Resolves placement references and decides create, update or no-op.
    fn resolve(&self) -> Result<Action> {
        let d = &self.descriptor;
        let inventory = &self.ctx.inventory;

        let (datacenter, cluster_id) = match &d.placement {
            Placement::Cluster { name } => {
                let id = inventory
                    .cluster_id(name)
                    .ok_or_else(|| ApiError::NotFound {
                        resource: "cluster",
                        id: name.clone(),
                    })?;
                (None, Some(id.to_string()))
            }
            Placement::Datacenter { slug, .. } => {
                if !inventory.has_datacenter(slug) {
                    return Err(ApiError::NotFound {
                        resource: "datacenter",
                        id: slug.clone(),
                    }
                    .into());
                }
                (Some(slug.clone()), None)
            }
        };

        let Some(existing) = self.existing() else {
            return Ok(Action::Create(CreateDeploymentRequest {
                account_id: inventory.account_id().to_string(),
                name: d.name.clone(),
                deployment_type: d.resource_type.as_str().to_string(),
                datacenter,
                cluster_id,
                version: d.version.clone(),
                units: d.placement.scaling(),
                ssl: d.ssl,
                wired_tiger: matches!(
                    d.placement,
                    Placement::Datacenter {
                        wired_tiger: true,
                        ..
                    }
                ),
                notes: d.notes.clone(),
            }));
        };

        if existing.deployment_type != d.resource_type.as_str() {
            return Err(ConfigError::validation(
                format!(
                    "existing deployment {} is of type '{}' and cannot become '{}'",
                    existing.id, existing.deployment_type, d.resource_type
                ),
                "type",
            )
            .into());
        }

        let version = d
            .version
            .clone()
            .filter(|v| existing.version.as_ref() != Some(v));
        let scaling = d
            .placement
            .scaling()
            .filter(|units| existing.scaling != Some(*units));

        if version.is_none() && scaling.is_none() {
            debug!("{} matches remote state", d.name);
            Ok(Action::NoOp {
                id: existing.id.clone(),
            })
        } else {
            Ok(Action::Update {
                id: existing.id.clone(),
                version,
                scaling,
            })
        }
    }

    /// Issues the create or update calls and waits for each to converge.
    async fn mutate(&self, action: Action) -> std::result::Result<String, DeployError> {
        let name = &self.descriptor.name;

        match action {
            Action::Create(request) => {
                info!("Creating {} deployment {name}", request.deployment_type);
                let deployment = self
                    .ctx
                    .api
                    .create_deployment(&request)
                    .await
                    .map_err(|e| self.fail(Stage::Mutating, e))?;
                if let Some(recipe_id) = &deployment.provision_recipe_id {
                    self.ctx
                        .await_recipe(name, recipe_id, self.timeout())
                        .await
                        .map_err(|e| self.fail(Stage::Polling, e))?;
                }
                Ok(deployment.id)
            }
            Action::Update {
                id,
                version,
                scaling,
            } => {
                if let Some(version) = version {
                    info!("Upgrading {name} ({id}) to version {version}");
                    let recipe = self
                        .ctx
                        .api
                        .update_version(&id, &version)
                        .await
                        .map_err(|e| self.fail(Stage::Mutating, e))?;
                    self.ctx
                        .await_recipe(name, &recipe.id, self.timeout())
                        .await
                        .map_err(|e| self.fail(Stage::Polling, e))?;
                }
                if let Some(units) = scaling {
                    info!("Scaling {name} ({id}) to {units} unit(s)");
                    let recipe = self
                        .ctx
                        .api
                        .set_scalings(&id, units)
                        .await
                        .map_err(|e| self.fail(Stage::Mutating, e))?;
                    self.ctx
                        .await_recipe(name, &recipe.id, self.timeout())
                        .await
                        .map_err(|e| self.fail(Stage::Polling, e))?;
                }
                Ok(id)
            }
            Action::NoOp { id } => Ok(id),
        }
    }

    /// Replaces the tag set when it differs. Returns true if a call was made.
    async fn apply_tags(&self, id: &str) -> Result<bool> {
        if self.descriptor.tags.is_empty() {
            return Ok(false);
        }

        let desired: BTreeSet<&str> = self.descriptor.tags.iter().map(String::as_str).collect();
        let current: BTreeSet<&str> = self
            .existing()
            .map(|e| e.tags.iter().map(String::as_str).collect())
            .unwrap_or_default();
        if desired == current {
            debug!("Tags of {} already match", self.descriptor.name);
            return Ok(false);
        }

        let tags: Vec<String> = desired.into_iter().map(str::to_string).collect();
        info!("Tagging {} with {}", self.descriptor.name, tags.join(", "));
        self.ctx.api.update_tags(id, &tags).await?;
        Ok(true)
    }

    /// Grants every missing team role. Never revokes.
    async fn grant_teams(&self, id: &str) -> Result<bool> {
        let existing = self.existing();
        let mut granted = false;

        for (team, role) in &self.descriptor.team_roles {
            if existing.is_some_and(|e| e.has_role(team, role.as_str())) {
                debug!("Team {team} already has {role} on {}", self.descriptor.name);
                continue;
            }
            info!("Granting {role} on {} to team {team}", self.descriptor.name);
            self.ctx.api.grant_team_role(id, team, role.as_str()).await?;
            granted = true;
        }

        Ok(granted)
    }
}

/// Deletes one deployment by name.
pub struct Remover {
    name: String,
    ctx: TaskContext,
}

impl Remover {
    /// Creates a remover for one deployment name.
    #[must_use]
    pub const fn new(name: String, ctx: TaskContext) -> Self {
        Self { name, ctx }
    }

    /// Deletes the deployment if it exists, reporting a failure to `errors`.
    pub async fn run(self, errors: ErrorSender) -> TaskReport {
        let result = self.execute().await;
        self.ctx.settle(self.name.clone(), result, &errors)
    }

    async fn execute(&self) -> std::result::Result<Outcome, DeployError> {
        let Some(existing) = self.ctx.inventory.deployment(&self.name) else {
            info!("Deployment {} does not exist, nothing to delete", self.name);
            return Ok(Outcome::Absent);
        };
        let id = existing.id.clone();

        if self.ctx.options.dry_run {
            let plan = format!("delete {id}");
            info!("[dry-run] {}: {plan}", self.name);
            return Ok(Outcome::DryRun { plan });
        }

        info!("Deleting deployment {} ({id})", self.name);
        let recipe = self
            .ctx
            .api
            .delete_deployment(&id)
            .await
            .map_err(|e| DeployError::new(&self.name, Stage::Deleting, e))?;
        self.ctx
            .await_recipe(&self.name, &recipe.id, self.ctx.options.default_timeout)
            .await
            .map_err(|e| DeployError::new(&self.name, Stage::Polling, e))?;

        Ok(Outcome::Deleted { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResourceType, TeamRole};
    use crate::dbaas::fake::{Call, FakeApi, FakeDeployment};
    use crate::provision::error_sink::ErrorSink;
    use crate::provision::progress::recording::RecordingProgress;

    fn options() -> ProvisionOptions {
        ProvisionOptions {
            dry_run: false,
            polling_interval: Duration::from_millis(5),
            default_timeout: Duration::from_secs(5),
        }
    }

    async fn context(api: &Arc<FakeApi>, options: ProvisionOptions) -> TaskContext {
        let inventory = Inventory::init(api.as_ref()).await.expect("init");
        TaskContext {
            api: api.clone(),
            inventory: Arc::new(inventory),
            registry: Arc::new(Registry::new()),
            progress: Arc::new(RecordingProgress::default()),
            options,
        }
    }

    async fn recorded_context(
        api: &Arc<FakeApi>,
        options: ProvisionOptions,
    ) -> (TaskContext, Arc<RecordingProgress>) {
        let progress = Arc::new(RecordingProgress::default());
        let mut ctx = context(api, options).await;
        ctx.progress = progress.clone();
        (ctx, progress)
    }

    fn refreshes(progress: &RecordingProgress, name: &str) -> usize {
        let event = format!("refresh:{name}");
        progress.events().iter().filter(|e| **e == event).count()
    }

    async fn deploy(
        ctx: &TaskContext,
        descriptor: DeploymentDescriptor,
    ) -> (TaskReport, ErrorSink) {
        let sink = ErrorSink::new();
        let report = Deployer::new(descriptor, ctx.clone())
            .run(sink.sender())
            .await;
        (report, sink)
    }

    fn cache1() -> DeploymentDescriptor {
        DeploymentDescriptor::in_datacenter("cache1", ResourceType::Redis, "aws:us-east-1")
            .with_scaling(2)
    }

    #[tokio::test]
    async fn test_create_registers_new_deployment() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(&api, options()).await;

        let (report, sink) = deploy(&ctx, cache1()).await;

        assert!(sink.flush().is_ok());
        let id = ctx.registry.get("cache1").expect("cache1 should be registered");
        assert_eq!(report.outcome, Outcome::Created { id });
        assert_eq!(api.calls(), vec![Call::Create(String::from("cache1"))]);
        assert_eq!(api.deployment_by_name("cache1").map(|d| d.units), Some(2));
    }

    #[tokio::test]
    async fn test_scaling_change_updates_in_place() {
        let api = Arc::new(FakeApi::new());
        api.seed_deployment(FakeDeployment::new("dep-7", "cache1", "redis", 2));
        let ctx = context(&api, options()).await;

        let (report, sink) = deploy(&ctx, cache1().with_scaling(3)).await;

        assert!(sink.flush().is_ok());
        assert_eq!(
            report.outcome,
            Outcome::Updated {
                id: String::from("dep-7")
            }
        );
        assert_eq!(
            api.calls(),
            vec![Call::SetScalings(String::from("dep-7"), 3)]
        );
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_matching_deployment_is_noop() {
        let api = Arc::new(FakeApi::new());
        api.seed_deployment(FakeDeployment::new("dep-7", "cache1", "redis", 2));
        let ctx = context(&api, options()).await;

        let (report, _sink) = deploy(&ctx, cache1().with_version("3.2.0")).await;

        assert_eq!(
            report.outcome,
            Outcome::Unchanged {
                id: String::from("dep-7")
            }
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_polling_times_out() {
        let api = Arc::new(FakeApi::new());
        api.never_complete("cache1");
        let ctx = context(&api, options()).await;

        let descriptor = cache1().with_timeout(Duration::from_millis(30));
        let (report, sink) = deploy(&ctx, descriptor).await;

        assert_eq!(
            report.outcome,
            Outcome::Failed {
                stage: Stage::Polling
            }
        );
        let err = sink.flush().expect_err("timeout should be reported");
        match err {
            ProvisionerError::Aggregate(agg) => {
                assert_eq!(agg.errors.len(), 1);
                assert!(agg.errors[0].is_timeout());
            }
            other => panic!("expected aggregate, got {other}"),
        }
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_every_poll_pulses_progress() {
        let api = Arc::new(FakeApi::new());
        api.never_complete("cache1");
        let (ctx, progress) = recorded_context(&api, options()).await;

        let descriptor = cache1().with_timeout(Duration::from_millis(60));
        let (report, _sink) = deploy(&ctx, descriptor).await;

        assert!(matches!(report.outcome, Outcome::Failed { .. }));
        assert!(refreshes(&progress, "cache1") >= 2);
        assert!(
            progress
                .events()
                .iter()
                .filter(|e| e.starts_with("refresh:"))
                .all(|e| e == "refresh:cache1")
        );
        assert_eq!(
            progress.events().last().map(String::as_str),
            Some("finish:cache1:false")
        );
    }

    #[tokio::test]
    async fn test_noop_and_dry_run_never_poll() {
        let api = Arc::new(FakeApi::new());
        api.seed_deployment(FakeDeployment::new("dep-7", "cache1", "redis", 2));

        let (ctx, progress) = recorded_context(&api, options()).await;
        let (report, _sink) = deploy(&ctx, cache1().with_version("3.2.0")).await;
        assert!(matches!(report.outcome, Outcome::Unchanged { .. }));
        assert_eq!(refreshes(&progress, "cache1"), 0);

        let dry_run = ProvisionOptions {
            dry_run: true,
            ..options()
        };
        let (ctx, progress) = recorded_context(&api, dry_run).await;
        let (report, _sink) = deploy(&ctx, cache1().with_scaling(5)).await;
        assert!(matches!(report.outcome, Outcome::DryRun { .. }));
        assert_eq!(refreshes(&progress, "cache1"), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_recipe_status_keeps_polling() {
        let api = Arc::new(FakeApi::new());
        api.unrecognized_status_once("cache1");
        let (ctx, progress) = recorded_context(&api, options()).await;

        let (report, sink) = deploy(&ctx, cache1()).await;

        assert!(sink.flush().is_ok());
        assert!(matches!(report.outcome, Outcome::Created { .. }));
        assert_eq!(refreshes(&progress, "cache1"), 2);
    }

    #[tokio::test]
    async fn test_failed_recipe_fails_polling() {
        let api = Arc::new(FakeApi::new());
        api.fail_recipe_for("cache1");
        let ctx = context(&api, options()).await;

        let (report, sink) = deploy(&ctx, cache1()).await;

        assert_eq!(
            report.outcome,
            Outcome::Failed {
                stage: Stage::Polling
            }
        );
        let err = sink.flush().expect_err("failure should be reported");
        assert!(err.to_string().contains("failed with status 'failed'"));
    }

    #[tokio::test]
    async fn test_type_change_fails_resolving() {
        let api = Arc::new(FakeApi::new());
        api.seed_deployment(FakeDeployment::new("dep-7", "cache1", "mongodb", 2));
        let ctx = context(&api, options()).await;

        let (report, _sink) = deploy(&ctx, cache1()).await;

        assert_eq!(
            report.outcome,
            Outcome::Failed {
                stage: Stage::Resolving
            }
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_cluster_fails_resolving() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(&api, options()).await;

        let descriptor = DeploymentDescriptor::in_cluster("docs", ResourceType::MongoDb, "nowhere");
        let (report, sink) = deploy(&ctx, descriptor).await;

        assert_eq!(
            report.outcome,
            Outcome::Failed {
                stage: Stage::Resolving
            }
        );
        let err = sink.flush().expect_err("should be reported");
        assert!(err.to_string().contains("cluster not found: nowhere"));
    }

    #[tokio::test]
    async fn test_cluster_placement_uses_cluster_id() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(&api, options()).await;

        let descriptor = DeploymentDescriptor::in_cluster("docs", ResourceType::MongoDb, "shared");
        let action = Deployer::new(descriptor, ctx).resolve().expect("should resolve");

        match action {
            Action::Create(request) => {
                assert_eq!(request.cluster_id.as_deref(), Some("cluster-1"));
                assert!(request.datacenter.is_none());
                assert!(request.units.is_none());
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(
            &api,
            ProvisionOptions {
                dry_run: true,
                ..options()
            },
        )
        .await;

        let (report, sink) = deploy(&ctx, cache1().with_tags(&["prod"])).await;

        assert!(sink.flush().is_ok());
        assert!(matches!(report.outcome, Outcome::DryRun { .. }));
        assert!(api.calls().is_empty());
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_tags_only_updated_when_different() {
        let api = Arc::new(FakeApi::new());
        let mut existing = FakeDeployment::new("dep-7", "cache1", "redis", 2);
        existing.tags = vec![String::from("prod"), String::from("cache")];
        api.seed_deployment(existing);
        let ctx = context(&api, options()).await;

        let (same, _) = deploy(&ctx, cache1().with_tags(&["cache", "prod"])).await;
        assert!(matches!(same.outcome, Outcome::Unchanged { .. }));
        assert!(api.calls().is_empty());

        let (different, _) = deploy(&ctx, cache1().with_tags(&["cache"])).await;
        assert!(matches!(different.outcome, Outcome::Updated { .. }));
        assert_eq!(
            api.calls(),
            vec![Call::UpdateTags(
                String::from("dep-7"),
                vec![String::from("cache")]
            )]
        );
    }

    #[tokio::test]
    async fn test_team_grants_are_additive() {
        let api = Arc::new(FakeApi::new());
        let mut existing = FakeDeployment::new("dep-7", "cache1", "redis", 2);
        existing
            .team_roles
            .insert(String::from("ops"), vec![String::from("admin")]);
        existing
            .team_roles
            .insert(String::from("legacy"), vec![String::from("developer")]);
        api.seed_deployment(existing);
        let ctx = context(&api, options()).await;

        let descriptor = cache1()
            .with_team_role("ops", TeamRole::Admin)
            .with_team_role("dev", TeamRole::Developer);
        let (report, _) = deploy(&ctx, descriptor).await;

        assert!(report.outcome.is_success());
        assert_eq!(
            api.calls(),
            vec![Call::GrantTeamRole(
                String::from("dep-7"),
                String::from("dev"),
                String::from("developer")
            )]
        );
        let roles = api.deployment_by_name("cache1").expect("exists").team_roles;
        assert!(roles.contains_key("legacy"));
    }

    #[tokio::test]
    async fn test_remover_deletes_and_skips_absent() {
        let api = Arc::new(FakeApi::new());
        api.seed_deployment(FakeDeployment::new("dep-7", "cache1", "redis", 2));
        let ctx = context(&api, options()).await;
        let sink = ErrorSink::new();

        let deleted = Remover::new(String::from("cache1"), ctx.clone())
            .run(sink.sender())
            .await;
        let absent = Remover::new(String::from("ghost"), ctx)
            .run(sink.sender())
            .await;

        assert!(sink.flush().is_ok());
        assert_eq!(
            deleted.outcome,
            Outcome::Deleted {
                id: String::from("dep-7")
            }
        );
        assert_eq!(absent.outcome, Outcome::Absent);
        assert_eq!(api.calls(), vec![Call::Delete(String::from("dep-7"))]);
    }
}
