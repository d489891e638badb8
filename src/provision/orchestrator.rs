//! Fan-out and join of deployment tasks.
//!
//! [`Provisioner`] owns the inventory snapshot, the registry of deployments
//! created during the run and the progress tracker. Each public operation
//! spawns one task per deployment, waits for all of them, then drains a
//! fresh [`ErrorSink`] into a single result.

use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinSet};
use tracing::{info, warn};

use crate::config::DeploymentDescriptor;
use crate::dbaas::DeploymentApi;
use crate::error::{DeployError, ProvisionerError, Result, Stage};
use crate::inventory::Inventory;

use super::connection::{ConnectionRecord, write_records};
use super::deployer::{Deployer, Outcome, Remover, TaskContext, TaskReport};
use super::error_sink::ErrorSink;
use super::progress::{NoProgress, ProgressTracker};
use super::registry::Registry;

/// Default seconds between recipe polls.
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 5;

/// Default seconds to wait for a recipe when a descriptor sets no timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 900;

/// Run-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Log intended actions without contacting the API.
    pub dry_run: bool,
    /// Delay between recipe polls.
    pub polling_interval: Duration,
    /// Polling timeout when a descriptor sets none.
    pub default_timeout: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            polling_interval: Duration::from_secs(DEFAULT_POLLING_INTERVAL_SECS),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Per-task outcomes of a run, plus the aggregated error.
#[derive(Debug)]
pub struct RunReport {
    /// One report per launched task, sorted by name.
    pub tasks: Vec<TaskReport>,
    /// `Ok` if no task failed, otherwise every failure.
    pub result: Result<()>,
}

/// Provisioning orchestrator.
pub struct Provisioner {
    api: Arc<dyn DeploymentApi>,
    inventory: Arc<Inventory>,
    registry: Arc<Registry>,
    progress: Arc<dyn ProgressTracker>,
    options: ProvisionOptions,
}

impl Provisioner {
    /// Fetches the inventory and builds a provisioner over it.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionerError::Init`] if any inventory fetch fails.
    pub async fn init(api: Arc<dyn DeploymentApi>, options: ProvisionOptions) -> Result<Self> {
        let inventory = Inventory::init(api.as_ref()).await?;
        Ok(Self::with_inventory(api, inventory, options))
    }

    /// Builds a provisioner over an inventory fetched elsewhere.
    #[must_use]
    pub fn with_inventory(
        api: Arc<dyn DeploymentApi>,
        inventory: Inventory,
        options: ProvisionOptions,
    ) -> Self {
        Self {
            api,
            inventory: Arc::new(inventory),
            registry: Arc::new(Registry::new()),
            progress: Arc::new(NoProgress),
            options,
        }
    }

    /// Sets the progress tracker.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// The inventory snapshot taken at init.
    #[must_use]
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Run-wide settings.
    #[must_use]
    pub const fn options(&self) -> &ProvisionOptions {
        &self.options
    }

    /// `(name, id)` of every deployment created so far, sorted by name.
    #[must_use]
    pub fn new_deployments(&self) -> Vec<(String, String)> {
        self.registry.entries()
    }

    fn context(&self) -> TaskContext {
        TaskContext {
            api: Arc::clone(&self.api),
            inventory: Arc::clone(&self.inventory),
            registry: Arc::clone(&self.registry),
            progress: Arc::clone(&self.progress),
            options: self.options,
        }
    }

    /// Brings every descriptor in line with remote state.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionerError::Aggregate`] naming every failed deployment.
    pub async fn provision(&self, descriptors: Vec<DeploymentDescriptor>) -> Result<()> {
        self.provision_report(descriptors).await.result
    }

    /// Same as [`Self::provision`], keeping each task's outcome.
    pub async fn provision_report(&self, descriptors: Vec<DeploymentDescriptor>) -> RunReport {
        info!("Provisioning {} deployment(s)", descriptors.len());
        let sink = ErrorSink::new();
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();

        self.progress.start();
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            let deployer = Deployer::new(descriptor, self.context());
            names.insert(tasks.spawn(deployer.run(sink.sender())).id(), name);
        }

        self.join(tasks, names, sink).await
    }

    /// Deletes every named deployment that exists.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionerError::Aggregate`] naming every failed deletion.
    pub async fn deprovision(&self, names: Vec<String>) -> Result<()> {
        self.deprovision_report(names).await.result
    }

    /// Same as [`Self::deprovision`], keeping each task's outcome.
    pub async fn deprovision_report(&self, names: Vec<String>) -> RunReport {
        info!("Deprovisioning {} deployment(s)", names.len());
        let sink = ErrorSink::new();
        let mut tasks = JoinSet::new();
        let mut task_names = HashMap::new();

        self.progress.start();
        for name in names {
            let remover = Remover::new(name.clone(), self.context());
            task_names.insert(tasks.spawn(remover.run(sink.sender())).id(), name);
        }

        self.join(tasks, task_names, sink).await
    }

    /// Waits for every task, then drains the sink.
    ///
    /// A task that panics is reported against its deployment name.
    async fn join(
        &self,
        mut tasks: JoinSet<TaskReport>,
        mut names: HashMap<Id, String>,
        sink: ErrorSink,
    ) -> RunReport {
        let mut reports = Vec::with_capacity(tasks.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => {
                    let name = names.remove(&err.id()).unwrap_or_default();
                    warn!("Task for {name} did not complete: {err}");
                    self.progress.finish(&name, false);
                    sink.enqueue(DeployError::new(
                        &name,
                        Stage::Aborted,
                        ProvisionerError::internal(format!("task did not complete: {err}")),
                    ));
                    reports.push(TaskReport {
                        name,
                        outcome: Outcome::Failed {
                            stage: Stage::Aborted,
                        },
                    });
                }
            }
        }

        self.progress.stop();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        RunReport {
            tasks: reports,
            result: sink.flush(),
        }
    }

    /// Writes connection records for every deployment created this run.
    ///
    /// Hosts are rewritten through `endpoint_map`. A failed lookup does not
    /// prevent the others from being written.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionerError::Aggregate`] with every lookup failure and,
    /// if the write failed, that failure too.
    pub async fn connection_strings(
        &self,
        endpoint_map: &BTreeMap<String, String>,
        out_file: &Path,
    ) -> Result<()> {
        let sink = ErrorSink::new();
        let entries = self.registry.entries();
        info!("Collecting connection strings for {} deployment(s)", entries.len());

        let lookups = entries.into_iter().map(|(name, id)| async move {
            let record = self
                .api
                .get_deployment(&id)
                .await
                .and_then(|d| ConnectionRecord::from_deployment(&d, endpoint_map));
            (name, record)
        });

        let mut records = BTreeMap::new();
        for (name, record) in join_all(lookups).await {
            match record {
                Ok(record) => {
                    records.insert(name, record);
                }
                Err(err) => sink.enqueue(DeployError::new(name, Stage::Output, err)),
            }
        }

        if let Err(err) = write_records(&records, out_file) {
            sink.enqueue(err);
        }

        sink.flush()
    }
}
