//! Registry of deployments created during a run.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::warn;

/// Concurrent map from deployment name to newly created deployment id.
///
/// Each name is written at most once, by the task that created it.
#[derive(Debug, Default)]
pub struct Registry {
    entries: DashMap<String, String>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a created deployment. Returns false if the name was taken.
    pub fn register(&self, name: &str, deployment_id: &str) -> bool {
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                warn!(
                    "Deployment {name} already registered as {}, ignoring {deployment_id}",
                    existing.get()
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(deployment_id.to_string());
                true
            }
        }
    }

    /// Looks up the id created for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.entries.get(name).map(|id| id.value().clone())
    }

    /// All `(name, id)` pairs, sorted by name.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort();
        entries
    }

    /// Number of registered deployments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
