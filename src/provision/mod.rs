//! Provisioning engine.
//!
//! This module turns validated deployment descriptors into remote actions:
//! - One concurrent deployer task per descriptor, joined by the [`Provisioner`]
//! - Failures collected in an [`ErrorSink`] and reported together
//! - Newly created deployments tracked in a [`Registry`] for output

mod connection;
mod deployer;
mod error_sink;
mod orchestrator;
mod progress;
mod registry;

pub use connection::{ConnectionRecord, rewrite_hosts, write_records};
pub use deployer::{Action, Outcome, TaskReport};
pub use error_sink::{ErrorSender, ErrorSink};
pub use orchestrator::{
    DEFAULT_POLLING_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS, ProvisionOptions, Provisioner, RunReport,
};
pub use progress::{NoProgress, ProgressBars, ProgressTracker};
pub use registry::Registry;
