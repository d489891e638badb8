//! CLI module for the provisioner.
//!
//! This module provides the command-line interface for provisioning,
//! deprovisioning and validating hosted database deployments.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
