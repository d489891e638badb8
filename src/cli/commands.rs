//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::dbaas::DEFAULT_API_URL;
use crate::provision::DEFAULT_POLLING_INTERVAL_SECS;

/// dbaas - Idempotent provisioning of hosted database deployments.
#[derive(Parser, Debug)]
#[command(name = "dbaas")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// API key used to authenticate.
    #[arg(short = 'a', long, global = true, env = "COMPOSE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the API.
    #[arg(long, global = true, env = "DBAAS_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// File to capture every API request and response to.
    #[arg(short, long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log intended actions without changing anything.
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Seconds between status polls.
    #[arg(long, global = true, default_value_t = DEFAULT_POLLING_INTERVAL_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub polling_interval: u64,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or update every deployment described in the spec files.
    Provision {
        /// Deployment spec files (YAML, one or more documents each).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write connection strings of newly created deployments here.
        #[arg(short, long)]
        connection_strings: Option<PathBuf>,

        /// Host rewrite map applied to connection strings.
        #[arg(short, long, requires = "connection_strings")]
        endpoint_map: Option<PathBuf>,
    },

    /// Delete every deployment named in the spec files.
    Deprovision {
        /// Deployment spec files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate spec files against the account without changing anything.
    Validate {
        /// Deployment spec files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
